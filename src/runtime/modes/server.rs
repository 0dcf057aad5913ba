//! Server mode
//!
//! This module contains the HTTP server startup logic: initial refresh,
//! background refresh loop, signal handling and the lookup API.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::api_routes;
use crate::api::middleware::{LogSampler, RequestLogMiddleware};
use crate::api::services::AppStartTime;
use crate::config::get_config;
use crate::runtime::lifetime;
use crate::system::platform;

/// Run the HTTP server
///
/// This function:
/// 1. Assembles store, cache, resolver and refresh coordinator
/// 2. Runs the initial refresh when the store is empty
/// 3. Spawns the periodic refresh loop and the SIGUSR1 trigger
/// 4. Serves the API until a shutdown signal arrives
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let config = get_config();
    let cancel = CancellationToken::new();

    let startup = lifetime::startup::prepare_server_startup(&config, &cancel)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let refresh_period = Duration::from_secs(config.refresh.interval_secs.max(1));
    let refresh_handle = startup
        .refresh
        .clone()
        .spawn(refresh_period, cancel.child_token());
    info!(
        "Background refresh scheduled every {}s",
        refresh_period.as_secs()
    );

    platform::setup_refresh_signal(refresh_handle.trigger_sender(), cancel.clone());

    let resolver = startup.resolver.clone();
    let refresh = startup.refresh.clone();
    let store = startup.store.clone();
    let cache = startup.cache.clone();

    let sampler = Arc::new(LogSampler::new(Duration::from_secs(
        config.logging.sample_interval_secs,
    )));
    let slow_threshold = Duration::from_millis(config.logging.slow_request_ms);
    let api_prefix = config.server.api_prefix.clone();

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogMiddleware::new(sampler.clone(), slow_threshold))
            .wrap(Compress::default())
            .app_data(web::Data::new(resolver.clone()))
            .app_data(web::Data::new(refresh.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .service(api_routes(&api_prefix))
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .disable_signals()
    .workers(cpu_count);

    warn!(
        "Starting server at http://{}:{}{}",
        config.server.host, config.server.port, config.server.api_prefix
    );
    let server = server
        .bind((config.server.host.as_str(), config.server.port))
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?
        .run();

    // 关闭信号到达后先停止接收请求，再等待后台刷新退出
    let server_handle = server.handle();
    let shutdown_token = cancel.clone();
    actix_web::rt::spawn(async move {
        lifetime::shutdown::listen_for_shutdown(shutdown_token).await;
        server_handle.stop(true).await;
    });

    let served = server.await;

    cancel.cancel();
    refresh_handle.join().await;
    warn!("Graceful shutdown: all tasks completed");

    served.context("HTTP server exited with error")
}
