use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheFactory, ResolutionCache};
use crate::config::StaticConfig;
use crate::rir::{FeedFetcher, HttpFeedFetcher};
use crate::services::{RefreshCoordinator, Resolver};
use crate::storage::{RangeStore, StorageFactory};

/// 运行时共享的组件集合
pub struct StartupContext {
    pub store: Arc<dyn RangeStore>,
    pub cache: Arc<dyn ResolutionCache>,
    pub resolver: Arc<Resolver>,
    pub refresh: Arc<RefreshCoordinator>,
}

/// 按配置组装存储、缓存、解析器与刷新协调器
pub async fn build_context(config: &StaticConfig) -> Result<StartupContext> {
    // ureq 与 sea-orm 共用 ring provider；重复安装（测试或多次调用）时忽略
    let _ = rustls::crypto::ring::default_provider().install_default();

    let store = StorageFactory::create(&config.database)
        .await
        .context("Failed to create range store")?;
    info!("Using range store backend: {}", store.backend_name());

    let cache = CacheFactory::create(&config.cache)
        .await
        .context("Failed to create resolution cache")?;

    let fetcher: Arc<dyn FeedFetcher> = Arc::new(HttpFeedFetcher::new(&config.fetcher));
    let resolver = Arc::new(Resolver::new(cache.clone(), store.clone()));
    let refresh = Arc::new(RefreshCoordinator::new(
        fetcher,
        store.clone(),
        cache.clone(),
        config.refresh.sources.clone(),
    ));

    Ok(StartupContext {
        store,
        cache,
        resolver,
        refresh,
    })
}

/// 准备服务器启动的上下文
///
/// 存储为空时同步完成首次刷新，失败则启动失败。
pub async fn prepare_server_startup(
    config: &StaticConfig,
    cancel: &CancellationToken,
) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let ctx = build_context(config).await?;

    if let Some(report) = ctx
        .refresh
        .ensure_initialized(cancel)
        .await
        .context("Initial refresh failed")?
    {
        info!(
            "Initial refresh loaded {} ranges ({} IPv4, {} IPv6) in {}ms",
            report.total, report.ipv4, report.ipv6, report.duration_ms
        );
    }

    info!(
        "Pre-startup completed in {} ms",
        start_time.elapsed().as_millis()
    );
    Ok(ctx)
}
