use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 等待 Ctrl+C（Unix 下还包括 SIGTERM），随后取消 `cancel`
pub async fn listen_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(
                    "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                    e
                );
            }
        }
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    info!("Shutdown signal received, stopping background tasks...");
    cancel.cancel();
}
