//! Unix/Linux platform implementation

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 收到 SIGUSR1 时请求一次手动刷新
pub fn setup_refresh_signal(trigger: mpsc::Sender<()>, cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        // 创建失败时降级为不支持信号刷新，而不是 panic
        let mut stream = match signal(SignalKind::user_defined1()) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "Failed to create SIGUSR1 handler: {}. Signal-triggered refresh disabled.",
                    e
                );
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = stream.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("Received SIGUSR1, triggering refresh...");
                    if trigger.try_send(()).is_err() {
                        info!("Refresh already pending, SIGUSR1 ignored");
                    }
                }
            }
        }
    });
}
