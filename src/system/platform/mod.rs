//! Platform abstraction layer
//!
//! - `unix.rs`: SIGUSR1 triggers a manual refresh
//! - other platforms: signal-triggered refresh is unavailable

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::setup_refresh_signal;

/// 非 Unix 平台不支持信号触发刷新
#[cfg(not(unix))]
pub fn setup_refresh_signal(
    _trigger: tokio::sync::mpsc::Sender<()>,
    _cancel: tokio_util::sync::CancellationToken,
) {
    tracing::debug!("Signal-triggered refresh is not supported on this platform");
}
