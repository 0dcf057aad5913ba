//! Refresh coordinator
//!
//! 完整的数据摄取周期：按顺序抓取所有数据源 → 合并 → 原子替换 Range Store →
//! 重建 tier 2 索引。启动同步刷新、定时刷新和手动触发共用一个互斥锁，
//! 已有刷新在运行时新的请求直接丢弃。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::ResolutionCache;
use crate::config::FeedSource;
use crate::errors::{IpLocatorError, Result};
use crate::rir::{FeedFetcher, FeedStats, RangeSet, SourceReport};
use crate::storage::RangeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RefreshState {
    #[default]
    Idle,
    Running,
}

/// 单次刷新报告
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: u64,
    pub ipv4: u64,
    pub ipv6: u64,
    pub skipped: u64,
    pub parse_errors: u64,
    pub sources: Vec<SourceReport>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<RefreshReport>,
}

pub struct RefreshCoordinator {
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn RangeStore>,
    cache: Arc<dyn ResolutionCache>,
    sources: Vec<FeedSource>,
    guard: Mutex<()>,
    status: RwLock<RefreshStatus>,
}

/// 后台刷新任务句柄
pub struct RefreshHandle {
    trigger: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// 请求一次手动刷新；已有请求排队或刷新进行中时返回 false
    pub fn trigger(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    pub fn trigger_sender(&self) -> mpsc::Sender<()> {
        self.trigger.clone()
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Refresh task terminated abnormally: {}", e);
        }
    }
}

/// 刷新期间保持 Running，结束（包括被取消丢弃）时恢复 Idle
struct RunningGuard<'a>(&'a RwLock<RefreshStatus>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.write().state = RefreshState::Idle;
    }
}

impl RefreshCoordinator {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn RangeStore>,
        cache: Arc<dyn ResolutionCache>,
        sources: Vec<FeedSource>,
    ) -> Self {
        Self {
            fetcher,
            store,
            cache,
            sources,
            guard: Mutex::new(()),
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.read().clone()
    }

    /// 执行一次完整刷新；已有刷新在运行时返回 `RefreshInProgress`
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        let Ok(_lock) = self.guard.try_lock() else {
            return Err(IpLocatorError::refresh_in_progress(
                "A refresh is already running",
            ));
        };

        {
            let mut status = self.status.write();
            status.state = RefreshState::Running;
            status.last_attempt_at = Some(Utc::now());
        }
        let _running = RunningGuard(&self.status);

        let result = self.run_cycle(cancel).await;

        let mut status = self.status.write();
        match &result {
            Ok(report) => {
                status.last_success_at = Some(Utc::now());
                status.last_error = None;
                status.last_report = Some(report.clone());
            }
            Err(e) => {
                status.last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Range Store 为空时同步执行一次刷新，失败即返回错误
    pub async fn ensure_initialized(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<RefreshReport>> {
        let count = self.store.count().await?;
        if count > 0 {
            info!(
                "Range store already holds {} ranges, skipping initial refresh",
                count
            );
            return Ok(None);
        }

        info!("Range store is empty, running initial refresh");
        self.refresh(cancel).await.map(Some)
    }

    /// 启动后台刷新循环
    ///
    /// 单个任务统一处理定时 tick、手动触发和取消信号。
    pub fn spawn(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> RefreshHandle {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Refresh loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_logged("scheduled", &cancel).await;
                    }
                    Some(()) = rx.recv() => {
                        self.run_logged("manual", &cancel).await;
                    }
                }

                // 刷新期间到达的触发请求直接丢弃
                while rx.try_recv().is_ok() {}
            }
        });

        RefreshHandle { trigger: tx, task }
    }

    async fn run_logged(&self, reason: &str, cancel: &CancellationToken) {
        info!("Starting {} refresh", reason);
        match self.refresh(cancel).await {
            Ok(report) => info!(
                "{} refresh finished in {}ms: {} ranges",
                reason, report.duration_ms, report.total
            ),
            Err(e @ IpLocatorError::RefreshInProgress(_)) => {
                debug!("{} refresh dropped: {}", reason, e)
            }
            Err(e) => error!("{} refresh failed, keeping previous data: {}", reason, e),
        }
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        let started = Instant::now();
        let started_at = Utc::now();

        let mut set = RangeSet::new();
        let mut sources = Vec::with_capacity(self.sources.len());
        let mut failures = 0usize;

        for source in &self.sources {
            if cancel.is_cancelled() {
                return Err(IpLocatorError::cancelled("refresh cancelled"));
            }

            match self.fetcher.fetch(source, cancel).await {
                Ok(batch) => {
                    sources.push(SourceReport {
                        source: source.name.clone(),
                        stats: Some(batch.stats),
                        error: None,
                    });
                    set.absorb(&source.name, batch);
                }
                Err(e @ IpLocatorError::Cancelled(_)) => return Err(e),
                Err(e) => {
                    error!("Source {} failed: {}", source.name, e);
                    failures += 1;
                    sources.push(SourceReport {
                        source: source.name.clone(),
                        stats: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if failures == self.sources.len() {
            return Err(IpLocatorError::refresh_failed(format!(
                "all {} sources failed",
                self.sources.len()
            )));
        }
        if set.is_empty() {
            return Err(IpLocatorError::refresh_failed(
                "sources produced no ranges",
            ));
        }

        let stored = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(IpLocatorError::cancelled("refresh cancelled while storing"));
            }
            r = self.store.replace_all(&set) => r,
        };
        stored?;

        if let Err(e) = self.cache.rebuild_range_index(&set).await {
            warn!("Range index rebuild failed, lookups fall back to store: {}", e);
        }

        let totals: FeedStats = set.totals();
        let report = RefreshReport {
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            total: set.len() as u64,
            ipv4: totals.ipv4,
            ipv6: totals.ipv6,
            skipped: totals.skipped,
            parse_errors: totals.parse_errors,
            sources,
        };

        info!(
            "Refresh complete: total={} v4={} v6={} skipped={} parse_errors={} ({} of {} sources ok) in {}ms",
            report.total,
            report.ipv4,
            report.ipv6,
            report.skipped,
            report.parse_errors,
            self.sources.len() - failures,
            self.sources.len(),
            report.duration_ms
        );

        Ok(report)
    }
}
