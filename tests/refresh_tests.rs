//! Refresh coordinator tests
//!
//! Uses an in-process fetcher with scripted per-source results, the memory
//! range store and the memory resolution cache.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iplocator::cache::{MemoryResolutionCache, ResolutionCache};
use iplocator::config::FeedSource;
use iplocator::errors::{IpLocatorError, Result};
use iplocator::rir::{FeedBatch, FeedFetcher, FeedStats, Range, RangeSet};
use iplocator::services::{RefreshCoordinator, RefreshState, Resolver};
use iplocator::storage::{MemoryRangeStore, RangeStore};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn range(net: &str, cc: &str) -> Range {
    Range::new(net.parse().unwrap(), cc)
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn batch(ranges: Vec<Range>) -> FeedBatch {
    let stats = FeedStats {
        lines: ranges.len() as u64 + 1,
        ipv4: ranges.iter().filter(|r| r.network.addr().is_ipv4()).count() as u64,
        ipv6: ranges.iter().filter(|r| r.network.addr().is_ipv6()).count() as u64,
        skipped: 1,
        parse_errors: 0,
    };
    FeedBatch { ranges, stats }
}

/// 按数据源名返回预设结果
#[derive(Default)]
struct ScriptedFetcher {
    results: HashMap<String, std::result::Result<Vec<Range>, String>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedFetcher {
    fn ok(mut self, source: &str, ranges: Vec<Range>) -> Self {
        self.results.insert(source.to_string(), Ok(ranges));
        self
    }

    fn fail(mut self, source: &str) -> Self {
        self.results
            .insert(source.to_string(), Err(format!("{} unreachable", source)));
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &FeedSource, _cancel: &CancellationToken) -> Result<FeedBatch> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.results.get(&source.name) {
            Some(Ok(ranges)) => Ok(batch(ranges.clone())),
            Some(Err(msg)) => Err(IpLocatorError::feed_fetch(msg.clone())),
            None => Ok(batch(Vec::new())),
        }
    }
}

/// 每次调用都失败的缓存
struct FailingCache;

#[async_trait]
impl ResolutionCache for FailingCache {
    async fn get_hot(&self, _ip: &str) -> Result<Option<String>> {
        Err(IpLocatorError::cache_connection("cache down"))
    }

    async fn set_hot(&self, _ip: &str, _country_code: &str) -> Result<()> {
        Err(IpLocatorError::cache_connection("cache down"))
    }

    async fn rebuild_range_index(&self, _set: &RangeSet) -> Result<()> {
        Err(IpLocatorError::cache_operation("rebuild failed"))
    }

    async fn lookup_range_index(&self, _addr: IpAddr) -> Result<Option<String>> {
        Err(IpLocatorError::cache_connection("cache down"))
    }

    fn cache_type(&self) -> &'static str {
        "failing"
    }
}

/// 写入总是失败的 Range Store
struct FailingStore;

#[async_trait]
impl RangeStore for FailingStore {
    async fn replace_all(&self, _set: &RangeSet) -> Result<()> {
        Err(IpLocatorError::database_operation("disk full"))
    }

    async fn find_owner(&self, _addr: IpAddr) -> Result<Option<String>> {
        Err(IpLocatorError::database_operation("disk full"))
    }

    async fn count(&self) -> Result<u64> {
        Ok(0)
    }

    fn backend_name(&self) -> &str {
        "failing"
    }
}

fn sources(names: &[&str]) -> Vec<FeedSource> {
    names
        .iter()
        .map(|n| FeedSource::new(*n, format!("http://feeds.invalid/{}", n)))
        .collect()
}

struct Harness {
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<MemoryRangeStore>,
    cache: Arc<MemoryResolutionCache>,
}

fn harness(fetcher: ScriptedFetcher, names: &[&str]) -> Harness {
    let store = Arc::new(MemoryRangeStore::new());
    let cache = Arc::new(MemoryResolutionCache::new(1000, Duration::from_secs(60)));
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::new(fetcher),
        store.clone(),
        cache.clone(),
        sources(names),
    ));
    Harness {
        coordinator,
        store,
        cache,
    }
}

#[tokio::test]
async fn test_successful_refresh_updates_store_and_index() {
    let fetcher = ScriptedFetcher::default()
        .ok("arin", vec![range("8.8.8.0/24", "US")])
        .ok("ripencc", vec![range("2001:db8::/32", "FR"), range("5.0.0.0/8", "DE")]);
    let h = harness(fetcher, &["arin", "ripencc"]);

    let report = h
        .coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.ipv4, 2);
    assert_eq!(report.ipv6, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.sources.len(), 2);
    assert!(report.sources.iter().all(|s| s.error.is_none()));

    assert_eq!(h.store.count().await.unwrap(), 3);
    assert_eq!(
        h.cache.lookup_range_index(ip("8.8.8.8")).await.unwrap().as_deref(),
        Some("US")
    );
    assert_eq!(
        h.cache.lookup_range_index(ip("2001:db8::1")).await.unwrap().as_deref(),
        Some("FR")
    );

    let status = h.coordinator.status();
    assert_eq!(status.state, RefreshState::Idle);
    assert!(status.last_success_at.is_some());
    assert!(status.last_error.is_none());
    assert_eq!(status.last_report.map(|r| r.total), Some(3));
}

#[tokio::test]
async fn test_partial_failure_keeps_successful_sources() {
    let fetcher = ScriptedFetcher::default()
        .ok("arin", vec![range("8.8.8.0/24", "US")])
        .fail("apnic");
    let h = harness(fetcher, &["arin", "apnic"]);

    let report = h
        .coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.total, 1);
    let apnic = report.sources.iter().find(|s| s.source == "apnic").unwrap();
    assert!(apnic.stats.is_none());
    assert!(apnic.error.as_deref().unwrap().contains("unreachable"));
    assert_eq!(h.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_all_sources_failing_keeps_previous_data() {
    let store = Arc::new(MemoryRangeStore::new());
    store
        .replace_all(&RangeSet::from_ranges(vec![range("1.0.0.0/24", "AU")]))
        .await
        .unwrap();

    let cache = Arc::new(MemoryResolutionCache::new(1000, Duration::from_secs(60)));
    let fetcher = ScriptedFetcher::default().fail("arin").fail("lacnic");
    let coordinator = RefreshCoordinator::new(
        Arc::new(fetcher),
        store.clone(),
        cache,
        sources(&["arin", "lacnic"]),
    );

    let err = coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, IpLocatorError::RefreshFailed(_)));

    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.find_owner(ip("1.0.0.1")).await.unwrap().as_deref(), Some("AU"));

    let status = coordinator.status();
    assert_eq!(status.state, RefreshState::Idle);
    assert!(status.last_error.is_some());
    assert!(status.last_success_at.is_none());
}

#[tokio::test]
async fn test_empty_aggregate_is_failure() {
    let fetcher = ScriptedFetcher::default().ok("arin", Vec::new());
    let h = harness(fetcher, &["arin", "afrinic"]);

    let err = h
        .coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, IpLocatorError::RefreshFailed(_)));
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ensure_initialized_only_when_empty() {
    let fetcher = ScriptedFetcher::default().ok("arin", vec![range("8.8.8.0/24", "US")]);
    let h = harness(fetcher, &["arin"]);
    let cancel = CancellationToken::new();

    let first = h.coordinator.ensure_initialized(&cancel).await.unwrap();
    assert_eq!(first.map(|r| r.total), Some(1));

    let second = h.coordinator.ensure_initialized(&cancel).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_ensure_initialized_propagates_failure() {
    let h = harness(ScriptedFetcher::default().fail("arin"), &["arin"]);
    let result = h
        .coordinator
        .ensure_initialized(&CancellationToken::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_overlapping_refresh_is_rejected() {
    let gate = Arc::new(Notify::new());
    let fetcher = ScriptedFetcher::default()
        .ok("arin", vec![range("8.8.8.0/24", "US")])
        .gated(gate.clone());
    let h = harness(fetcher, &["arin"]);

    let running = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.refresh(&CancellationToken::new()).await })
    };

    // 等待第一个刷新进入 Running
    for _ in 0..100 {
        if h.coordinator.status().state == RefreshState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.coordinator.status().state, RefreshState::Running);

    let err = h
        .coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, IpLocatorError::RefreshInProgress(_)));

    gate.notify_one();
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(h.coordinator.status().state, RefreshState::Idle);
}

#[tokio::test]
async fn test_cancelled_refresh_does_not_touch_store() {
    let fetcher = ScriptedFetcher::default().ok("arin", vec![range("8.8.8.0/24", "US")]);
    let h = harness(fetcher, &["arin"]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = h.coordinator.refresh(&cancel).await.unwrap_err();
    assert!(matches!(err, IpLocatorError::Cancelled(_)));
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert_eq!(h.coordinator.status().state, RefreshState::Idle);
}

#[tokio::test]
async fn test_background_loop_runs_on_trigger_and_stops_on_cancel() {
    let fetcher = ScriptedFetcher::default().ok("arin", vec![range("8.8.8.0/24", "US")]);
    let h = harness(fetcher, &["arin"]);

    let cancel = CancellationToken::new();
    let handle = h
        .coordinator
        .clone()
        .spawn(Duration::from_secs(3600), cancel.clone());

    assert!(handle.trigger());

    let mut loaded = false;
    for _ in 0..200 {
        if h.store.count().await.unwrap() > 0 {
            loaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(loaded, "manual trigger did not run a refresh");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("refresh loop did not stop after cancel");
}

#[tokio::test(start_paused = true)]
async fn test_background_loop_runs_on_schedule() {
    let fetcher = ScriptedFetcher::default().ok("arin", vec![range("8.8.8.0/24", "US")]);
    let h = harness(fetcher, &["arin"]);

    let cancel = CancellationToken::new();
    let handle = h
        .coordinator
        .clone()
        .spawn(Duration::from_secs(86400), cancel.clone());

    tokio::time::sleep(Duration::from_secs(86400 + 1)).await;
    assert_eq!(h.store.count().await.unwrap(), 1);

    cancel.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_index_rebuild_failure_still_counts_as_success() {
    let store = Arc::new(MemoryRangeStore::new());
    let cache: Arc<dyn ResolutionCache> = Arc::new(FailingCache);
    let fetcher = ScriptedFetcher::default().ok("arin", vec![range("8.8.8.0/24", "US")]);
    let coordinator = RefreshCoordinator::new(
        Arc::new(fetcher),
        store.clone(),
        cache.clone(),
        sources(&["arin"]),
    );

    let report = coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(store.count().await.unwrap(), 1);

    let status = coordinator.status();
    assert!(status.last_success_at.is_some());
    assert!(status.last_error.is_none());

    // 缓存完全不可用时查询仍由 Range Store 回答
    let resolver = Resolver::new(cache, store);
    let resp = resolver.lookup("8.8.8.8").await.unwrap();
    assert_eq!(resp.country_code, "US");
    assert!(resolver.lookup("9.9.9.9").await.unwrap().is_unknown());
}

#[tokio::test]
async fn test_store_failure_fails_refresh() {
    let cache = Arc::new(MemoryResolutionCache::new(1000, Duration::from_secs(60)));
    let fetcher = ScriptedFetcher::default().ok("arin", vec![range("8.8.8.0/24", "US")]);
    let coordinator = RefreshCoordinator::new(
        Arc::new(fetcher),
        Arc::new(FailingStore),
        cache.clone(),
        sources(&["arin"]),
    );

    let err = coordinator
        .refresh(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, IpLocatorError::DatabaseOperation(_)));

    // 存储失败时不重建索引
    assert_eq!(cache.lookup_range_index(ip("8.8.8.8")).await.unwrap(), None);
    let status = coordinator.status();
    assert_eq!(status.state, RefreshState::Idle);
    assert!(status.last_error.unwrap().contains("disk full"));
}

#[tokio::test]
async fn test_repeated_refresh_is_idempotent() {
    let fetcher = ScriptedFetcher::default()
        .ok("arin", vec![range("8.8.0.0/16", "US"), range("8.8.8.0/24", "CA")])
        .ok("ripencc", vec![range("2001:db8::/32", "FR")]);
    let h = harness(fetcher, &["arin", "ripencc"]);
    let addrs = ["8.8.8.8", "8.8.9.9", "2001:db8::1", "1.1.1.1"];

    h.coordinator.refresh(&CancellationToken::new()).await.unwrap();
    let mut first = Vec::new();
    for a in addrs {
        first.push(h.store.find_owner(ip(a)).await.unwrap());
    }
    let first_count = h.store.count().await.unwrap();

    h.coordinator.refresh(&CancellationToken::new()).await.unwrap();
    let mut second = Vec::new();
    for a in addrs {
        second.push(h.store.find_owner(ip(a)).await.unwrap());
    }

    assert_eq!(first, second);
    assert_eq!(h.store.count().await.unwrap(), first_count);
    assert_eq!(
        first,
        vec![
            Some("CA".to_string()),
            Some("US".to_string()),
            Some("FR".to_string()),
            None
        ]
    );
}
