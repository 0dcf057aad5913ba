use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::cache::range_index::RangeIndex;
use crate::cache::traits::ResolutionCache;
use crate::config::CacheConfig;
use crate::declare_resolution_cache_plugin;
use crate::errors::Result;
use crate::rir::RangeSet;

declare_resolution_cache_plugin!("memory", MemoryResolutionCache);

/// 带整体过期时间的索引快照
struct IndexSnapshot {
    index: RangeIndex,
    expires_at: Instant,
}

/// 进程内解析缓存
///
/// tier 1 使用 moka（TTL + 容量上限），tier 2 为 ArcSwap 整体替换的有序索引。
pub struct MemoryResolutionCache {
    hot: Cache<String, String>,
    index: ArcSwapOption<IndexSnapshot>,
    ttl: Duration,
}

impl MemoryResolutionCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let hot = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        debug!(
            "MemoryResolutionCache initialized with max capacity: {}, TTL: {:?}",
            max_capacity, ttl
        );
        Self {
            hot,
            index: ArcSwapOption::empty(),
            ttl,
        }
    }

    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self::new(
            config.memory.max_capacity,
            Duration::from_secs(config.ttl_secs),
        ))
    }
}

#[async_trait]
impl ResolutionCache for MemoryResolutionCache {
    async fn get_hot(&self, ip: &str) -> Result<Option<String>> {
        Ok(self.hot.get(ip).await)
    }

    async fn set_hot(&self, ip: &str, country_code: &str) -> Result<()> {
        self.hot
            .insert(ip.to_string(), country_code.to_string())
            .await;
        Ok(())
    }

    async fn rebuild_range_index(&self, set: &RangeSet) -> Result<()> {
        let index = RangeIndex::build(set);
        debug!("Rebuilt in-process range index with {} entries", index.len());
        self.index.store(Some(Arc::new(IndexSnapshot {
            index,
            expires_at: Instant::now() + self.ttl,
        })));
        Ok(())
    }

    async fn lookup_range_index(&self, addr: IpAddr) -> Result<Option<String>> {
        let guard = self.index.load();
        let Some(snapshot) = guard.as_ref() else {
            return Ok(None);
        };
        if Instant::now() >= snapshot.expires_at {
            return Ok(None);
        }
        Ok(snapshot
            .index
            .lookup(addr)
            .map(|entry| entry.country_code.clone()))
    }

    fn cache_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rir::Range;

    fn sample_set() -> RangeSet {
        RangeSet::from_ranges(vec![
            Range::new("192.168.0.0/16".parse().unwrap(), "US"),
            Range::new("2001:db8::/32".parse().unwrap(), "CA"),
        ])
    }

    #[tokio::test]
    async fn test_hot_tier_round_trip() {
        let cache = MemoryResolutionCache::new(100, Duration::from_secs(60));
        assert_eq!(cache.get_hot("1.1.1.1").await.unwrap(), None);
        cache.set_hot("1.1.1.1", "AU").await.unwrap();
        assert_eq!(
            cache.get_hot("1.1.1.1").await.unwrap().as_deref(),
            Some("AU")
        );
    }

    #[tokio::test]
    async fn test_range_index_rebuild_and_lookup() {
        let cache = MemoryResolutionCache::new(100, Duration::from_secs(60));
        let addr: IpAddr = "192.168.4.4".parse().unwrap();
        assert_eq!(cache.lookup_range_index(addr).await.unwrap(), None);

        cache.rebuild_range_index(&sample_set()).await.unwrap();
        assert_eq!(
            cache.lookup_range_index(addr).await.unwrap().as_deref(),
            Some("US")
        );
        assert_eq!(
            cache
                .lookup_range_index("2001:db8::5".parse().unwrap())
                .await
                .unwrap()
                .as_deref(),
            Some("CA")
        );

        // 重建会丢弃旧内容
        cache.rebuild_range_index(&RangeSet::new()).await.unwrap();
        assert_eq!(cache.lookup_range_index(addr).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_range_index_expires() {
        let cache = MemoryResolutionCache::new(100, Duration::from_millis(20));
        cache.rebuild_range_index(&sample_set()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            cache
                .lookup_range_index("192.168.0.1".parse().unwrap())
                .await
                .unwrap(),
            None
        );
    }
}
