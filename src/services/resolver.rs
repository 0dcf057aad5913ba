//! IP → country resolution
//!
//! 查询顺序固定：tier 1 (hot-IP) → 解析地址 → tier 2 (range index) → Range Store。
//! 缓存错误按未命中处理；只有非法地址和 Range Store 错误会返回给调用方。

use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{trace, warn};

use crate::cache::ResolutionCache;
use crate::errors::{IpLocatorError, Result};
use crate::rir::UNKNOWN_COUNTRY;
use crate::storage::RangeStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpResponse {
    pub ip: String,
    pub country_code: String,
}

impl IpResponse {
    pub fn is_unknown(&self) -> bool {
        self.country_code == UNKNOWN_COUNTRY
    }
}

pub struct Resolver {
    cache: Arc<dyn ResolutionCache>,
    store: Arc<dyn RangeStore>,
}

impl Resolver {
    pub fn new(cache: Arc<dyn ResolutionCache>, store: Arc<dyn RangeStore>) -> Self {
        Self { cache, store }
    }

    pub async fn lookup(&self, ip: &str) -> Result<IpResponse> {
        // 1. hot-IP，命中直接返回
        match self.cache.get_hot(ip).await {
            Ok(Some(country_code)) => {
                trace!("Hot-IP hit for {}", ip);
                return Ok(IpResponse {
                    ip: ip.to_string(),
                    country_code,
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Hot-IP cache read failed for {}: {}", ip, e),
        }

        // 2. 解析地址；::ffff:a.b.c.d 按 IPv4 查
        let addr: IpAddr = ip
            .parse::<IpAddr>()
            .map_err(|_| IpLocatorError::invalid_address(format!("Invalid IP address: {}", ip)))?
            .to_canonical();

        // 3. range index
        match self.cache.lookup_range_index(addr).await {
            Ok(Some(country_code)) => {
                trace!("Range index hit for {}", ip);
                self.remember(ip, &country_code).await;
                return Ok(IpResponse {
                    ip: ip.to_string(),
                    country_code,
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Range index lookup failed for {}: {}", ip, e),
        }

        // 4. Range Store；未知结果不缓存
        let country_code = match self.store.find_owner(addr).await? {
            Some(country_code) => {
                self.remember(ip, &country_code).await;
                country_code
            }
            None => UNKNOWN_COUNTRY.to_string(),
        };

        Ok(IpResponse {
            ip: ip.to_string(),
            country_code,
        })
    }

    async fn remember(&self, ip: &str, country_code: &str) {
        if let Err(e) = self.cache.set_hot(ip, country_code).await {
            warn!("Failed to cache {} -> {}: {}", ip, country_code, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryResolutionCache;
    use crate::rir::{Range, RangeSet};
    use crate::storage::MemoryRangeStore;
    use std::time::Duration;

    async fn resolver_with(ranges: &[(&str, &str)]) -> (Resolver, Arc<MemoryResolutionCache>) {
        let set = RangeSet::from_ranges(
            ranges
                .iter()
                .map(|(net, cc)| Range::new(net.parse().unwrap(), *cc))
                .collect(),
        );
        let store = Arc::new(MemoryRangeStore::new());
        store.replace_all(&set).await.unwrap();
        let cache = Arc::new(MemoryResolutionCache::new(100, Duration::from_secs(60)));
        (Resolver::new(cache.clone(), store), cache)
    }

    #[tokio::test]
    async fn test_store_hit_populates_hot_tier() {
        let (resolver, cache) = resolver_with(&[("192.168.0.0/16", "US")]).await;
        let resp = resolver.lookup("192.168.1.1").await.unwrap();
        assert_eq!(resp.country_code, "US");
        assert_eq!(
            cache.get_hot("192.168.1.1").await.unwrap().as_deref(),
            Some("US")
        );
    }

    #[tokio::test]
    async fn test_unknown_is_not_cached() {
        let (resolver, cache) = resolver_with(&[]).await;
        let resp = resolver.lookup("8.8.8.8").await.unwrap();
        assert!(resp.is_unknown());
        assert_eq!(resp.country_code, "ZZ");
        assert_eq!(cache.get_hot("8.8.8.8").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let (resolver, _) = resolver_with(&[]).await;
        let err = resolver.lookup("not-an-ip").await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_ipv4_mapped_address_uses_ipv4_ranges() {
        let (resolver, cache) = resolver_with(&[("8.8.8.0/24", "US")]).await;
        let resp = resolver.lookup("::ffff:8.8.8.8").await.unwrap();
        assert_eq!(resp.ip, "::ffff:8.8.8.8");
        assert_eq!(resp.country_code, "US");

        cache
            .rebuild_range_index(&RangeSet::from_ranges(vec![Range::new(
                "9.9.9.0/24".parse().unwrap(),
                "CH",
            )]))
            .await
            .unwrap();
        let resp = resolver.lookup("::ffff:9.9.9.9").await.unwrap();
        assert_eq!(resp.country_code, "CH");
    }

    #[tokio::test]
    async fn test_hot_tier_answers_first() {
        let (resolver, cache) = resolver_with(&[("10.0.0.0/8", "US")]).await;
        cache.set_hot("10.0.0.1", "JP").await.unwrap();
        let resp = resolver.lookup("10.0.0.1").await.unwrap();
        assert_eq!(resp.country_code, "JP");
    }
}
