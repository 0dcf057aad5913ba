use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::debug;

use super::RangeStore;
use crate::errors::Result;
use crate::rir::{AddressFamily, RangeSet, models::addr_to_u128};

pub fn is_memory_url(url: &str) -> bool {
    url.starts_with("memory://") || url == "memory"
}

/// 按前缀长度分桶的网络表：prefix_len → (网络起始地址 → 国家)
#[derive(Default)]
struct PrefixTable {
    v4: BTreeMap<u8, HashMap<u128, String>>,
    v6: BTreeMap<u8, HashMap<u128, String>>,
    len: u64,
}

impl PrefixTable {
    fn build(set: &RangeSet) -> Self {
        let mut table = PrefixTable::default();
        for range in set.deduplicated() {
            let buckets = match range.family {
                AddressFamily::V4 => &mut table.v4,
                AddressFamily::V6 => &mut table.v6,
            };
            buckets
                .entry(range.prefix_len())
                .or_default()
                .insert(range.start_u128(), range.country_code.clone());
            table.len += 1;
        }
        table
    }

    fn lookup(&self, addr: &IpAddr) -> Option<&String> {
        let (buckets, bits) = match addr {
            IpAddr::V4(_) => (&self.v4, 32u32),
            IpAddr::V6(_) => (&self.v6, 128u32),
        };
        let value = addr_to_u128(addr);

        // 从最长前缀开始找
        buckets.iter().rev().find_map(|(&prefix, networks)| {
            let host_bits = bits - prefix as u32;
            let base = if host_bits >= 128 {
                0
            } else {
                (value >> host_bits) << host_bits
            };
            networks.get(&base)
        })
    }
}

/// 进程内 Range Store
///
/// 整表通过 ArcSwap 替换，读者不会看到半新半旧的数据。
pub struct MemoryRangeStore {
    table: ArcSwap<PrefixTable>,
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(PrefixTable::default()),
        }
    }
}

impl Default for MemoryRangeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RangeStore for MemoryRangeStore {
    async fn replace_all(&self, set: &RangeSet) -> Result<()> {
        let table = PrefixTable::build(set);
        debug!("Memory range store swapped in {} ranges", table.len);
        self.table.store(Arc::new(table));
        Ok(())
    }

    async fn find_owner(&self, addr: IpAddr) -> Result<Option<String>> {
        Ok(self.table.load().lookup(&addr).cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.table.load().len)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
