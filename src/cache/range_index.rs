//! Ordered range index (tier 2)
//!
//! 以 Range 起始地址为键的有序索引。查询取“≤ 地址的最大起始地址”，
//! 再用存储的起始地址与前缀长度重建网络校验包含关系。
//! 起始地址相同的多个 Range 只保留前缀最长的一条。

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::rir::{AddressFamily, Range, RangeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub country_code: String,
    pub prefix_len: u8,
}

#[derive(Debug, Clone, Default)]
pub struct RangeIndex {
    v4: BTreeMap<u32, IndexEntry>,
    v6: BTreeMap<u128, IndexEntry>,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(set: &RangeSet) -> Self {
        let mut index = Self::new();
        for range in set.deduplicated() {
            index.insert(range);
        }
        index
    }

    pub fn insert(&mut self, range: &Range) {
        let entry = IndexEntry {
            country_code: range.country_code.clone(),
            prefix_len: range.prefix_len(),
        };
        match range.family {
            AddressFamily::V4 => {
                insert_most_specific(&mut self.v4, range.start_u128() as u32, entry)
            }
            AddressFamily::V6 => insert_most_specific(&mut self.v6, range.start_u128(), entry),
        }
    }

    pub fn lookup(&self, addr: IpAddr) -> Option<&IndexEntry> {
        match addr {
            IpAddr::V4(v4) => {
                let key = u32::from(v4);
                let (&start, entry) = self.v4.range(..=key).next_back()?;
                contains(IpAddr::V4(start.into()), entry.prefix_len, addr).then_some(entry)
            }
            IpAddr::V6(v6) => {
                let key = u128::from(v6);
                let (&start, entry) = self.v6.range(..=key).next_back()?;
                contains(IpAddr::V6(start.into()), entry.prefix_len, addr).then_some(entry)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    pub fn iter_v4(&self) -> impl Iterator<Item = (u32, &IndexEntry)> {
        self.v4.iter().map(|(k, v)| (*k, v))
    }

    pub fn iter_v6(&self) -> impl Iterator<Item = (u128, &IndexEntry)> {
        self.v6.iter().map(|(k, v)| (*k, v))
    }
}

fn insert_most_specific<K: Ord>(map: &mut BTreeMap<K, IndexEntry>, key: K, entry: IndexEntry) {
    match map.get(&key) {
        Some(existing) if existing.prefix_len > entry.prefix_len => {}
        _ => {
            map.insert(key, entry);
        }
    }
}

/// 由起始地址 + 前缀长度重建网络后判断包含
pub fn contains(start: IpAddr, prefix_len: u8, addr: IpAddr) -> bool {
    match IpNet::new(start, prefix_len) {
        Ok(net) => net.trunc().contains(&addr),
        Err(_) => false,
    }
}
