use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::Serialize;

/// 未知归属的国家代码
pub const UNKNOWN_COUNTRY: &str = "ZZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// 持久化用的数值标签（4 / 6）
    pub fn as_u8(&self) -> u8 {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 6,
        }
    }
}

/// 一条归一化后的分配记录
///
/// `network` 总是规范网络地址（主机位清零）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Range {
    pub network: IpNet,
    pub country_code: String,
    pub family: AddressFamily,
}

impl Range {
    pub fn new(network: IpNet, country_code: impl Into<String>) -> Self {
        let network = network.trunc();
        let family = match network {
            IpNet::V4(_) => AddressFamily::V4,
            IpNet::V6(_) => AddressFamily::V6,
        };
        Self {
            network,
            country_code: country_code.into(),
            family,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        self.network.prefix_len()
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.network.contains(addr)
    }

    /// 网络起始地址的数值形式（v4 放在低 32 位）
    pub fn start_u128(&self) -> u128 {
        addr_to_u128(&self.network.network())
    }

    pub fn end_u128(&self) -> u128 {
        addr_to_u128(&self.network.broadcast())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} v{}",
            self.network,
            self.country_code,
            self.family.as_u8()
        )
    }
}

pub fn addr_to_u128(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(*v4) as u128,
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

/// 单个数据源的解析统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub lines: u64,
    pub ipv4: u64,
    pub ipv6: u64,
    pub skipped: u64,
    pub parse_errors: u64,
}

impl FeedStats {
    pub fn total(&self) -> u64 {
        self.ipv4 + self.ipv6
    }

    pub fn absorb(&mut self, other: &FeedStats) {
        self.lines += other.lines;
        self.ipv4 += other.ipv4;
        self.ipv6 += other.ipv6;
        self.skipped += other.skipped;
        self.parse_errors += other.parse_errors;
    }
}

/// 一次成功抓取的结果
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    pub ranges: Vec<Range>,
    pub stats: FeedStats,
}

/// 每个数据源在一次刷新中的结果
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub stats: Option<FeedStats>,
    pub error: Option<String>,
}

/// 一次刷新周期产出的全部 Range
///
/// 按数据源顺序追加，之后只读。
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    ranges: Vec<Range>,
    per_source: Vec<(String, FeedStats)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ranges(ranges: Vec<Range>) -> Self {
        Self {
            ranges,
            per_source: Vec::new(),
        }
    }

    pub fn absorb(&mut self, source: &str, batch: FeedBatch) {
        self.per_source.push((source.to_string(), batch.stats));
        self.ranges.extend(batch.ranges);
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn per_source(&self) -> &[(String, FeedStats)] {
        &self.per_source
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn totals(&self) -> FeedStats {
        let mut total = FeedStats::default();
        for (_, stats) in &self.per_source {
            total.absorb(stats);
        }
        total
    }

    /// 按 network 去重，后出现的记录覆盖先出现的
    pub fn deduplicated(&self) -> Vec<&Range> {
        let mut position: HashMap<IpNet, usize> = HashMap::with_capacity(self.ranges.len());
        let mut unique: Vec<&Range> = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            match position.get(&range.network) {
                Some(&idx) => unique[idx] = range,
                None => {
                    position.insert(range.network, unique.len());
                    unique.push(range);
                }
            }
        }
        unique
    }
}
