//! Parser for the RIR extended delegation format
//!
//! `registry|cc|type|start|value|date|status[|extensions...]`
//!
//! For `ipv4` records `value` is an address count (power of two),
//! for `ipv6` records it is the prefix length.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use super::models::Range;

const MIN_FIELDS: usize = 7;

/// 单行解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Range(Range),
    Skipped(SkipReason),
    Invalid(RangeParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    Comment,
    TooFewFields,
    /// 汇总行（country = `*`）
    Summary,
    /// status 不是 allocated / assigned
    Unallocated,
    /// asn 等非 IP 记录
    NotIp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    EmptyCountry,
    BadAddress(String),
    BadCount(String),
    CountNotPowerOfTwo(u64),
    BadPrefix(String),
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeParseError::EmptyCountry => write!(f, "empty country code"),
            RangeParseError::BadAddress(a) => write!(f, "invalid start address '{}'", a),
            RangeParseError::BadCount(v) => write!(f, "invalid address count '{}'", v),
            RangeParseError::CountNotPowerOfTwo(n) => {
                write!(f, "address count {} is not a power of two", n)
            }
            RangeParseError::BadPrefix(v) => write!(f, "invalid prefix length '{}'", v),
        }
    }
}

impl std::error::Error for RangeParseError {}

/// 解析一行。纯函数，不会 panic。
pub fn parse_line(line: &str) -> LineOutcome {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim().is_empty() {
        return LineOutcome::Skipped(SkipReason::Blank);
    }
    if line.starts_with('#') {
        return LineOutcome::Skipped(SkipReason::Comment);
    }

    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < MIN_FIELDS {
        return LineOutcome::Skipped(SkipReason::TooFewFields);
    }

    let country = fields[1].trim();
    let kind = fields[2].trim();
    let start = fields[3].trim();
    let value = fields[4].trim();
    let status = fields[6].trim();

    if country == "*" {
        return LineOutcome::Skipped(SkipReason::Summary);
    }
    if status != "allocated" && status != "assigned" {
        return LineOutcome::Skipped(SkipReason::Unallocated);
    }

    let network = match kind {
        "ipv4" => parse_v4(start, value),
        "ipv6" => parse_v6(start, value),
        _ => return LineOutcome::Skipped(SkipReason::NotIp),
    };

    let network = match network {
        Ok(net) => net,
        Err(e) => return LineOutcome::Invalid(e),
    };

    if country.is_empty() {
        return LineOutcome::Invalid(RangeParseError::EmptyCountry);
    }

    LineOutcome::Range(Range::new(network, country))
}

fn parse_v4(start: &str, value: &str) -> Result<IpNet, RangeParseError> {
    let addr: Ipv4Addr = start
        .parse()
        .map_err(|_| RangeParseError::BadAddress(start.to_string()))?;
    let count: u64 = value
        .parse()
        .map_err(|_| RangeParseError::BadCount(value.to_string()))?;

    if count == 0 || count > (1u64 << 32) {
        return Err(RangeParseError::BadCount(value.to_string()));
    }
    if !count.is_power_of_two() {
        return Err(RangeParseError::CountNotPowerOfTwo(count));
    }

    let prefix = 32 - count.trailing_zeros() as u8;
    let net = Ipv4Net::new(addr, prefix)
        .map_err(|_| RangeParseError::BadPrefix(prefix.to_string()))?;
    Ok(IpNet::V4(net.trunc()))
}

fn parse_v6(start: &str, value: &str) -> Result<IpNet, RangeParseError> {
    let addr: Ipv6Addr = start
        .parse()
        .map_err(|_| RangeParseError::BadAddress(start.to_string()))?;
    let prefix: u8 = value
        .parse()
        .map_err(|_| RangeParseError::BadPrefix(value.to_string()))?;

    let net =
        Ipv6Net::new(addr, prefix).map_err(|_| RangeParseError::BadPrefix(value.to_string()))?;
    Ok(IpNet::V6(net.trunc()))
}
