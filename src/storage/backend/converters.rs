use std::net::IpAddr;

use ipnet::IpNet;

use crate::rir::Range;
use migration::entities::ip_range;

/// 定长小写十六进制：v4 8 位，v6 32 位
///
/// 同一族内字符串序与数值序一致，包含判断可直接用字符串比较。
pub fn addr_to_hex(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{:08x}", u32::from(*v4)),
        IpAddr::V6(v6) => format!("{:032x}", u128::from(*v6)),
    }
}

/// 地址在每个前缀长度下所属网络的 `network` 列取值
///
/// 入库网络均已按前缀对齐，候选集合与 `network` 唯一索引直接匹配。
pub fn candidate_networks(addr: &IpAddr) -> Vec<String> {
    let max_len = match addr {
        IpAddr::V4(_) => 32u8,
        IpAddr::V6(_) => 128u8,
    };
    (0..=max_len)
        .filter_map(|len| IpNet::new(*addr, len).ok())
        .map(|net| net.trunc().to_string())
        .collect()
}

/// 将 Range 转换为 ActiveModel（用于插入）
pub fn range_to_active_model(range: &Range) -> ip_range::ActiveModel {
    use sea_orm::ActiveValue::*;

    ip_range::ActiveModel {
        id: NotSet,
        network: Set(range.network.to_string()),
        country_code: Set(range.country_code.clone()),
        ip_version: Set(range.family.as_u8() as i16),
        prefix_len: Set(range.prefix_len() as i16),
        range_start: Set(addr_to_hex(&range.network.network())),
        range_end: Set(addr_to_hex(&range.network.broadcast())),
    }
}
