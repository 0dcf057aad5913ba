use std::net::IpAddr;

use async_trait::async_trait;

use crate::errors::Result;
use crate::rir::RangeSet;

/// 两级解析缓存
///
/// - tier 1 (hot-IP)：地址字面量 → 国家代码，惰性写入
/// - tier 2 (range index)：按起始地址有序的 Range 索引，每次刷新整体重建
///
/// 两级都使用写入时设置的 TTL。缓存内容只是 Range Store 的派生副本，
/// 可能落后一个刷新周期。
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    async fn get_hot(&self, ip: &str) -> Result<Option<String>>;

    async fn set_hot(&self, ip: &str, country_code: &str) -> Result<()>;

    /// 清空并以 `set` 重建 tier 2
    async fn rebuild_range_index(&self, set: &RangeSet) -> Result<()>;

    /// 包含校验失败视为未命中，不是错误
    async fn lookup_range_index(&self, addr: IpAddr) -> Result<Option<String>>;

    fn cache_type(&self) -> &'static str;
}
