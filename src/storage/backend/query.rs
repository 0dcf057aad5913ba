//! Query operations for SeaOrmRangeStore
//!
//! This module contains all read-only database operations.

use std::net::IpAddr;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::trace;

use super::{SeaOrmRangeStore, converters::candidate_networks, retry};
use crate::errors::{IpLocatorError, Result};
use crate::rir::AddressFamily;

use migration::entities::ip_range;

impl SeaOrmRangeStore {
    /// 最长前缀匹配，同前缀时按国家代码升序
    ///
    /// 按前缀长度枚举候选网络，走 `network` 唯一索引，代价与表大小无关。
    pub(super) async fn find_owner_of(&self, addr: IpAddr) -> Result<Option<String>> {
        let db = &self.db;
        let version = AddressFamily::of(&addr).as_u8() as i16;
        let candidates = candidate_networks(&addr);

        let model = retry::with_retry(&format!("find_owner({})", addr), self.retry_config, || {
            let candidates = candidates.clone();
            async move {
                ip_range::Entity::find()
                    .filter(ip_range::Column::IpVersion.eq(version))
                    .filter(ip_range::Column::Network.is_in(candidates))
                    .order_by_desc(ip_range::Column::PrefixLen)
                    .order_by_asc(ip_range::Column::CountryCode)
                    .limit(1)
                    .one(db)
                    .await
            }
        })
        .await
        .map_err(|e| {
            IpLocatorError::database_operation(format!("Range lookup for {} failed: {}", addr, e))
        })?;

        trace!("Store lookup {} -> {:?}", addr, model.as_ref().map(|m| &m.network));
        Ok(model.map(|m| m.country_code))
    }

    pub(super) async fn count_ranges(&self) -> Result<u64> {
        let db = &self.db;
        retry::with_retry("count_ranges", self.retry_config, || async {
            ip_range::Entity::find().count(db).await
        })
        .await
        .map_err(|e| IpLocatorError::database_operation(format!("Count failed: {}", e)))
    }
}
