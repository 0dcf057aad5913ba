//! Mutation operations for SeaOrmRangeStore

use std::time::Instant;

use sea_orm::{DbErr, EntityTrait, TransactionTrait, sea_query::OnConflict};
use tracing::info;

use super::{SeaOrmRangeStore, converters::range_to_active_model, retry};
use crate::errors::{IpLocatorError, Result};
use crate::rir::RangeSet;

use migration::entities::ip_range;

impl SeaOrmRangeStore {
    /// 在单个事务中清空并批量写入
    ///
    /// 提交前其它连接只能读到旧数据；future 被丢弃时事务回滚。
    pub(super) async fn replace_all_ranges(&self, set: &RangeSet) -> Result<()> {
        let start = Instant::now();
        let models: Vec<ip_range::ActiveModel> = set
            .deduplicated()
            .into_iter()
            .map(range_to_active_model)
            .collect();
        let batch_size = self.insert_batch_size;

        retry::with_retry("replace_all", self.retry_config, || {
            self.replace_all_once(&models, batch_size)
        })
        .await
        .map_err(|e| IpLocatorError::database_operation(format!("Replace all failed: {}", e)))?;

        info!(
            "Replaced range store with {} ranges in {:?}",
            models.len(),
            start.elapsed()
        );
        Ok(())
    }

    async fn replace_all_once(
        &self,
        models: &[ip_range::ActiveModel],
        batch_size: usize,
    ) -> std::result::Result<(), DbErr> {
        let txn = self.db.begin().await?;

        ip_range::Entity::delete_many().exec(&txn).await?;

        for chunk in models.chunks(batch_size) {
            ip_range::Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::column(ip_range::Column::Network)
                        .update_columns([
                            ip_range::Column::CountryCode,
                            ip_range::Column::IpVersion,
                            ip_range::Column::PrefixLen,
                            ip_range::Column::RangeStart,
                            ip_range::Column::RangeEnd,
                        ])
                        .to_owned(),
                )
                .exec(&txn)
                .await?;
        }

        txn.commit().await
    }
}
