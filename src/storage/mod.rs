//! Range Store
//!
//! 所有当前有效 Range 的权威集合，支持“包含地址 X 的最具体 Range”查询。
//!
//! - `backend`: SeaORM（SQLite / MySQL / PostgreSQL）
//! - `memory`: 进程内实现（`memory://`），用于测试与无持久化部署

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::Result;
use crate::rir::RangeSet;

pub mod backend;
pub mod memory;

pub use backend::SeaOrmRangeStore;
pub use memory::MemoryRangeStore;

#[async_trait]
pub trait RangeStore: Send + Sync {
    /// 原子替换全部数据：并发查询只会看到完整的旧集合或完整的新集合
    async fn replace_all(&self, set: &RangeSet) -> Result<()>;

    /// 最长前缀匹配；没有包含该地址的 Range 时返回 None
    async fn find_owner(&self, addr: IpAddr) -> Result<Option<String>>;

    async fn count(&self) -> Result<u64>;

    fn backend_name(&self) -> &str;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<dyn RangeStore>> {
        let database_url = &config.database_url;

        if memory::is_memory_url(database_url) {
            info!("Using in-process range store");
            return Ok(Arc::new(MemoryRangeStore::new()));
        }

        // 从 URL 自动推断数据库类型
        let backend_type = backend::infer_backend_from_url(database_url)?;

        let storage = SeaOrmRangeStore::new(database_url, &backend_type, config).await?;
        Ok(Arc::new(storage))
    }
}
