//! SeaORM range store backend
//!
//! This module provides the persisted range store using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod connection;
mod converters;
mod mutations;
mod query;
pub mod retry;

use std::net::IpAddr;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::warn;

use super::RangeStore;
use crate::config::DatabaseConfig;
use crate::errors::{IpLocatorError, Result};
use crate::rir::RangeSet;

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::{addr_to_hex, range_to_active_model};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(IpLocatorError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://, memory://",
            database_url
        )))
    }
}

/// SeaORM-based range store
#[derive(Clone)]
pub struct SeaOrmRangeStore {
    db: DatabaseConnection,
    backend_name: String,
    /// 重试配置
    retry_config: retry::RetryConfig,
    /// 每条 INSERT 的行数
    insert_batch_size: usize,
}

impl SeaOrmRangeStore {
    pub async fn new(
        database_url: &str,
        backend_name: &str,
        config: &DatabaseConfig,
    ) -> Result<Self> {
        if database_url.is_empty() {
            return Err(IpLocatorError::database_config("database_url is empty"));
        }

        // 根据不同数据库类型配置连接选项
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, backend_name, config.pool_size).await?
        };

        let storage = SeaOrmRangeStore {
            db,
            backend_name: backend_name.to_string(),
            retry_config: retry::RetryConfig::from(config),
            insert_batch_size: config.insert_batch_size.max(1),
        };

        // 运行迁移
        run_migrations(&storage.db).await?;

        warn!(
            "{} range store initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }
}

#[async_trait]
impl RangeStore for SeaOrmRangeStore {
    async fn replace_all(&self, set: &RangeSet) -> Result<()> {
        self.replace_all_ranges(set).await
    }

    async fn find_owner(&self, addr: IpAddr) -> Result<Option<String>> {
        self.find_owner_of(addr).await
    }

    async fn count(&self) -> Result<u64> {
        self.count_ranges().await
    }

    fn backend_name(&self) -> &str {
        &self.backend_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(
            infer_backend_from_url("sqlite://iplocator.db?mode=rwc").unwrap(),
            "sqlite"
        );
        assert_eq!(infer_backend_from_url("ranges.db").unwrap(), "sqlite");
        assert_eq!(
            infer_backend_from_url("mariadb://u:p@localhost/ip").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgresql://localhost/ip").unwrap(),
            "postgres"
        );
        assert!(matches!(
            infer_backend_from_url("mongodb://localhost"),
            Err(IpLocatorError::DatabaseConfig(_))
        ));
    }
}
