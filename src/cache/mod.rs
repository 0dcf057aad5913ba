//! Resolution cache
//!
//! - `traits`: `ResolutionCache` (tier 1 hot-IP + tier 2 range index)
//! - `range_index`: in-process ordered index shared by the memory backend
//! - `memory`: moka + arc-swap backend
//! - `redis`: Redis backend (`SET EX` + sorted sets)
//! - `register` / `macros`: backend plugin registry

pub mod macros;
pub mod memory;
pub mod range_index;
pub mod redis;
pub mod register;
pub mod traits;

use std::sync::{Arc, Once};

use tracing::info;

use crate::config::CacheConfig;
use crate::errors::{IpLocatorError, Result};

pub use memory::MemoryResolutionCache;
pub use range_index::{IndexEntry, RangeIndex};
pub use redis::RedisResolutionCache;
pub use traits::ResolutionCache;

static BUILTIN_PLUGINS: Once = Once::new();

/// 确保内置后端已注册
fn ensure_builtin_plugins() {
    BUILTIN_PLUGINS.call_once(|| {
        memory::register_plugin();
        redis::register_plugin();
    });
}

pub struct CacheFactory;

impl CacheFactory {
    /// 按 `cache.type` 创建缓存后端
    pub async fn create(config: &CacheConfig) -> Result<Arc<dyn ResolutionCache>> {
        ensure_builtin_plugins();
        register::debug_cache_registry();

        let name = config.cache_type.as_ref();
        let constructor = register::get_resolution_cache_plugin(name).ok_or_else(|| {
            IpLocatorError::cache_plugin_not_found(format!("Unknown cache type: {}", name))
        })?;

        let cache = constructor(config.clone()).await?;
        info!("Using {} resolution cache", cache.cache_type());
        Ok(cache)
    }
}
