use crate::cache::traits::ResolutionCache;
use crate::config::CacheConfig;
use crate::errors::Result;
use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, RwLock},
};

pub type BoxedResolutionCacheFuture =
    Pin<Box<dyn Future<Output = Result<Arc<dyn ResolutionCache>>> + Send>>;
pub type ResolutionCacheConstructor =
    Arc<dyn Fn(CacheConfig) -> BoxedResolutionCacheFuture + Send + Sync>;

static RESOLUTION_CACHE_REGISTRY: Lazy<RwLock<HashMap<String, ResolutionCacheConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_resolution_cache_plugin<S: Into<String>>(
    name: S,
    constructor: ResolutionCacheConstructor,
) {
    let name = name.into();
    let mut registry = RESOLUTION_CACHE_REGISTRY
        .write()
        .expect("Cache registry RwLock poisoned - a thread panicked while holding the lock");
    registry.insert(name, constructor);
}

pub fn get_resolution_cache_plugin(name: &str) -> Option<ResolutionCacheConstructor> {
    RESOLUTION_CACHE_REGISTRY
        .read()
        .expect("Cache registry RwLock poisoned - a thread panicked while holding the lock")
        .get(name)
        .cloned()
}

pub fn debug_cache_registry() {
    let registry = RESOLUTION_CACHE_REGISTRY
        .read()
        .expect("Cache registry RwLock poisoned");
    if registry.is_empty() {
        tracing::debug!("No resolution cache plugins registered.");
    } else {
        tracing::debug!("Registered resolution cache plugins:");
        for key in registry.keys() {
            tracing::debug!(" - {}", key);
        }
    }
}
