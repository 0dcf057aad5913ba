/// 声明一个解析缓存后端
///
/// 生成 `register_plugin()`，并在进程启动时通过 ctor 自动注册。
/// `$ty` 需要提供 `async fn from_config(&CacheConfig) -> Result<Self>`。
#[macro_export]
macro_rules! declare_resolution_cache_plugin {
    ($name:expr, $ty:ty) => {
        pub fn register_plugin() {
            use std::sync::Arc;
            use $crate::cache::register::register_resolution_cache_plugin;

            register_resolution_cache_plugin(
                $name,
                Arc::new(|config: $crate::config::CacheConfig| {
                    Box::pin(async move {
                        let cache = <$ty>::from_config(&config).await?;
                        Ok(Arc::new(cache) as Arc<dyn $crate::cache::traits::ResolutionCache>)
                    }) as $crate::cache::register::BoxedResolutionCacheFuture
                }),
            );
        }

        #[ctor::ctor]
        fn __register_resolution_cache_plugin() {
            register_plugin();
        }
    };
}
