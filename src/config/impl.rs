use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration
///
/// Loads configuration from `path` (default "config.toml"), then applies
/// `IPL__*` environment overrides. Missing file means in-memory defaults;
/// a malformed file or an unparsable override is returned as an error.
///
/// # Examples
/// ```no_run
/// use iplocator::config::init_config;
/// init_config(None).expect("invalid configuration");
/// ```
pub fn init_config(path: Option<&str>) -> Result<(), config::ConfigError> {
    if CONFIG.get().is_some() {
        return Ok(());
    }
    let config = StaticConfig::load(path)?;
    let _ = CONFIG.set(ArcSwap::from_pointee(config));
    Ok(())
}
