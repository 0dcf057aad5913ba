use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、CPU 数量、API 前缀
/// - database: Range Store 连接配置
/// - cache: 两级解析缓存配置
/// - logging: 日志配置
/// - fetcher: RIR 数据源下载配置
/// - refresh: 刷新周期与数据源列表
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：IPL，分隔符：__
    /// 示例：IPL__SERVER__PORT=9999
    ///
    /// 文件不存在时使用默认值；文件格式错误或 ENV 值非法时返回错误
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let settings = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 IPL，分隔符 __
            .add_source(
                Environment::with_prefix("IPL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = settings.try_deserialize::<StaticConfig>()?;
        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        Ok(config)
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 所有 API 路由的前缀
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            api_prefix: default_api_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlite:// / postgres:// / mysql:// / memory://
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// replace_all 时每条 INSERT 语句的行数
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            insert_batch_size: default_insert_batch_size(),
        }
    }
}

/// 缓存后端类型
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheType {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "type", default)]
    pub cache_type: CacheType,
    /// 两级缓存共用的 TTL（秒）
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::default(),
            ttl_secs: default_cache_ttl(),
            redis: RedisConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// hot-IP 缓存最大条目数
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_memory_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// text / json
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub enable_rotation: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    /// 超过该耗时的请求总会被记录
    #[serde(default = "default_slow_request_ms")]
    pub slow_request_ms: u64,
    /// 正常请求的采样日志间隔
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            enable_rotation: false,
            max_backups: default_max_backups(),
            slow_request_ms: default_slow_request_ms(),
            sample_interval_secs: default_sample_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// 单次请求超时
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fetch_max_attempts")]
    pub max_attempts: u32,
    /// 第 n 次重试前等待 n * retry_delay_secs
    #[serde(default = "default_fetch_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            max_attempts: default_fetch_max_attempts(),
            retry_delay_secs: default_fetch_retry_delay_secs(),
            max_line_bytes: default_max_line_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

/// 单个 RIR 数据源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_feed_sources")]
    pub sources: Vec<FeedSource>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval_secs(),
            sources: default_feed_sources(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_database_url() -> String {
    "sqlite://iplocator.db?mode=rwc".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_insert_batch_size() -> usize {
    500
}

fn default_cache_ttl() -> u64 {
    24 * 60 * 60
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_redis_key_prefix() -> String {
    "iplocator:".to_string()
}

fn default_memory_capacity() -> u64 {
    100_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_slow_request_ms() -> u64 {
    100
}

fn default_sample_interval_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_fetch_max_attempts() -> u32 {
    3
}

fn default_fetch_retry_delay_secs() -> u64 {
    5
}

fn default_max_line_bytes() -> usize {
    1024 * 1024
}

fn default_user_agent() -> String {
    "IPLocator/1.0".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    24 * 60 * 60
}

pub fn default_feed_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "ARIN",
            "https://ftp.arin.net/pub/stats/arin/delegated-arin-extended-latest",
        ),
        FeedSource::new(
            "RIPE",
            "https://ftp.ripe.net/pub/stats/ripencc/delegated-ripencc-latest",
        ),
        FeedSource::new(
            "APNIC",
            "https://ftp.apnic.net/stats/apnic/delegated-apnic-latest",
        ),
        FeedSource::new(
            "LACNIC",
            "https://ftp.lacnic.net/pub/stats/lacnic/delegated-lacnic-latest",
        ),
        FeedSource::new(
            "AFRINIC",
            "https://ftp.afrinic.net/stats/afrinic/delegated-afrinic-latest",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_daily_refresh() {
        let config = StaticConfig::default();
        assert_eq!(config.refresh.interval_secs, 86_400);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.fetcher.max_attempts, 3);
        assert_eq!(config.fetcher.retry_delay_secs, 5);
        assert_eq!(config.server.api_prefix, "/api/v1");
    }

    #[test]
    fn test_default_sources_cover_all_registries() {
        let names: Vec<String> = default_feed_sources()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["ARIN", "RIPE", "APNIC", "LACNIC", "AFRINIC"]);
    }

    #[test]
    fn test_sample_config_round_trips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).expect("sample config should parse");
        assert_eq!(parsed.refresh.sources.len(), 5);
        assert_eq!(parsed.cache.cache_type, CacheType::Memory);
    }

    #[test]
    fn test_cache_type_from_str() {
        use std::str::FromStr;
        assert_eq!(CacheType::from_str("redis").unwrap(), CacheType::Redis);
        assert_eq!(CacheType::Memory.as_ref(), "memory");
        assert!(CacheType::from_str("bloom").is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [cache]
            type = "redis"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.cache.cache_type, CacheType::Redis);
        assert_eq!(parsed.cache.redis.key_prefix, "iplocator:");
    }
}
