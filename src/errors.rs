use std::fmt;

#[derive(Debug, Clone)]
pub enum IpLocatorError {
    CacheConnection(String),
    CacheOperation(String),
    CachePluginNotFound(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    InvalidAddress(String),
    FeedFetch(String),
    RefreshFailed(String),
    RefreshInProgress(String),
    Cancelled(String),
    FileOperation(String),
    Serialization(String),
}

impl IpLocatorError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            IpLocatorError::CacheConnection(_) => "E001",
            IpLocatorError::CacheOperation(_) => "E002",
            IpLocatorError::CachePluginNotFound(_) => "E003",
            IpLocatorError::DatabaseConfig(_) => "E004",
            IpLocatorError::DatabaseConnection(_) => "E005",
            IpLocatorError::DatabaseOperation(_) => "E006",
            IpLocatorError::InvalidAddress(_) => "E007",
            IpLocatorError::FeedFetch(_) => "E008",
            IpLocatorError::RefreshFailed(_) => "E009",
            IpLocatorError::RefreshInProgress(_) => "E010",
            IpLocatorError::Cancelled(_) => "E011",
            IpLocatorError::FileOperation(_) => "E012",
            IpLocatorError::Serialization(_) => "E013",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            IpLocatorError::CacheConnection(_) => "Cache Connection Error",
            IpLocatorError::CacheOperation(_) => "Cache Operation Error",
            IpLocatorError::CachePluginNotFound(_) => "Cache Plugin Not Found",
            IpLocatorError::DatabaseConfig(_) => "Database Configuration Error",
            IpLocatorError::DatabaseConnection(_) => "Database Connection Error",
            IpLocatorError::DatabaseOperation(_) => "Database Operation Error",
            IpLocatorError::InvalidAddress(_) => "Invalid IP Address",
            IpLocatorError::FeedFetch(_) => "Feed Fetch Error",
            IpLocatorError::RefreshFailed(_) => "Refresh Failed",
            IpLocatorError::RefreshInProgress(_) => "Refresh In Progress",
            IpLocatorError::Cancelled(_) => "Operation Cancelled",
            IpLocatorError::FileOperation(_) => "File Operation Error",
            IpLocatorError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            IpLocatorError::CacheConnection(msg)
            | IpLocatorError::CacheOperation(msg)
            | IpLocatorError::CachePluginNotFound(msg)
            | IpLocatorError::DatabaseConfig(msg)
            | IpLocatorError::DatabaseConnection(msg)
            | IpLocatorError::DatabaseOperation(msg)
            | IpLocatorError::InvalidAddress(msg)
            | IpLocatorError::FeedFetch(msg)
            | IpLocatorError::RefreshFailed(msg)
            | IpLocatorError::RefreshInProgress(msg)
            | IpLocatorError::Cancelled(msg)
            | IpLocatorError::FileOperation(msg)
            | IpLocatorError::Serialization(msg) => msg,
        }
    }

    /// 是否为调用方输入错误（对应 HTTP 400）
    pub fn is_input_error(&self) -> bool {
        matches!(self, IpLocatorError::InvalidAddress(_))
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for IpLocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for IpLocatorError {}

// 便捷的构造函数
impl IpLocatorError {
    pub fn cache_connection<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::CacheConnection(msg.into())
    }

    pub fn cache_operation<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::CacheOperation(msg.into())
    }

    pub fn cache_plugin_not_found<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::CachePluginNotFound(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::DatabaseOperation(msg.into())
    }

    pub fn invalid_address<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::InvalidAddress(msg.into())
    }

    pub fn feed_fetch<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::FeedFetch(msg.into())
    }

    pub fn refresh_failed<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::RefreshFailed(msg.into())
    }

    pub fn refresh_in_progress<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::RefreshInProgress(msg.into())
    }

    pub fn cancelled<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::Cancelled(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        IpLocatorError::Serialization(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for IpLocatorError {
    fn from(err: sea_orm::DbErr) -> Self {
        IpLocatorError::DatabaseOperation(err.to_string())
    }
}

impl From<redis::RedisError> for IpLocatorError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            IpLocatorError::CacheConnection(err.to_string())
        } else {
            IpLocatorError::CacheOperation(err.to_string())
        }
    }
}

impl From<std::io::Error> for IpLocatorError {
    fn from(err: std::io::Error) -> Self {
        IpLocatorError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for IpLocatorError {
    fn from(err: serde_json::Error) -> Self {
        IpLocatorError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IpLocatorError>;
