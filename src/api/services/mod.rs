pub mod health;
pub mod lookup;
pub mod status;

use actix_web::web;

pub use health::HealthService;
pub use lookup::LookupService;
pub use status::{AppStartTime, StatusService};

/// 所有 API 路由，挂在 `prefix` 之下
pub fn api_routes(prefix: &str) -> actix_web::Scope {
    web::scope(prefix)
        .route("/lookup/{ip}", web::get().to(LookupService::lookup))
        .route("/health", web::get().to(HealthService::health_check))
        .route("/health", web::head().to(HealthService::health_check))
        .route("/status", web::get().to(StatusService::status))
}

/// 错误响应体
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
