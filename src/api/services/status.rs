use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::ResolutionCache;
use crate::services::{RefreshCoordinator, RefreshStatus};
use crate::storage::RangeStore;

// 应用启动时间
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    uptime_secs: i64,
    store_backend: String,
    cache_type: &'static str,
    refresh: RefreshStatus,
}

pub struct StatusService;

impl StatusService {
    /// 最近一次刷新报告、刷新状态与后端信息
    pub async fn status(
        refresh: web::Data<Arc<RefreshCoordinator>>,
        store: web::Data<Arc<dyn RangeStore>>,
        cache: web::Data<Arc<dyn ResolutionCache>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let uptime_secs = (chrono::Utc::now() - app_start_time.start_datetime)
            .num_seconds()
            .max(0);

        HttpResponse::Ok().json(StatusResponse {
            uptime_secs,
            store_backend: store.backend_name().to_string(),
            cache_type: cache.cache_type(),
            refresh: refresh.status(),
        })
    }
}
