use actix_web::{HttpResponse, Responder, web};
use std::sync::Arc;
use tracing::error;

use super::ErrorBody;
use crate::services::Resolver;

pub struct LookupService;

impl LookupService {
    /// GET {prefix}/lookup/{ip}
    ///
    /// - 200 `{ip, country_code}`
    /// - 400 地址格式错误
    /// - 404 没有归属信息
    /// - 500 Range Store 查询失败
    pub async fn lookup(
        path: web::Path<String>,
        resolver: web::Data<Arc<Resolver>>,
    ) -> impl Responder {
        let ip = path.into_inner();

        if ip.is_empty() {
            return HttpResponse::BadRequest().json(ErrorBody::new("IP address is required"));
        }

        match resolver.lookup(&ip).await {
            Ok(resp) if resp.is_unknown() => HttpResponse::NotFound().json(ErrorBody::new(
                "No country information found for this IP",
            )),
            Ok(resp) => HttpResponse::Ok().json(resp),
            Err(e) if e.is_input_error() => HttpResponse::BadRequest()
                .json(ErrorBody::new(format!("Invalid IP address format: {}", ip))),
            Err(e) => {
                error!("IP lookup failed for {}: {}", ip, e);
                HttpResponse::InternalServerError()
                    .json(ErrorBody::new("Failed to lookup IP address"))
            }
        }
    }
}
