//! HTTP request logging middleware
//!
//! 错误、非 200 响应和慢请求总会记录；其余请求按固定间隔采样，
//! 避免高 QPS 下日志被查询请求淹没。

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use parking_lot::Mutex;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 日志采样器：每个间隔最多放行一条
pub struct LogSampler {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl LogSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn should_log(&self) -> bool {
        self.should_log_at(Instant::now())
    }

    fn should_log_at(&self, now: Instant) -> bool {
        let mut last = self.last.lock();
        match *last {
            Some(prev) if now.duration_since(prev) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// 请求日志中间件工厂
#[derive(Clone)]
pub struct RequestLogMiddleware {
    sampler: Arc<LogSampler>,
    slow_threshold: Duration,
}

impl RequestLogMiddleware {
    pub fn new(sampler: Arc<LogSampler>, slow_threshold: Duration) -> Self {
        Self {
            sampler,
            slow_threshold,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLogService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLogService {
            service: Rc::new(service),
            sampler: self.sampler.clone(),
            slow_threshold: self.slow_threshold,
        }))
    }
}

pub struct RequestLogService<S> {
    service: Rc<S>,
    sampler: Arc<LogSampler>,
    slow_threshold: Duration,
}

impl<S, B> Service<ServiceRequest> for RequestLogService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let sampler = self.sampler.clone();
        let slow_threshold = self.slow_threshold;
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        Box::pin(async move {
            let result = srv.call(req).await;
            let elapsed = start.elapsed();

            match &result {
                Err(e) => {
                    error!(
                        method = %method,
                        path = %path,
                        latency_ms = elapsed.as_millis() as u64,
                        "Request failed: {}",
                        e
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let is_slow = elapsed > slow_threshold;
                    if status.is_server_error() {
                        error!(
                            method = %method,
                            path = %path,
                            status = status.as_u16(),
                            latency_ms = elapsed.as_millis() as u64,
                            "Request error"
                        );
                    } else if status != StatusCode::OK || is_slow {
                        warn!(
                            method = %method,
                            path = %path,
                            status = status.as_u16(),
                            latency_ms = elapsed.as_millis() as u64,
                            slow = is_slow,
                            "Request"
                        );
                    } else if sampler.should_log() {
                        info!(
                            method = %method,
                            path = %path,
                            status = status.as_u16(),
                            latency_ms = elapsed.as_millis() as u64,
                            "Request (sampled)"
                        );
                    }
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_allows_one_per_interval() {
        let sampler = LogSampler::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(sampler.should_log_at(t0));
        assert!(!sampler.should_log_at(t0 + Duration::from_secs(3)));
        assert!(!sampler.should_log_at(t0 + Duration::from_millis(9_999)));
        assert!(sampler.should_log_at(t0 + Duration::from_secs(10)));
        assert!(!sampler.should_log_at(t0 + Duration::from_secs(11)));
    }

    #[test]
    fn test_samplers_are_independent() {
        let a = LogSampler::new(Duration::from_secs(10));
        let b = LogSampler::new(Duration::from_secs(10));
        assert!(a.should_log());
        assert!(b.should_log());
        assert!(!a.should_log());
    }
}
