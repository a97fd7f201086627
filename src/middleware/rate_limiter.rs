use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::comm::env_config::RateLimitSection;

/// 限流配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 每个时间窗口允许的最大请求数
    pub max_requests: u32,
    /// 时间窗口大小（秒）
    pub window_size: u64,
    /// 是否启用限流
    pub enabled: bool,
    /// 超限时返回的提示
    pub error_message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_size: 60,
            enabled: true,
            error_message: "Demasiadas solicitudes. Intenta de nuevo en un momento.".to_string(),
        }
    }
}

impl From<&RateLimitSection> for RateLimitConfig {
    fn from(section: &RateLimitSection) -> Self {
        Self {
            max_requests: section.requests.max(1),
            enabled: section.enabled,
            ..Default::default()
        }
    }
}

/// 记录数超过该值时顺带清理过期窗口
const CLEANUP_THRESHOLD: usize = 4096;

/// 请求记录
#[derive(Debug, Clone)]
struct RequestRecord {
    count: u32,
    window_start: Instant,
}

/// 固定窗口限流器，按客户端 IP 计数
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<Mutex<HashMap<String, RequestRecord>>>,
    config: RateLimitConfig,
}

/// 限流信息
#[derive(Debug)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: Option<Duration>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// 检查是否允许请求
    pub fn check_rate_limit(&self, client_ip: &str) -> RateLimitInfo {
        self.check_rate_limit_at(client_ip, Instant::now())
    }

    pub fn check_rate_limit_at(&self, client_ip: &str, now: Instant) -> RateLimitInfo {
        if !self.config.enabled {
            return RateLimitInfo {
                allowed: true,
                remaining: self.config.max_requests,
                retry_after: None,
            };
        }

        let window = Duration::from_secs(self.config.window_size);
        let mut store = self.store.lock();
        if store.len() >= CLEANUP_THRESHOLD {
            store.retain(|_, record| now.duration_since(record.window_start) < window);
        }
        let record = store
            .entry(client_ip.to_string())
            .or_insert_with(|| RequestRecord {
                count: 0,
                window_start: now,
            });

        // 窗口到期后重新计数
        if now.duration_since(record.window_start) >= window {
            record.count = 0;
            record.window_start = now;
        }

        if record.count >= self.config.max_requests {
            let reset_time = record.window_start + window;
            return RateLimitInfo {
                allowed: false,
                remaining: 0,
                retry_after: Some(reset_time.saturating_duration_since(now)),
            };
        }

        record.count += 1;
        RateLimitInfo {
            allowed: true,
            remaining: self.config.max_requests - record.count,
            retry_after: None,
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.lock().len()
    }
}

/// 获取客户端IP地址
fn get_client_ip(req: &ServiceRequest) -> String {
    if let Some(forwarded_for) = req.headers().get("X-Forwarded-For") {
        if let Ok(forwarded_for_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_for_str.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            return real_ip_str.trim().to_string();
        }
    }

    // 回退到连接信息
    req.connection_info()
        .peer_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// 限流中间件
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }

    /// 多个 worker 共用同一张计数表
    pub fn with_limiter(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let client_ip = get_client_ip(&req);
            let info = limiter.check_rate_limit(&client_ip);

            if info.allowed {
                debug!("限流通过: IP {} 剩余 {} 次请求", client_ip, info.remaining);
                let response = service.call(req).await?;
                return Ok(response.map_into_boxed_body());
            }

            warn!("限流拒绝: IP {} 访问 {}", client_ip, req.path());
            let retry_after = info.retry_after.map(|d| d.as_secs().max(1)).unwrap_or(1);
            let error_response = HttpResponse::TooManyRequests()
                .insert_header(("Retry-After", retry_after.to_string()))
                .json(serde_json::json!({
                    "success": false,
                    "message": limiter.config.error_message,
                }));
            Ok(req.into_response(error_response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as awtest, web, App, HttpResponse};

    async fn test_handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn test_rate_limit_blocks_excess_requests() {
        let config = RateLimitConfig {
            max_requests: 2,
            ..Default::default()
        };

        let app = awtest::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(config))
                .route("/test", web::get().to(test_handler)),
        )
        .await;

        for _ in 0..2 {
            let req = awtest::TestRequest::get().uri("/test").to_request();
            let resp = awtest::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }

        let req = awtest::TestRequest::get().uri("/test").to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 429);
        assert!(resp.headers().contains_key("Retry-After"));
        let body: serde_json::Value = awtest::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        // 其他客户端不受影响
        let req = awtest::TestRequest::get()
            .uri("/test")
            .insert_header(("X-Forwarded-For", "10.0.0.9, 10.0.0.1"))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_size: 60,
            ..Default::default()
        });
        let start = Instant::now();
        assert!(limiter.check_rate_limit_at("1.2.3.4", start).allowed);
        let blocked = limiter.check_rate_limit_at("1.2.3.4", start + Duration::from_secs(10));
        assert!(!blocked.allowed);
        assert_eq!(blocked.retry_after, Some(Duration::from_secs(50)));
        assert!(limiter
            .check_rate_limit_at("1.2.3.4", start + Duration::from_secs(61))
            .allowed);
    }

    #[test]
    fn test_disabled_limiter_allows_all() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            enabled: false,
            ..Default::default()
        });
        for _ in 0..5 {
            assert!(limiter.check_rate_limit("1.2.3.4").allowed);
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
