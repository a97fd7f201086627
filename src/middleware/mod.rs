//! HTTP 中间件
//! HTTP middleware

pub mod auth;
pub mod rate_limiter;
pub mod security;

pub use auth::{AdminAuth, AdminContext};
pub use rate_limiter::{RateLimitConfig, RateLimitMiddleware, RateLimiter};
pub use security::SecurityHeaders;
