//! 登录与退出
//! Login and logout
pub mod controller;
pub mod validator;

pub use validator::{resolve_redirect, LoginValidator, DEFAULT_REDIRECT};

/// 注册 auth 模块的路由（不经过后台鉴权）
pub fn register_auth_routes() {
    crate::register_route!("auth", "登录页、登录提交与退出", "auth", controller::configure);
}
