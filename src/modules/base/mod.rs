//! Base 模块：根路径、静态资源与命令行工具
//! Base module: root path, static assets and CLI tools

#[path = "cmd/cmd.rs"]
pub mod cmd;
pub mod routes;

pub use cmd::register_base_commands;

/// 注册 base 模块的路由
pub fn register_base_routes() {
    crate::register_route!("base", "根路径跳转与静态资源", "base", routes::configure);
}
