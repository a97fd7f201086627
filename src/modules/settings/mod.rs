//! 系统设置（仅超级管理员）：会话超时与角色视图
//! System settings for the superadmin: session timeout and role views
pub mod controller;

/// 注册设置路由（后台）
pub fn register_settings_routes() {
    crate::register_admin_route!(
        "settings",
        "会话超时与角色视图设置",
        "settings",
        controller::configure
    );
}
