//! 后台用户活动日志（仅超级管理员）
//! Admin user activity log, superadmin only
pub mod controller;

/// 注册活动日志路由（后台）
pub fn register_user_activity_routes() {
    crate::register_admin_route!(
        "user_activity",
        "后台用户活动日志",
        "user_activity",
        controller::configure
    );
}
