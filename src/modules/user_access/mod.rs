//! 邮箱访问凭据（单条表单、列表与删除）
//! Mailbox access credentials: single form, listing and removal
pub mod controller;

/// 注册访问凭据路由（后台）
pub fn register_user_access_routes() {
    crate::register_admin_route!(
        "user_access",
        "访问凭据表单、列表与删除",
        "user_access",
        controller::configure
    );
}
