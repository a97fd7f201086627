//! 角色视图预览与视图分配
//! Role view preview and view assignment
pub mod controller;

/// 注册角色预览路由（后台）
pub fn register_role_preview_routes() {
    crate::register_admin_route!(
        "role_preview",
        "角色视图预览与分配",
        "role_preview",
        controller::configure
    );
}
