//! 管理员资料与密码维护
//! Administrator profile and password maintenance
pub mod controller;

/// 注册管理员维护路由（后台）
pub fn register_administrator_routes() {
    crate::register_admin_route!(
        "administrators",
        "管理员资料编辑与密码修改",
        "administrators",
        controller::configure
    );
}
