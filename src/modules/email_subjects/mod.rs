//! 邮件主题登记（按平台）
//! Per-platform email subject registry
pub mod controller;

/// 注册主题管理路由（后台）
pub fn register_email_subject_routes() {
    crate::register_admin_route!(
        "email_subjects",
        "邮件主题列表、新建、编辑与删除",
        "email_subjects",
        controller::configure
    );
}
