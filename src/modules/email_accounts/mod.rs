//! 被监控邮箱的管理：列表、按域名筛选、单条维护与批量登记
//! Monitored mailboxes: listing, domain filters, single edits and bulk registration
pub mod bulk;
pub mod controller;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    bulk::configure(cfg);
    controller::configure(cfg);
}

/// 注册邮箱账户路由（后台）
pub fn register_email_account_routes() {
    crate::register_admin_route!(
        "email_accounts",
        "邮箱账户列表、维护与批量登记",
        "email_accounts",
        configure
    );
}
