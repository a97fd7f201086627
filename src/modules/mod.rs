//! 模块管理，每个业务模块提供 `configure` 和注册函数
//! Feature modules; each exposes `configure` and a registration function
pub mod administrators;
pub mod auth;
pub mod base;
pub mod dashboard;
pub mod email_accounts;
pub mod email_subjects;
pub mod listings;
pub mod role_preview;
pub mod settings;
pub mod user_access;
pub mod user_activity;
