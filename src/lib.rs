pub mod comm;
pub mod db;
pub mod error;
pub mod middleware;
pub mod repo;
pub mod session;
pub mod state;
pub mod views;
#[path = "bootstrap/app_bootstrap.rs"]
pub mod app_bootstrap;
#[path = "bootstrap/command_registry.rs"]
pub mod command_registry;
#[path = "bootstrap/route_registry.rs"]
pub mod route_registry;

// Modules
pub mod modules;

/// 初始化所有模块的命令
pub fn init_commands() {
    modules::base::register_base_commands();
}

/// 初始化所有模块的路由
pub fn init_routes() {
    modules::base::register_base_routes();
    modules::auth::register_auth_routes();
    modules::dashboard::register_dashboard_routes();
    modules::listings::register_listing_routes();
    modules::email_accounts::register_email_account_routes();
    modules::email_subjects::register_email_subject_routes();
    modules::user_access::register_user_access_routes();
    modules::role_preview::register_role_preview_routes();
    modules::administrators::register_administrator_routes();
    modules::settings::register_settings_routes();
    modules::user_activity::register_user_activity_routes();
}

// Re-export bootstrap modules
pub use app_bootstrap::*;
pub use command_registry::*;
pub use route_registry::*;
pub use state::AppState;
