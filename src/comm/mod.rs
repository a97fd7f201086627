//! 通用模块：配置、日志、分页与字段验证
//! Common module: configuration, logging, pagination and field validation

pub mod config;
pub mod config_validator;
pub mod enhanced_config;
pub mod env_config;
pub mod pagination;
pub mod tracing;
pub mod validation;

// 重新导出主要的公共接口
pub use config_validator::ServerSettings;
pub use env_config::GacConfig;
pub use pagination::{ListQuery, Page, PageRequest, PaginationView};
