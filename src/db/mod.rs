//! 数据库连接池与错误类型
//! Database pool and error types

pub mod connection;
pub mod error;

pub use error::DbError;
