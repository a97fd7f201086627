//! 应用错误与 HTTP 响应映射
//! Application errors and their HTTP responses

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::comm::validation::FieldErrors;
use crate::db::DbError;

/// 统一的应用错误类型
///
/// `Display` 仅用于日志；返回给浏览器的文本见 [`AppError::public_message`]。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] crate::comm::config::ConfigError),

    #[error("认证错误: {message}")]
    Auth { message: String },

    #[error("权限错误: {message}")]
    Permission { message: String },

    #[error("验证错误: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("表单验证错误: {message}")]
    Form { message: String, errors: FieldErrors },

    #[error("CSRF 校验失败")]
    Csrf,

    #[error("登录尝试过多: {message}")]
    TooManyAttempts { message: String },

    #[error("账户已停用")]
    Inactive,

    #[error("资源未找到: {resource}")]
    NotFound { resource: String },

    #[error("数据库错误: {0}")]
    Database(#[from] DbError),

    #[error("模板渲染错误: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 创建认证错误
    pub fn auth<T: Into<String>>(message: T) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// 创建权限错误
    pub fn permission<T: Into<String>>(message: T) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation<T: Into<String>, U: Into<String>>(field: T, message: U) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 多字段表单错误，message 取第一条字段错误
    pub fn form(errors: FieldErrors) -> Self {
        let message = errors
            .first_message()
            .unwrap_or("Datos inválidos")
            .to_string();
        Self::Form { message, errors }
    }

    pub fn too_many_attempts<T: Into<String>>(message: T) -> Self {
        Self::TooManyAttempts {
            message: message.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>>(resource: T) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 获取错误代码
    pub fn error_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 1001,
            AppError::Auth { .. } => 1002,
            AppError::Permission { .. } => 1003,
            AppError::Validation { .. } => 1004,
            AppError::Form { .. } => 1005,
            AppError::Csrf => 1006,
            AppError::TooManyAttempts { .. } => 1007,
            AppError::Inactive => 1008,
            AppError::NotFound { .. } => 1009,
            AppError::Database(_) => 1010,
            AppError::Template(_) => 1011,
            AppError::Internal(_) => 1000,
        }
    }

    /// 获取HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::Permission { .. } | AppError::Csrf | AppError::Inactive => {
                StatusCode::FORBIDDEN
            }
            AppError::Validation { .. } | AppError::Form { .. } => StatusCode::BAD_REQUEST,
            AppError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Database(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 错误类型名
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Config(_) => "Config",
            AppError::Auth { .. } => "Auth",
            AppError::Permission { .. } => "Permission",
            AppError::Validation { .. } => "Validation",
            AppError::Form { .. } => "Form",
            AppError::Csrf => "Csrf",
            AppError::TooManyAttempts { .. } => "TooManyAttempts",
            AppError::Inactive => "Inactive",
            AppError::NotFound { .. } => "NotFound",
            AppError::Database(_) => "Database",
            AppError::Template(_) => "Template",
            AppError::Internal(_) => "Internal",
        }
    }

    /// 面向用户的提示；服务器内部错误不暴露细节
    pub fn public_message(&self) -> String {
        match self {
            AppError::Auth { message }
            | AppError::Permission { message }
            | AppError::Validation { message, .. }
            | AppError::Form { message, .. }
            | AppError::TooManyAttempts { message } => message.clone(),
            AppError::Csrf => "Token de seguridad inválido".to_string(),
            AppError::Inactive => {
                "Tu cuenta está desactivada. Contacta al administrador.".to_string()
            }
            AppError::NotFound { resource } => resource.clone(),
            AppError::Config(_)
            | AppError::Database(_)
            | AppError::Template(_)
            | AppError::Internal(_) => "Error interno del servidor".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = AppError::status_code(self);

        // 记录错误日志
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "Internal error: {}", self);
        } else {
            tracing::info!(code = self.error_code(), "Client error: {}", self);
        }

        let mut body = json!({
            "success": false,
            "message": self.public_message(),
            "error": {
                "code": self.error_code(),
                "type": self.error_type(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        if let AppError::Form { errors, .. } = self {
            body["errors"] = json!(errors);
        }

        HttpResponse::build(status).json(body)
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

/// JSON 成功响应 `{success, message, redirect?, data?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            redirect: None,
            data: None,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            redirect: None,
            data: Some(data),
        }
    }

    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = Some(redirect.into());
        self
    }
}

/// 便捷宏：创建API成功响应
#[macro_export]
macro_rules! api_success {
    ($message:expr) => {
        Ok(actix_web::HttpResponse::Ok().json($crate::error::ApiResponse::message($message)))
    };
    ($message:expr, $data:expr) => {
        Ok(actix_web::HttpResponse::Ok().json($crate::error::ApiResponse::success($message, $data)))
    };
}
