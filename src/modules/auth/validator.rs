use serde::Deserialize;

use crate::comm::validation::{FieldErrors, FieldValidation, Validator};

/// 登录成功后的默认跳转
pub const DEFAULT_REDIRECT: &str = "/admin/dashboard";

pub const USERNAME_MIN_CHARS: usize = 3;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// 登录表单规则，与 `/assets/js/auth/login.js` 保持一致
pub struct LoginValidator {
    validator: Validator,
}

impl Default for LoginValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginValidator {
    pub fn new() -> Self {
        let validator = Validator::new()
            .field(
                FieldValidation::new("username")
                    .required("El usuario es requerido")
                    .min_chars(
                        USERNAME_MIN_CHARS,
                        "El usuario debe tener al menos 3 caracteres",
                    ),
            )
            .field(
                FieldValidation::new("password")
                    .required("La contraseña es requerida")
                    .min_chars(
                        PASSWORD_MIN_CHARS,
                        "La contraseña debe tener al menos 6 caracteres",
                    ),
            );
        Self { validator }
    }

    /// 单字段检查；用户名先去除首尾空白
    pub fn validate_field(&self, field: &str, value: &str) -> Option<&str> {
        let value = if field == "username" { value.trim() } else { value };
        self.validator.validate_field(field, value)
    }

    pub fn validate(&self, username: &str, password: &str) -> Result<(), FieldErrors> {
        let username = username.trim();
        self.validator.validate(|field| match field {
            "username" => Some(username),
            "password" => Some(password),
            _ => None,
        })
    }
}

/// `POST /login` 的响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// 响应中有 `redirect` 时原样使用，否则回到仪表盘
pub fn resolve_redirect(outcome: &LoginOutcome) -> String {
    outcome
        .redirect
        .clone()
        .unwrap_or_else(|| DEFAULT_REDIRECT.to_string())
}

/// 登录后的跳转只接受站内路径
pub fn safe_redirect(target: Option<String>) -> String {
    match target {
        Some(url) if url.starts_with('/') && !url.starts_with("//") => url,
        _ => DEFAULT_REDIRECT.to_string(),
    }
}
