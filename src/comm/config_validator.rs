use crate::comm::config::{default_sources, ConfigSource};
use crate::comm::env_config::GacConfig;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 配置验证规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValidationRule {
    pub key: String,
    pub required: bool,
    pub data_type: ConfigDataType,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub allowed_values: Option<Vec<String>>,
    pub regex_pattern: Option<String>,
    pub description: String,
}

/// 配置数据类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigDataType {
    String,
    Integer,
    Boolean,
}

/// 仓储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    Mysql,
    Memory,
}

impl DatabaseDriver {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" => Some(Self::Mysql),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Memory => "memory",
        }
    }
}

impl Default for DatabaseDriver {
    fn default() -> Self {
        Self::Mysql
    }
}

/// HTTP 服务器运行参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub debug: bool,
    pub log_level: String,
    pub log_json: bool,
    pub database_driver: DatabaseDriver,
    pub database_max_connections: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            debug: false,
            log_level: "info".to_string(),
            log_json: false,
            database_driver: DatabaseDriver::default(),
            database_max_connections: 10,
        }
    }
}

/// 配置验证器
pub struct ConfigValidator {
    rules: HashMap<String, ConfigValidationRule>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let mut rules = HashMap::new();

        rules.insert(
            "server.host".to_string(),
            ConfigValidationRule {
                key: "server.host".to_string(),
                required: true,
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: None,
                regex_pattern: Some(r"^[a-zA-Z0-9.:-]+$".to_string()),
                description: "服务器主机地址".to_string(),
            },
        );

        rules.insert(
            "server.port".to_string(),
            ConfigValidationRule {
                key: "server.port".to_string(),
                required: true,
                data_type: ConfigDataType::Integer,
                min_value: Some(1.0),
                max_value: Some(65535.0),
                allowed_values: None,
                regex_pattern: None,
                description: "服务器端口".to_string(),
            },
        );

        rules.insert(
            "logging.level".to_string(),
            ConfigValidationRule {
                key: "logging.level".to_string(),
                required: true,
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: Some(
                    ["trace", "debug", "info", "notice", "warn", "warning", "error", "critical"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
                regex_pattern: None,
                description: "日志级别".to_string(),
            },
        );

        rules.insert(
            "database.driver".to_string(),
            ConfigValidationRule {
                key: "database.driver".to_string(),
                required: false,
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: Some(vec!["mysql".to_string(), "memory".to_string()]),
                regex_pattern: None,
                description: "仓储后端".to_string(),
            },
        );

        Self { rules }
    }

    /// 验证单个配置值
    pub fn validate_value(&self, key: &str, value: &serde_json::Value) -> AppResult<()> {
        if let Some(rule) = self.rules.get(key) {
            self.validate_against_rule(rule, value)?;
        }
        Ok(())
    }

    /// 验证服务器参数
    pub fn validate_settings(&self, settings: &ServerSettings) -> AppResult<()> {
        self.validate_value("server.host", &serde_json::json!(settings.host))?;
        self.validate_value("server.port", &serde_json::json!(settings.port))?;
        self.validate_value(
            "logging.level",
            &serde_json::json!(settings.log_level.to_ascii_lowercase()),
        )?;

        if let Some(workers) = settings.workers {
            if workers == 0 || workers > 64 {
                return Err(AppError::validation("server.workers", "工作线程数必须在1-64范围内"));
            }
        }

        if settings.database_max_connections == 0 || settings.database_max_connections > 100 {
            return Err(AppError::validation(
                "database.max_connections",
                "数据库连接池大小必须在1-100范围内",
            ));
        }

        Ok(())
    }

    /// 非致命的配置告警（密钥为空等），启动时记录
    pub fn warnings(&self, config: &GacConfig) -> Vec<String> {
        let mut warnings = Vec::new();
        let secrets = [
            ("APP_KEY", config.security.app_key.as_str()),
            ("ENCRYPTION_KEY", config.encryption_key.as_str()),
            ("GMAIL_CLIENT_SECRET", config.gmail.client_secret.as_str()),
            ("OUTLOOK_CLIENT_SECRET", config.outlook.client_secret.as_str()),
        ];
        for (key, value) in secrets {
            if value.is_empty() {
                warnings.push(format!("{} 未设置", key));
            }
        }
        if config.is_production() && config.app.debug {
            warnings.push("生产环境开启了 APP_DEBUG".to_string());
        }
        if config.is_production() && !config.security.session_secure {
            warnings.push("生产环境未启用 SESSION_SECURE".to_string());
        }
        warnings
    }

    /// 根据规则验证值
    fn validate_against_rule(
        &self,
        rule: &ConfigValidationRule,
        value: &serde_json::Value,
    ) -> AppResult<()> {
        match (&rule.data_type, value) {
            (ConfigDataType::String, serde_json::Value::String(s)) => {
                if rule.required && s.is_empty() {
                    return Err(AppError::validation(&rule.key, format!("{}不能为空", rule.description)));
                }
                if let Some(pattern) = &rule.regex_pattern {
                    let regex = regex::Regex::new(pattern).map_err(|e| {
                        AppError::validation(&rule.key, format!("正则表达式错误: {}", e))
                    })?;
                    if !regex.is_match(s) {
                        return Err(AppError::validation(&rule.key, "值不匹配正则表达式"));
                    }
                }
                if let Some(allowed) = &rule.allowed_values {
                    if !allowed.contains(s) {
                        return Err(AppError::validation(
                            &rule.key,
                            format!("值必须是以下之一: {}", allowed.join(", ")),
                        ));
                    }
                }
            }
            (ConfigDataType::Integer, serde_json::Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    let f = i as f64;
                    if let Some(min) = rule.min_value {
                        if f < min {
                            return Err(AppError::validation(
                                &rule.key,
                                format!("值必须大于等于 {}", min),
                            ));
                        }
                    }
                    if let Some(max) = rule.max_value {
                        if f > max {
                            return Err(AppError::validation(
                                &rule.key,
                                format!("值必须小于等于 {}", max),
                            ));
                        }
                    }
                }
            }
            (ConfigDataType::Boolean, serde_json::Value::Bool(_)) => {}
            _ => {
                return Err(AppError::validation(
                    &rule.key,
                    format!("数据类型不匹配，期望: {:?}", rule.data_type),
                ));
            }
        }

        Ok(())
    }
}

/// 环境特定配置加载器
pub struct EnvironmentConfigLoader {
    environment: String,
}

impl Default for EnvironmentConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentConfigLoader {
    /// `GAC_ENV` 优先，其次 `APP_ENV`
    pub fn new() -> Self {
        let environment = std::env::var("GAC_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "production".to_string());
        Self { environment }
    }

    pub fn with_environment(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    /// 获取当前环境
    pub fn get_environment(&self) -> &str {
        &self.environment
    }

    /// 当前环境对应的配置源
    pub fn config_sources(&self) -> Vec<ConfigSource> {
        default_sources(&self.environment)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let validator = ConfigValidator::new();
        assert!(validator.validate_settings(&ServerSettings::default()).is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let validator = ConfigValidator::new();

        let mut settings = ServerSettings::default();
        settings.port = 0;
        assert!(validator.validate_settings(&settings).is_err());

        let mut settings = ServerSettings::default();
        settings.host = "bad host!".to_string();
        assert!(validator.validate_settings(&settings).is_err());

        let mut settings = ServerSettings::default();
        settings.log_level = "verbose".to_string();
        assert!(validator.validate_settings(&settings).is_err());

        let mut settings = ServerSettings::default();
        settings.workers = Some(0);
        assert!(validator.validate_settings(&settings).is_err());
    }

    #[test]
    fn test_warnings_for_empty_secrets() {
        let config = GacConfig::from_lookup(|key| match key {
            "APP_KEY" => Some("base64:abc".to_string()),
            _ => None,
        });
        let warnings = ConfigValidator::new().warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("ENCRYPTION_KEY")));
        assert!(!warnings.iter().any(|w| w.contains("APP_KEY")));
    }

    #[test]
    fn test_database_driver_parse() {
        assert_eq!(DatabaseDriver::parse("MySQL"), Some(DatabaseDriver::Mysql));
        assert_eq!(DatabaseDriver::parse("memory"), Some(DatabaseDriver::Memory));
        assert_eq!(DatabaseDriver::parse("sqlite"), None);
    }

    #[test]
    fn test_environment_sources() {
        let loader = EnvironmentConfigLoader::with_environment("test");
        assert_eq!(loader.get_environment(), "test");
        assert_eq!(loader.config_sources().len(), 4);
        assert!(!loader.is_production());
    }
}
