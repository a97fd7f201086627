//! 应用常量配置
//! Application constants loaded from the environment
//!
//! 从环境变量构建一次、之后只读的 [`GacConfig`]。进程内通过 [`load`] 共享同一实例。

use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

static GAC_CONFIG: OnceLock<Arc<GacConfig>> = OnceLock::new();

/// 应用基本信息
#[derive(Debug, Clone, Serialize)]
pub struct AppSection {
    pub name: String,
    pub version: String,
    pub env: String,
    pub debug: bool,
    pub url: String,
}

/// 主数据库连接参数
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSection {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub charset: String,
    pub collate: String,
}

/// 数据仓库连接参数，未设置时沿用主库
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseSection {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecuritySection {
    #[serde(skip_serializing)]
    pub app_key: String,
    /// 分钟
    pub session_lifetime: u32,
    pub session_secure: bool,
    pub session_httponly: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GmailSection {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlookSection {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub tenant_id: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImapSection {
    pub host: String,
    pub port: u16,
    pub encryption: String,
    pub validate_cert: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingSection {
    pub channel: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CronSection {
    pub enabled: bool,
    /// 分钟
    pub email_reader_interval: u32,
    /// 分钟
    pub warehouse_sync_interval: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSection {
    pub enabled: bool,
    /// 每分钟请求数
    pub requests: u32,
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize)]
pub struct GacConfig {
    pub app: AppSection,
    pub database: DatabaseSection,
    pub warehouse: WarehouseSection,
    pub security: SecuritySection,
    pub gmail: GmailSection,
    pub outlook: OutlookSection,
    pub imap: ImapSection,
    #[serde(skip_serializing)]
    pub encryption_key: String,
    pub logging: LoggingSection,
    pub cron: CronSection,
    pub rate_limit: RateLimitSection,
    pub timezone: String,
    pub locale: String,
    pub fallback_locale: String,
}

/// 布尔值解析：`1/true/on/yes`（忽略大小写与首尾空白）为真，其余为假
pub fn filter_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

struct Lookup<F> {
    f: F,
}

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.f)(key).unwrap_or_else(|| default.to_string())
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> T {
        (self.f)(key)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(default)
    }

    fn boolean(&self, key: &str, default: bool) -> bool {
        (self.f)(key).map(|raw| filter_bool(&raw)).unwrap_or(default)
    }
}

impl GacConfig {
    /// 使用任意查找函数构建配置，便于测试时注入变量
    pub fn from_lookup<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup { f };

        let database = DatabaseSection {
            host: env.string("DB_HOST", "localhost"),
            port: env.number("DB_PORT", 3306),
            name: env.string("DB_NAME", "pocoavbb_gac"),
            user: env.string("DB_USER", "root"),
            password: env.string("DB_PASSWORD", ""),
            charset: env.string("DB_CHARSET", "utf8mb4"),
            collate: env.string("DB_COLLATE", "utf8mb4_spanish_ci"),
        };

        let warehouse = WarehouseSection {
            host: env.string("WAREHOUSE_DB_HOST", &database.host),
            port: env.number("WAREHOUSE_DB_PORT", database.port),
            name: env.string("WAREHOUSE_DB_NAME", &database.name),
            user: env.string("WAREHOUSE_DB_USER", &database.user),
            password: env.string("WAREHOUSE_DB_PASSWORD", &database.password),
        };

        Self {
            app: AppSection {
                name: env.string("APP_NAME", "GAC"),
                version: env.string("APP_VERSION", "2.0.0"),
                env: env.string("APP_ENV", "production"),
                debug: env.boolean("APP_DEBUG", false),
                url: env.string("APP_URL", "http://localhost/gac"),
            },
            database,
            warehouse,
            security: SecuritySection {
                app_key: env.string("APP_KEY", ""),
                session_lifetime: env.number("SESSION_LIFETIME", 120),
                session_secure: env.boolean("SESSION_SECURE", false),
                session_httponly: env.boolean("SESSION_HTTPONLY", true),
            },
            gmail: GmailSection {
                client_id: env.string("GMAIL_CLIENT_ID", ""),
                client_secret: env.string("GMAIL_CLIENT_SECRET", ""),
                redirect_uri: env.string("GMAIL_REDIRECT_URI", ""),
                scopes: env.string(
                    "GMAIL_SCOPES",
                    "https://www.googleapis.com/auth/gmail.readonly",
                ),
            },
            outlook: OutlookSection {
                client_id: env.string("OUTLOOK_CLIENT_ID", ""),
                client_secret: env.string("OUTLOOK_CLIENT_SECRET", ""),
                tenant_id: env.string("OUTLOOK_TENANT_ID", ""),
                redirect_uri: env.string("OUTLOOK_REDIRECT_URI", ""),
            },
            imap: ImapSection {
                host: env.string("IMAP_HOST", ""),
                port: env.number("IMAP_PORT", 993),
                encryption: env.string("IMAP_ENCRYPTION", "ssl"),
                validate_cert: env.boolean("IMAP_VALIDATE_CERT", true),
            },
            encryption_key: env.string("ENCRYPTION_KEY", ""),
            logging: LoggingSection {
                channel: env.string("LOG_CHANNEL", "file"),
                level: env.string("LOG_LEVEL", "info"),
            },
            cron: CronSection {
                enabled: env.boolean("CRON_ENABLED", true),
                email_reader_interval: env.number("CRON_EMAIL_READER_INTERVAL", 5),
                warehouse_sync_interval: env.number("CRON_WAREHOUSE_SYNC_INTERVAL", 60),
            },
            rate_limit: RateLimitSection {
                enabled: env.boolean("RATE_LIMIT_ENABLED", true),
                requests: env.number("RATE_LIMIT_REQUESTS", 60),
            },
            timezone: env.string("TIMEZONE", "America/Mexico_City"),
            locale: env.string("LOCALE", "es_ES"),
            fallback_locale: env.string("FALLBACK_LOCALE", "es_ES"),
        }
    }

    /// 从进程环境变量构建
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}

/// 初始化并返回进程级配置；只有第一次调用会读取环境变量
pub fn load() -> Arc<GacConfig> {
    Arc::clone(GAC_CONFIG.get_or_init(|| {
        let config = GacConfig::from_env();
        // 进程时区
        std::env::set_var("TZ", &config.timezone);
        tracing::debug!(timezone = %config.timezone, "应用配置已加载");
        Arc::new(config)
    }))
}

/// 已初始化时返回进程级配置
pub fn get() -> Option<Arc<GacConfig>> {
    GAC_CONFIG.get().map(Arc::clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GacConfig::from_lookup(|_| None);
        assert_eq!(config.app.name, "GAC");
        assert_eq!(config.app.version, "2.0.0");
        assert!(!config.app.debug);
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.collate, "utf8mb4_spanish_ci");
        assert_eq!(config.security.session_lifetime, 120);
        assert!(config.security.session_httponly);
        assert_eq!(config.imap.port, 993);
        assert!(config.cron.enabled);
        assert_eq!(config.rate_limit.requests, 60);
        assert_eq!(config.timezone, "America/Mexico_City");
        assert_eq!(config.fallback_locale, "es_ES");
    }

    #[test]
    fn test_warehouse_falls_back_to_primary() {
        let config = GacConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "3307"),
            ("WAREHOUSE_DB_NAME", "warehouse"),
        ]));
        assert_eq!(config.warehouse.host, "db.internal");
        assert_eq!(config.warehouse.port, 3307);
        assert_eq!(config.warehouse.name, "warehouse");
        assert_eq!(config.warehouse.user, "root");
    }

    #[test]
    fn test_boolean_coercion() {
        for raw in ["1", "true", "TRUE", " on ", "Yes"] {
            assert!(filter_bool(raw), "{raw}");
        }
        for raw in ["0", "false", "off", "no", "", "verdadero"] {
            assert!(!filter_bool(raw), "{raw}");
        }
        let config = GacConfig::from_lookup(lookup(&[
            ("APP_DEBUG", "on"),
            ("SESSION_HTTPONLY", "nope"),
        ]));
        assert!(config.app.debug);
        assert!(!config.security.session_httponly);
    }

    #[test]
    fn test_unparsable_numbers_use_default() {
        let config = GacConfig::from_lookup(lookup(&[
            ("DB_PORT", "tres mil"),
            ("RATE_LIMIT_REQUESTS", "120"),
        ]));
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.rate_limit.requests, 120);
    }

    #[test]
    fn test_load_is_idempotent() {
        let first = load();
        std::env::set_var("APP_NAME", "otro-nombre-despues-de-cargar");
        let second = load();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.app.name, second.app.name);
        assert!(get().is_some());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let config = GacConfig::from_lookup(lookup(&[("DB_PASSWORD", "s3creto")]));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3creto"));
    }
}
