use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// 服务器配置所使用的环境变量前缀（`GAC_SERVER_PORT` -> `server.port`）
pub const ENV_PREFIX: &str = "GAC";

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },
    #[error("配置项 '{key}' 不存在")]
    KeyNotFound { key: String },
    #[error("配置项 '{key}' 类型转换失败: {message}")]
    TypeConversionError { key: String, message: String },
    #[error("配置初始化失败: {message}")]
    InitializationError { message: String },
}

/// 配置数据源信息
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: &'static str,
    pub description: String,
    pub priority: u8,
    pub loaded: bool,
}

/// 基于 `config` crate 的分层配置管理器
///
/// 后添加的配置源优先级更高，环境变量始终最后加入。
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 使用默认的分层配置源创建（default -> {env} -> local -> GAC_*）
    pub fn new() -> Result<Self> {
        let loader = crate::comm::config_validator::EnvironmentConfigLoader::new();
        Self::with_sources(loader.config_sources())
    }

    /// 使用指定的配置源创建配置管理器
    pub fn with_sources(sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::with_capacity(sources.len());

        for (index, source) in sources.into_iter().enumerate() {
            let mut info = source.describe(index as u8 + 1);

            if let ConfigSource::File { path, required, .. } = &source {
                if !std::path::Path::new(path).exists() {
                    if *required {
                        return Err(anyhow!(ConfigError::FileNotFound { path: path.clone() }));
                    }
                    // 可选文件不存在，仅记录
                    sources_info.push(info);
                    continue;
                }
            }

            builder = source.add_to_builder(builder)?;
            info.loaded = true;
            sources_info.push(info);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败: {}", key, e))
    }

    /// 获取指定 key 的配置值，如果不存在返回默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 安全获取配置值，区分缺失与类型错误
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound {
                key: key.to_string(),
            },
            other => ConfigError::TypeConversionError {
                key: key.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// 检查配置项是否存在
    pub fn exists(&self, key: &str) -> bool {
        self.config.get::<serde_json::Value>(key).is_ok()
    }

    /// 获取所有配置源信息
    pub fn sources_info(&self) -> &[ConfigSourceInfo] {
        &self.sources_info
    }

    /// (总数, 已加载, 未加载)
    pub fn sources_stats(&self) -> (usize, usize, usize) {
        let total = self.sources_info.len();
        let loaded = self.sources_info.iter().filter(|info| info.loaded).count();
        (total, loaded, total - loaded)
    }

    /// 以日志形式输出配置源
    pub fn log_sources_info(&self) {
        for info in &self.sources_info {
            tracing::debug!(
                priority = info.priority,
                loaded = info.loaded,
                "配置源 {}: {}",
                info.source_type,
                info.description
            );
        }
        let (total, loaded, skipped) = self.sources_stats();
        tracing::info!("配置源: 总计 {} 个，加载 {} 个，跳过 {} 个", total, loaded, skipped);
    }
}

/// 默认配置源，按优先级从低到高排列
pub fn default_sources(environment: &str) -> Vec<ConfigSource> {
    vec![
        ConfigSource::File {
            path: "config/default.toml".to_string(),
            format: Some(FileFormat::Toml),
            required: false,
        },
        ConfigSource::File {
            path: format!("config/{}.toml", environment),
            format: Some(FileFormat::Toml),
            required: false,
        },
        ConfigSource::File {
            path: "config/local.toml".to_string(),
            format: Some(FileFormat::Toml),
            required: false,
        },
        ConfigSource::Env {
            prefix: ENV_PREFIX.to_string(),
            separator: "_",
        },
    ]
}

/// 配置源类型
pub enum ConfigSource {
    /// 文件配置源
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    /// 环境变量配置源
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源（测试常用）
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    fn describe(&self, priority: u8) -> ConfigSourceInfo {
        let (source_type, description) = match self {
            ConfigSource::File { path, required, .. } => {
                ("File", format!("文件配置源: {} (必需: {})", path, required))
            }
            ConfigSource::Env { prefix, separator } => (
                "Environment",
                format!("环境变量配置源: 前缀={}, 分隔符={}", prefix, separator),
            ),
            ConfigSource::Memory(map) => ("Memory", format!("内存配置源: {} 个配置项", map.len())),
            ConfigSource::String { .. } => ("String", "字符串配置源".to_string()),
        };
        ConfigSourceInfo {
            source_type,
            description,
            priority,
            loaded: false,
        }
    }

    fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => {
                let file_source = match format {
                    Some(format) => File::with_name(&path).format(format),
                    None => File::with_name(&path),
                };
                Ok(builder.add_source(file_source.required(required)))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .try_parsing(true)
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                let json_content = serde_json::to_string(&map)
                    .map_err(|e| anyhow!("序列化内存配置失败: {}", e))?;
                Ok(builder.add_source(File::from_str(&json_content, FileFormat::Json)))
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_string() {
        let source = ConfigSource::String {
            content: "[server]\nport = 8080".to_string(),
            format: FileFormat::Toml,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert_eq!(manager.get::<i64>("server.port").unwrap(), 8080);
    }

    #[test]
    fn test_config_from_memory() {
        let mut map = HashMap::new();
        map.insert(
            "server".to_string(),
            serde_json::json!({ "host": "127.0.0.1" }),
        );
        let manager = ConfigManager::with_sources(vec![ConfigSource::Memory(map)]).unwrap();
        assert_eq!(manager.get::<String>("server.host").unwrap(), "127.0.0.1");
        assert!(manager.exists("server.host"));
        assert!(!manager.exists("server.port"));
    }

    #[test]
    fn test_missing_optional_file_is_skipped() {
        let manager = ConfigManager::with_sources(vec![ConfigSource::File {
            path: "config/does-not-exist.toml".to_string(),
            format: Some(FileFormat::Toml),
            required: false,
        }])
        .unwrap();
        assert_eq!(manager.sources_stats(), (1, 0, 1));
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = ConfigManager::with_sources(vec![ConfigSource::File {
            path: "config/does-not-exist.toml".to_string(),
            format: Some(FileFormat::Toml),
            required: true,
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_safe_reports_missing_key() {
        let manager = ConfigManager::with_sources(vec![]).unwrap();
        let err = manager.get_safe::<String>("server.host").unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound { .. }));
    }
}
