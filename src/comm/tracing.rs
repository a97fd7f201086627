use anyhow::Result;
use chrono::{Datelike, Timelike};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::comm::config_validator::ServerSettings;

struct LogTimer;

impl fmt::time::FormatTime for LogTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        let cs = now.timestamp_subsec_millis() / 10;
        write!(
            w,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:02}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            cs
        )
    }
}

/// 将 Monolog 风格的级别名映射为 tracing 级别
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "alert" | "emergency" => "error",
        _ => "info",
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = normalize_level(level);
        EnvFilter::try_new(format!("{},sqlx=warn,actix_server=info", level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// 初始化全局日志；重复调用时忽略
pub fn init_tracing(settings: &ServerSettings, app_name: &str) -> Result<()> {
    LogTracer::init().ok();
    let filter = build_filter(&settings.log_level);

    if settings.log_json {
        let formatting_layer = BunyanFormattingLayer::new(app_name.to_string(), std::io::stdout);
        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(formatting_layer);
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        fmt::SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_timer(LogTimer)
            .compact()
            .with_target(settings.debug)
            .try_init()
            .ok();
    }
    Ok(())
}
