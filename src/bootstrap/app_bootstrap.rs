use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::MySqlPool;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, instrument, warn};

use crate::comm::config_validator::{DatabaseDriver, ServerSettings};
use crate::comm::enhanced_config::{EnhancedConfigManager, SettingsOverrides};
use crate::comm::env_config::{self, GacConfig};
use crate::comm::tracing::init_tracing;
use crate::db::{connection, DbError};
use crate::middleware::{RateLimitConfig, RateLimitMiddleware, RateLimiter, SecurityHeaders};
use crate::repo::memory::MemoryStore;
use crate::repo::Repositories;
use crate::route_registry::{configure_app, init_global_routes, print_global_routes_info};
use crate::state::AppState;

/// 内存仓储演示账户的初始密码
const DEMO_PASSWORD: &str = "admin123";

/// 应用启动器
#[derive(Debug, Default)]
pub struct AppBootstrap {
    overrides: SettingsOverrides,
}

impl AppBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 命令行参数覆盖配置文件
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// 加载配置、初始化日志与仓储，然后运行 HTTP 服务器
    pub async fn run(self) -> anyhow::Result<()> {
        let gac = env_config::load();
        let mut manager = EnhancedConfigManager::new(&gac)?;
        manager.apply_overrides(&self.overrides)?;
        let settings = manager.settings().clone();

        init_tracing(&settings, &gac.app.name)?;
        manager.print_config_summary(&gac);

        let repos = self.build_repositories(&gac, &settings).await?;
        let state = AppState::new(gac, settings, repos)?;

        match self.start_http_server(state).await {
            Ok(()) => {
                info!("服务器已停止");
                Ok(())
            }
            Err(e) => {
                error!("服务器启动失败: {}", e);
                Err(e)
            }
        }
    }

    async fn build_repositories(
        &self,
        gac: &GacConfig,
        settings: &ServerSettings,
    ) -> anyhow::Result<Repositories> {
        match settings.database_driver {
            DatabaseDriver::Mysql => {
                let pool =
                    Self::connect_with_retry(gac, settings.database_max_connections).await?;
                Ok(Repositories::mysql(pool))
            }
            DatabaseDriver::Memory => {
                warn!("使用内存仓储，数据不会持久化；演示密码为 {}", DEMO_PASSWORD);
                let hash = bcrypt::hash(DEMO_PASSWORD, bcrypt::DEFAULT_COST)?;
                Ok(Repositories::memory(Arc::new(MemoryStore::demo(&hash))))
            }
        }
    }

    /// 建立连接池并做健康检查，失败时指数退避重试
    #[instrument(skip(gac))]
    async fn connect_with_retry(gac: &GacConfig, max_connections: u32) -> anyhow::Result<MySqlPool> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT_DURATION: Duration = Duration::from_secs(10);

        let mut attempt = 1;
        loop {
            info!("数据库连接尝试 {}/{}", attempt, MAX_RETRIES);
            let result = timeout(TIMEOUT_DURATION, async {
                let pool = connection::connect(gac, max_connections).await?;
                connection::check_health(&pool).await?;
                Ok::<_, DbError>(pool)
            })
            .await;

            let failure = match result {
                Ok(Ok(pool)) => {
                    info!("数据库连接成功");
                    return Ok(pool);
                }
                Ok(Err(e)) => crate::db::error::describe_error(&e),
                Err(_) => "连接超时".to_string(),
            };
            warn!("数据库连接失败 (尝试 {}): {}", attempt, failure);
            if attempt == MAX_RETRIES {
                anyhow::bail!("无法连接数据库: {}", failure);
            }

            let delay = Duration::from_millis(1000 * 2_u64.pow(attempt - 1));
            info!("等待 {:?} 后重试", delay);
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn start_http_server(&self, state: AppState) -> anyhow::Result<()> {
        let settings = state.settings.clone();
        let hsts = state.config.security.session_secure;
        let limiter = RateLimiter::new(RateLimitConfig::from(&state.config.rate_limit));
        let data = web::Data::new(state);

        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .wrap(RateLimitMiddleware::with_limiter(limiter.clone()))
                .wrap(SecurityHeaders::new(hsts))
                .wrap(Logger::default())
                .configure(configure_app)
        });
        if let Some(workers) = settings.workers {
            server = server.workers(workers);
        }

        let address = format!("{}:{}", settings.host, settings.port);
        let server = server.bind(&address)?;
        init_global_routes();
        print_global_routes_info();
        info!("服务器监听 http://{}", address);

        server.run().await?;
        Ok(())
    }
}
