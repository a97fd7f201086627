//! 所有请求共享的应用状态
//! Application state shared by every request

use std::sync::Arc;

use crate::comm::config_validator::ServerSettings;
use crate::comm::env_config::GacConfig;
use crate::repo::memory::MemoryStore;
use crate::repo::Repositories;
use crate::session::{LoginThrottle, SessionStore};
use crate::views::Views;

/// 通过 `web::Data<AppState>` 注入控制器与中间件
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GacConfig>,
    pub settings: ServerSettings,
    pub repos: Repositories,
    pub sessions: Arc<SessionStore>,
    pub throttle: Arc<LoginThrottle>,
    pub views: Arc<Views>,
}

impl AppState {
    pub fn new(
        config: Arc<GacConfig>,
        settings: ServerSettings,
        repos: Repositories,
    ) -> anyhow::Result<Self> {
        // 未登录会话沿用 SESSION_LIFETIME（分钟）
        let sessions = SessionStore::new(
            u64::from(config.security.session_lifetime) * 60,
            config.security.session_secure,
            config.security.session_httponly,
        );
        Ok(Self {
            settings,
            repos,
            sessions: Arc::new(sessions),
            throttle: Arc::new(LoginThrottle::default()),
            views: Arc::new(Views::new()?),
            config,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.config.app.name
    }

    /// 内存仓储的状态，供测试与 `database.driver = "memory"` 使用
    pub fn memory(store: MemoryStore) -> anyhow::Result<Self> {
        let config = Arc::new(GacConfig::from_lookup(|_| None));
        Self::new(
            config,
            ServerSettings::default(),
            Repositories::memory(Arc::new(store)),
        )
    }
}

/// 挂载在 `/admin` 鉴权 scope 下的测试应用
#[cfg(test)]
#[macro_export]
macro_rules! admin_test_app {
    ($state:expr, $configure:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state.clone()))
                .service(
                    actix_web::web::scope("/admin")
                        .wrap($crate::middleware::AdminAuth)
                        .configure($configure),
                ),
        )
        .await
    };
}

#[cfg(test)]
pub(crate) mod testing {
    //! HTTP 测试的公共工具

    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::dev::ServiceResponse;

    use crate::session::{SessionData, SessionUser, SESSION_COOKIE};

    /// 演示账户的明文密码
    pub const DEMO_PASSWORD: &str = "admin123";

    /// 使用低成本 bcrypt 的演示数据
    pub fn demo_state() -> AppState {
        let hash = bcrypt::hash(DEMO_PASSWORD, 4).unwrap();
        AppState::memory(MemoryStore::demo(&hash)).unwrap()
    }

    /// 直接在会话存储中登录指定用户
    pub async fn login_as(state: &AppState, username: &str) -> SessionData {
        let user = state
            .repos
            .users
            .find_by_username(username)
            .await
            .unwrap()
            .unwrap();
        state.sessions.login(
            None,
            SessionUser {
                id: user.id,
                username: user.username,
                email: user.email,
                role_id: user.role_id,
            },
            false,
            3600,
        )
        .await
        .unwrap()
    }

    pub fn session_cookie(session: &SessionData) -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, session.id.clone())
    }

    pub async fn body_text<B: actix_web::body::MessageBody>(resp: ServiceResponse<B>) -> String {
        let bytes = actix_web::test::read_body(resp).await;
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub fn location<B>(resp: &ServiceResponse<B>) -> String {
        resp.headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }
}
