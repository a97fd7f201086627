//! Sa-Token 初始化与登录事件监听
//! Sa-Token initialization and login event listener

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use sa_token_core::config::TokenStyle;
use sa_token_core::{SaTokenConfig, SaTokenListener, SaTokenManager};
use sa_token_storage_memory::MemoryStorage;
use tracing::info;

use super::{REMEMBER_LIFETIME_SECS, SESSION_COOKIE};

static MANAGER: OnceLock<Arc<SaTokenManager>> = OnceLock::new();

/// 登录、登出事件写入日志
/// Writes login and logout events to the log
pub struct SessionListener;

#[async_trait]
impl SaTokenListener for SessionListener {
    async fn on_login(&self, login_id: &str, _token: &str, login_type: &str) {
        info!(login_id, login_type, "用户登录");
    }

    async fn on_logout(&self, login_id: &str, _token: &str, login_type: &str) {
        info!(login_id, login_type, "用户登出");
    }

    async fn on_kick_out(&self, login_id: &str, _token: &str, login_type: &str) {
        info!(login_id, login_type, "用户被踢下线");
    }
}

/// 初始化 Sa-Token（进程内只构建一次）
/// Initialize Sa-Token, built once per process
///
/// 令牌名即会话 cookie 名；令牌的绝对有效期取“记住我”的 30 天，
/// 每次登录各自的空闲超时由 [`super::SessionStore`] 检查。
pub fn init_sa_token() -> Arc<SaTokenManager> {
    MANAGER
        .get_or_init(|| {
            let manager = SaTokenConfig::builder()
                .token_name(SESSION_COOKIE)
                .timeout(REMEMBER_LIFETIME_SECS as i64)
                .register_listener(Arc::new(SessionListener))
                .token_style(TokenStyle::Random64)
                .auto_renew(true)
                .is_concurrent(true)
                .is_share(false)
                .storage(Arc::new(MemoryStorage::new()))
                .build();
            info!("Sa-Token 使用内存存储");
            Arc::new(manager)
        })
        .clone()
}
