//! 服务端会话
//! Server-side sessions backed by Sa-Token
//!
//! 登录、登出与令牌校验交给 Sa-Token；`GACSESSID` cookie 在登录前是随机 ID，
//! 登录后就是 Sa-Token 令牌。这里只额外保存 CSRF 令牌、登录后跳转地址与空闲超时。

pub mod throttle;
pub mod token;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use sa_token_core::token::TokenValue;
use sa_token_core::{SaTokenManager, StpUtil};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

pub use throttle::LoginThrottle;

pub const SESSION_COOKIE: &str = "GACSESSID";

/// 勾选“记住我”时的会话有效期（30 天）
pub const REMEMBER_LIFETIME_SECS: u64 = 86400 * 30;

/// 已登录用户
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SessionData {
    /// 登录前为随机 ID，登录后为 Sa-Token 令牌
    pub id: String,
    pub csrf_token: String,
    pub user: Option<SessionUser>,
    pub remember: bool,
    /// 空闲超时（秒），登录时确定
    pub lifetime_secs: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub redirect_after_login: Option<String>,
}

impl SessionData {
    fn new(anonymous_lifetime_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            id: new_session_id(),
            csrf_token: new_csrf_token(),
            user: None,
            remember: false,
            lifetime_secs: anonymous_lifetime_secs,
            created_at: now,
            last_activity: now,
            redirect_after_login: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// 距上次活动超过 `lifetime_secs` 即过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.last_activity > Duration::seconds(self.lifetime_secs as i64)
    }
}

/// `touch` 的结果
#[derive(Debug, Clone)]
pub enum SessionState {
    /// 已登录且未过期，活动时间已刷新
    Active(SessionData),
    /// 会话存在但未登录
    Anonymous(SessionData),
    /// 已过期或令牌失效，会话已销毁
    Expired,
    /// 没有对应的会话
    Missing,
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 32 字节随机数的十六进制形式
pub fn new_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 定长比较，避免按前缀提前返回
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 从请求 cookie 中读取会话 ID
pub fn session_id(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// 会话存储：令牌生命周期在 Sa-Token，附加数据在进程内
pub struct SessionStore {
    manager: Arc<SaTokenManager>,
    extras: RwLock<HashMap<String, SessionData>>,
    anonymous_lifetime_secs: u64,
    cookie_secure: bool,
    cookie_httponly: bool,
}

impl SessionStore {
    /// `anonymous_lifetime_secs` 用于尚未登录的会话（登录页的 CSRF 令牌）
    pub fn new(anonymous_lifetime_secs: u64, cookie_secure: bool, cookie_httponly: bool) -> Self {
        Self {
            manager: token::init_sa_token(),
            extras: RwLock::new(HashMap::new()),
            anonymous_lifetime_secs: anonymous_lifetime_secs.max(60),
            cookie_secure,
            cookie_httponly,
        }
    }

    pub fn manager(&self) -> &Arc<SaTokenManager> {
        &self.manager
    }

    /// 取已有会话，不存在（或已过期）时新建匿名会话
    pub fn start(&self, id: Option<&str>) -> SessionData {
        let now = Utc::now();
        if let Some(id) = id {
            let extras = self.extras.read();
            if let Some(session) = extras.get(id) {
                if !session.is_expired_at(now) {
                    return session.clone();
                }
            }
        }
        let session = SessionData::new(self.anonymous_lifetime_secs);
        let mut extras = self.extras.write();
        if let Some(id) = id {
            extras.remove(id);
        }
        // 只清理匿名会话；已登录会话过期时需要同时注销令牌，由 touch 处理
        extras.retain(|_, s| s.is_authenticated() || !s.is_expired_at(now));
        extras.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<SessionData> {
        self.extras.read().get(id).cloned()
    }

    /// 检查会话并刷新最后活动时间；过期会话被销毁
    pub async fn touch(&self, id: Option<&str>) -> SessionState {
        self.touch_at(id, Utc::now()).await
    }

    pub async fn touch_at(&self, id: Option<&str>, now: DateTime<Utc>) -> SessionState {
        let Some(id) = id else {
            return SessionState::Missing;
        };
        let Some(session) = self.get(id) else {
            return SessionState::Missing;
        };

        if session.is_expired_at(now) {
            debug!(authenticated = session.is_authenticated(), "会话空闲超时");
            self.destroy(id).await;
            return SessionState::Expired;
        }

        if let Some(user) = &session.user {
            let token = TokenValue::new(id.to_string());
            let valid = match StpUtil::get_login_id(&token).await {
                Ok(login_id) => login_id == user.id.to_string(),
                Err(e) => {
                    debug!("令牌校验失败: {}", e);
                    false
                }
            };
            if !valid {
                self.extras.write().remove(id);
                return SessionState::Expired;
            }
        }

        let mut extras = self.extras.write();
        let Some(current) = extras.get_mut(id) else {
            return SessionState::Missing;
        };
        current.last_activity = now;
        if current.is_authenticated() {
            SessionState::Active(current.clone())
        } else {
            SessionState::Anonymous(current.clone())
        }
    }

    /// 校验表单提交的 CSRF 令牌
    pub fn verify_csrf(&self, id: Option<&str>, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        id.and_then(|id| self.get(id))
            .map(|s| constant_time_eq(s.csrf_token.as_bytes(), token.as_bytes()))
            .unwrap_or(false)
    }

    /// 登录成功：由 Sa-Token 签发新令牌作为会话 ID，保留 CSRF 令牌与登录后跳转地址
    pub async fn login(
        &self,
        old_id: Option<&str>,
        user: SessionUser,
        remember: bool,
        lifetime_secs: u64,
    ) -> anyhow::Result<SessionData> {
        let login_id = user.id.to_string();
        let token = self
            .manager
            .login(&login_id)
            .await
            .map_err(|e| anyhow::anyhow!("Sa-Token 登录失败: {}", e))?;

        let previous = old_id.and_then(|id| self.extras.write().remove(id));
        if let Some(previous) = &previous {
            if let Some(old_user) = &previous.user {
                // 已登录会话再次登录，旧令牌作废
                let old = TokenValue::new(previous.id.clone());
                if let Err(e) = StpUtil::logout(&old).await {
                    warn!(user_id = old_user.id, "注销旧令牌失败: {}", e);
                }
            }
        }

        let now = Utc::now();
        let mut session = previous.unwrap_or_else(|| SessionData::new(lifetime_secs));
        session.id = token.to_string();
        session.user = Some(user);
        session.remember = remember;
        session.lifetime_secs = if remember {
            REMEMBER_LIFETIME_SECS
        } else {
            lifetime_secs
        };
        session.created_at = now;
        session.last_activity = now;

        self.extras
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    pub fn set_redirect_after_login(&self, id: &str, url: &str) {
        if let Some(session) = self.extras.write().get_mut(id) {
            session.redirect_after_login = Some(url.to_string());
        }
    }

    /// 取出并清除登录后跳转地址
    pub fn take_redirect_after_login(&self, id: &str) -> Option<String> {
        self.extras
            .write()
            .get_mut(id)
            .and_then(|s| s.redirect_after_login.take())
    }

    /// 删除会话；已登录时同时注销 Sa-Token 令牌
    pub async fn destroy(&self, id: &str) {
        let removed = self.extras.write().remove(id);
        if let Some(session) = removed.filter(SessionData::is_authenticated) {
            let token = TokenValue::new(session.id);
            if let Err(e) = StpUtil::logout(&token).await {
                warn!("注销令牌失败: {}", e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.extras.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 会话 cookie；已登录时带 Max-Age
    pub fn cookie(&self, session: &SessionData) -> Cookie<'static> {
        let mut builder = Cookie::build(SESSION_COOKIE, session.id.clone())
            .path("/")
            .http_only(self.cookie_httponly)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax);
        if session.is_authenticated() {
            builder = builder.max_age(CookieDuration::seconds(session.lifetime_secs as i64));
        }
        builder.finish()
    }

    /// 删除浏览器端 cookie
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(self.cookie_httponly)
            .secure(self.cookie_secure)
            .finish();
        cookie.make_removal();
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: 7,
            username: "ana".to_string(),
            email: "ana@mail.com".to_string(),
            role_id: Some(2),
        }
    }

    #[test]
    fn test_csrf_token_shape() {
        let token = new_csrf_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, new_csrf_token());
    }

    #[test]
    fn test_start_reuses_existing_session() {
        let store = SessionStore::new(7200, false, true);
        let first = store.start(None);
        let again = store.start(Some(&first.id));
        assert_eq!(first.id, again.id);
        assert_eq!(first.csrf_token, again.csrf_token);
        let other = store.start(Some("desconocido"));
        assert_ne!(other.id, first.id);
    }

    #[test]
    fn test_verify_csrf() {
        let store = SessionStore::new(7200, false, true);
        let session = store.start(None);
        assert!(store.verify_csrf(Some(&session.id), &session.csrf_token));
        assert!(!store.verify_csrf(Some(&session.id), "otro"));
        assert!(!store.verify_csrf(Some(&session.id), ""));
        assert!(!store.verify_csrf(None, &session.csrf_token));
    }

    #[tokio::test]
    async fn test_login_issues_token_and_keeps_redirect() {
        let store = SessionStore::new(7200, false, true);
        let anon = store.start(None);
        store.set_redirect_after_login(&anon.id, "/admin/codes");

        let session = store
            .login(Some(&anon.id), user(), false, 3600)
            .await
            .unwrap();
        assert_ne!(session.id, anon.id);
        assert!(store.get(&anon.id).is_none());
        assert_eq!(session.csrf_token, anon.csrf_token);
        assert_eq!(session.lifetime_secs, 3600);

        let token = TokenValue::new(session.id.clone());
        assert!(StpUtil::is_login(&token).await);
        assert_eq!(StpUtil::get_login_id(&token).await.unwrap(), "7");

        assert_eq!(
            store.take_redirect_after_login(&session.id).as_deref(),
            Some("/admin/codes")
        );
        assert!(store.take_redirect_after_login(&session.id).is_none());
    }

    #[tokio::test]
    async fn test_remember_extends_lifetime() {
        let store = SessionStore::new(7200, false, true);
        let session = store.login(None, user(), true, 3600).await.unwrap();
        assert_eq!(session.lifetime_secs, REMEMBER_LIFETIME_SECS);
        let cookie = store.cookie(&session);
        assert_eq!(
            cookie.max_age(),
            Some(CookieDuration::seconds(REMEMBER_LIFETIME_SECS as i64))
        );
    }

    #[tokio::test]
    async fn test_touch_expires_idle_sessions() {
        let store = SessionStore::new(7200, false, true);
        let session = store.login(None, user(), false, 3600).await.unwrap();

        let soon = Utc::now() + Duration::seconds(1800);
        assert!(matches!(
            store.touch_at(Some(&session.id), soon).await,
            SessionState::Active(_)
        ));
        // 活动时间已刷新，从 soon 起再过 3599 秒仍有效
        let later = soon + Duration::seconds(3599);
        assert!(matches!(
            store.touch_at(Some(&session.id), later).await,
            SessionState::Active(_)
        ));
        let too_late = later + Duration::seconds(3601);
        assert!(matches!(
            store.touch_at(Some(&session.id), too_late).await,
            SessionState::Expired
        ));
        assert!(matches!(
            store.touch_at(Some(&session.id), too_late).await,
            SessionState::Missing
        ));
        // 空闲超时同时注销令牌
        assert!(!StpUtil::is_login(&TokenValue::new(session.id)).await);
    }

    #[tokio::test]
    async fn test_revoked_token_ends_session() {
        let store = SessionStore::new(7200, false, true);
        let session = store.login(None, user(), false, 3600).await.unwrap();
        StpUtil::logout(&TokenValue::new(session.id.clone()))
            .await
            .unwrap();

        assert!(matches!(
            store.touch(Some(&session.id)).await,
            SessionState::Expired
        ));
        assert!(store.get(&session.id).is_none());
    }

    #[tokio::test]
    async fn test_destroy_logs_out_token() {
        let store = SessionStore::new(7200, false, true);
        let session = store.login(None, user(), false, 3600).await.unwrap();
        store.destroy(&session.id).await;
        assert!(store.get(&session.id).is_none());
        assert!(!StpUtil::is_login(&TokenValue::new(session.id)).await);
    }

    #[test]
    fn test_removal_cookie() {
        let store = SessionStore::new(7200, true, true);
        let cookie = store.removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(cookie.secure(), Some(true));
    }
}
