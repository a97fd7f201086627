//! `/admin/**` 的登录与视图权限检查
//! Login and per-role view checks for `/admin/**`

use std::rc::Rc;

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::db::error::describe_error;
use crate::repo::{ActivityAction, SUPERADMIN_ROLE_ID};
use crate::session::{constant_time_eq, session_id, SessionData, SessionState, SessionUser};
use crate::state::AppState;
use crate::views::{is_ajax, LayoutContext, RoleViewsConfig, ViewEntry};

pub const LOGIN_PATH: &str = "/login";
pub const NO_VIEWS_PATH: &str = "/login?error=no_views";

/// 通过检查后放入请求扩展的登录上下文
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub session: SessionData,
    pub user: SessionUser,
    /// 角色允许的视图 key；超级管理员为整个目录
    pub view_keys: Vec<String>,
}

impl AdminContext {
    pub fn is_superadmin(&self) -> bool {
        self.user.role_id == Some(SUPERADMIN_ROLE_ID)
    }

    pub fn can_view(&self, key: &str) -> bool {
        self.view_keys.iter().any(|k| k == key)
    }

    /// 超级管理员专属页面
    pub fn require_superadmin(&self) -> AppResult<()> {
        if self.is_superadmin() {
            Ok(())
        } else {
            Err(AppError::permission("No tienes acceso a esa sección."))
        }
    }

    /// 记录非超级管理员的操作；写入失败只记日志
    pub async fn record_activity(&self, state: &AppState, action: ActivityAction, description: &str) {
        if self.is_superadmin() {
            return;
        }
        if let Err(e) = state
            .repos
            .activity
            .log(self.user.id, &self.user.username, action, description)
            .await
        {
            warn!(user = %self.user.username, error = %describe_error(&e), "操作记录写入失败");
        }
    }

    pub fn allowed_views(&self) -> Vec<ViewEntry> {
        RoleViewsConfig::allowed(&self.view_keys)
    }

    /// 带导航与用户菜单的页面布局
    pub fn layout(&self, state: &AppState, title: &str, current_path: &str) -> LayoutContext {
        LayoutContext::new(title, state.app_name())
            .css("/assets/css/admin/main.css")
            .with_user(
                &self.user,
                &self.session.csrf_token,
                &self.allowed_views(),
                current_path,
            )
    }

    /// 表单字段 `csrf_token` 或请求头 `X-CSRF-Token`
    pub fn check_csrf(&self, req: &HttpRequest, form_token: Option<&str>) -> AppResult<()> {
        let header = req
            .headers()
            .get("X-CSRF-Token")
            .and_then(|v| v.to_str().ok());
        let token = form_token.filter(|t| !t.is_empty()).or(header).unwrap_or("");
        if !token.is_empty()
            && constant_time_eq(token.as_bytes(), self.session.csrf_token.as_bytes())
        {
            Ok(())
        } else {
            warn!(user = %self.user.username, path = %req.path(), "CSRF 校验失败");
            Err(AppError::Csrf)
        }
    }
}

impl FromRequest for AdminContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AdminContext>()
                .cloned()
                .ok_or_else(|| AppError::auth("No autenticado")),
        )
    }
}

/// 后台鉴权中间件
pub struct AdminAuth;

impl<S, B> Transform<S, ServiceRequest> for AdminAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AdminAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthService {
            service: Rc::new(service),
        }))
    }
}

pub struct AdminAuthService<S> {
    service: Rc<S>,
}

/// 检查结果
enum Decision {
    Allow(AdminContext),
    Deny(HttpResponse),
}

impl<S, B> Service<ServiceRequest> for AdminAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                let err = AppError::Internal(anyhow::anyhow!("AppState 未注册"));
                return Ok(req.into_response(err.error_response()));
            };

            let decision = match authorize(&state, req.request()).await {
                Ok(decision) => decision,
                Err(err) => return Ok(req.into_response(err.error_response())),
            };

            match decision {
                Decision::Allow(context) => {
                    req.extensions_mut().insert(context);
                    let response = service.call(req).await?;
                    Ok(response.map_into_boxed_body())
                }
                Decision::Deny(response) => Ok(req.into_response(response)),
            }
        })
    }
}

async fn authorize(state: &AppState, req: &HttpRequest) -> AppResult<Decision> {
    let sid = session_id(req);
    let session = match state.sessions.touch(sid.as_deref()).await {
        SessionState::Active(session) => session,
        SessionState::Anonymous(_) | SessionState::Expired | SessionState::Missing => {
            return Ok(Decision::Deny(unauthenticated(state, req, sid.as_deref())));
        }
    };
    let Some(user) = session.user.clone() else {
        return Ok(Decision::Deny(unauthenticated(state, req, sid.as_deref())));
    };

    let view_keys = resolve_view_keys(state, user.role_id).await?;

    if view_keys.is_empty() {
        info!(user = %user.username, role_id = ?user.role_id, "角色的视图均已失效，结束会话");
        state.sessions.destroy(&session.id).await;
        let response = if is_ajax(req) {
            HttpResponse::Forbidden().json(json!({
                "success": false,
                "message": "Tu rol no tiene vistas asignadas",
                "redirect": NO_VIEWS_PATH,
            }))
        } else {
            HttpResponse::Found()
                .append_header(("Location", NO_VIEWS_PATH))
                .cookie(state.sessions.removal_cookie())
                .finish()
        };
        return Ok(Decision::Deny(response));
    }

    if let Some(required) = RoleViewsConfig::view_keys_for_path(req.path()) {
        let permitted = required.iter().any(|k| view_keys.iter().any(|v| v == k));
        if !permitted {
            let fallback = RoleViewsConfig::allowed(&view_keys)
                .first()
                .map(|v| v.url)
                .unwrap_or(NO_VIEWS_PATH);
            debug!(user = %user.username, path = %req.path(), fallback, "缺少视图权限");
            let response = if is_ajax(req) {
                HttpResponse::Forbidden().json(json!({
                    "success": false,
                    "message": "No tienes acceso a esa sección.",
                    "redirect": fallback,
                }))
            } else {
                HttpResponse::Found()
                    .append_header(("Location", fallback))
                    .finish()
            };
            return Ok(Decision::Deny(response));
        }
    }

    Ok(Decision::Allow(AdminContext {
        session,
        user,
        view_keys,
    }))
}

/// 角色可见的视图 key
///
/// 超级管理员、没有角色或角色没有任何 `role_views` 记录时为整个目录；
/// 只有已配置的 key 全部不在目录中时才为空。
pub async fn resolve_view_keys(state: &AppState, role_id: Option<i64>) -> AppResult<Vec<String>> {
    let all = || RoleViewsConfig::keys().map(str::to_string).collect();
    match role_id {
        Some(role_id) if role_id != SUPERADMIN_ROLE_ID => {
            let stored = state.repos.roles.view_keys(role_id).await?;
            if stored.is_empty() {
                Ok(all())
            } else {
                Ok(RoleViewsConfig::filter_valid(&stored))
            }
        }
        _ => Ok(all()),
    }
}

/// AJAX 返回 401 JSON；普通 GET 记住目标地址后跳转登录页
fn unauthenticated(state: &AppState, req: &HttpRequest, sid: Option<&str>) -> HttpResponse {
    if is_ajax(req) {
        return HttpResponse::Unauthorized().json(json!({
            "success": false,
            "message": "No autenticado",
            "redirect": LOGIN_PATH,
        }));
    }

    let mut response = HttpResponse::Found();
    response.append_header(("Location", LOGIN_PATH));
    if req.method() == Method::GET {
        let session = state.sessions.start(sid);
        state
            .sessions
            .set_redirect_after_login(&session.id, &req.uri().to_string());
        response.cookie(state.sessions.cookie(&session));
    }
    response.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as awtest, App};

    use crate::state::testing::{demo_state, location, login_as, session_cookie};

    async fn echo_user(ctx: AdminContext) -> HttpResponse {
        HttpResponse::Ok().body(ctx.user.username)
    }

    fn admin_scope() -> actix_web::Scope<
        impl actix_web::dev::ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<BoxBody>,
            Error = Error,
            InitError = (),
        >,
    > {
        web::scope("/admin")
            .wrap(AdminAuth)
            .route("/dashboard", web::get().to(echo_user))
            .route("/users", web::get().to(echo_user))
            .route("/codes", web::get().to(echo_user))
    }

    #[actix_web::test]
    async fn test_anonymous_get_is_redirected_and_remembered() {
        let state = demo_state();
        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(admin_scope()),
        )
        .await;

        let req = awtest::TestRequest::get().uri("/admin/codes?page=2").to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), "/login");

        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == crate::session::SESSION_COOKIE)
            .unwrap();
        assert_eq!(
            state.sessions.take_redirect_after_login(cookie.value()).as_deref(),
            Some("/admin/codes?page=2")
        );
    }

    #[actix_web::test]
    async fn test_anonymous_ajax_gets_json_401() {
        let state = demo_state();
        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(admin_scope()),
        )
        .await;

        let req = awtest::TestRequest::get()
            .uri("/admin/dashboard")
            .insert_header(("X-Requested-With", "XMLHttpRequest"))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = awtest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "No autenticado");
        assert_eq!(body["redirect"], "/login");
    }

    #[actix_web::test]
    async fn test_superadmin_sees_everything() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(admin_scope()),
        )
        .await;

        let req = awtest::TestRequest::get()
            .uri("/admin/users")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_missing_view_redirects_to_first_allowed() {
        let state = demo_state();
        let session = login_as(&state, "operador").await;
        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(admin_scope()),
        )
        .await;

        let req = awtest::TestRequest::get()
            .uri("/admin/users")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), "/admin/dashboard");

        let req = awtest::TestRequest::get()
            .uri("/admin/codes")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_role_without_view_rows_has_full_access() {
        let hash = bcrypt::hash(crate::state::testing::DEMO_PASSWORD, 4).unwrap();
        let store = crate::repo::memory::MemoryStore::demo(&hash);
        let support = store.add_role("SOPORTE", "Soporte");
        store.add_user("soporte", "soporte@gac.local", &hash, Some(support), true);
        let state = AppState::memory(store).unwrap();
        let session = login_as(&state, "soporte").await;

        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(admin_scope()),
        )
        .await;

        for uri in ["/admin/dashboard", "/admin/users", "/admin/codes"] {
            let req = awtest::TestRequest::get()
                .uri(uri)
                .cookie(session_cookie(&session))
                .to_request();
            let resp = awtest::call_service(&app, req).await;
            assert_eq!(resp.status(), 200, "{}", uri);
        }
        assert!(state.sessions.get(&session.id).is_some());
    }

    #[actix_web::test]
    async fn test_user_without_role_has_full_access() {
        let hash = bcrypt::hash(crate::state::testing::DEMO_PASSWORD, 4).unwrap();
        let store = crate::repo::memory::MemoryStore::demo(&hash);
        store.add_user("sinrol", "sinrol@gac.local", &hash, None, true);
        let state = AppState::memory(store).unwrap();
        let session = login_as(&state, "sinrol").await;

        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(admin_scope()),
        )
        .await;
        let req = awtest::TestRequest::get()
            .uri("/admin/users")
            .cookie(session_cookie(&session))
            .to_request();
        assert_eq!(awtest::call_service(&app, req).await.status(), 200);
    }

    #[actix_web::test]
    async fn test_role_with_only_unknown_views_ends_session() {
        let state = demo_state();
        let session = login_as(&state, "operador").await;
        let role_id = session.user.as_ref().and_then(|u| u.role_id).unwrap();
        state
            .repos
            .roles
            .set_view_keys(role_id, &["vista_retirada".to_string()])
            .await
            .unwrap();

        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(admin_scope()),
        )
        .await;

        let req = awtest::TestRequest::get()
            .uri("/admin/dashboard")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), NO_VIEWS_PATH);
        assert!(state.sessions.get(&session.id).is_none());
    }

    #[tokio::test]
    async fn test_csrf_check() {
        let user = SessionUser {
            id: 1,
            username: "admin".to_string(),
            email: "admin@gac.local".to_string(),
            role_id: Some(SUPERADMIN_ROLE_ID),
        };
        let store = crate::session::SessionStore::new(3600, false, true);
        let session = store.login(None, user.clone(), false, 3600).await.unwrap();
        let ctx = AdminContext {
            session: session.clone(),
            user,
            view_keys: Vec::new(),
        };

        let req = awtest::TestRequest::default().to_http_request();
        assert!(ctx.check_csrf(&req, Some(&session.csrf_token)).is_ok());
        assert!(ctx.check_csrf(&req, Some("falso")).is_err());
        assert!(ctx.check_csrf(&req, None).is_err());

        let req = awtest::TestRequest::default()
            .insert_header(("X-CSRF-Token", session.csrf_token.as_str()))
            .to_http_request();
        assert!(ctx.check_csrf(&req, None).is_ok());
        assert!(ctx.is_superadmin());
    }
}
