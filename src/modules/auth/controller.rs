use actix_web::{
    http::{header::ContentType, Method},
    web, Either, HttpRequest, HttpResponse,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::comm::env_config::filter_bool;
use crate::error::{ApiResponse, AppError, AppResult};
use crate::modules::auth::validator::{safe_redirect, LoginValidator, DEFAULT_REDIRECT};
use crate::session::{session_id, SessionState, SessionUser};
use crate::state::AppState;
use crate::views::{is_ajax, redirect, LayoutContext};

/// 登录请求，JSON 与表单共用
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub remember: bool,
    #[serde(default)]
    pub csrf_token: String,
}

/// JSON 中为布尔值，表单中为 `on`/`1`/`true`
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Int(i64),
        Str(String),
    }
    Ok(match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(b) => b,
        BoolLike::Int(n) => n == 1,
        BoolLike::Str(s) => filter_bool(&s),
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
}

/// `?error=` 对应的提示
pub fn login_error_message(code: &str) -> Option<&'static str> {
    match code {
        "no_views" => Some("Tu rol no tiene vistas asignadas. Contacta al administrador."),
        "no_access" => Some("No tienes acceso a esa sección."),
        _ => None,
    }
}

/// 登录页
#[actix_web::get("/login")]
#[instrument(skip_all)]
pub async fn login_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<LoginPageQuery>,
) -> AppResult<HttpResponse> {
    let sid = session_id(&req);
    if let SessionState::Active(_) = state.sessions.touch(sid.as_deref()).await {
        return Ok(redirect(DEFAULT_REDIRECT));
    }

    let session = state.sessions.start(sid.as_deref());
    let error_message = query.error.as_deref().and_then(login_error_message);

    let layout = LayoutContext::new("Iniciar Sesión", state.app_name())
        .without_nav()
        .css("/assets/css/auth/login.css")
        .js("/assets/js/auth/login.js");
    let body = state.views.page(
        layout,
        "auth/login",
        &json!({
            "app_name": state.app_name(),
            "csrf_token": session.csrf_token,
            "error_message": error_message,
        }),
    )?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .cookie(state.sessions.cookie(&session))
        .body(body))
}

/// 提交登录
#[actix_web::post("/login")]
#[instrument(skip_all)]
pub async fn login_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Either<web::Json<LoginRequest>, web::Form<LoginRequest>>,
) -> AppResult<HttpResponse> {
    let input = match payload {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };
    let sid = session_id(&req);

    if !state.sessions.verify_csrf(sid.as_deref(), &input.csrf_token) {
        warn!("登录请求 CSRF 令牌无效");
        return Err(AppError::Csrf);
    }

    let username = input.username.trim().to_string();
    if username.is_empty() || input.password.is_empty() {
        return Err(AppError::validation(
            "username",
            "Usuario y contraseña son requeridos",
        ));
    }
    LoginValidator::new()
        .validate(&username, &input.password)
        .map_err(AppError::form)?;

    if state.throttle.is_locked_out(&username) {
        return Err(AppError::too_many_attempts(
            "Demasiados intentos fallidos. Intenta de nuevo en 15 minutos.",
        ));
    }

    let users = &state.repos.users;
    let user = match users.find_by_username(&username).await? {
        Some(user) => Some(user),
        None => users.find_by_email(&username).await?,
    };

    let user = match user {
        Some(user) if verify_password(&input.password, &user.password).await? => user,
        _ => {
            state.throttle.record_failure(&username);
            info!(username = %username, "登录失败: 用户名或密码错误");
            return Err(AppError::auth("Usuario o contraseña incorrectos"));
        }
    };

    if !user.active {
        info!(user_id = user.id, "登录失败: 账户已停用");
        return Err(AppError::Inactive);
    }

    let lifetime = state.repos.settings.session_timeout_secs().await;
    let target = sid
        .as_deref()
        .and_then(|id| state.sessions.take_redirect_after_login(id));
    let session = state.sessions.login(
        sid.as_deref(),
        SessionUser {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role_id: user.role_id,
        },
        input.remember,
        lifetime,
    )
    .await?;
    state.throttle.clear(&username);

    if let Err(e) = users.update_last_login(user.id).await {
        warn!(user_id = user.id, "更新最后登录时间失败: {}", e);
    }
    info!(user_id = user.id, remember = input.remember, "登录成功");

    Ok(HttpResponse::Ok()
        .cookie(state.sessions.cookie(&session))
        .json(ApiResponse::message("Inicio de sesión exitoso").with_redirect(safe_redirect(target))))
}

/// bcrypt 校验放到阻塞线程池
async fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    let plain = plain.to_string();
    let hash = hash.to_string();
    let verified = web::block(move || bcrypt::verify(plain, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("密码校验任务失败: {}", e)))?;
    Ok(verified)
}

/// 退出登录：POST 或 AJAX 返回 JSON，GET 直接跳转
#[instrument(skip_all)]
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(id) = session_id(&req) {
        state.sessions.destroy(&id).await;
        info!("会话已结束");
    }

    if req.method() == Method::POST || is_ajax(&req) {
        HttpResponse::Ok()
            .cookie(state.sessions.removal_cookie())
            .json(ApiResponse::message("Sesión cerrada correctamente").with_redirect("/login"))
    } else {
        HttpResponse::Found()
            .append_header(("Location", "/login"))
            .cookie(state.sessions.removal_cookie())
            .finish()
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(login_page)
        .service(login_submit)
        .service(
            web::resource("/logout")
                .route(web::get().to(logout))
                .route(web::post().to(logout)),
        );
}
