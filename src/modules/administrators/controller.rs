use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::comm::validation::{is_valid_email, parse_id};
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::repo::{User, UserUpdate, SUPERADMIN_ROLE_ID};
use crate::state::AppState;
use crate::views::{html, redirect};

const LIST_PATH: &str = "/admin/administrators";
const MIN_PASSWORD_CHARS: usize = 6;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Deserialize)]
pub struct EditQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub active: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub id: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
    pub csrf_token: Option<String>,
}

/// 模板数据，不含密码哈希
#[derive(Serialize)]
struct AdministratorView {
    id: i64,
    username: String,
    email: String,
    active: bool,
}

impl From<User> for AdministratorView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            active: user.active,
        }
    }
}

fn incomplete() -> AppError {
    AppError::validation("form", "Datos incompletos")
}

/// 只有超级管理员可以修改超级管理员账户
async fn editable_user(state: &AppState, ctx: &AdminContext, id: i64) -> AppResult<User> {
    let Some(user) = state.repos.users.find_by_id(id).await? else {
        return Err(AppError::not_found("Administrador no encontrado"));
    };
    if user.role_id == Some(SUPERADMIN_ROLE_ID) && !ctx.is_superadmin() {
        return Err(AppError::permission(
            "No puedes modificar la cuenta de un superadministrador",
        ));
    }
    Ok(user)
}

async fn hash_password(plain: &str) -> AppResult<String> {
    let plain = plain.to_string();
    web::block(move || bcrypt::hash(plain, HASH_COST))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("密码哈希任务失败: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("密码哈希失败: {}", e)))
}

#[actix_web::get("/administrators/edit")]
#[instrument(skip_all)]
pub async fn edit_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<EditQuery>,
) -> AppResult<HttpResponse> {
    let user = match parse_id(query.id.as_deref()) {
        Some(id) => state.repos.users.find_by_id(id).await?,
        None => None,
    };
    let Some(user) = user else {
        return Ok(redirect(LIST_PATH));
    };

    let layout = ctx
        .layout(&state, "Editar administrador", req.path())
        .js("/assets/js/admin/administrators.js");
    let body = state.views.page(
        layout,
        "admin/administrator_edit",
        &json!({
            "admin": AdministratorView::from(user),
            "min_password": MIN_PASSWORD_CHARS,
            "csrf_token": ctx.session.csrf_token,
        }),
    )?;
    Ok(html(body))
}

#[actix_web::post("/administrators/update")]
#[instrument(skip_all)]
pub async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<ProfileForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let username = form.username.as_deref().unwrap_or("").trim().to_string();
    let email = form.email.as_deref().unwrap_or("").trim().to_string();
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(incomplete());
    };
    if username.is_empty() || email.is_empty() {
        return Err(incomplete());
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("email", "El correo electrónico no es válido"));
    }
    let user = editable_user(&state, &ctx, id).await?;
    if state.repos.users.is_taken(&username, &email, id).await? {
        return Err(AppError::validation(
            "username",
            "El usuario o correo ya está en uso",
        ));
    }

    let update = UserUpdate {
        username,
        email,
        active: form.active.as_deref().map_or(true, |v| v.trim() != "0"),
    };
    if !state.repos.users.update_profile(user.id, &update).await? {
        return Err(AppError::not_found("Administrador no encontrado"));
    }
    info!(id, username = %update.username, active = update.active, user = %ctx.user.username, "管理员资料已更新");

    crate::api_success!("Administrador actualizado correctamente")
}

#[actix_web::post("/administrators/update-password")]
#[instrument(skip_all)]
pub async fn update_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<PasswordForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let new_password = form.new_password.as_deref().unwrap_or("");
    let confirm = form.confirm_password.as_deref().unwrap_or("");
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(incomplete());
    };
    if new_password.is_empty() || confirm.is_empty() {
        return Err(incomplete());
    }
    if new_password != confirm {
        return Err(AppError::validation(
            "confirm_password",
            "Las contraseñas no coinciden",
        ));
    }
    if new_password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::validation(
            "new_password",
            "La contraseña debe tener al menos 6 caracteres",
        ));
    }
    let user = editable_user(&state, &ctx, id).await?;

    let hash = hash_password(new_password).await?;
    if !state.repos.users.update_password(user.id, &hash).await? {
        return Err(AppError::not_found("Administrador no encontrado"));
    }
    info!(id, user = %ctx.user.username, "管理员密码已修改");

    crate::api_success!("Contraseña actualizada correctamente")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(edit_form)
        .service(update_profile)
        .service(update_password);
}
