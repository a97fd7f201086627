use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::comm::validation::parse_id;
use crate::error::{ApiResponse, AppError, AppResult};
use crate::middleware::auth::resolve_view_keys;
use crate::middleware::AdminContext;
use crate::modules::dashboard::{action_cards, stat_cards};
use crate::repo::SUPERADMIN_ROLE_ID;
use crate::state::AppState;
use crate::views::layout::build_nav;
use crate::views::{html, RoleViewsConfig};

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub role_id: Option<String>,
    /// 逗号分隔的视图 key
    pub views: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleViewsForm {
    pub role_id: Option<String>,
    pub views: Option<String>,
    pub csrf_token: Option<String>,
}

fn split_keys(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = raw.split(',').collect();
    RoleViewsConfig::filter_valid(&parts)
}

async fn role_keys(state: &AppState, role_id: i64) -> AppResult<Vec<String>> {
    if state.repos.roles.find_by_id(role_id).await?.is_none() {
        return Err(AppError::not_found("Rol no encontrado"));
    }
    resolve_view_keys(state, Some(role_id)).await
}

/// 独立页面，所有链接与卡片均不可点击
#[actix_web::get("/role-preview")]
#[instrument(skip_all)]
pub async fn role_preview(
    state: web::Data<AppState>,
    _ctx: AdminContext,
    query: web::Query<PreviewQuery>,
) -> AppResult<HttpResponse> {
    let keys = match parse_id(query.role_id.as_deref()) {
        Some(role_id) => role_keys(&state, role_id).await?,
        None => split_keys(query.views.as_deref().unwrap_or("")),
    };
    let allowed = RoleViewsConfig::allowed(&keys);
    let nav: Vec<_> = build_nav(&allowed, "")
        .into_iter()
        .map(|item| json!({ "label": item.label }))
        .collect();

    let body = state.views.render(
        "admin/role_preview",
        &json!({
            "app_name": state.app_name(),
            "nav": nav,
            "action_cards": action_cards(&keys),
            "stat_cards": stat_cards(&keys, None),
            "preview": true,
            "has_views": !keys.is_empty(),
        }),
    )?;
    Ok(html(body))
}

/// 替换角色的可见视图，未知 key 被忽略
#[actix_web::post("/role-views")]
#[instrument(skip_all)]
pub async fn update_role_views(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<RoleViewsForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(role_id) = parse_id(form.role_id.as_deref()) else {
        return Err(AppError::validation("role_id", "Rol inválido"));
    };
    if state.repos.roles.find_by_id(role_id).await?.is_none() {
        return Err(AppError::not_found("Rol no encontrado"));
    }
    // 超级管理员始终拥有全部视图
    if role_id == SUPERADMIN_ROLE_ID {
        return Err(AppError::permission(
            "Las vistas del superadministrador no se pueden modificar",
        ));
    }

    let keys = split_keys(form.views.as_deref().unwrap_or(""));
    state.repos.roles.set_view_keys(role_id, &keys).await?;
    info!(role_id, views = ?keys, user = %ctx.user.username, "角色视图已更新");

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Vistas del rol actualizadas",
        json!({ "role_id": role_id, "views": keys }),
    )))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(role_preview).service(update_role_views);
}
