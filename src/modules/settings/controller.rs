use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::repo::SUPERADMIN_ROLE_ID;
use crate::state::AppState;
use crate::views::{html, redirect, RoleViewsConfig};

/// 可选的会话超时（小时）
pub const SESSION_TIMEOUT_CHOICES: [u64; 5] = [1, 2, 3, 5, 7];

const TIMEOUT_KEY: &str = "session_timeout_hours";

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub session_timeout_hours: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Serialize)]
struct TimeoutOption {
    hours: u64,
    selected: bool,
}

#[derive(Serialize)]
struct ViewCheckbox {
    key: &'static str,
    label: &'static str,
    checked: bool,
}

#[derive(Serialize)]
struct RoleSettings {
    id: i64,
    display_name: String,
    /// 未保存任何视图，登录后拥有全部权限
    unrestricted: bool,
    views: Vec<ViewCheckbox>,
}

fn parse_timeout(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|h| SESSION_TIMEOUT_CHOICES.contains(h))
}

#[actix_web::get("/settings")]
#[instrument(skip_all)]
pub async fn settings_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
) -> AppResult<HttpResponse> {
    if !ctx.is_superadmin() {
        debug!(user = %ctx.user.username, "非超级管理员访问设置页");
        return Ok(redirect("/admin/dashboard"));
    }

    let current = state.repos.settings.session_timeout_secs().await / 3600;
    let timeouts: Vec<TimeoutOption> = SESSION_TIMEOUT_CHOICES
        .iter()
        .map(|&hours| TimeoutOption {
            hours,
            selected: hours == current,
        })
        .collect();

    let mut roles = Vec::new();
    for role in state.repos.roles.find_all().await? {
        if role.id == SUPERADMIN_ROLE_ID {
            continue;
        }
        let stored = RoleViewsConfig::filter_valid(&state.repos.roles.view_keys(role.id).await?);
        let views = RoleViewsConfig::all()
            .iter()
            .map(|v| ViewCheckbox {
                key: v.key,
                label: v.label,
                checked: stored.iter().any(|k| k == v.key),
            })
            .collect();
        roles.push(RoleSettings {
            id: role.id,
            display_name: role.display_name,
            unrestricted: stored.is_empty(),
            views,
        });
    }

    let layout = ctx
        .layout(&state, "Configuración", req.path())
        .js("/assets/js/admin/settings.js");
    let body = state.views.page(
        layout,
        "admin/settings",
        &json!({
            "timeouts": timeouts,
            "roles": roles,
            "csrf_token": ctx.session.csrf_token,
        }),
    )?;
    Ok(html(body))
}

/// 新的超时对之后的登录生效
#[actix_web::post("/settings")]
#[instrument(skip_all)]
pub async fn update_settings(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<SettingsForm>,
) -> AppResult<HttpResponse> {
    ctx.require_superadmin()?;
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(hours) = parse_timeout(form.session_timeout_hours.as_deref()) else {
        return Err(AppError::validation(
            TIMEOUT_KEY,
            "El tiempo de sesión debe ser 1, 2, 3, 5 o 7 horas",
        ));
    };
    state
        .repos
        .settings
        .set_value(
            TIMEOUT_KEY,
            &hours.to_string(),
            Some("Tiempo de expiración de sesión en horas"),
        )
        .await?;
    info!(hours, user = %ctx.user.username, "会话超时已更新");

    crate::api_success!("Configuración actualizada correctamente")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(settings_page).service(update_settings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as awtest;
    use serde_json::Value;

    use crate::state::testing::{body_text, demo_state, location, login_as, session_cookie};

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(Some(" 5 ")), Some(5));
        assert_eq!(parse_timeout(Some("4")), None);
        assert_eq!(parse_timeout(Some("dos")), None);
        assert_eq!(parse_timeout(None), None);
    }

    #[actix_web::test]
    async fn test_settings_page_for_superadmin_only() {
        let state = demo_state();
        let admin = login_as(&state, "admin").await;
        let operador = login_as(&state, "operador").await;
        let app = crate::admin_test_app!(state, configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/settings")
            .cookie(session_cookie(&admin))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let html = body_text(resp).await;
        assert!(html.contains("<option value=\"1\" selected>1 hora</option>"));
        assert!(html.contains("data-role-id=\"2\""));
        assert!(html.contains("value=\"registro_acceso\" checked"));
        assert!(!html.contains("data-role-id=\"1\""));

        let req = awtest::TestRequest::get()
            .uri("/admin/settings")
            .cookie(session_cookie(&operador))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), "/admin/dashboard");
    }

    #[actix_web::test]
    async fn test_update_timeout() {
        let state = demo_state();
        let admin = login_as(&state, "admin").await;
        let operador = login_as(&state, "operador").await;
        let app = crate::admin_test_app!(state, configure);

        let cases = [
            (&admin, "4", admin.csrf_token.clone(), 400, "El tiempo de sesión debe ser 1, 2, 3, 5 o 7 horas"),
            (&admin, "5", "otro".to_string(), 403, "Token de seguridad inválido"),
            (&operador, "5", operador.csrf_token.clone(), 403, "No tienes acceso a esa sección."),
            (&admin, "5", admin.csrf_token.clone(), 200, "Configuración actualizada correctamente"),
        ];
        for (session, hours, csrf, status, message) in cases {
            let req = awtest::TestRequest::post()
                .uri("/admin/settings")
                .cookie(session_cookie(session))
                .set_form([("session_timeout_hours", hours.to_string()), ("csrf_token", csrf)])
                .to_request();
            let resp = awtest::call_service(&app, req).await;
            assert_eq!(resp.status(), status, "{}", message);
            let body: Value = awtest::read_body_json(resp).await;
            assert_eq!(body["message"], message);
        }
        assert_eq!(state.repos.settings.session_timeout_secs().await, 5 * 3600);
    }
}
