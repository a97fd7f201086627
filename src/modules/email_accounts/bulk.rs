//! 批量登记：一次为多个邮箱分配平台、作为库存登记或解除分配
//! Bulk registration: assign, stock or unassign many mailboxes at once

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::comm::validation::is_valid_email;
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::repo::{ActivityAction, MailFilter, Platform};
use crate::state::AppState;
use crate::views::html;

#[derive(Debug, Default, Deserialize)]
pub struct BulkRequest {
    /// 每行一个，也接受逗号或分号分隔
    #[serde(default)]
    pub emails: String,
    pub access_code: Option<String>,
    pub platform_id: Option<i64>,
    pub csrf_token: Option<String>,
}

#[derive(Serialize)]
struct PlatformOption {
    id: i64,
    display_name: String,
}

/// 拆分后的邮箱；按小写去重，保持输入顺序
#[derive(Debug, Default, PartialEq)]
pub struct ParsedEmails {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

/// `allowed_domains_only` 时只接受 Pocoyoni、Gmail、Outlook、Hotmail、Live
pub fn parse_emails(raw: &str, allowed_domains_only: bool) -> ParsedEmails {
    let mut parsed = ParsedEmails::default();
    let mut seen = std::collections::HashSet::new();
    for email in raw
        .split(['\n', '\r', ',', ';'])
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        let email = email.to_lowercase();
        if !seen.insert(email.clone()) {
            continue;
        }
        let allowed = !allowed_domains_only || MailFilter::detect(&email).is_some();
        if is_valid_email(&email) && allowed {
            parsed.valid.push(email);
        } else {
            parsed.invalid.push(email);
        }
    }
    parsed
}

async fn require_platform(state: &AppState, platform_id: Option<i64>) -> AppResult<Platform> {
    let platform = match platform_id.filter(|id| *id > 0) {
        Some(id) => state.repos.platforms.find_by_id(id).await?,
        None => None,
    };
    platform.ok_or_else(|| AppError::validation("platform_id", "La plataforma seleccionada no existe"))
}

/// 没有可处理的邮箱时的 400 响应，附带被拒绝的列表
fn rejected(message: &str, emails: &[String]) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "message": message,
        "invalid_emails": emails,
    }))
}

#[actix_web::get("/email-accounts/bulk-register")]
#[instrument(skip_all)]
pub async fn bulk_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
) -> AppResult<HttpResponse> {
    let platforms: Vec<PlatformOption> = state
        .repos
        .platforms
        .find_all_enabled()
        .await?
        .into_iter()
        .map(|p| PlatformOption {
            id: p.id,
            display_name: p.display_name,
        })
        .collect();
    let layout = ctx
        .layout(&state, "Registro masivo", req.path())
        .js("/assets/js/admin/bulk_register.js");
    let body = state.views.page(
        layout,
        "admin/bulk_register",
        &json!({
            "platforms": platforms,
            "csrf_token": ctx.session.csrf_token,
        }),
    )?;
    Ok(html(body))
}

#[actix_web::post("/email-accounts/bulk-register")]
#[instrument(skip_all)]
pub async fn bulk_register(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    body: web::Json<BulkRequest>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, body.csrf_token.as_deref())?;
    let access_code = body.access_code.as_deref().unwrap_or("").trim().to_string();
    if body.emails.trim().is_empty() {
        return Err(AppError::validation("emails", "Ingresa al menos un correo"));
    }
    if access_code.is_empty() {
        return Err(AppError::validation("access_code", "El código de acceso es requerido"));
    }
    let platform = require_platform(&state, body.platform_id).await?;

    let parsed = parse_emails(&body.emails, true);
    if parsed.valid.is_empty() {
        return Ok(rejected(
            "Ningún correo válido para registrar",
            &parsed.invalid,
        ));
    }

    let created = state.repos.email_accounts.bulk_insert(&parsed.valid).await?;
    for email in &parsed.valid {
        state
            .repos
            .user_access
            .upsert(email, &access_code, platform.id)
            .await?;
    }
    info!(
        platform = %platform.name,
        registered = parsed.valid.len(),
        created,
        invalid = parsed.invalid.len(),
        user = %ctx.user.username,
        "批量登记完成"
    );
    ctx.record_activity(
        &state,
        ActivityAction::Asignado,
        &format!(
            "Asignó {} a {} correo(s)",
            platform.display_name,
            parsed.valid.len()
        ),
    )
    .await;

    crate::api_success!(
        format!(
            "Se registraron {} correo(s) en {}",
            parsed.valid.len(),
            platform.display_name
        ),
        json!({
            "registered": parsed.valid.len(),
            "created": created,
            "invalid_emails": parsed.invalid,
        })
    )
}

#[actix_web::post("/email-accounts/add-stock")]
#[instrument(skip_all)]
pub async fn add_stock(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    body: web::Json<BulkRequest>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, body.csrf_token.as_deref())?;
    if body.emails.trim().is_empty() {
        return Err(AppError::validation("emails", "Ingresa al menos un correo"));
    }
    let parsed = parse_emails(&body.emails, true);
    if parsed.valid.is_empty() {
        return Ok(rejected(
            "Ningún correo válido para agregar",
            &parsed.invalid,
        ));
    }

    let added = state.repos.email_accounts.bulk_insert(&parsed.valid).await?;
    let skipped = parsed.valid.len() as u64 - added;
    info!(added, skipped, user = %ctx.user.username, "库存邮箱已登记");
    if added > 0 {
        ctx.record_activity(
            &state,
            ActivityAction::AgregarCorreo,
            &format!("Agregó {} correo(s) como stock", added),
        )
        .await;
    }

    crate::api_success!(
        format!("Se agregaron {} correo(s) como stock", added),
        json!({
            "added": added,
            "skipped": skipped,
            "invalid_emails": parsed.invalid,
        })
    )
}

#[actix_web::post("/email-accounts/bulk-delete")]
#[instrument(skip_all)]
pub async fn bulk_delete(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    body: web::Json<BulkRequest>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, body.csrf_token.as_deref())?;
    if body.emails.trim().is_empty() {
        return Err(AppError::validation("emails", "Ingresa al menos un correo"));
    }
    let platform = require_platform(&state, body.platform_id).await?;

    let parsed = parse_emails(&body.emails, false);
    if parsed.valid.is_empty() {
        return Ok(rejected(
            "Ningún correo con formato válido",
            &parsed.invalid,
        ));
    }

    let mut removed = 0usize;
    let mut not_found = Vec::new();
    for email in parsed.valid {
        if state
            .repos
            .user_access
            .delete_by_email_and_platform(&email, platform.id)
            .await?
        {
            removed += 1;
        } else {
            not_found.push(email);
        }
    }
    info!(platform = %platform.name, removed, missing = not_found.len(), user = %ctx.user.username, "批量解除分配完成");
    if removed > 0 {
        ctx.record_activity(
            &state,
            ActivityAction::Eliminar,
            &format!("Quitó {} de {} correo(s)", platform.display_name, removed),
        )
        .await;
    }

    crate::api_success!(
        format!(
            "Se eliminaron {} asignación(es) de {}",
            removed, platform.display_name
        ),
        json!({
            "removed": removed,
            "not_found_emails": not_found,
            "invalid_emails": parsed.invalid,
        })
    )
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(bulk_form)
        .service(bulk_register)
        .service(add_stock)
        .service(bulk_delete);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as awtest;
    use serde_json::Value;

    use crate::comm::pagination::PageRequest;
    use crate::state::testing::{body_text, demo_state, login_as, session_cookie};

    async fn platform_id(state: &AppState, name: &str) -> i64 {
        state
            .repos
            .platforms
            .find_all_enabled()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
            .id
    }

    #[test]
    fn test_parse_emails() {
        let parsed = parse_emails(
            "Uno@Gmail.com\n uno@gmail.com ;dos@live.com\r\nmal\ntres@yahoo.com,",
            true,
        );
        assert_eq!(parsed.valid, vec!["uno@gmail.com", "dos@live.com"]);
        assert_eq!(parsed.invalid, vec!["mal", "tres@yahoo.com"]);

        let any_domain = parse_emails("tres@yahoo.com", false);
        assert_eq!(any_domain.valid, vec!["tres@yahoo.com"]);
    }

    #[actix_web::test]
    async fn test_bulk_page_renders() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);
        let req = awtest::TestRequest::get()
            .uri("/admin/email-accounts/bulk-register")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let html = body_text(resp).await;
        assert!(html.contains("Registro masivo"));
        assert!(html.contains(">Netflix</option>"));
        assert!(!html.contains("Prime Video"));
    }

    #[actix_web::test]
    async fn test_bulk_register_assigns_and_reports_invalid() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);
        let netflix = platform_id(&state, "netflix").await;

        let req = awtest::TestRequest::post()
            .uri("/admin/email-accounts/bulk-register")
            .cookie(session_cookie(&session))
            .insert_header(("X-CSRF-Token", session.csrf_token.clone()))
            .set_json(json!({
                "emails": "cuenta2@gmail.com\nnueva@hotmail.com\notra@yahoo.com",
                "access_code": "1234",
                "platform_id": netflix,
            }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["data"]["registered"], 2);
        assert_eq!(body["data"]["created"], 1);
        assert_eq!(body["data"]["invalid_emails"], json!(["otra@yahoo.com"]));

        assert!(state.repos.email_accounts.exists_by_email("nueva@hotmail.com").await.unwrap());
        let access = state
            .repos
            .user_access
            .find_by_email_and_platform("nueva@hotmail.com", netflix)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(access.password, "1234");
    }

    #[actix_web::test]
    async fn test_bulk_register_rejects() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);
        let netflix = platform_id(&state, "netflix").await;

        let cases = [
            (json!({"emails": "a@gmail.com", "access_code": "", "platform_id": netflix}), "El código de acceso es requerido"),
            (json!({"emails": "a@gmail.com", "access_code": "1", "platform_id": 999}), "La plataforma seleccionada no existe"),
            (json!({"emails": "a@yahoo.com", "access_code": "1", "platform_id": netflix}), "Ningún correo válido para registrar"),
        ];
        for (payload, message) in cases {
            let req = awtest::TestRequest::post()
                .uri("/admin/email-accounts/bulk-register")
                .cookie(session_cookie(&session))
                .insert_header(("X-CSRF-Token", session.csrf_token.clone()))
                .set_json(payload)
                .to_request();
            let resp = awtest::call_service(&app, req).await;
            assert_eq!(resp.status(), 400, "{}", message);
            let body: Value = awtest::read_body_json(resp).await;
            assert_eq!(body["message"], message);
        }

        let req = awtest::TestRequest::post()
            .uri("/admin/email-accounts/bulk-register")
            .cookie(session_cookie(&session))
            .set_json(json!({"emails": "a@gmail.com", "access_code": "1", "platform_id": netflix}))
            .to_request();
        assert_eq!(awtest::call_service(&app, req).await.status(), 403);
    }

    #[actix_web::test]
    async fn test_add_stock_and_bulk_delete() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);
        let netflix = platform_id(&state, "netflix").await;
        state
            .repos
            .user_access
            .upsert("cuenta1@pocoyoni.com", "clave", netflix)
            .await
            .unwrap();

        let req = awtest::TestRequest::post()
            .uri("/admin/email-accounts/add-stock")
            .cookie(session_cookie(&session))
            .insert_header(("X-CSRF-Token", session.csrf_token.clone()))
            .set_json(json!({"emails": "stock@outlook.com\ncuenta1@pocoyoni.com"}))
            .to_request();
        let body: Value = awtest::read_body_json(awtest::call_service(&app, req).await).await;
        assert_eq!(body["data"]["added"], 1);
        assert_eq!(body["data"]["skipped"], 1);

        let req = awtest::TestRequest::post()
            .uri("/admin/email-accounts/bulk-delete")
            .cookie(session_cookie(&session))
            .insert_header(("X-CSRF-Token", session.csrf_token.clone()))
            .set_json(json!({
                "emails": "cuenta1@pocoyoni.com\nstock@outlook.com",
                "platform_id": netflix,
            }))
            .to_request();
        let body: Value = awtest::read_body_json(awtest::call_service(&app, req).await).await;
        assert_eq!(body["data"]["removed"], 1);
        assert_eq!(body["data"]["not_found_emails"], json!(["stock@outlook.com"]));

        let remaining = state
            .repos
            .user_access
            .search(&PageRequest::new("", 1, 0))
            .await
            .unwrap();
        assert_eq!(remaining.total, 0);
    }
}
