use actix_web::{http::header::ContentType, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::comm::pagination::SUBJECT_PER_PAGE;
use crate::comm::validation::parse_id;
use crate::comm::ListQuery;
use crate::error::{ApiResponse, AppError, AppResult};
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::repo::{EmailSubject, SubjectInput};
use crate::state::AppState;
use crate::views::html;

const SUBJECTS: Listing = Listing {
    title: "Asuntos de correo",
    template: "admin/email_subjects",
    table_template: "admin/email_subjects_table",
    rows_key: "subjects",
    scripts: &["/assets/js/admin/email_subjects.js"],
    per_page_options: SUBJECT_PER_PAGE,
};

/// 新建、更新、删除共用的表单；数字字段按字符串接收再解析
#[derive(Debug, Default, Deserialize)]
pub struct SubjectForm {
    pub id: Option<String>,
    pub platform_id: Option<String>,
    pub subject_line: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditQuery {
    pub id: Option<String>,
}

#[derive(Serialize)]
struct PlatformOption {
    id: i64,
    display_name: String,
    selected: bool,
}

/// 平台必须存在，主题去除空白后不能为空
async fn validated_input(state: &AppState, form: &SubjectForm) -> AppResult<SubjectInput> {
    let subject_line = form.subject_line.as_deref().unwrap_or("").trim().to_string();
    let Some(platform_id) = parse_id(form.platform_id.as_deref()) else {
        return Err(AppError::validation("platform_id", "Seleccione una plataforma"));
    };
    if subject_line.is_empty() {
        return Err(AppError::validation("subject_line", "El asunto es requerido"));
    }
    if state.repos.platforms.find_by_id(platform_id).await?.is_none() {
        return Err(AppError::validation(
            "platform_id",
            "La plataforma seleccionada no existe",
        ));
    }
    Ok(SubjectInput {
        platform_id,
        subject_line,
    })
}

#[actix_web::get("/email-subjects")]
#[instrument(skip_all)]
pub async fn list_subjects(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let request = SUBJECTS.request(&query);
    let page = state.repos.subjects.search(&request).await?;
    SUBJECTS.render(&state, &ctx, &req, page, &request)
}

async fn render_form(
    state: &AppState,
    ctx: &AdminContext,
    req: &HttpRequest,
    subject: Option<EmailSubject>,
) -> AppResult<HttpResponse> {
    let selected = subject.as_ref().map(|s| s.platform_id);
    let platforms: Vec<PlatformOption> = state
        .repos
        .platforms
        .find_all_enabled()
        .await?
        .into_iter()
        .map(|p| PlatformOption {
            selected: Some(p.id) == selected,
            id: p.id,
            display_name: p.display_name,
        })
        .collect();

    let title = if subject.is_some() {
        "Editar asunto"
    } else {
        "Nuevo asunto"
    };
    let layout = ctx
        .layout(state, title, req.path())
        .js("/assets/js/admin/email_subjects.js");
    let body = state.views.page(
        layout,
        "admin/email_subject_form",
        &json!({
            "is_edit": subject.is_some(),
            "subject": subject,
            "platforms": platforms,
            "csrf_token": ctx.session.csrf_token,
        }),
    )?;
    Ok(html(body))
}

#[actix_web::get("/email-subjects/create")]
#[instrument(skip_all)]
pub async fn create_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
) -> AppResult<HttpResponse> {
    render_form(&state, &ctx, &req, None).await
}

#[actix_web::get("/email-subjects/edit")]
#[instrument(skip_all)]
pub async fn edit_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<EditQuery>,
) -> AppResult<HttpResponse> {
    let subject = match parse_id(query.id.as_deref()) {
        Some(id) => state.repos.subjects.find_by_id(id).await?,
        None => None,
    };
    match subject.filter(|s| s.active) {
        Some(subject) => render_form(&state, &ctx, &req, Some(subject)).await,
        None => {
            let layout = ctx.layout(&state, "Página no encontrada", req.path());
            let body = state.views.page(layout, "errors/404", &json!({}))?;
            Ok(HttpResponse::NotFound()
                .content_type(ContentType::html())
                .body(body))
        }
    }
}

#[actix_web::post("/email-subjects")]
#[instrument(skip_all)]
pub async fn store(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<SubjectForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let input = validated_input(&state, &form).await?;
    let id = state.repos.subjects.create(&input).await?;
    info!(id, platform_id = input.platform_id, user = %ctx.user.username, "主题已创建");

    Ok(HttpResponse::Created().json(ApiResponse::success(
        "Asunto creado correctamente",
        json!({ "id": id }),
    )))
}

#[actix_web::post("/email-subjects/update")]
#[instrument(skip_all)]
pub async fn update(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<SubjectForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(AppError::validation("id", "ID inválido"));
    };
    let input = validated_input(&state, &form).await?;
    if !state.repos.subjects.update(id, &input).await? {
        return Err(AppError::not_found("Asunto no encontrado"));
    }
    info!(id, user = %ctx.user.username, "主题已更新");

    crate::api_success!("Asunto actualizado correctamente")
}

#[actix_web::post("/email-subjects/delete")]
#[instrument(skip_all)]
pub async fn delete(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<SubjectForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(AppError::validation("id", "ID inválido"));
    };
    if !state.repos.subjects.delete(id).await? {
        return Err(AppError::not_found("Asunto no encontrado"));
    }
    info!(id, user = %ctx.user.username, "主题已停用");

    crate::api_success!("Asunto eliminado correctamente")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_subjects)
        .service(create_form)
        .service(edit_form)
        .service(store)
        .service(update)
        .service(delete);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as awtest;

    use crate::comm::pagination::PageRequest;
    use crate::state::testing::{body_text, demo_state, login_as, session_cookie};

    #[actix_web::test]
    async fn test_create_update_delete() {
        let state = demo_state();
        let session = login_as(&state, "operador").await;
        let app = crate::admin_test_app!(state, configure);
        let netflix = state
            .repos
            .platforms
            .find_all_enabled()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == "netflix")
            .unwrap();

        let req = awtest::TestRequest::post()
            .uri("/admin/email-subjects")
            .cookie(session_cookie(&session))
            .set_form([
                ("platform_id", netflix.id.to_string()),
                ("subject_line", "  Código de inicio de sesión  ".to_string()),
                ("csrf_token", session.csrf_token.clone()),
            ])
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = awtest::read_body_json(resp).await;
        let id = body["data"]["id"].as_i64().unwrap();
        let created = state.repos.subjects.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(created.subject_line, "Código de inicio de sesión");

        let req = awtest::TestRequest::post()
            .uri("/admin/email-subjects/update")
            .cookie(session_cookie(&session))
            .set_form([
                ("id", id.to_string()),
                ("platform_id", netflix.id.to_string()),
                ("subject_line", "Nuevo asunto".to_string()),
                ("csrf_token", session.csrf_token.clone()),
            ])
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let req = awtest::TestRequest::get()
            .uri(&format!("/admin/email-subjects/edit?id={}", id))
            .cookie(session_cookie(&session))
            .to_request();
        let html = body_text(awtest::call_service(&app, req).await).await;
        assert!(html.contains("Nuevo asunto"));
        assert!(html.contains("data-mode=\"edit\""));

        let req = awtest::TestRequest::post()
            .uri("/admin/email-subjects/delete")
            .cookie(session_cookie(&session))
            .insert_header(("X-CSRF-Token", session.csrf_token.as_str()))
            .set_form([("id", id.to_string())])
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let page = state
            .repos
            .subjects
            .search(&PageRequest::new("Nuevo asunto", 1, 0))
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let req = awtest::TestRequest::get()
            .uri(&format!("/admin/email-subjects/edit?id={}", id))
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_validation_and_csrf() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);

        let req = awtest::TestRequest::post()
            .uri("/admin/email-subjects")
            .cookie(session_cookie(&session))
            .set_form([("platform_id", "1"), ("subject_line", "Asunto")])
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);

        let req = awtest::TestRequest::post()
            .uri("/admin/email-subjects")
            .cookie(session_cookie(&session))
            .set_form([
                ("platform_id", "999"),
                ("subject_line", "Asunto"),
                ("csrf_token", session.csrf_token.as_str()),
            ])
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = awtest::read_body_json(resp).await;
        assert_eq!(body["message"], "La plataforma seleccionada no existe");

        let req = awtest::TestRequest::post()
            .uri("/admin/email-subjects/update")
            .cookie(session_cookie(&session))
            .set_form([
                ("id", "abc"),
                ("platform_id", "1"),
                ("subject_line", "   "),
                ("csrf_token", session.csrf_token.as_str()),
            ])
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_list_uses_subject_page_sizes() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/email-subjects?per_page=10")
            .cookie(session_cookie(&session))
            .to_request();
        let html = body_text(awtest::call_service(&app, req).await).await;
        assert!(html.contains("<option value=\"10\" selected>10</option>"));
        assert!(html.contains("Tu código de acceso temporal de Netflix"));
        assert!(html.contains("/assets/js/admin/email_subjects.js"));
    }
}
