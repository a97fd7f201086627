use actix_web::{web, HttpRequest, HttpResponse};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::comm::pagination::STANDARD_PER_PAGE;
use crate::comm::validation::{parse_id, FieldValidation, Validator};
use crate::comm::ListQuery;
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::repo::{ActivityAction, UserAccess};
use crate::state::AppState;
use crate::views::html;

const ACCESSES: Listing = Listing {
    title: "Accesos registrados",
    template: "admin/user_access_list",
    table_template: "admin/user_access_table",
    rows_key: "accesses",
    scripts: &["/assets/js/admin/user_access.js"],
    per_page_options: STANDARD_PER_PAGE,
};

lazy_static! {
    static ref ACCESS_VALIDATOR: Validator = Validator::new()
        .field(
            FieldValidation::new("email")
                .required("El correo es requerido")
                .email("El correo electrónico no es válido"),
        )
        .field(FieldValidation::new("password").required("La contraseña es requerida"))
        .field(FieldValidation::new("platform_id").required("Seleccione una plataforma"));
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub platform_id: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrefillQuery {
    pub email: Option<String>,
    pub platform_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub id: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Serialize)]
struct PlatformOption {
    id: i64,
    display_name: String,
    selected: bool,
}

/// 列表行附带编辑链接
#[derive(Serialize)]
struct AccessRow {
    #[serde(flatten)]
    access: UserAccess,
    edit_url: String,
}

impl From<UserAccess> for AccessRow {
    fn from(access: UserAccess) -> Self {
        let edit_url = format!(
            "/admin/user-access?email={}&platform_id={}",
            urlencoding::encode(&access.email),
            access.platform_id
        );
        Self { access, edit_url }
    }
}

#[actix_web::get("/user-access")]
#[instrument(skip_all)]
pub async fn access_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<PrefillQuery>,
) -> AppResult<HttpResponse> {
    let prefill_platform = parse_id(query.platform_id.as_deref());
    let platforms: Vec<PlatformOption> = state
        .repos
        .platforms
        .find_all_enabled()
        .await?
        .into_iter()
        .map(|p| PlatformOption {
            selected: Some(p.id) == prefill_platform,
            id: p.id,
            display_name: p.display_name,
        })
        .collect();
    let has_prefill_platform = platforms.iter().any(|p| p.selected);

    let layout = ctx
        .layout(&state, "Registro de acceso", req.path())
        .js("/assets/js/admin/user_access.js");
    let body = state.views.page(
        layout,
        "admin/user_access",
        &json!({
            "csrf_token": ctx.session.csrf_token,
            "prefill_email": query.email.as_deref().map(str::trim).unwrap_or(""),
            "has_prefill_platform": has_prefill_platform,
            "platforms": platforms,
        }),
    )?;
    Ok(html(body))
}

#[actix_web::post("/user-access")]
#[instrument(skip_all)]
pub async fn save_access(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<AccessForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;

    let email = form.email.as_deref().unwrap_or("").trim().to_string();
    let password = form.password.as_deref().unwrap_or("").trim().to_string();
    let platform_raw = form.platform_id.as_deref().unwrap_or("").trim().to_string();
    ACCESS_VALIDATOR
        .validate(|field| match field {
            "email" => Some(email.as_str()),
            "password" => Some(password.as_str()),
            "platform_id" => Some(platform_raw.as_str()),
            _ => None,
        })
        .map_err(AppError::form)?;

    if !state.repos.email_accounts.exists_by_email(&email).await? {
        warn!(email = %email, "邮箱未登记");
        return Err(AppError::validation(
            "email",
            "El correo no está registrado en el sistema",
        ));
    }

    let platform = match parse_id(Some(&platform_raw)) {
        Some(id) => state.repos.platforms.find_by_id(id).await?,
        None => None,
    };
    let Some(platform) = platform else {
        return Err(AppError::validation(
            "platform_id",
            "La plataforma seleccionada no existe",
        ));
    };

    state
        .repos
        .user_access
        .upsert(&email, &password, platform.id)
        .await?;
    info!(email = %email, platform = %platform.name, user = %ctx.user.username, "访问凭据已保存");
    ctx.record_activity(
        &state,
        ActivityAction::Asignado,
        &format!("Asignó {} a {}", platform.display_name, email),
    )
    .await;

    crate::api_success!("Acceso registrado correctamente")
}

#[actix_web::get("/user-access/list")]
#[instrument(skip_all)]
pub async fn list_accesses(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let request = ACCESSES.request(&query);
    let page = state
        .repos
        .user_access
        .search(&request)
        .await?
        .map(AccessRow::from);
    ACCESSES.render(&state, &ctx, &req, page, &request)
}

#[actix_web::post("/user-access/delete")]
#[instrument(skip_all)]
pub async fn delete_access(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<DeleteForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(AppError::validation("id", "ID inválido"));
    };
    if !state.repos.user_access.delete(id).await? {
        return Err(AppError::not_found("Acceso no encontrado"));
    }
    info!(id, user = %ctx.user.username, "访问凭据已删除");

    crate::api_success!("Acceso eliminado correctamente")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_accesses)
        .service(delete_access)
        .service(access_form)
        .service(save_access);
}
