use actix_web::{http::header::ContentType, web, HttpRequest, HttpResponse};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::comm::pagination::STANDARD_PER_PAGE;
use crate::comm::validation::{is_valid_email, parse_id};
use crate::comm::ListQuery;
use crate::error::{ApiResponse, AppError, AppResult};
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::repo::{ActivityAction, EmailAccount, EmailAccountInput, ImapConfig, MailFilter};
use crate::state::AppState;
use crate::views::html;

const ACCOUNTS: Listing = Listing {
    title: "Gestión de Cuentas de Email",
    template: "admin/email_accounts",
    table_template: "admin/email_accounts_table",
    rows_key: "email_accounts",
    scripts: &["/assets/js/admin/email_accounts.js"],
    per_page_options: STANDARD_PER_PAGE,
};

const FILTERED_ACCOUNTS: Listing = Listing {
    title: "Correos",
    template: "admin/email_accounts_filtered",
    table_template: "admin/email_accounts_filtered_table",
    rows_key: "email_accounts",
    scripts: &["/assets/js/admin/email_accounts.js"],
    per_page_options: STANDARD_PER_PAGE,
};

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditQuery {
    pub id: Option<String>,
}

/// 新建与更新共用；数字字段按字符串接收
#[derive(Debug, Default, Deserialize)]
pub struct AccountForm {
    pub id: Option<String>,
    pub email: Option<String>,
    pub imap_server: Option<String>,
    pub imap_port: Option<String>,
    pub imap_user: Option<String>,
    pub imap_password: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdForm {
    pub id: Option<String>,
    pub enabled: Option<String>,
    pub csrf_token: Option<String>,
}

/// 列表行：分配状态与最近活动时间
#[derive(Serialize)]
struct AccountRow {
    #[serde(flatten)]
    account: EmailAccount,
    assigned: bool,
    activity_at: NaiveDateTime,
}

impl From<EmailAccount> for AccountRow {
    fn from(account: EmailAccount) -> Self {
        Self {
            assigned: account.is_assigned(),
            activity_at: account.updated_at.unwrap_or(account.created_at),
            account,
        }
    }
}

fn field(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

/// 端口为空时取 993
fn parse_port(raw: &str) -> AppResult<u16> {
    if raw.is_empty() {
        return Ok(ImapConfig::DEFAULT_PORT);
    }
    raw.parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| AppError::validation("imap_port", "El puerto IMAP no es válido"))
}

/// 新建时密码必填；更新时留空表示保留原密码
fn validated_input(form: &AccountForm, require_password: bool) -> AppResult<EmailAccountInput> {
    let email = field(&form.email);
    let imap_server = field(&form.imap_server);
    let imap_user = field(&form.imap_user);
    let imap_password = form
        .imap_password
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string);

    if email.is_empty()
        || imap_server.is_empty()
        || imap_user.is_empty()
        || (require_password && imap_password.is_none())
    {
        return Err(AppError::validation("form", "Todos los campos son requeridos"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("email", "El email no es válido"));
    }
    Ok(EmailAccountInput {
        email,
        imap_server,
        imap_port: parse_port(&field(&form.imap_port))?,
        imap_user,
        imap_password,
    })
}

fn duplicate_email() -> AppError {
    AppError::validation("email", "Ya existe una cuenta con ese correo")
}

#[actix_web::get("/email-accounts")]
#[instrument(skip_all)]
pub async fn list_accounts(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
    filter: web::Query<FilterQuery>,
) -> AppResult<HttpResponse> {
    let filter = filter.filter.as_deref().and_then(MailFilter::parse);
    let permitted = ctx.can_view("listar_correos")
        || filter.map_or(false, |f| ctx.can_view(f.view_key()));
    if !permitted {
        return Err(AppError::permission("No tienes acceso a esa sección."));
    }

    let Some(filter) = filter else {
        let request = ACCOUNTS.request(&query);
        let page = state
            .repos
            .email_accounts
            .search(&request, None)
            .await?
            .map(AccountRow::from);
        return ACCOUNTS.render(&state, &ctx, &req, page, &request);
    };

    let request = FILTERED_ACCOUNTS.request(&query);
    let page = state
        .repos
        .email_accounts
        .search(&request, Some(filter))
        .await?
        .map(AccountRow::from);
    let mut extra = Map::new();
    extra.insert("filter".to_string(), Value::String(filter.as_str().to_string()));
    extra.insert("filter_label".to_string(), Value::String(filter.label().to_string()));
    extra.insert(
        "list_endpoint".to_string(),
        Value::String(format!("/admin/email-accounts?filter={}", filter.as_str())),
    );
    let title = format!("Correos {}", filter.label());
    FILTERED_ACCOUNTS.render_with(&state, &ctx, &req, page, &request, &title, extra)
}

async fn render_form(
    state: &AppState,
    ctx: &AdminContext,
    req: &HttpRequest,
    account: Option<EmailAccount>,
) -> AppResult<HttpResponse> {
    let platforms = match &account {
        Some(a) => state.repos.user_access.platforms_by_email(&a.email).await?,
        None => Vec::new(),
    };
    let title = if account.is_some() {
        "Editar cuenta de email"
    } else {
        "Nueva cuenta de email"
    };
    let layout = ctx
        .layout(state, title, req.path())
        .js("/assets/js/admin/email_accounts.js");
    let body = state.views.page(
        layout,
        "admin/email_account_form",
        &json!({
            "is_edit": account.is_some(),
            "account": account,
            "default_port": ImapConfig::DEFAULT_PORT,
            "assigned_platforms": platforms,
            "csrf_token": ctx.session.csrf_token,
        }),
    )?;
    Ok(html(body))
}

#[actix_web::get("/email-accounts/create")]
#[instrument(skip_all)]
pub async fn create_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
) -> AppResult<HttpResponse> {
    render_form(&state, &ctx, &req, None).await
}

#[actix_web::get("/email-accounts/edit")]
#[instrument(skip_all)]
pub async fn edit_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<EditQuery>,
) -> AppResult<HttpResponse> {
    let account = match parse_id(query.id.as_deref()) {
        Some(id) => state.repos.email_accounts.find_by_id(id).await?,
        None => None,
    };
    match account {
        Some(account) => render_form(&state, &ctx, &req, Some(account)).await,
        None => {
            let layout = ctx.layout(&state, "Página no encontrada", req.path());
            let body = state.views.page(layout, "errors/404", &json!({}))?;
            Ok(HttpResponse::NotFound()
                .content_type(ContentType::html())
                .body(body))
        }
    }
}

#[actix_web::post("/email-accounts")]
#[instrument(skip_all)]
pub async fn store(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<AccountForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let input = validated_input(&form, true)?;
    if state.repos.email_accounts.exists_by_email(&input.email).await? {
        return Err(duplicate_email());
    }
    let id = state.repos.email_accounts.create(&input).await?;
    info!(id, email = %input.email, user = %ctx.user.username, "邮箱账户已创建");
    ctx.record_activity(
        &state,
        ActivityAction::AgregarCorreo,
        &format!("Agregó el correo {}", input.email),
    )
    .await;

    Ok(HttpResponse::Created().json(ApiResponse::success(
        "Cuenta de email agregada correctamente",
        json!({ "id": id }),
    )))
}

#[actix_web::post("/email-accounts/update")]
#[instrument(skip_all)]
pub async fn update(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<AccountForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(AppError::validation("id", "ID de cuenta inválido"));
    };
    let input = validated_input(&form, false)?;
    let Some(existing) = state.repos.email_accounts.find_by_id(id).await? else {
        return Err(AppError::not_found("Cuenta no encontrada"));
    };
    if !existing.email.eq_ignore_ascii_case(&input.email)
        && state.repos.email_accounts.exists_by_email(&input.email).await?
    {
        return Err(duplicate_email());
    }
    if !state.repos.email_accounts.update(id, &input).await? {
        return Err(AppError::not_found("Cuenta no encontrada"));
    }
    info!(id, email = %input.email, user = %ctx.user.username, "邮箱账户已更新");
    ctx.record_activity(
        &state,
        ActivityAction::Edicion,
        &format!("Editó el correo {}", input.email),
    )
    .await;

    crate::api_success!("Cuenta de email actualizada correctamente")
}

#[actix_web::routes]
#[post("/email-accounts/delete")]
#[post("/email-accounts/delete-account")]
#[instrument(skip_all)]
pub async fn delete(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<IdForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(AppError::validation("id", "ID de cuenta inválido"));
    };
    let Some(account) = state.repos.email_accounts.find_by_id(id).await? else {
        return Err(AppError::not_found("Cuenta no encontrada"));
    };
    state.repos.email_accounts.delete(id).await?;
    info!(id, email = %account.email, user = %ctx.user.username, "邮箱账户已删除");
    ctx.record_activity(
        &state,
        ActivityAction::Eliminar,
        &format!("Eliminó el correo {}", account.email),
    )
    .await;

    crate::api_success!("Cuenta de email eliminada correctamente")
}

#[actix_web::post("/email-accounts/toggle-status")]
#[instrument(skip_all)]
pub async fn toggle_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    form: web::Form<IdForm>,
) -> AppResult<HttpResponse> {
    ctx.check_csrf(&req, form.csrf_token.as_deref())?;
    let Some(id) = parse_id(form.id.as_deref()) else {
        return Err(AppError::validation("id", "ID de cuenta inválido"));
    };
    let enabled = matches!(field(&form.enabled).as_str(), "1" | "true" | "on");
    if !state.repos.email_accounts.set_enabled(id, enabled).await? {
        return Err(AppError::not_found("Cuenta no encontrada"));
    }
    info!(id, enabled, user = %ctx.user.username, "邮箱账户状态已切换");

    crate::api_success!(
        "Estado de cuenta actualizado correctamente",
        json!({ "enabled": enabled })
    )
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_accounts)
        .service(create_form)
        .service(edit_form)
        .service(store)
        .service(update)
        .service(delete)
        .service(toggle_status);
}
