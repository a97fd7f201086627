use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::instrument;

use super::{action_cards, stat_cards, DashboardCounts};
use crate::error::AppResult;
use crate::middleware::AdminContext;
use crate::state::AppState;
use crate::views::html;

#[actix_web::get("/dashboard")]
#[instrument(skip_all, fields(user = %ctx.user.username))]
pub async fn dashboard(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
) -> AppResult<HttpResponse> {
    let counts = DashboardCounts::load(&state.repos).await?;
    let layout = ctx.layout(&state, "Dashboard", req.path());
    let body = state.views.page(
        layout,
        "admin/dashboard",
        &json!({
            "action_cards": action_cards(&ctx.view_keys),
            "stat_cards": stat_cards(&ctx.view_keys, Some(&counts)),
            "preview": false,
            "has_views": true,
        }),
    )?;
    Ok(html(body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard);
}
