use actix_web::{web, HttpRequest, HttpResponse};
use tracing::instrument;

use crate::comm::pagination::STANDARD_PER_PAGE;
use crate::comm::ListQuery;
use crate::error::AppResult;
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::state::AppState;

const PLATFORMS: Listing = Listing {
    title: "Plataformas",
    template: "admin/platforms",
    table_template: "admin/platforms_table",
    rows_key: "platforms",
    scripts: &[],
    per_page_options: STANDARD_PER_PAGE,
};

/// 全部平台，按显示名称排序
#[actix_web::get("/platforms")]
#[instrument(skip_all)]
pub async fn list_platforms(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let request = PLATFORMS.request(&query);
    let page = state.repos.platforms.search(&request).await?;
    PLATFORMS.render(&state, &ctx, &req, page, &request)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_platforms);
}
