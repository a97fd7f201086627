use actix_web::web;
use tracing::instrument;

use crate::views::{assets, redirect};

/// 根路径进入后台首页，未登录时由后台鉴权转到登录页
#[actix_web::get("/")]
#[instrument(skip_all)]
pub async fn index() -> actix_web::HttpResponse {
    redirect(crate::modules::auth::DEFAULT_REDIRECT)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index);
    assets::configure(cfg);
}
