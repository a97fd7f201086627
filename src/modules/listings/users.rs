use actix_web::{web, HttpRequest, HttpResponse};
use tracing::instrument;

use crate::comm::pagination::STANDARD_PER_PAGE;
use crate::comm::ListQuery;
use crate::error::AppResult;
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::state::AppState;

const USERS: Listing = Listing {
    title: "Usuarios",
    template: "admin/users",
    table_template: "admin/users_table",
    rows_key: "users",
    scripts: &[],
    per_page_options: STANDARD_PER_PAGE,
};

/// 用户及其角色，最新创建的在前
#[instrument(skip_all)]
pub async fn list_users(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let request = USERS.request(&query);
    let page = state.repos.users.search(&request).await?;
    USERS.render(&state, &ctx, &req, page, &request)
}

/// 导航中的“Administradores”指向同一个列表
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::get().to(list_users))
        .route("/administrators", web::get().to(list_users));
}

#[cfg(test)]
mod tests {
    use actix_web::test as awtest;

    use crate::state::testing::{body_text, demo_state, login_as, session_cookie};

    #[actix_web::test]
    async fn test_users_page() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, super::configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/administrators?search=OPERADOR")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let html = body_text(resp).await;
        assert!(html.contains("operador@gac.local"));
        assert!(!html.contains("admin@gac.local"));
        // 从未登录
        assert!(html.contains("Nunca"));
        assert!(html.contains("/admin/administrators/edit?id="));
    }
}
