use actix_web::{web, HttpRequest, HttpResponse};
use tracing::instrument;

use crate::comm::pagination::STANDARD_PER_PAGE;
use crate::comm::ListQuery;
use crate::error::AppResult;
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::state::AppState;

const CODES: Listing = Listing {
    title: "Registro de Accesos",
    template: "admin/codes",
    table_template: "admin/codes_table",
    rows_key: "codes",
    scripts: &["/assets/js/admin/codes.js"],
    per_page_options: STANDARD_PER_PAGE,
};

/// 已消费访问码，最新的在前
#[actix_web::get("/codes")]
#[instrument(skip_all)]
pub async fn list_codes(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let request = CODES.request(&query);
    let page = state.repos.codes.search_consumed(&request).await?;
    CODES.render(&state, &ctx, &req, page, &request)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_codes);
}

#[cfg(test)]
mod tests {
    use actix_web::test as awtest;

    use crate::state::testing::{body_text, demo_state, login_as, session_cookie};

    #[actix_web::test]
    async fn test_codes_page_lists_consumed_codes_only() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, super::configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/codes")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let html = body_text(resp).await;
        assert!(html.contains("<title>Registro de Accesos - GAC</title>"));
        assert!(html.contains("771204"));
        assert!(html.contains("482913"));
        assert!(!html.contains("118822"));
        // 最新消费的排在前面
        assert!(html.find("771204").unwrap() < html.find("482913").unwrap());
        assert!(html.contains("Mostrando 2 de 2 registros"));
        let search = html.find("/assets/js/admin/search-ajax.js").unwrap();
        let codes = html.find("/assets/js/admin/codes.js").unwrap();
        assert!(search < codes);
    }

    #[actix_web::test]
    async fn test_ajax_search_returns_fragment() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, super::configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/codes?search=disney&per_page=all")
            .insert_header(("X-Requested-With", "XMLHttpRequest"))
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let html = body_text(resp).await;
        assert!(html.starts_with("<div class=\"admin-content\">"));
        assert!(!html.contains("<html"));
        assert!(html.contains("771204"));
        assert!(!html.contains("482913"));
        assert!(html.contains("Mostrando 1 de 1 registros"));
    }

    #[actix_web::test]
    async fn test_empty_result_renders_single_row() {
        let state = demo_state();
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, super::configure);

        for uri in ["/admin/codes?search=zzzz", "/admin/codes?search=zzzz&per_page=0"] {
            let req = awtest::TestRequest::get()
                .uri(uri)
                .insert_header(("X-Requested-With", "XMLHttpRequest"))
                .cookie(session_cookie(&session))
                .to_request();
            let html = body_text(awtest::call_service(&app, req).await).await;
            assert_eq!(html.matches("No hay registros de accesos").count(), 1);
            assert_eq!(html.matches("<tr").count(), 2);
        }
    }
}
