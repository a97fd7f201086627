use actix_web::{web, HttpRequest, HttpResponse};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::comm::pagination::ACTIVITY_PER_PAGE;
use crate::comm::ListQuery;
use crate::error::AppResult;
use crate::middleware::AdminContext;
use crate::modules::listings::Listing;
use crate::repo::{ActivityAction, ActivityEntry};
use crate::state::AppState;
use crate::views::redirect;

const ACTIVITY: Listing = Listing {
    title: "Actividad de usuarios",
    template: "admin/user_activity",
    table_template: "admin/user_activity_table",
    rows_key: "entries",
    scripts: &[],
    per_page_options: ACTIVITY_PER_PAGE,
};

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub order: Option<String>,
}

impl OrderQuery {
    /// 只有 `asc` 改为最早的在前
    fn ascending(&self) -> bool {
        self.order
            .as_deref()
            .is_some_and(|o| o.trim().eq_ignore_ascii_case("asc"))
    }
}

#[derive(Serialize)]
struct ActivityRow {
    id: i64,
    username: String,
    action: String,
    action_label: String,
    description: String,
    created_at: NaiveDateTime,
}

impl From<ActivityEntry> for ActivityRow {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            action_label: ActivityAction::label_for(&entry.action).to_string(),
            id: entry.id,
            username: entry.username,
            action: entry.action,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}

#[actix_web::get("/user-activity")]
#[instrument(skip_all)]
pub async fn list_activity(
    req: HttpRequest,
    state: web::Data<AppState>,
    ctx: AdminContext,
    query: web::Query<ListQuery>,
    order: web::Query<OrderQuery>,
) -> AppResult<HttpResponse> {
    if !ctx.is_superadmin() {
        return Ok(redirect("/admin/dashboard"));
    }

    let ascending = order.ascending();
    let request = ACTIVITY.request(&query);
    let page = state
        .repos
        .activity
        .list(&request, ascending)
        .await?
        .map(ActivityRow::from);

    let mut extra = Map::new();
    extra.insert(
        "order".to_string(),
        Value::String(if ascending { "asc" } else { "desc" }.to_string()),
    );
    extra.insert("ascending".to_string(), Value::Bool(ascending));
    extra.insert(
        "list_endpoint".to_string(),
        Value::String(format!("/admin/user-activity?order={}", if ascending { "asc" } else { "desc" })),
    );
    ACTIVITY.render_with(&state, &ctx, &req, page, &request, ACTIVITY.title, extra)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_activity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as awtest;

    use crate::state::testing::{body_text, demo_state, location, login_as, session_cookie};

    async fn seed(state: &AppState) {
        let log = &state.repos.activity;
        log.log(2, "operador", ActivityAction::AgregarCorreo, "primero@gmail.com").await.unwrap();
        log.log(2, "operador", ActivityAction::Asignado, "segundo@gmail.com").await.unwrap();
    }

    #[actix_web::test]
    async fn test_activity_order() {
        let state = demo_state();
        seed(&state).await;
        let session = login_as(&state, "admin").await;
        let app = crate::admin_test_app!(state, configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/user-activity")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let html = body_text(resp).await;
        assert!(html.contains("Agregar correo"));
        // 超级管理员的用户菜单
        assert!(html.contains("href=\"/admin/settings\""));
        assert!(html.contains("data-endpoint=\"/admin/user-activity?order"));
        assert!(html.contains("<option value=\"45\""));
        let first = html.find("primero@gmail.com").unwrap();
        let second = html.find("segundo@gmail.com").unwrap();
        assert!(second < first);

        let req = awtest::TestRequest::get()
            .uri("/admin/user-activity?order=asc")
            .insert_header(("X-Requested-With", "XMLHttpRequest"))
            .cookie(session_cookie(&session))
            .to_request();
        let html = body_text(awtest::call_service(&app, req).await).await;
        assert!(!html.contains("<html"));
        let first = html.find("primero@gmail.com").unwrap();
        let second = html.find("segundo@gmail.com").unwrap();
        assert!(first < second);
    }

    #[actix_web::test]
    async fn test_activity_is_superadmin_only() {
        let state = demo_state();
        let session = login_as(&state, "operador").await;
        let app = crate::admin_test_app!(state, configure);

        let req = awtest::TestRequest::get()
            .uri("/admin/user-activity")
            .cookie(session_cookie(&session))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), "/admin/dashboard");
    }
}
