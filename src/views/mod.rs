//! 服务端模板渲染
//! Server-side template rendering
//!
//! 模板在编译期嵌入，启动时注册到一个共享的 [`Handlebars`] 实例。
//! 页面先渲染内容模板，再把结果放进 `layouts/main`。

pub mod assets;
pub mod layout;
pub mod role_views;

use actix_web::{http::header::ContentType, HttpRequest, HttpResponse};
use chrono::NaiveDateTime;
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;

use crate::error::AppResult;

pub use layout::{LayoutContext, NavItem};
pub use role_views::{RoleViewsConfig, ViewEntry};

const TEMPLATES: &[(&str, &str)] = &[
    ("layouts/main", include_str!("../../templates/layouts/main.hbs")),
    ("auth/login", include_str!("../../templates/auth/login.hbs")),
    ("admin/dashboard", include_str!("../../templates/admin/dashboard.hbs")),
    ("admin/codes", include_str!("../../templates/admin/codes.hbs")),
    ("admin/codes_table", include_str!("../../templates/admin/codes_table.hbs")),
    ("admin/users", include_str!("../../templates/admin/users.hbs")),
    ("admin/users_table", include_str!("../../templates/admin/users_table.hbs")),
    ("admin/platforms", include_str!("../../templates/admin/platforms.hbs")),
    ("admin/platforms_table", include_str!("../../templates/admin/platforms_table.hbs")),
    ("admin/email_subjects", include_str!("../../templates/admin/email_subjects.hbs")),
    (
        "admin/email_subjects_table",
        include_str!("../../templates/admin/email_subjects_table.hbs"),
    ),
    ("admin/email_subject_form", include_str!("../../templates/admin/email_subject_form.hbs")),
    ("admin/user_access", include_str!("../../templates/admin/user_access.hbs")),
    ("admin/user_access_list", include_str!("../../templates/admin/user_access_list.hbs")),
    (
        "admin/user_access_table",
        include_str!("../../templates/admin/user_access_table.hbs"),
    ),
    ("admin/role_preview", include_str!("../../templates/admin/role_preview.hbs")),
    ("admin/email_accounts", include_str!("../../templates/admin/email_accounts.hbs")),
    (
        "admin/email_accounts_table",
        include_str!("../../templates/admin/email_accounts_table.hbs"),
    ),
    (
        "admin/email_accounts_filtered",
        include_str!("../../templates/admin/email_accounts_filtered.hbs"),
    ),
    (
        "admin/email_accounts_filtered_table",
        include_str!("../../templates/admin/email_accounts_filtered_table.hbs"),
    ),
    ("admin/email_account_form", include_str!("../../templates/admin/email_account_form.hbs")),
    ("admin/bulk_register", include_str!("../../templates/admin/bulk_register.hbs")),
    ("admin/settings", include_str!("../../templates/admin/settings.hbs")),
    ("admin/administrator_edit", include_str!("../../templates/admin/administrator_edit.hbs")),
    ("admin/user_activity", include_str!("../../templates/admin/user_activity.hbs")),
    ("admin/user_activity_table", include_str!("../../templates/admin/user_activity_table.hbs")),
    ("errors/404", include_str!("../../templates/errors/404.hbs")),
];

const PARTIALS: &[(&str, &str)] = &[
    ("pagination", include_str!("../../templates/partials/pagination.hbs")),
    ("list_controls", include_str!("../../templates/partials/list_controls.hbs")),
];

handlebars_helper!(format_date: |value: Json| display_date(value));

/// `d/m/Y H:i`；空值或无法解析时为 `-`
pub fn display_date(value: &serde_json::Value) -> String {
    let Some(raw) = value.as_str().filter(|s| !s.is_empty()) else {
        return "-".to_string();
    };
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// 模板注册表
pub struct Views {
    hbs: Handlebars<'static>,
}

impl Views {
    pub fn new() -> anyhow::Result<Self> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(false);
        hbs.register_helper("date", Box::new(format_date));

        for (name, source) in PARTIALS {
            hbs.register_partial(name, *source)?;
        }
        for (name, source) in TEMPLATES {
            hbs.register_template_string(name, *source)?;
        }
        tracing::debug!(templates = TEMPLATES.len(), partials = PARTIALS.len(), "模板注册完成");

        Ok(Self { hbs })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<String> {
        Ok(self.hbs.render(name, data)?)
    }

    /// 内容模板嵌入主布局
    pub fn page<T: Serialize>(
        &self,
        mut layout: LayoutContext,
        template: &str,
        data: &T,
    ) -> AppResult<String> {
        layout.content = self.render(template, data)?;
        self.render("layouts/main", &layout)
    }

    /// AJAX 列表刷新只返回表格片段
    pub fn fragment<T: Serialize>(&self, template: &str, data: &T) -> AppResult<String> {
        let inner = self.render(template, data)?;
        Ok(format!("<div class=\"admin-content\">{}</div>", inner))
    }
}

/// `X-Requested-With: XMLHttpRequest`
pub fn is_ajax(req: &HttpRequest) -> bool {
    req.headers()
        .get("X-Requested-With")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

pub fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body)
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", location))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_templates_compile() {
        assert!(Views::new().is_ok());
    }

    #[test]
    fn test_display_date() {
        assert_eq!(display_date(&json!("2024-03-05T14:07:09")), "05/03/2024 14:07");
        assert_eq!(display_date(&json!("2024-03-05 14:07:09")), "05/03/2024 14:07");
        assert_eq!(display_date(&json!(null)), "-");
        assert_eq!(display_date(&json!("")), "-");
        assert_eq!(display_date(&json!("ayer")), "-");
    }

    #[test]
    fn test_layout_escapes_title() {
        let views = Views::new().unwrap();
        let layout = LayoutContext::new("<script>", "GAC").without_nav();
        let html = views.page(layout, "errors/404", &json!({})).unwrap();
        assert!(html.contains("<title>&lt;script&gt; - GAC</title>"));
        assert!(!html.contains("<title><script>"));
    }

    #[test]
    fn test_layout_includes_bundles_in_order() {
        let views = Views::new().unwrap();
        let layout = LayoutContext::new("Prueba", "GAC")
            .css("/assets/css/admin/main.css")
            .js("/assets/js/admin/search-ajax.js")
            .js("/assets/js/admin/codes.js");
        let html = views.page(layout, "errors/404", &json!({})).unwrap();
        let base = html.find("/assets/css/main.css").unwrap();
        let admin = html.find("/assets/css/admin/main.css").unwrap();
        assert!(base < admin);
        let search = html.find("/assets/js/admin/search-ajax.js").unwrap();
        let codes = html.find("/assets/js/admin/codes.js").unwrap();
        assert!(search < codes);
    }

    #[test]
    fn test_fragment_wrapper() {
        let views = Views::new().unwrap();
        let html = views
            .fragment("admin/codes_table", &json!({ "codes": [], "pagination": {} }))
            .unwrap();
        assert!(html.starts_with("<div class=\"admin-content\">"));
        assert!(html.contains("No hay registros de accesos"));
    }
}
