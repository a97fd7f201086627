//! 编译期嵌入的静态资源，挂载在 `/assets`
//! Static assets embedded at compile time, served under `/assets`

use actix_web::{http::header, web, HttpResponse};

struct Asset {
    path: &'static str,
    content_type: &'static str,
    body: &'static str,
}

const JS: &str = "application/javascript; charset=utf-8";
const CSS: &str = "text/css; charset=utf-8";

const ASSETS: &[Asset] = &[
    Asset {
        path: "js/main.js",
        content_type: JS,
        body: include_str!("../../static/js/main.js"),
    },
    Asset {
        path: "js/auth/login.js",
        content_type: JS,
        body: include_str!("../../static/js/auth/login.js"),
    },
    Asset {
        path: "js/admin/search-ajax.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/search-ajax.js"),
    },
    Asset {
        path: "js/admin/codes.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/codes.js"),
    },
    Asset {
        path: "js/admin/email_subjects.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/email_subjects.js"),
    },
    Asset {
        path: "js/admin/user_access.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/user_access.js"),
    },
    Asset {
        path: "js/admin/email_accounts.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/email_accounts.js"),
    },
    Asset {
        path: "js/admin/bulk_register.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/bulk_register.js"),
    },
    Asset {
        path: "js/admin/settings.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/settings.js"),
    },
    Asset {
        path: "js/admin/administrators.js",
        content_type: JS,
        body: include_str!("../../static/js/admin/administrators.js"),
    },
    Asset {
        path: "css/main.css",
        content_type: CSS,
        body: include_str!("../../static/css/main.css"),
    },
    Asset {
        path: "css/auth/login.css",
        content_type: CSS,
        body: include_str!("../../static/css/auth/login.css"),
    },
    Asset {
        path: "css/admin/main.css",
        content_type: CSS,
        body: include_str!("../../static/css/admin/main.css"),
    },
];

fn find(path: &str) -> Option<&'static Asset> {
    ASSETS.iter().find(|a| a.path == path)
}

pub fn exists(path: &str) -> bool {
    find(path.trim_start_matches("/assets/")).is_some()
}

/// `GET /assets/{path}`
pub async fn serve(path: web::Path<String>) -> HttpResponse {
    match find(path.as_str()) {
        Some(asset) => HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, asset.content_type))
            .insert_header((header::CACHE_CONTROL, "public, max-age=3600"))
            .body(asset.body),
        None => HttpResponse::NotFound().finish(),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/assets/{path:.*}", web::get().to(serve));
}
