use actix_web::{web, HttpRequest, HttpResponse};
use lazy_static::lazy_static;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Once;
use tracing::{debug, info};

use crate::middleware::AdminAuth;
use crate::state::AppState;

/// 路由配置函数类型
pub type RouteConfigFn = fn(&mut web::ServiceConfig);

/// 后台路由统一挂载的前缀
pub const ADMIN_SCOPE: &str = "/admin";

/// 路由挂载位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    /// 挂在根路径，不做登录检查
    Public,
    /// 挂在 `/admin` 下，经过 `AdminAuth`
    Admin,
}

/// 路由信息结构
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub name: String,
    pub description: String,
    pub module: String,
    pub scope: RouteScope,
    pub config_fn: RouteConfigFn,
}

/// 全局路由注册器，按名称排序保证挂载顺序稳定
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: BTreeMap<String, RouteInfo>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名注册会覆盖之前的配置
    pub fn register_route(&mut self, route_info: RouteInfo) {
        self.routes.insert(route_info.name.clone(), route_info);
    }

    pub fn get_routes_by_module(&self, module: &str) -> Vec<&RouteInfo> {
        self.routes
            .values()
            .filter(|route| route.module == module)
            .collect()
    }

    fn config_fns(&self, scope: RouteScope) -> Vec<RouteConfigFn> {
        self.routes
            .values()
            .filter(|route| route.scope == scope)
            .map(|route| route.config_fn)
            .collect()
    }

    /// 公共路由直接挂载；后台路由合并进同一个 `/admin` scope，
    /// 多个同前缀的 scope 会互相遮挡
    pub fn configure_all_routes(&self, cfg: &mut web::ServiceConfig) {
        let admin = self.config_fns(RouteScope::Admin);
        if !admin.is_empty() {
            cfg.service(web::scope(ADMIN_SCOPE).wrap(AdminAuth).configure(move |scope| {
                for config_fn in &admin {
                    config_fn(scope);
                }
            }));
        }
        for config_fn in self.config_fns(RouteScope::Public) {
            config_fn(cfg);
        }
    }

    /// 路由统计：总数与模块列表
    pub fn get_stats(&self) -> (usize, Vec<String>) {
        let modules: BTreeSet<String> = self
            .routes
            .values()
            .map(|route| route.module.clone())
            .collect();
        (self.routes.len(), modules.into_iter().collect())
    }

    /// 记录路由注册信息
    pub fn log_routes_info(&self) {
        let (total, modules) = self.get_stats();
        for module in &modules {
            for route in self.get_routes_by_module(module) {
                debug!(
                    module = %module,
                    name = %route.name,
                    scope = ?route.scope,
                    "{}",
                    route.description
                );
            }
        }
        info!(total, modules = ?modules, "路由注册完成");
    }
}

lazy_static! {
    static ref GLOBAL_ROUTE_REGISTRY: RwLock<RouteRegistry> = RwLock::new(RouteRegistry::new());
}

static INIT_ROUTES: Once = Once::new();

pub fn get_global_route_registry() -> RwLockReadGuard<'static, RouteRegistry> {
    GLOBAL_ROUTE_REGISTRY.read()
}

pub fn get_global_route_registry_mut() -> RwLockWriteGuard<'static, RouteRegistry> {
    GLOBAL_ROUTE_REGISTRY.write()
}

pub fn register_global_route(route_info: RouteInfo) {
    get_global_route_registry_mut().register_route(route_info);
}

pub fn configure_global_routes(cfg: &mut web::ServiceConfig) {
    get_global_route_registry().configure_all_routes(cfg);
}

pub fn print_global_routes_info() {
    get_global_route_registry().log_routes_info();
}

/// 未匹配的路径：`/api/` 下返回 JSON，其余返回 HTML 404 页面
pub async fn not_found(req: HttpRequest, state: Option<web::Data<AppState>>) -> HttpResponse {
    if req.path().starts_with("/api/") {
        return HttpResponse::NotFound().json(json!({
            "success": false,
            "message": "Recurso no encontrado",
        }));
    }

    let body = state.and_then(|state| {
        let layout = crate::views::LayoutContext::new("Página no encontrada", state.app_name())
            .without_nav();
        state
            .views
            .page(layout, "errors/404", &json!({}))
            .ok()
    });
    HttpResponse::NotFound()
        .content_type(actix_web::http::header::ContentType::html())
        .body(body.unwrap_or_else(|| "<h1>404</h1>".to_string()))
}

/// 注册所有模块路由，只执行一次
pub fn init_global_routes() {
    INIT_ROUTES.call_once(crate::init_routes);
}

/// 挂载全部路由与 404 处理
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    init_global_routes();
    configure_global_routes(cfg);
    cfg.default_service(web::to(not_found));
}

/// 便捷宏：注册公共路由
#[macro_export]
macro_rules! register_route {
    ($name:expr, $description:expr, $module:expr, $config_fn:expr) => {
        $crate::route_registry::register_global_route($crate::route_registry::RouteInfo {
            name: $name.to_string(),
            description: $description.to_string(),
            module: $module.to_string(),
            scope: $crate::route_registry::RouteScope::Public,
            config_fn: $config_fn,
        });
    };
}

/// 便捷宏：注册 `/admin` 下需要登录的路由
#[macro_export]
macro_rules! register_admin_route {
    ($name:expr, $description:expr, $module:expr, $config_fn:expr) => {
        $crate::route_registry::register_global_route($crate::route_registry::RouteInfo {
            name: $name.to_string(),
            description: $description.to_string(),
            module: $module.to_string(),
            scope: $crate::route_registry::RouteScope::Admin,
            config_fn: $config_fn,
        });
    };
}

/// 便捷宏：批量注册公共路由
#[macro_export]
macro_rules! register_routes {
    ($(($name:expr, $description:expr, $module:expr, $config_fn:expr)),* $(,)?) => {
        $(
            $crate::register_route!($name, $description, $module, $config_fn);
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as awtest, App};

    use crate::state::testing::{body_text, demo_state, location};

    fn ping(cfg: &mut web::ServiceConfig) {
        cfg.route("/ping", web::get().to(|| async { HttpResponse::Ok().body("pong") }));
    }

    fn secret(cfg: &mut web::ServiceConfig) {
        cfg.route("/secret", web::get().to(|| async { HttpResponse::Ok().finish() }));
    }

    #[test]
    fn test_registry_stats() {
        let mut registry = RouteRegistry::new();
        registry.register_route(RouteInfo {
            name: "ping".into(),
            description: "ping".into(),
            module: "base".into(),
            scope: RouteScope::Public,
            config_fn: ping,
        });
        registry.register_route(RouteInfo {
            name: "secret".into(),
            description: "secret".into(),
            module: "admin".into(),
            scope: RouteScope::Admin,
            config_fn: secret,
        });
        let (total, modules) = registry.get_stats();
        assert_eq!(total, 2);
        assert_eq!(modules, vec!["admin".to_string(), "base".to_string()]);
        assert_eq!(registry.get_routes_by_module("base").len(), 1);
    }

    #[actix_web::test]
    async fn test_admin_routes_share_guarded_scope() {
        let mut registry = RouteRegistry::new();
        registry.register_route(RouteInfo {
            name: "ping".into(),
            description: "ping".into(),
            module: "base".into(),
            scope: RouteScope::Public,
            config_fn: ping,
        });
        registry.register_route(RouteInfo {
            name: "secret".into(),
            description: "secret".into(),
            module: "admin".into(),
            scope: RouteScope::Admin,
            config_fn: secret,
        });
        let registry = std::sync::Arc::new(registry);
        let state = demo_state();
        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| registry.configure_all_routes(cfg)),
        )
        .await;

        let resp = awtest::call_service(&app, awtest::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(body_text(resp).await, "pong");

        let resp =
            awtest::call_service(&app, awtest::TestRequest::get().uri("/admin/secret").to_request()).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), "/login");
    }

    #[actix_web::test]
    async fn test_full_app_routing() {
        let state = demo_state();
        let app = awtest::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_app),
        )
        .await;

        let resp = awtest::call_service(&app, awtest::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(location(&resp), "/admin/dashboard");

        let resp = awtest::call_service(&app, awtest::TestRequest::get().uri("/login").to_request()).await;
        assert_eq!(resp.status(), 200);

        let resp =
            awtest::call_service(&app, awtest::TestRequest::get().uri("/api/nada").to_request()).await;
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = awtest::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        let resp =
            awtest::call_service(&app, awtest::TestRequest::get().uri("/no-existe").to_request()).await;
        assert_eq!(resp.status(), 404);
        assert!(body_text(resp).await.contains("Página no encontrada"));

        let resp = awtest::call_service(
            &app,
            awtest::TestRequest::get().uri("/assets/css/main.css").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);

        for uri in ["/admin/dashboard", "/admin/codes", "/admin/email-subjects", "/admin/role-preview"] {
            let resp = awtest::call_service(&app, awtest::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), 302, "{}", uri);
        }
    }
}
