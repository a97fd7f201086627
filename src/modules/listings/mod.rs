//! 分页、可搜索的后台列表
//! Paginated, searchable admin listings
//!
//! 普通请求渲染整页；`X-Requested-With: XMLHttpRequest` 只返回表格与分页片段，
//! 由 `search-ajax.js` 替换到页面中。

pub mod codes;
pub mod platforms;
pub mod users;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::comm::pagination::{Page, PageRequest, PaginationView};
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::state::AppState;
use crate::views::{html, is_ajax};

/// 列表页面的模板与脚本
pub struct Listing {
    pub title: &'static str,
    pub template: &'static str,
    pub table_template: &'static str,
    /// 模板中行数据的变量名
    pub rows_key: &'static str,
    /// 额外脚本，位于 `search-ajax.js` 之后
    pub scripts: &'static [&'static str],
    pub per_page_options: &'static [u32],
}

impl Listing {
    pub fn request(&self, query: &crate::comm::ListQuery) -> PageRequest {
        PageRequest::from_query(query, self.per_page_options)
    }

    pub fn render<T: Serialize>(
        &self,
        state: &AppState,
        ctx: &AdminContext,
        req: &HttpRequest,
        page: Page<T>,
        request: &PageRequest,
    ) -> AppResult<HttpResponse> {
        self.render_with(state, ctx, req, page, request, self.title, Map::new())
    }

    /// 同 [`Listing::render`]，可替换标题并附加模板变量
    #[allow(clippy::too_many_arguments)]
    pub fn render_with<T: Serialize>(
        &self,
        state: &AppState,
        ctx: &AdminContext,
        req: &HttpRequest,
        page: Page<T>,
        request: &PageRequest,
        title: &str,
        extra: Map<String, Value>,
    ) -> AppResult<HttpResponse> {
        let data = self.data(ctx, page, request, extra)?;

        if is_ajax(req) {
            return Ok(html(state.views.fragment(self.table_template, &data)?));
        }

        let layout = self
            .scripts
            .iter()
            .fold(
                ctx.layout(state, title, req.path())
                    .js("/assets/js/admin/search-ajax.js"),
                |layout, src| layout.js(src),
            );
        Ok(html(state.views.page(layout, self.template, &data)?))
    }

    fn data<T: Serialize>(
        &self,
        ctx: &AdminContext,
        page: Page<T>,
        request: &PageRequest,
        extra: Map<String, Value>,
    ) -> AppResult<Value> {
        let pagination = PaginationView::build(&page, self.per_page_options, &request.search);
        let mut data = extra;
        data.insert(self.rows_key.to_string(), to_value(&page.data)?);
        data.insert("pagination".to_string(), to_value(&pagination)?);
        data.insert(
            "csrf_token".to_string(),
            Value::String(ctx.session.csrf_token.clone()),
        );
        Ok(Value::Object(data))
    }
}

pub(crate) fn to_value<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    codes::configure(cfg);
    users::configure(cfg);
    platforms::configure(cfg);
}

/// 注册列表路由（后台）
pub fn register_listing_routes() {
    crate::register_admin_route!(
        "listings",
        "访问记录、用户与平台列表",
        "listings",
        configure
    );
}
