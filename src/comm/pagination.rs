//! 列表分页与搜索参数
//! List pagination and search parameters

use serde::{Deserialize, Serialize};

/// 每页条数默认值
pub const DEFAULT_PER_PAGE: u32 = 15;

/// 用户、邮件账户、访问记录等列表的可选条数（0 表示全部）
pub const STANDARD_PER_PAGE: &[u32] = &[15, 30, 60, 100, 0];

/// 邮件主题列表的可选条数
pub const SUBJECT_PER_PAGE: &[u32] = &[10, 15, 30, 60, 100, 0];

/// 用户活动日志的可选条数
pub const ACTIVITY_PER_PAGE: &[u32] = &[15, 30, 45, 60, 100];

/// 列表查询字符串
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub search_query: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
    pub current_page: Option<String>,
}

/// 规范化后的分页请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub search: String,
    pub page: u32,
    /// 0 表示不分页
    pub per_page: u32,
}

impl PageRequest {
    pub fn from_query(query: &ListQuery, allowed: &[u32]) -> Self {
        let search = query
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(query.search_query.as_deref())
            .unwrap_or("")
            .trim()
            .to_string();

        let per_page = match query.per_page.as_deref().map(str::trim) {
            Some("all") => 0,
            Some(raw) => raw.parse::<u32>().unwrap_or(DEFAULT_PER_PAGE),
            None => DEFAULT_PER_PAGE,
        };
        let per_page = if allowed.contains(&per_page) {
            per_page
        } else {
            DEFAULT_PER_PAGE
        };

        let page = query
            .page
            .as_deref()
            .or(query.current_page.as_deref())
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, u32::MAX as i64) as u32;

        Self {
            search,
            page,
            per_page,
        }
    }

    pub fn new(search: impl Into<String>, page: u32, per_page: u32) -> Self {
        Self {
            search: search.into(),
            page: page.max(1),
            per_page,
        }
    }

    /// SQL OFFSET；不分页时为 0
    pub fn offset(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            (self.page.max(1) as u64 - 1) * self.per_page as u64
        }
    }

    /// 小写化的搜索词，空字符串返回 None
    pub fn search_term(&self) -> Option<String> {
        if self.search.is_empty() {
            None
        } else {
            Some(self.search.to_lowercase())
        }
    }

    /// 对内存中的完整结果集做切片
    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        if self.per_page == 0 {
            return rows.to_vec();
        }
        rows.iter()
            .skip(self.offset() as usize)
            .take(self.per_page as usize)
            .cloned()
            .collect()
    }
}

/// 总页数：`per_page > 0` 时向上取整，否则为 1
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        1
    } else {
        ((total as f64) / (per_page as f64)).ceil() as u32
    }
}

/// 一页查询结果
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages: total_pages(total, request.per_page),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageButton {
    pub number: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerPageOption {
    pub value: u32,
    pub label: String,
    pub selected: bool,
}

/// 分页控件的模板数据
#[derive(Debug, Clone, Serialize)]
pub struct PaginationView {
    pub pages: Vec<PageButton>,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    pub showing: usize,
    pub total: u64,
    pub current_page: u32,
    pub per_page: u32,
    pub per_page_options: Vec<PerPageOption>,
    pub search_query: String,
}

impl PaginationView {
    pub fn build<T>(page: &Page<T>, allowed: &[u32], search: &str) -> Self {
        let pages = (1..=page.total_pages)
            .map(|number| PageButton {
                number,
                active: number == page.page,
            })
            .collect();
        let per_page_options = allowed
            .iter()
            .map(|&value| PerPageOption {
                value,
                label: if value == 0 {
                    "Todos".to_string()
                } else {
                    value.to_string()
                },
                selected: value == page.per_page,
            })
            .collect();

        Self {
            pages,
            prev: (page.page > 1).then(|| page.page - 1),
            next: (page.page < page.total_pages).then(|| page.page + 1),
            showing: page.data.len(),
            total: page.total,
            current_page: page.page,
            per_page: page.per_page,
            per_page_options,
            search_query: search.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "search" => q.search = v,
                "search_query" => q.search_query = v,
                "per_page" => q.per_page = v,
                "page" => q.page = v,
                "current_page" => q.current_page = v,
                _ => {}
            }
        }
        q
    }

    #[test]
    fn test_per_page_allow_list() {
        let req = PageRequest::from_query(&query(&[("per_page", "30")]), STANDARD_PER_PAGE);
        assert_eq!(req.per_page, 30);
        let req = PageRequest::from_query(&query(&[("per_page", "all")]), STANDARD_PER_PAGE);
        assert_eq!(req.per_page, 0);
        let req = PageRequest::from_query(&query(&[("per_page", "10")]), STANDARD_PER_PAGE);
        assert_eq!(req.per_page, 15);
        let req = PageRequest::from_query(&query(&[("per_page", "10")]), SUBJECT_PER_PAGE);
        assert_eq!(req.per_page, 10);
        let req = PageRequest::from_query(&query(&[("per_page", "abc")]), STANDARD_PER_PAGE);
        assert_eq!(req.per_page, 15);
    }

    #[test]
    fn test_page_and_search_aliases() {
        let req = PageRequest::from_query(
            &query(&[("search_query", " Netflix "), ("current_page", "3")]),
            STANDARD_PER_PAGE,
        );
        assert_eq!(req.search, "Netflix");
        assert_eq!(req.page, 3);
        assert_eq!(req.search_term().as_deref(), Some("netflix"));

        let req = PageRequest::from_query(&query(&[("page", "-4")]), STANDARD_PER_PAGE);
        assert_eq!(req.page, 1);
        assert_eq!(req.search_term(), None);
    }

    #[test]
    fn test_total_pages_and_offset() {
        assert_eq!(total_pages(31, 15), 3);
        assert_eq!(total_pages(30, 15), 2);
        assert_eq!(total_pages(0, 15), 0);
        assert_eq!(total_pages(500, 0), 1);
        assert_eq!(PageRequest::new("", 3, 15).offset(), 30);
        assert_eq!(PageRequest::new("", 3, 0).offset(), 0);
    }

    #[test]
    fn test_per_page_zero_returns_everything() {
        let rows: Vec<u32> = (1..=40).collect();
        let req = PageRequest::new("", 1, 0);
        let page = Page::new(req.slice(&rows), rows.len() as u64, &req);
        assert_eq!(page.data.len(), 40);
        assert_eq!(page.total_pages, 1);

        let view = PaginationView::build(&page, STANDARD_PER_PAGE, "");
        assert_eq!(view.pages.len(), 1);
        assert!(view.prev.is_none());
        assert!(view.next.is_none());
        assert!(view.per_page_options.iter().any(|o| o.label == "Todos" && o.selected));
    }

    #[test]
    fn test_pagination_view_prev_next() {
        let rows: Vec<u32> = (1..=40).collect();
        let req = PageRequest::new("", 2, 15);
        let page = Page::new(req.slice(&rows), 40, &req);
        assert_eq!(page.data, (16..=30).collect::<Vec<_>>());
        let view = PaginationView::build(&page, STANDARD_PER_PAGE, "x");
        assert_eq!(view.prev, Some(1));
        assert_eq!(view.next, Some(3));
        assert_eq!(view.pages.iter().filter(|p| p.active).count(), 1);
        assert_eq!(view.showing, 15);
    }
}
