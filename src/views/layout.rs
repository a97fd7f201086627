//! 主布局数据与导航
//! Main layout data and navigation

use chrono::Datelike;
use serde::Serialize;

use crate::repo::SUPERADMIN_ROLE_ID;
use crate::session::SessionUser;
use crate::views::role_views::{RoleViewsConfig, ViewEntry};

/// 导航链接
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NavItem {
    pub label: String,
    pub url: String,
    pub active: bool,
}

/// 主布局的模板数据
#[derive(Debug, Clone, Serialize)]
pub struct LayoutContext {
    pub title: String,
    pub app_name: String,
    pub description: String,
    pub additional_css: Vec<String>,
    pub additional_js: Vec<String>,
    pub show_nav: bool,
    pub show_footer: bool,
    pub footer_text: String,
    pub footer_whatsapp: bool,
    pub footer_whatsapp_number: String,
    pub footer_whatsapp_text: String,
    pub nav: Vec<NavItem>,
    pub username: Option<String>,
    /// 用户菜单显示“Configuración”和“Actividad”
    pub is_superadmin: bool,
    /// 页面脚本提交 POST 时使用
    pub csrf_token: String,
    pub year: i32,
    /// 页面主体，渲染内容模板后填入
    pub content: String,
}

impl LayoutContext {
    pub fn new(title: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            app_name: app_name.into(),
            description: "Sistema de consulta de códigos de acceso".to_string(),
            additional_css: Vec::new(),
            additional_js: Vec::new(),
            show_nav: true,
            show_footer: true,
            footer_text: String::new(),
            footer_whatsapp: false,
            footer_whatsapp_number: String::new(),
            footer_whatsapp_text: "Hola".to_string(),
            nav: Vec::new(),
            username: None,
            is_superadmin: false,
            csrf_token: String::new(),
            year: chrono::Local::now().year(),
            content: String::new(),
        }
    }

    pub fn css(mut self, href: &str) -> Self {
        self.additional_css.push(href.to_string());
        self
    }

    pub fn js(mut self, src: &str) -> Self {
        self.additional_js.push(src.to_string());
        self
    }

    pub fn without_nav(mut self) -> Self {
        self.show_nav = false;
        self
    }

    /// 已登录用户的导航，由角色允许的视图生成
    pub fn with_user(
        mut self,
        user: &SessionUser,
        csrf_token: &str,
        allowed: &[ViewEntry],
        current_path: &str,
    ) -> Self {
        self.username = Some(user.username.clone());
        self.is_superadmin = user.role_id == Some(SUPERADMIN_ROLE_ID);
        self.csrf_token = csrf_token.to_string();
        self.nav = build_nav(allowed, current_path);
        self
    }
}

/// 同一个 URL 只出现一次；邮件相关的几个视图合并为一个“Correos”，
/// 放在 `listar_correos` 在目录中的位置
pub fn build_nav(allowed: &[ViewEntry], current_path: &str) -> Vec<NavItem> {
    let mut targets: Vec<&ViewEntry> = allowed
        .iter()
        .map(|view| match view.key {
            "listar_gmail" | "listar_outlook" | "listar_pocoyoni" => {
                RoleViewsConfig::get("listar_correos").unwrap_or(view)
            }
            _ => view,
        })
        .collect();
    targets.sort_by_key(|view| RoleViewsConfig::position(view.key).unwrap_or(usize::MAX));

    let mut nav: Vec<NavItem> = Vec::new();
    for view in targets {
        if nav.iter().any(|item| item.url == view.url) {
            continue;
        }
        let base = view.url.split('?').next().unwrap_or(view.url);
        nav.push(NavItem {
            label: view.nav_label.to_string(),
            url: view.url.to_string(),
            active: current_path == base || current_path.starts_with(&format!("{}/", base)),
        });
    }
    nav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_merges_mail_views() {
        let allowed = RoleViewsConfig::allowed(&["dashboard", "listar_gmail", "listar_outlook", "registro_asuntos"]);
        let nav = build_nav(&allowed, "/admin/email-subjects/create");
        let labels: Vec<_> = nav.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Dashboard", "Correos", "Registro de asuntos"]);
        assert!(nav[2].active);
        assert!(!nav[0].active);
        assert_eq!(nav[1].url, "/admin/email-accounts");
    }

    #[test]
    fn test_nav_mail_item_follows_catalogue_slot() {
        let allowed = RoleViewsConfig::allowed(&["listar_pocoyoni", "registro_acceso", "plataformas_activas"]);
        let nav = build_nav(&allowed, "/admin/email-accounts");
        let labels: Vec<_> = nav.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Correos", "Registro de acceso", "Plataformas"]);
        assert!(nav[0].active);
    }

    #[test]
    fn test_builder() {
        let ctx = LayoutContext::new("Login", "GAC")
            .without_nav()
            .css("/assets/css/auth/login.css")
            .js("/assets/js/auth/login.js");
        assert!(!ctx.show_nav);
        assert_eq!(ctx.additional_css, vec!["/assets/css/auth/login.css"]);
        assert_eq!(ctx.additional_js, vec!["/assets/js/auth/login.js"]);
    }
}
