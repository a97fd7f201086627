//! 角色可见视图目录
//! Catalogue of views a role can be granted

use serde::Serialize;

/// 视图目录中的一项
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ViewEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub nav_label: &'static str,
    pub url: &'static str,
}

const fn entry(
    key: &'static str,
    label: &'static str,
    nav_label: &'static str,
    url: &'static str,
) -> ViewEntry {
    ViewEntry {
        key,
        label,
        nav_label,
        url,
    }
}

/// 固定顺序，用于导航、勾选框和预览
const VIEWS: &[ViewEntry] = &[
    entry("dashboard", "Dashboard", "Dashboard", "/admin/dashboard"),
    entry("listar_correos", "Listar correos", "Correos", "/admin/email-accounts"),
    entry("registro_acceso", "Registro de acceso", "Registro de acceso", "/admin/user-access"),
    entry(
        "registro_masivo",
        "Registro masivo",
        "Registro masivo",
        "/admin/email-accounts/bulk-register",
    ),
    entry("registro_asuntos", "Registro de asuntos", "Registro de asuntos", "/admin/email-subjects"),
    entry("listar_gmail", "Listar Gmail", "Gmail", "/admin/email-accounts?filter=gmail"),
    entry("listar_outlook", "Listar Outlook", "Outlook", "/admin/email-accounts?filter=outlook"),
    entry(
        "listar_pocoyoni",
        "Listar Pocoyoni",
        "Pocoyoni",
        "/admin/email-accounts?filter=pocoyoni",
    ),
    entry("plataformas_activas", "Plataformas activas", "Plataformas", "/admin/platforms"),
    entry("administradores", "Administradores", "Administradores", "/admin/administrators"),
];

const MAIL_KEYS: &[&str] = &["listar_correos", "listar_gmail", "listar_outlook", "listar_pocoyoni"];

pub struct RoleViewsConfig;

impl RoleViewsConfig {
    pub fn all() -> &'static [ViewEntry] {
        VIEWS
    }

    pub fn get(key: &str) -> Option<&'static ViewEntry> {
        VIEWS.iter().find(|v| v.key == key)
    }

    /// 在目录中的序号
    pub fn position(key: &str) -> Option<usize> {
        VIEWS.iter().position(|v| v.key == key)
    }

    pub fn keys() -> impl Iterator<Item = &'static str> {
        VIEWS.iter().map(|v| v.key)
    }

    /// 只保留目录中存在的 key，去重并按目录顺序排列
    pub fn filter_valid<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
        VIEWS
            .iter()
            .filter(|v| keys.iter().any(|k| k.as_ref().trim() == v.key))
            .map(|v| v.key.to_string())
            .collect()
    }

    /// 允许的视图，按目录顺序
    pub fn allowed<S: AsRef<str>>(keys: &[S]) -> Vec<ViewEntry> {
        VIEWS
            .iter()
            .filter(|v| keys.iter().any(|k| k.as_ref() == v.key))
            .copied()
            .collect()
    }

    /// 访问路径所需的视图 key（满足其一即可）；`None` 表示该路径不受视图限制
    pub fn view_keys_for_path(path: &str) -> Option<&'static [&'static str]> {
        let path = path.split('?').next().unwrap_or("");
        let path = path.trim_end_matches('/');
        let keys: &'static [&'static str] = match path {
            "/admin/dashboard" => &["dashboard"],
            "/admin/email-accounts" => MAIL_KEYS,
            "/admin/email-accounts/bulk-register"
            | "/admin/email-accounts/add-stock"
            | "/admin/email-accounts/bulk-delete" => &["registro_masivo"],
            "/admin/email-subjects" => &["registro_asuntos"],
            "/admin/platforms" => &["plataformas_activas"],
            "/admin/administrators" | "/admin/users" => &["administradores"],
            _ if path.starts_with("/admin/administrators/") => &["administradores"],
            "/admin/role-preview" | "/admin/role-views" => &["administradores"],
            "/admin/codes" => &["registro_acceso"],
            _ if path.starts_with("/admin/user-access") => &["registro_acceso"],
            _ if path.starts_with("/admin/email-subjects/") => &["registro_asuntos"],
            _ if path.starts_with("/admin/email-accounts") => MAIL_KEYS,
            _ => return None,
        };
        Some(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_order() {
        let keys: Vec<_> = RoleViewsConfig::keys().collect();
        assert_eq!(keys.len(), 10);
        assert_eq!(keys[0], "dashboard");
        assert_eq!(keys[9], "administradores");
        assert_eq!(
            RoleViewsConfig::get("listar_gmail").map(|v| v.url),
            Some("/admin/email-accounts?filter=gmail")
        );
        assert!(RoleViewsConfig::get("desconocido").is_none());
    }

    #[test]
    fn test_view_keys_for_path() {
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/dashboard/"),
            Some(&["dashboard"][..])
        );
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/email-accounts?filter=gmail"),
            Some(MAIL_KEYS)
        );
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/email-accounts/15/edit"),
            Some(MAIL_KEYS)
        );
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/email-accounts/bulk-register"),
            Some(&["registro_masivo"][..])
        );
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/users"),
            Some(&["administradores"][..])
        );
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/email-accounts/bulk-delete"),
            Some(&["registro_masivo"][..])
        );
        assert_eq!(
            RoleViewsConfig::view_keys_for_path("/admin/administrators/update-password"),
            Some(&["administradores"][..])
        );
        assert_eq!(RoleViewsConfig::view_keys_for_path("/admin/settings"), None);
        assert_eq!(RoleViewsConfig::view_keys_for_path("/admin/user-activity"), None);
    }

    #[test]
    fn test_filter_valid_keeps_catalogue_order() {
        let keys = RoleViewsConfig::filter_valid(&["registro_asuntos", "nada", "dashboard", "dashboard"]);
        assert_eq!(keys, vec!["dashboard", "registro_asuntos"]);
    }
}
