//! 后台首页：快捷入口与统计卡片
//! Admin home page: shortcuts and stat cards
//!
//! 卡片同时用于角色预览，预览时不查询统计数据。

pub mod controller;

use serde::Serialize;

use crate::error::AppResult;
use crate::repo::Repositories;
use crate::views::RoleViewsConfig;

/// 出现在首页快捷入口的视图
const ACTION_KEYS: &[&str] = &[
    "listar_correos",
    "registro_acceso",
    "registro_masivo",
    "registro_asuntos",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stat {
    Users,
    Platforms,
    Subjects,
    Codes,
}

const STATS: &[(Stat, &str, &str)] = &[
    (Stat::Users, "Usuarios", "/admin/users"),
    (Stat::Platforms, "Plataformas activas", "/admin/platforms"),
    (Stat::Subjects, "Asuntos activos", "/admin/email-subjects"),
    (Stat::Codes, "Códigos consumidos", "/admin/codes"),
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionCard {
    pub key: &'static str,
    pub label: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatCard {
    pub label: &'static str,
    pub url: &'static str,
    pub value: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub users: u64,
    pub platforms: u64,
    pub subjects: u64,
    pub codes: u64,
}

impl DashboardCounts {
    pub async fn load(repos: &Repositories) -> AppResult<Self> {
        let (users, platforms, subjects, codes) = tokio::try_join!(
            repos.users.count(),
            repos.platforms.count_enabled(),
            repos.subjects.count_active(),
            repos.codes.count_consumed(),
        )?;
        Ok(Self {
            users,
            platforms,
            subjects,
            codes,
        })
    }

    fn value(&self, stat: Stat) -> u64 {
        match stat {
            Stat::Users => self.users,
            Stat::Platforms => self.platforms,
            Stat::Subjects => self.subjects,
            Stat::Codes => self.codes,
        }
    }
}

fn visible<S: AsRef<str>>(url: &str, keys: &[S]) -> bool {
    match RoleViewsConfig::view_keys_for_path(url) {
        Some(required) => keys.iter().any(|k| required.contains(&k.as_ref())),
        None => true,
    }
}

/// 快捷入口，按视图目录顺序
pub fn action_cards<S: AsRef<str>>(keys: &[S]) -> Vec<ActionCard> {
    RoleViewsConfig::allowed(keys)
        .into_iter()
        .filter(|v| ACTION_KEYS.contains(&v.key))
        .map(|v| ActionCard {
            key: v.key,
            label: v.label,
            url: v.url,
        })
        .collect()
}

/// 统计卡片只显示角色能打开的页面；`counts` 为空时不带数值
pub fn stat_cards<S: AsRef<str>>(keys: &[S], counts: Option<&DashboardCounts>) -> Vec<StatCard> {
    STATS
        .iter()
        .filter(|(_, _, url)| visible(url, keys))
        .map(|(stat, label, url)| StatCard {
            label,
            url,
            value: counts.map(|c| c.value(*stat)),
        })
        .collect()
}

/// 注册首页路由（后台）
pub fn register_dashboard_routes() {
    crate::register_admin_route!("dashboard", "后台首页", "dashboard", controller::configure);
}
