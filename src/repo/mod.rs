//! 数据访问层
//! Data access layer
//!
//! 每类实体一个 trait，控制器只依赖 trait 对象；MySQL 与内存两种实现。

pub mod memory;
pub mod mysql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::comm::pagination::{Page, PageRequest};
use crate::db::error::Result;

/// 已消费的访问码（访问记录列表行）
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConsumedCode {
    pub id: i64,
    pub code: String,
    pub consumed_by_username: Option<String>,
    pub consumed_by_email: Option<String>,
    pub recipient_email: Option<String>,
    pub consumed_at: Option<NaiveDateTime>,
    pub received_at: Option<NaiveDateTime>,
    pub platform_name: String,
    pub platform_display_name: String,
}

/// 后台用户
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_id: Option<i64>,
    pub active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// 用户列表行（带角色）
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserListRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub role_name: Option<String>,
    pub role_display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Platform {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailSubject {
    pub id: i64,
    pub platform_id: i64,
    pub subject_line: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub platform_name: String,
    pub platform_display_name: String,
}

/// 新建或更新主题时的输入
#[derive(Debug, Clone)]
pub struct SubjectInput {
    pub platform_id: i64,
    pub subject_line: String,
}

/// 邮箱访问凭据
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserAccess {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub platform_id: i64,
    pub enabled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub platform_name: Option<String>,
    pub platform_display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub display_name: String,
}

/// 被监控的 IMAP 邮箱（不含密码）
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailAccount {
    pub id: i64,
    pub email: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub account_type: String,
    pub imap_server: String,
    pub imap_port: i64,
    pub imap_user: String,
    pub enabled: bool,
    pub sync_status: String,
    pub last_sync_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    /// 该邮箱已启用的访问凭据数
    pub access_count: i64,
}

impl EmailAccount {
    /// 至少分配了一个平台
    pub fn is_assigned(&self) -> bool {
        self.access_count > 0
    }
}

/// `email_accounts.provider_config` 的 JSON 内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImapConfig {
    pub imap_server: String,
    pub imap_port: u16,
    pub imap_encryption: String,
    pub imap_user: String,
    pub imap_password: String,
    pub imap_validate_cert: bool,
}

impl ImapConfig {
    pub const DEFAULT_PORT: u16 = 993;

    /// 993 端口走 SSL，其余 TLS
    pub fn new(server: &str, port: u16, user: &str, password: &str) -> Self {
        Self {
            imap_server: server.to_string(),
            imap_port: port,
            imap_encryption: if port == Self::DEFAULT_PORT { "ssl" } else { "tls" }.to_string(),
            imap_user: user.to_string(),
            imap_password: password.to_string(),
            imap_validate_cert: true,
        }
    }
}

/// 新建或更新邮箱账户的输入；`imap_password` 为 `None` 时更新保留原密码
#[derive(Debug, Clone)]
pub struct EmailAccountInput {
    pub email: String,
    pub imap_server: String,
    pub imap_port: u16,
    pub imap_user: String,
    pub imap_password: Option<String>,
}

impl EmailAccountInput {
    pub fn provider_config(&self) -> ImapConfig {
        ImapConfig::new(
            &self.imap_server,
            self.imap_port,
            &self.imap_user,
            self.imap_password.as_deref().unwrap_or(""),
        )
    }
}

/// 按邮箱域名筛选的列表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailFilter {
    Gmail,
    Outlook,
    Pocoyoni,
}

impl MailFilter {
    pub const ALL: [MailFilter; 3] = [MailFilter::Gmail, MailFilter::Outlook, MailFilter::Pocoyoni];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MailFilter::Gmail => "gmail",
            MailFilter::Outlook => "outlook",
            MailFilter::Pocoyoni => "pocoyoni",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MailFilter::Gmail => "Gmail",
            MailFilter::Outlook => "Outlook",
            MailFilter::Pocoyoni => "Pocoyoni",
        }
    }

    /// 对应的角色视图 key
    pub fn view_key(&self) -> &'static str {
        match self {
            MailFilter::Gmail => "listar_gmail",
            MailFilter::Outlook => "listar_outlook",
            MailFilter::Pocoyoni => "listar_pocoyoni",
        }
    }

    /// `@` 之后的域名前缀（小写）
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            MailFilter::Gmail => &["gmail.", "googlemail."],
            MailFilter::Outlook => &["outlook.", "hotmail.", "live."],
            MailFilter::Pocoyoni => &["pocoyoni."],
        }
    }

    pub fn matches(&self, email: &str) -> bool {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };
        let domain = domain.to_lowercase();
        self.domains().iter().any(|d| domain.starts_with(d))
    }

    /// 邮箱所属的筛选；不属于任何一个时为 `None`
    pub fn detect(email: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.matches(email))
    }

    /// 与 [`MailFilter::matches`] 等价的 SQL 条件，只包含常量
    pub fn sql_condition(&self, column: &str) -> String {
        let parts: Vec<String> = self
            .domains()
            .iter()
            .map(|d| format!("LOWER({}) LIKE '%@{}%'", column, d))
            .collect();
        format!("({})", parts.join(" OR "))
    }
}

/// 非超级管理员的操作记录
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    AgregarCorreo,
    Edicion,
    Eliminar,
    Asignado,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::AgregarCorreo => "agregar_correo",
            ActivityAction::Edicion => "edicion",
            ActivityAction::Eliminar => "eliminar",
            ActivityAction::Asignado => "asignado",
        }
    }

    /// 列表中显示的名称；未知类型原样返回
    pub fn label_for(raw: &str) -> &str {
        match raw {
            "agregar_correo" => "Agregar correo",
            "edicion" => "Edición",
            "eliminar" => "Eliminar",
            "asignado" => "Asignado",
            other => other,
        }
    }
}

/// 管理员资料更新
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub active: bool,
}

/// 超级管理员角色 ID，不受视图权限限制
pub const SUPERADMIN_ROLE_ID: i64 = 1;

/// 默认会话超时（秒）
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600;

/// 将 `session_timeout_hours` 设置值换算为秒；1..=7 之外或无法解析时取 1 小时
pub fn session_timeout_from_hours(raw: Option<&str>) -> u64 {
    match raw.and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(hours) if (1..=7).contains(&hours) => hours as u64 * 3600,
        _ => DEFAULT_SESSION_TIMEOUT_SECS,
    }
}

#[async_trait]
pub trait CodeRepository: Send + Sync {
    /// status = 'consumed' 的访问码，按消费时间倒序
    async fn search_consumed(&self, request: &PageRequest) -> Result<Page<ConsumedCode>>;
    async fn count_consumed(&self) -> Result<u64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn update_last_login(&self, id: i64) -> Result<()>;
    async fn search(&self, request: &PageRequest) -> Result<Page<UserListRow>>;
    async fn count(&self) -> Result<u64>;
    /// 用户名或邮箱被其他用户占用
    async fn is_taken(&self, username: &str, email: &str, except_id: i64) -> Result<bool>;
    async fn update_profile(&self, id: i64, update: &UserUpdate) -> Result<bool>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool>;
}

#[async_trait]
pub trait PlatformRepository: Send + Sync {
    async fn find_all_enabled(&self) -> Result<Vec<Platform>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Platform>>;
    async fn search(&self, request: &PageRequest) -> Result<Page<Platform>>;
    async fn count_enabled(&self) -> Result<u64>;
}

#[async_trait]
pub trait EmailSubjectRepository: Send + Sync {
    /// 仅 active = 1，按 id 倒序
    async fn search(&self, request: &PageRequest) -> Result<Page<EmailSubject>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<EmailSubject>>;
    async fn create(&self, input: &SubjectInput) -> Result<i64>;
    /// 返回是否有记录被更新
    async fn update(&self, id: i64, input: &SubjectInput) -> Result<bool>;
    /// 软删除
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn count_active(&self) -> Result<u64>;
}

#[async_trait]
pub trait UserAccessRepository: Send + Sync {
    /// (email, platform_id) 唯一；已存在时替换密码并重新启用
    async fn upsert(&self, email: &str, password: &str, platform_id: i64) -> Result<()>;
    async fn find_by_email_and_platform(
        &self,
        email: &str,
        platform_id: i64,
    ) -> Result<Option<UserAccess>>;
    async fn search(&self, request: &PageRequest) -> Result<Page<UserAccess>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    /// 删除某邮箱在某平台上的凭据
    async fn delete_by_email_and_platform(&self, email: &str, platform_id: i64) -> Result<bool>;
    /// 邮箱已分配的平台显示名，按名称排序
    async fn platforms_by_email(&self, email: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Role>>;
    /// 按 ID 升序
    async fn find_all(&self) -> Result<Vec<Role>>;
    async fn view_keys(&self, role_id: i64) -> Result<Vec<String>>;
    /// 整体替换角色可见视图
    async fn set_view_keys(&self, role_id: i64, keys: &[String]) -> Result<()>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>>;
    /// 不存在时插入
    async fn set_value(&self, key: &str, value: &str, description: Option<&str>) -> Result<()>;

    async fn session_timeout_secs(&self) -> u64 {
        match self.get_value("session_timeout_hours").await {
            Ok(raw) => session_timeout_from_hours(raw.as_deref()),
            Err(e) => {
                tracing::warn!("读取会话超时设置失败，使用默认值: {}", e);
                DEFAULT_SESSION_TIMEOUT_SECS
            }
        }
    }
}

#[async_trait]
pub trait EmailAccountRepository: Send + Sync {
    /// 只看未删除的账户，不区分大小写
    async fn exists_by_email(&self, email: &str) -> Result<bool>;
    /// 搜索邮箱或 IMAP 用户，最新创建的在前
    async fn search(&self, request: &PageRequest, filter: Option<MailFilter>)
        -> Result<Page<EmailAccount>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<EmailAccount>>;
    /// 同名的已删除账户会被恢复
    async fn create(&self, input: &EmailAccountInput) -> Result<i64>;
    async fn update(&self, id: i64, input: &EmailAccountInput) -> Result<bool>;
    /// 软删除
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool>;
    /// 作为库存登记（不含 IMAP 配置），已存在的跳过；返回新增数量
    async fn bulk_insert(&self, emails: &[String]) -> Result<u64>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn log(&self, user_id: i64, username: &str, action: ActivityAction, description: &str)
        -> Result<()>;
    /// 按时间排序，`ascending` 为 false 时最新的在前
    async fn list(&self, request: &PageRequest, ascending: bool) -> Result<Page<ActivityEntry>>;
}

/// 所有仓储句柄
#[derive(Clone)]
pub struct Repositories {
    pub codes: Arc<dyn CodeRepository>,
    pub users: Arc<dyn UserRepository>,
    pub platforms: Arc<dyn PlatformRepository>,
    pub subjects: Arc<dyn EmailSubjectRepository>,
    pub user_access: Arc<dyn UserAccessRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub email_accounts: Arc<dyn EmailAccountRepository>,
    pub activity: Arc<dyn ActivityRepository>,
}

impl Repositories {
    /// 全部由同一个内存存储提供
    pub fn memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            codes: store.clone(),
            users: store.clone(),
            platforms: store.clone(),
            subjects: store.clone(),
            user_access: store.clone(),
            roles: store.clone(),
            settings: store.clone(),
            email_accounts: store.clone(),
            activity: store,
        }
    }

    pub fn mysql(pool: sqlx::MySqlPool) -> Self {
        let repo = Arc::new(mysql::MySqlRepository::new(pool));
        Self {
            codes: repo.clone(),
            users: repo.clone(),
            platforms: repo.clone(),
            subjects: repo.clone(),
            user_access: repo.clone(),
            roles: repo.clone(),
            settings: repo.clone(),
            email_accounts: repo.clone(),
            activity: repo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_timeout_range() {
        assert_eq!(session_timeout_from_hours(None), 3600);
        assert_eq!(session_timeout_from_hours(Some("3")), 3 * 3600);
        assert_eq!(session_timeout_from_hours(Some("7")), 7 * 3600);
        assert_eq!(session_timeout_from_hours(Some("8")), 3600);
        assert_eq!(session_timeout_from_hours(Some("0")), 3600);
        assert_eq!(session_timeout_from_hours(Some("dos")), 3600);
    }

    #[test]
    fn test_mail_filter_domains() {
        assert_eq!(MailFilter::parse("Gmail"), Some(MailFilter::Gmail));
        assert_eq!(MailFilter::parse("yahoo"), None);
        assert!(MailFilter::Outlook.matches("ana@HOTMAIL.com"));
        assert!(MailFilter::Outlook.matches("ana@live.com.mx"));
        assert!(!MailFilter::Gmail.matches("gmail.com@pocoyoni.com"));
        assert_eq!(MailFilter::detect("x@pocoyoni.com"), Some(MailFilter::Pocoyoni));
        assert_eq!(MailFilter::detect("x@yahoo.com"), None);
        assert_eq!(
            MailFilter::Gmail.sql_condition("ea.email"),
            "(LOWER(ea.email) LIKE '%@gmail.%' OR LOWER(ea.email) LIKE '%@googlemail.%')"
        );
    }

    #[test]
    fn test_imap_config_encryption() {
        assert_eq!(ImapConfig::new("imap.x.com", 993, "u", "p").imap_encryption, "ssl");
        assert_eq!(ImapConfig::new("imap.x.com", 143, "u", "p").imap_encryption, "tls");
        assert!(ImapConfig::new("", 993, "", "").imap_validate_cert);
    }

    #[test]
    fn test_activity_labels() {
        assert_eq!(ActivityAction::label_for(ActivityAction::Asignado.as_str()), "Asignado");
        assert_eq!(ActivityAction::label_for("agregar_correo"), "Agregar correo");
        assert_eq!(ActivityAction::label_for("otra"), "otra");
    }
}
