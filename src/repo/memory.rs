//! 内存仓储实现，用于测试与无数据库的演示模式
//! In-memory repositories for tests and the database-less demo mode

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use parking_lot::RwLock;

use crate::comm::pagination::{Page, PageRequest};
use crate::db::error::{DbError, Result};
use crate::repo::{
    ActivityAction, ActivityEntry, ActivityRepository, CodeRepository, ConsumedCode, EmailAccount,
    EmailAccountInput, EmailAccountRepository, EmailSubject, EmailSubjectRepository, ImapConfig,
    MailFilter, Platform, PlatformRepository, Role, RoleRepository, SettingsRepository,
    SubjectInput, User, UserAccess, UserAccessRepository, UserListRow, UserRepository, UserUpdate,
};

#[derive(Debug, Clone)]
struct CodeRecord {
    id: i64,
    code: String,
    platform_id: i64,
    status: &'static str,
    consumed_by_username: Option<String>,
    consumed_by_email: Option<String>,
    recipient_email: Option<String>,
    consumed_at: Option<NaiveDateTime>,
    received_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
struct SubjectRecord {
    id: i64,
    platform_id: i64,
    subject_line: String,
    active: bool,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
struct AccessRecord {
    id: i64,
    email: String,
    password: String,
    platform_id: i64,
    enabled: bool,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
struct AccountRecord {
    id: i64,
    email: String,
    account_type: String,
    config: Option<ImapConfig>,
    enabled: bool,
    sync_status: String,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
    deleted: bool,
}

#[derive(Default)]
struct MemoryData {
    next_id: i64,
    codes: Vec<CodeRecord>,
    users: Vec<User>,
    platforms: Vec<Platform>,
    subjects: Vec<SubjectRecord>,
    user_access: Vec<AccessRecord>,
    roles: Vec<Role>,
    role_views: HashMap<i64, Vec<String>>,
    settings: HashMap<String, String>,
    email_accounts: Vec<AccountRecord>,
    activity: Vec<ActivityEntry>,
}

impl MemoryData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn platform(&self, id: i64) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }
}

/// 线程安全的内存数据集
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn contains_opt(haystack: Option<&str>, needle: &str) -> bool {
    haystack.map_or(false, |h| contains(h, needle))
}

fn paginate<T: Clone>(rows: Vec<T>, request: &PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    Page::new(request.slice(&rows), total, request)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role(&self, name: &str, display_name: &str) -> i64 {
        let mut data = self.data.write();
        let id = data.next_id();
        data.roles.push(Role {
            id,
            name: name.to_string(),
            display_name: display_name.to_string(),
        });
        id
    }

    pub fn add_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role_id: Option<i64>,
        active: bool,
    ) -> i64 {
        let mut data = self.data.write();
        let id = data.next_id();
        // 与 created_at DESC 排序配合，后插入的更新
        let created_at = now() + Duration::seconds(id);
        data.users.push(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password: password_hash.to_string(),
            role_id,
            active,
            last_login: None,
            created_at,
        });
        id
    }

    pub fn add_platform(&self, name: &str, display_name: &str, enabled: bool) -> i64 {
        let mut data = self.data.write();
        let id = data.next_id();
        data.platforms.push(Platform {
            id,
            name: name.to_string(),
            display_name: display_name.to_string(),
            enabled,
            created_at: now(),
        });
        id
    }

    /// 写入一个库存邮箱（无 IMAP 配置）
    pub fn add_email_account(&self, email: &str) -> i64 {
        let mut data = self.data.write();
        Self::insert_account(&mut data, email, None)
    }

    fn insert_account(data: &mut MemoryData, email: &str, config: Option<ImapConfig>) -> i64 {
        let id = data.next_id();
        data.email_accounts.push(AccountRecord {
            id,
            email: email.to_string(),
            account_type: "imap".to_string(),
            config,
            enabled: true,
            sync_status: "pending".to_string(),
            created_at: now() + Duration::seconds(id),
            updated_at: None,
            deleted: false,
        });
        id
    }

    fn account_row(data: &MemoryData, record: &AccountRecord) -> EmailAccount {
        let config = record.config.as_ref();
        let access_count = data
            .user_access
            .iter()
            .filter(|a| a.enabled && a.email.eq_ignore_ascii_case(&record.email))
            .count() as i64;
        EmailAccount {
            id: record.id,
            email: record.email.clone(),
            account_type: record.account_type.clone(),
            imap_server: config.map(|c| c.imap_server.clone()).unwrap_or_default(),
            imap_port: config.map_or(ImapConfig::DEFAULT_PORT, |c| c.imap_port) as i64,
            imap_user: config.map(|c| c.imap_user.clone()).unwrap_or_default(),
            enabled: record.enabled,
            sync_status: record.sync_status.clone(),
            last_sync_at: None,
            created_at: record.created_at,
            updated_at: record.updated_at,
            access_count,
        }
    }

    fn live_account(data: &mut MemoryData, id: i64) -> Option<&mut AccountRecord> {
        data.email_accounts.iter_mut().find(|a| a.id == id && !a.deleted)
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.data
            .write()
            .settings
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_role_views(&self, role_id: i64, keys: &[&str]) {
        self.data
            .write()
            .role_views
            .insert(role_id, keys.iter().map(|k| k.to_string()).collect());
    }

    /// 写入一条已消费的访问码
    pub fn add_consumed_code(
        &self,
        code: &str,
        platform_id: i64,
        username: &str,
        email: &str,
        consumed_at: NaiveDateTime,
    ) -> i64 {
        let mut data = self.data.write();
        let id = data.next_id();
        data.codes.push(CodeRecord {
            id,
            code: code.to_string(),
            platform_id,
            status: "consumed",
            consumed_by_username: Some(username.to_string()),
            consumed_by_email: Some(email.to_string()),
            recipient_email: Some(email.to_string()),
            consumed_at: Some(consumed_at),
            received_at: Some(consumed_at - Duration::minutes(2)),
        });
        id
    }

    /// 写入一条尚未消费的访问码
    pub fn add_available_code(&self, code: &str, platform_id: i64) -> i64 {
        let mut data = self.data.write();
        let id = data.next_id();
        data.codes.push(CodeRecord {
            id,
            code: code.to_string(),
            platform_id,
            status: "available",
            consumed_by_username: None,
            consumed_by_email: None,
            recipient_email: None,
            consumed_at: None,
            received_at: Some(now()),
        });
        id
    }

    /// 演示数据：超级管理员、一个受限角色、几个平台与记录
    pub fn demo(admin_password_hash: &str) -> Self {
        let store = Self::new();
        let superadmin = store.add_role("SUPER_ADMIN", "Super Administrador");
        let operator = store.add_role("OPERADOR", "Operador");
        store.set_role_views(operator, &["dashboard", "registro_acceso", "registro_asuntos"]);

        store.add_user("admin", "admin@gac.local", admin_password_hash, Some(superadmin), true);
        store.add_user("operador", "operador@gac.local", admin_password_hash, Some(operator), true);

        let netflix = store.add_platform("netflix", "Netflix", true);
        let disney = store.add_platform("disney", "Disney+", true);
        store.add_platform("prime", "Prime Video", false);

        store.add_email_account("cuenta1@pocoyoni.com");
        store.add_email_account("cuenta2@gmail.com");

        let base = now() - Duration::days(1);
        store.add_consumed_code("482913", netflix, "cliente1", "cuenta1@pocoyoni.com", base);
        store.add_consumed_code(
            "771204",
            disney,
            "cliente2",
            "cuenta2@gmail.com",
            base + Duration::hours(3),
        );
        store.add_available_code("118822", netflix);

        if let Ok(id) = store.create_subject(netflix, "Tu código de acceso temporal de Netflix") {
            tracing::debug!(id, "演示主题已创建");
        }
        store.set_setting("session_timeout_hours", "1");
        store
    }

    fn create_subject(&self, platform_id: i64, subject_line: &str) -> Result<i64> {
        let mut data = self.data.write();
        if data.platform(platform_id).is_none() {
            return Err(DbError::NotFound);
        }
        let id = data.next_id();
        data.subjects.push(SubjectRecord {
            id,
            platform_id,
            subject_line: subject_line.to_string(),
            active: true,
            created_at: now(),
            updated_at: None,
        });
        Ok(id)
    }

    fn subject_row(data: &MemoryData, record: &SubjectRecord) -> Option<EmailSubject> {
        let platform = data.platform(record.platform_id)?;
        Some(EmailSubject {
            id: record.id,
            platform_id: record.platform_id,
            subject_line: record.subject_line.clone(),
            active: record.active,
            created_at: record.created_at,
            updated_at: record.updated_at,
            platform_name: platform.name.clone(),
            platform_display_name: platform.display_name.clone(),
        })
    }

    fn access_row(data: &MemoryData, record: &AccessRecord) -> UserAccess {
        let platform = data.platform(record.platform_id);
        UserAccess {
            id: record.id,
            email: record.email.clone(),
            password: record.password.clone(),
            platform_id: record.platform_id,
            enabled: record.enabled,
            created_at: record.created_at,
            updated_at: record.updated_at,
            platform_name: platform.map(|p| p.name.clone()),
            platform_display_name: platform.map(|p| p.display_name.clone()),
        }
    }
}

#[async_trait]
impl CodeRepository for MemoryStore {
    async fn search_consumed(&self, request: &PageRequest) -> Result<Page<ConsumedCode>> {
        let data = self.data.read();
        let term = request.search_term();
        let mut rows: Vec<ConsumedCode> = data
            .codes
            .iter()
            .filter(|c| c.status == "consumed")
            .filter_map(|c| {
                let platform = data.platform(c.platform_id)?;
                Some(ConsumedCode {
                    id: c.id,
                    code: c.code.clone(),
                    consumed_by_username: c.consumed_by_username.clone(),
                    consumed_by_email: c.consumed_by_email.clone(),
                    recipient_email: c.recipient_email.clone(),
                    consumed_at: c.consumed_at,
                    received_at: c.received_at,
                    platform_name: platform.name.clone(),
                    platform_display_name: platform.display_name.clone(),
                })
            })
            .filter(|row| match &term {
                None => true,
                Some(t) => {
                    contains(&row.code, t)
                        || contains_opt(row.consumed_by_username.as_deref(), t)
                        || contains_opt(row.consumed_by_email.as_deref(), t)
                        || contains_opt(row.recipient_email.as_deref(), t)
                        || contains(&row.platform_display_name, t)
                }
            })
            .collect();
        rows.sort_by(|a, b| b.consumed_at.cmp(&a.consumed_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, request))
    }

    async fn count_consumed(&self) -> Result<u64> {
        let data = self.data.read();
        Ok(data.codes.iter().filter(|c| c.status == "consumed").count() as u64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let data = self.data.read();
        Ok(data.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let data = self.data.read();
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let data = self.data.read();
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_last_login(&self, id: i64) -> Result<()> {
        let mut data = self.data.write();
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(DbError::NotFound)?;
        user.last_login = Some(now());
        Ok(())
    }

    async fn search(&self, request: &PageRequest) -> Result<Page<UserListRow>> {
        let data = self.data.read();
        let term = request.search_term();
        let mut rows: Vec<UserListRow> = data
            .users
            .iter()
            .filter(|u| match &term {
                None => true,
                Some(t) => contains(&u.username, t) || contains(&u.email, t),
            })
            .map(|u| {
                let role = u
                    .role_id
                    .and_then(|rid| data.roles.iter().find(|r| r.id == rid));
                UserListRow {
                    id: u.id,
                    username: u.username.clone(),
                    email: u.email.clone(),
                    active: u.active,
                    last_login: u.last_login,
                    created_at: u.created_at,
                    role_name: role.map(|r| r.name.clone()),
                    role_display_name: role.map(|r| r.display_name.clone()),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, request))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.data.read().users.len() as u64)
    }

    async fn is_taken(&self, username: &str, email: &str, except_id: i64) -> Result<bool> {
        let data = self.data.read();
        Ok(data
            .users
            .iter()
            .any(|u| u.id != except_id && (u.username == username || u.email == email)))
    }

    async fn update_profile(&self, id: i64, update: &UserUpdate) -> Result<bool> {
        let mut data = self.data.write();
        match data.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.username = update.username.clone();
                user.email = update.email.clone();
                user.active = update.active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let mut data = self.data.write();
        match data.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PlatformRepository for MemoryStore {
    async fn find_all_enabled(&self) -> Result<Vec<Platform>> {
        let data = self.data.read();
        let mut rows: Vec<Platform> = data.platforms.iter().filter(|p| p.enabled).cloned().collect();
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Platform>> {
        Ok(self.data.read().platform(id).cloned())
    }

    async fn search(&self, request: &PageRequest) -> Result<Page<Platform>> {
        let data = self.data.read();
        let term = request.search_term();
        let mut rows: Vec<Platform> = data
            .platforms
            .iter()
            .filter(|p| match &term {
                None => true,
                Some(t) => contains(&p.name, t) || contains(&p.display_name, t),
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(paginate(rows, request))
    }

    async fn count_enabled(&self) -> Result<u64> {
        Ok(self.data.read().platforms.iter().filter(|p| p.enabled).count() as u64)
    }
}

#[async_trait]
impl EmailSubjectRepository for MemoryStore {
    async fn search(&self, request: &PageRequest) -> Result<Page<EmailSubject>> {
        let data = self.data.read();
        let term = request.search_term();
        let mut rows: Vec<EmailSubject> = data
            .subjects
            .iter()
            .filter(|s| s.active)
            .filter_map(|s| Self::subject_row(&data, s))
            .filter(|row| match &term {
                None => true,
                Some(t) => {
                    contains(&row.subject_line, t)
                        || contains(&row.platform_display_name, t)
                        || contains(&row.platform_name, t)
                }
            })
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(paginate(rows, request))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<EmailSubject>> {
        let data = self.data.read();
        Ok(data
            .subjects
            .iter()
            .find(|s| s.id == id && s.active)
            .and_then(|s| Self::subject_row(&data, s)))
    }

    async fn create(&self, input: &SubjectInput) -> Result<i64> {
        self.create_subject(input.platform_id, &input.subject_line)
    }

    async fn update(&self, id: i64, input: &SubjectInput) -> Result<bool> {
        let mut data = self.data.write();
        if data.platform(input.platform_id).is_none() {
            return Err(DbError::NotFound);
        }
        match data.subjects.iter_mut().find(|s| s.id == id && s.active) {
            Some(subject) => {
                subject.platform_id = input.platform_id;
                subject.subject_line = input.subject_line.clone();
                subject.updated_at = Some(now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut data = self.data.write();
        match data.subjects.iter_mut().find(|s| s.id == id) {
            Some(subject) => {
                subject.active = false;
                subject.updated_at = Some(now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_active(&self) -> Result<u64> {
        Ok(self.data.read().subjects.iter().filter(|s| s.active).count() as u64)
    }
}

#[async_trait]
impl UserAccessRepository for MemoryStore {
    async fn upsert(&self, email: &str, password: &str, platform_id: i64) -> Result<()> {
        let mut data = self.data.write();
        if let Some(existing) = data
            .user_access
            .iter_mut()
            .find(|a| a.email == email && a.platform_id == platform_id)
        {
            existing.password = password.to_string();
            existing.enabled = true;
            existing.updated_at = Some(now());
            return Ok(());
        }
        let id = data.next_id();
        let created_at = now() + Duration::seconds(id);
        data.user_access.push(AccessRecord {
            id,
            email: email.to_string(),
            password: password.to_string(),
            platform_id,
            enabled: true,
            created_at,
            updated_at: None,
        });
        Ok(())
    }

    async fn find_by_email_and_platform(
        &self,
        email: &str,
        platform_id: i64,
    ) -> Result<Option<UserAccess>> {
        let data = self.data.read();
        Ok(data
            .user_access
            .iter()
            .find(|a| a.email == email && a.platform_id == platform_id && a.enabled)
            .map(|a| Self::access_row(&data, a)))
    }

    async fn search(&self, request: &PageRequest) -> Result<Page<UserAccess>> {
        let data = self.data.read();
        let term = request.search_term();
        let mut rows: Vec<UserAccess> = data
            .user_access
            .iter()
            .map(|a| Self::access_row(&data, a))
            .filter(|row| match &term {
                None => true,
                Some(t) => {
                    contains(&row.email, t) || contains_opt(row.platform_display_name.as_deref(), t)
                }
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, request))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut data = self.data.write();
        let before = data.user_access.len();
        data.user_access.retain(|a| a.id != id);
        Ok(data.user_access.len() != before)
    }

    async fn delete_by_email_and_platform(&self, email: &str, platform_id: i64) -> Result<bool> {
        let mut data = self.data.write();
        let before = data.user_access.len();
        data.user_access
            .retain(|a| !(a.platform_id == platform_id && a.email.eq_ignore_ascii_case(email)));
        Ok(data.user_access.len() != before)
    }

    async fn platforms_by_email(&self, email: &str) -> Result<Vec<String>> {
        let data = self.data.read();
        let mut names: Vec<String> = data
            .user_access
            .iter()
            .filter(|a| a.enabled && a.email.eq_ignore_ascii_case(email))
            .filter_map(|a| data.platform(a.platform_id).map(|p| p.display_name.clone()))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Role>> {
        Ok(self.data.read().roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Role>> {
        let mut roles = self.data.read().roles.clone();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn view_keys(&self, role_id: i64) -> Result<Vec<String>> {
        let mut keys = self
            .data
            .read()
            .role_views
            .get(&role_id)
            .cloned()
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn set_view_keys(&self, role_id: i64, keys: &[String]) -> Result<()> {
        self.data.write().role_views.insert(role_id, keys.to_vec());
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().settings.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str, _description: Option<&str>) -> Result<()> {
        self.set_setting(key, value);
        Ok(())
    }
}

#[async_trait]
impl EmailAccountRepository for MemoryStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let data = self.data.read();
        Ok(data
            .email_accounts
            .iter()
            .any(|a| !a.deleted && a.email.eq_ignore_ascii_case(email)))
    }

    async fn search(
        &self,
        request: &PageRequest,
        filter: Option<MailFilter>,
    ) -> Result<Page<EmailAccount>> {
        let data = self.data.read();
        let term = request.search_term();
        let mut rows: Vec<EmailAccount> = data
            .email_accounts
            .iter()
            .filter(|a| !a.deleted)
            .filter(|a| filter.map_or(true, |f| f.matches(&a.email)))
            .map(|a| Self::account_row(&data, a))
            .filter(|row| match &term {
                None => true,
                Some(t) => contains(&row.email, t) || contains(&row.imap_user, t),
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, request))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<EmailAccount>> {
        let data = self.data.read();
        Ok(data
            .email_accounts
            .iter()
            .find(|a| a.id == id && !a.deleted)
            .map(|a| Self::account_row(&data, a)))
    }

    async fn create(&self, input: &EmailAccountInput) -> Result<i64> {
        let mut data = self.data.write();
        let config = Some(input.provider_config());
        if let Some(existing) = data
            .email_accounts
            .iter_mut()
            .find(|a| a.email.eq_ignore_ascii_case(&input.email))
        {
            if !existing.deleted {
                return Err(DbError::Conflict(input.email.clone()));
            }
            existing.deleted = false;
            existing.enabled = true;
            existing.config = config;
            existing.updated_at = Some(now());
            return Ok(existing.id);
        }
        Ok(Self::insert_account(&mut data, &input.email, config))
    }

    async fn update(&self, id: i64, input: &EmailAccountInput) -> Result<bool> {
        let mut data = self.data.write();
        if data
            .email_accounts
            .iter()
            .any(|a| a.id != id && !a.deleted && a.email.eq_ignore_ascii_case(&input.email))
        {
            return Err(DbError::Conflict(input.email.clone()));
        }
        let Some(account) = Self::live_account(&mut data, id) else {
            return Ok(false);
        };
        let mut config = input.provider_config();
        if input.imap_password.is_none() {
            config.imap_password = account
                .config
                .as_ref()
                .map(|c| c.imap_password.clone())
                .unwrap_or_default();
        }
        account.email = input.email.clone();
        account.config = Some(config);
        account.updated_at = Some(now());
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut data = self.data.write();
        match Self::live_account(&mut data, id) {
            Some(account) => {
                account.deleted = true;
                account.updated_at = Some(now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let mut data = self.data.write();
        match Self::live_account(&mut data, id) {
            Some(account) => {
                account.enabled = enabled;
                account.updated_at = Some(now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn bulk_insert(&self, emails: &[String]) -> Result<u64> {
        let mut data = self.data.write();
        let mut inserted = 0;
        for email in emails {
            let existing = data
                .email_accounts
                .iter_mut()
                .find(|a| a.email.eq_ignore_ascii_case(email));
            match existing {
                Some(account) if account.deleted => {
                    account.deleted = false;
                    account.enabled = true;
                    account.updated_at = Some(now());
                    inserted += 1;
                }
                Some(_) => {}
                None => {
                    Self::insert_account(&mut data, email, None);
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn log(
        &self,
        user_id: i64,
        username: &str,
        action: ActivityAction,
        description: &str,
    ) -> Result<()> {
        let mut data = self.data.write();
        let id = data.next_id();
        data.activity.push(ActivityEntry {
            id,
            user_id,
            username: username.to_string(),
            action: action.as_str().to_string(),
            description: description.to_string(),
            created_at: now() + Duration::seconds(id),
        });
        Ok(())
    }

    async fn list(&self, request: &PageRequest, ascending: bool) -> Result<Page<ActivityEntry>> {
        let term = request.search_term();
        let mut rows: Vec<ActivityEntry> = self
            .data
            .read()
            .activity
            .iter()
            .filter(|e| {
                term.as_deref().map_or(true, |t| {
                    contains(&e.username, t) || contains(&e.description, t)
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if !ascending {
            rows.reverse();
        }
        Ok(paginate(rows, request))
    }
}
