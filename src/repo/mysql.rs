//! MySQL 仓储实现
//! MySQL-backed repositories

use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::instrument;

use crate::comm::pagination::{Page, PageRequest};
use crate::db::error::{DbError, Result};
use crate::repo::{
    ActivityAction, ActivityEntry, ActivityRepository, CodeRepository, ConsumedCode, EmailAccount,
    EmailAccountInput, EmailAccountRepository, EmailSubject, EmailSubjectRepository, ImapConfig,
    MailFilter, Platform, PlatformRepository, Role, RoleRepository, SettingsRepository,
    SubjectInput, User, UserAccess, UserAccessRepository, UserListRow, UserRepository, UserUpdate,
};

pub struct MySqlRepository {
    pool: MySqlPool,
}

/// `LIMIT ? OFFSET ?` 片段；不分页时为空
fn limit_clause(request: &PageRequest) -> &'static str {
    if request.per_page > 0 {
        "LIMIT ? OFFSET ?"
    } else {
        ""
    }
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term)
}

fn config_json(config: &ImapConfig) -> Result<String> {
    serde_json::to_string(config).map_err(|e| DbError::Config(format!("provider_config: {}", e)))
}

impl MySqlRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// 通用的 “计数 + 分页查询”
    ///
    /// `where_clause` 中的每个 `?` 都绑定同一个搜索模式，个数由 `placeholders` 给出。
    async fn paginate<T>(
        &self,
        count_sql: &str,
        select_sql: &str,
        placeholders: usize,
        request: &PageRequest,
    ) -> Result<Page<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> + Send + Unpin,
    {
        let pattern = request.search_term().map(|t| like_pattern(&t));

        let mut count_query = sqlx::query_scalar::<_, i64>(count_sql);
        if let Some(p) = &pattern {
            for _ in 0..placeholders {
                count_query = count_query.bind(p.clone());
            }
        }
        let total = count_query.fetch_one(&self.pool).await?.max(0) as u64;

        let mut select_query = sqlx::query_as::<_, T>(select_sql);
        if let Some(p) = &pattern {
            for _ in 0..placeholders {
                select_query = select_query.bind(p.clone());
            }
        }
        if request.per_page > 0 {
            select_query = select_query
                .bind(request.per_page as u64)
                .bind(request.offset());
        }
        let data = select_query.fetch_all(&self.pool).await?;

        Ok(Page::new(data, total, request))
    }
}

#[async_trait]
impl CodeRepository for MySqlRepository {
    #[instrument(skip(self))]
    async fn search_consumed(&self, request: &PageRequest) -> Result<Page<ConsumedCode>> {
        let mut where_clause = "WHERE c.status = 'consumed'".to_string();
        let mut placeholders = 0;
        if request.search_term().is_some() {
            where_clause.push_str(
                " AND (LOWER(c.code) LIKE ? OR LOWER(c.consumed_by_username) LIKE ? \
                 OR LOWER(c.consumed_by_email) LIKE ? OR LOWER(c.recipient_email) LIKE ? \
                 OR LOWER(p.display_name) LIKE ?)",
            );
            placeholders = 5;
        }
        let count_sql = format!(
            "SELECT COUNT(*) FROM codes c INNER JOIN platforms p ON c.platform_id = p.id {}",
            where_clause
        );
        let select_sql = format!(
            "SELECT c.id, c.code, c.consumed_by_username, c.consumed_by_email, c.recipient_email, \
             c.consumed_at, c.received_at, p.name AS platform_name, p.display_name AS platform_display_name \
             FROM codes c INNER JOIN platforms p ON c.platform_id = p.id {} \
             ORDER BY c.consumed_at DESC, c.id DESC {}",
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }

    async fn count_consumed(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM codes WHERE status = 'consumed'")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password, role_id, active, last_login, created_at";

#[async_trait]
impl UserRepository for MySqlRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_last_login(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE users SET last_login = NOW() WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search(&self, request: &PageRequest) -> Result<Page<UserListRow>> {
        let (where_clause, placeholders) = if request.search_term().is_some() {
            ("WHERE LOWER(u.username) LIKE ? OR LOWER(u.email) LIKE ?", 2)
        } else {
            ("", 0)
        };
        let count_sql = format!("SELECT COUNT(*) FROM users u {}", where_clause);
        let select_sql = format!(
            "SELECT u.id, u.username, u.email, u.active, u.last_login, u.created_at, \
             r.name AS role_name, r.display_name AS role_display_name \
             FROM users u LEFT JOIN roles r ON u.role_id = r.id {} \
             ORDER BY u.created_at DESC {}",
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn is_taken(&self, username: &str, email: &str, except_id: i64) -> Result<bool> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE (username = ? OR email = ?) AND id != ?",
        )
        .bind(username)
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(n > 0)
    }

    async fn update_profile(&self, id: i64, update: &UserUpdate) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET username = ?, email = ?, active = ? WHERE id = ?")
            .bind(&update.username)
            .bind(&update.email)
            .bind(update.active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        // 值未变化时 MySQL 报告 0 行
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(UserRepository::find_by_id(self, id).await?.is_some())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PlatformRepository for MySqlRepository {
    async fn find_all_enabled(&self) -> Result<Vec<Platform>> {
        Ok(sqlx::query_as::<_, Platform>(
            "SELECT id, name, display_name, enabled, created_at FROM platforms \
             WHERE enabled = 1 ORDER BY display_name ASC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Platform>> {
        Ok(sqlx::query_as::<_, Platform>(
            "SELECT id, name, display_name, enabled, created_at FROM platforms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn search(&self, request: &PageRequest) -> Result<Page<Platform>> {
        let (where_clause, placeholders) = if request.search_term().is_some() {
            ("WHERE (LOWER(name) LIKE ? OR LOWER(display_name) LIKE ?)", 2)
        } else {
            ("", 0)
        };
        let count_sql = format!("SELECT COUNT(*) FROM platforms {}", where_clause);
        let select_sql = format!(
            "SELECT id, name, display_name, enabled, created_at FROM platforms {} \
             ORDER BY display_name ASC {}",
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }

    async fn count_enabled(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM platforms WHERE enabled = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}

const SUBJECT_SELECT: &str = "SELECT es.id, es.platform_id, es.subject_line, es.active, \
     es.created_at, es.updated_at, p.name AS platform_name, p.display_name AS platform_display_name \
     FROM email_subjects es JOIN platforms p ON es.platform_id = p.id";

#[async_trait]
impl EmailSubjectRepository for MySqlRepository {
    #[instrument(skip(self))]
    async fn search(&self, request: &PageRequest) -> Result<Page<EmailSubject>> {
        let mut where_clause = "WHERE es.active = 1".to_string();
        let mut placeholders = 0;
        if request.search_term().is_some() {
            where_clause.push_str(
                " AND (LOWER(es.subject_line) LIKE ? OR LOWER(p.display_name) LIKE ? \
                 OR LOWER(p.name) LIKE ?)",
            );
            placeholders = 3;
        }
        let count_sql = format!(
            "SELECT COUNT(*) FROM email_subjects es JOIN platforms p ON es.platform_id = p.id {}",
            where_clause
        );
        let select_sql = format!(
            "{} {} ORDER BY es.id DESC {}",
            SUBJECT_SELECT,
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<EmailSubject>> {
        let sql = format!("{} WHERE es.id = ? AND es.active = 1", SUBJECT_SELECT);
        Ok(sqlx::query_as::<_, EmailSubject>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, input: &SubjectInput) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO email_subjects (platform_id, subject_line, active) VALUES (?, ?, 1)",
        )
        .bind(input.platform_id)
        .bind(&input.subject_line)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    async fn update(&self, id: i64, input: &SubjectInput) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE email_subjects SET platform_id = ?, subject_line = ?, updated_at = NOW() \
             WHERE id = ? AND active = 1",
        )
        .bind(input.platform_id)
        .bind(&input.subject_line)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE email_subjects SET active = 0, updated_at = NOW() WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_active(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_subjects WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}

#[async_trait]
impl UserAccessRepository for MySqlRepository {
    async fn upsert(&self, email: &str, password: &str, platform_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_access (email, password, platform_id, enabled) VALUES (?, ?, ?, 1) \
             ON DUPLICATE KEY UPDATE password = VALUES(password), enabled = 1, updated_at = NOW()",
        )
        .bind(email)
        .bind(password)
        .bind(platform_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_email_and_platform(
        &self,
        email: &str,
        platform_id: i64,
    ) -> Result<Option<UserAccess>> {
        Ok(sqlx::query_as::<_, UserAccess>(
            "SELECT ua.id, ua.email, ua.password, ua.platform_id, ua.enabled, ua.created_at, \
             ua.updated_at, p.name AS platform_name, p.display_name AS platform_display_name \
             FROM user_access ua LEFT JOIN platforms p ON ua.platform_id = p.id \
             WHERE ua.email = ? AND ua.platform_id = ? AND ua.enabled = 1",
        )
        .bind(email)
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn search(&self, request: &PageRequest) -> Result<Page<UserAccess>> {
        let (where_clause, placeholders) = if request.search_term().is_some() {
            ("WHERE (LOWER(ua.email) LIKE ? OR LOWER(p.display_name) LIKE ?)", 2)
        } else {
            ("", 0)
        };
        let count_sql = format!(
            "SELECT COUNT(*) FROM user_access ua LEFT JOIN platforms p ON ua.platform_id = p.id {}",
            where_clause
        );
        let select_sql = format!(
            "SELECT ua.id, ua.email, ua.password, ua.platform_id, ua.enabled, ua.created_at, \
             ua.updated_at, p.name AS platform_name, p.display_name AS platform_display_name \
             FROM user_access ua LEFT JOIN platforms p ON ua.platform_id = p.id {} \
             ORDER BY ua.created_at DESC {}",
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_access WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_email_and_platform(&self, email: &str, platform_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_access WHERE LOWER(email) = LOWER(?) AND platform_id = ?")
                .bind(email)
                .bind(platform_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn platforms_by_email(&self, email: &str) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT p.display_name FROM user_access ua \
             JOIN platforms p ON ua.platform_id = p.id \
             WHERE LOWER(ua.email) = LOWER(?) AND ua.enabled = 1 ORDER BY p.display_name ASC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl RoleRepository for MySqlRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Role>> {
        Ok(
            sqlx::query_as::<_, Role>("SELECT id, name, display_name FROM roles WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_all(&self) -> Result<Vec<Role>> {
        Ok(
            sqlx::query_as::<_, Role>("SELECT id, name, display_name FROM roles ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn view_keys(&self, role_id: i64) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT view_key FROM role_views WHERE role_id = ? ORDER BY view_key ASC",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_view_keys(&self, role_id: i64, keys: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM role_views WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        for key in keys {
            sqlx::query("INSERT INTO role_views (role_id, view_key) VALUES (?, ?)")
                .bind(role_id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MySqlRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT `value` FROM settings WHERE `key` = ? LIMIT 1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_value(&self, key: &str, value: &str, description: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (`key`, `value`, description) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE `value` = VALUES(`value`), \
             description = COALESCE(VALUES(description), description)",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EmailAccountRepository for MySqlRepository {
    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM email_accounts WHERE LOWER(email) = LOWER(?) AND deleted_at IS NULL LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        request: &PageRequest,
        filter: Option<MailFilter>,
    ) -> Result<Page<EmailAccount>> {
        let mut where_clause = "WHERE ea.deleted_at IS NULL".to_string();
        if let Some(f) = filter {
            where_clause.push_str(" AND ");
            where_clause.push_str(&f.sql_condition("ea.email"));
        }
        let mut placeholders = 0;
        if request.search_term().is_some() {
            where_clause.push_str(
                " AND (LOWER(ea.email) LIKE ? OR \
                 LOWER(JSON_UNQUOTE(JSON_EXTRACT(ea.provider_config, '$.imap_user'))) LIKE ?)",
            );
            placeholders = 2;
        }
        let count_sql = format!("SELECT COUNT(*) FROM email_accounts ea {}", where_clause);
        let select_sql = format!(
            "{} {} ORDER BY ea.created_at DESC, ea.id DESC {}",
            ACCOUNT_SELECT,
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<EmailAccount>> {
        let sql = format!("{} WHERE ea.id = ? AND ea.deleted_at IS NULL", ACCOUNT_SELECT);
        Ok(sqlx::query_as::<_, EmailAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, input: &EmailAccountInput) -> Result<i64> {
        let config = config_json(&input.provider_config())?;
        let existing: Option<(i64, i64)> = sqlx::query_as(
            "SELECT id, CAST(deleted_at IS NOT NULL AS SIGNED) FROM email_accounts \
             WHERE LOWER(email) = LOWER(?) LIMIT 1",
        )
        .bind(&input.email)
        .fetch_optional(&self.pool)
        .await?;
        match existing {
            Some((_, 0)) => Err(DbError::Conflict(input.email.clone())),
            Some((id, _)) => {
                sqlx::query(
                    "UPDATE email_accounts SET provider_config = ?, enabled = 1, deleted_at = NULL, \
                     sync_status = 'pending', updated_at = NOW() WHERE id = ?",
                )
                .bind(config)
                .bind(id)
                .execute(&self.pool)
                .await?;
                Ok(id)
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO email_accounts (email, type, provider_config, enabled, sync_status) \
                     VALUES (?, 'imap', ?, 1, 'pending')",
                )
                .bind(&input.email)
                .bind(config)
                .execute(&self.pool)
                .await?;
                Ok(result.last_insert_id() as i64)
            }
        }
    }

    async fn update(&self, id: i64, input: &EmailAccountInput) -> Result<bool> {
        let taken: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM email_accounts WHERE LOWER(email) = LOWER(?) AND id != ? \
             AND deleted_at IS NULL LIMIT 1",
        )
        .bind(&input.email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        if taken.is_some() {
            return Err(DbError::Conflict(input.email.clone()));
        }
        let mut config = input.provider_config();
        if input.imap_password.is_none() {
            let stored: Option<Option<String>> = sqlx::query_scalar(
                "SELECT JSON_UNQUOTE(JSON_EXTRACT(provider_config, '$.imap_password')) \
                 FROM email_accounts WHERE id = ? AND deleted_at IS NULL",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            match stored {
                Some(password) => config.imap_password = password.unwrap_or_default(),
                None => return Ok(false),
            }
        }
        let result = sqlx::query(
            "UPDATE email_accounts SET email = ?, provider_config = ?, updated_at = NOW() \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&input.email)
        .bind(config_json(&config)?)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE email_accounts SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE email_accounts SET enabled = ?, updated_at = NOW() \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(enabled)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn bulk_insert(&self, emails: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for email in emails {
            // 已删除的行恢复，在用的行保持不变
            let result = sqlx::query(
                "INSERT INTO email_accounts (email, type, enabled, sync_status) \
                 VALUES (?, 'imap', 1, 'pending') \
                 ON DUPLICATE KEY UPDATE enabled = IF(deleted_at IS NULL, enabled, 1), \
                 updated_at = IF(deleted_at IS NULL, updated_at, NOW()), deleted_at = NULL",
            )
            .bind(email)
            .execute(&mut *tx)
            .await?;
            // 插入为 1，恢复为 2，未变化为 0
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

const ACCOUNT_SELECT: &str = "SELECT ea.id, ea.email, ea.type, \
     COALESCE(JSON_UNQUOTE(JSON_EXTRACT(ea.provider_config, '$.imap_server')), '') AS imap_server, \
     CAST(COALESCE(JSON_EXTRACT(ea.provider_config, '$.imap_port'), 993) AS SIGNED) AS imap_port, \
     COALESCE(JSON_UNQUOTE(JSON_EXTRACT(ea.provider_config, '$.imap_user')), '') AS imap_user, \
     ea.enabled, ea.sync_status, ea.last_sync_at, ea.created_at, ea.updated_at, \
     (SELECT COUNT(*) FROM user_access ua WHERE LOWER(ua.email) = LOWER(ea.email) \
      AND ua.enabled = 1) AS access_count \
     FROM email_accounts ea";

#[async_trait]
impl ActivityRepository for MySqlRepository {
    async fn log(
        &self,
        user_id: i64,
        username: &str,
        action: ActivityAction,
        description: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_activity_log (user_id, username, action, description) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(username)
        .bind(action.as_str())
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, request: &PageRequest, ascending: bool) -> Result<Page<ActivityEntry>> {
        let order = if ascending { "ASC" } else { "DESC" };
        let (where_clause, placeholders) = if request.search_term().is_some() {
            ("WHERE (LOWER(username) LIKE ? OR LOWER(description) LIKE ?)", 2)
        } else {
            ("", 0)
        };
        let count_sql = format!("SELECT COUNT(*) FROM user_activity_log {}", where_clause);
        let select_sql = format!(
            "SELECT id, user_id, username, action, description, created_at FROM user_activity_log {} \
             ORDER BY created_at {order}, id {order} {}",
            where_clause,
            limit_clause(request)
        );
        self.paginate(&count_sql, &select_sql, placeholders, request)
            .await
    }
}
