use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::database::{
    LinkChanges, LinkEntity, LinkId, NewLink, NewSocialLink, NewUser, SocialLinkChanges,
    SocialLinkEntity, SocialLinkId, Store, StoreError, StoreResult, UserEntity, UserId, UserUpdate,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, bio, \
     show_profile_picture, profile_picture_url, theme, created_at, updated_at";
const LINK_COLUMNS: &str = "id, user_id, title, url, visible, sort_order, created_at";
const SOCIAL_LINK_COLUMNS: &str = "id, user_id, platform, url, visible, created_at";

// Postgres 错误码
const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Postgres 存储实现
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    retry_attempts: u32,
}

impl PgStore {
    pub fn new(pool: PgPool, retry_attempts: u32) -> Self {
        Self {
            pool,
            retry_attempts: retry_attempts.max(1),
        }
    }

    /// 执行内嵌的数据库迁移
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// 对暂时性错误（连接中断、连接池超时、序列化冲突）进行重试
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.retry(operation, Retry::Idempotent, f).await
    }

    /// 插入语句：连接中断时无法确定是否已提交，只重试确定未执行的错误
    async fn insert_with_retry<T, F, Fut>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.retry(operation, Retry::NotApplied, f).await
    }

    async fn retry<T, F, Fut>(&self, operation: &'static str, policy: Retry, f: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e, policy) && attempt < self.retry_attempts => {
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        operation,
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(map_sqlx_error(e)),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// 重复执行无副作用
    Idempotent,
    /// 仅重试语句确定未生效的错误
    NotApplied,
}

fn is_transient(err: &sqlx::Error, policy: Retry) -> bool {
    match err {
        sqlx::Error::Io(_) => policy == Retry::Idempotent,
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ),
        _ => false,
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => "email",
                Some(c) if c.contains("username") => "username",
                _ => "record",
            };
            return StoreError::Conflict { field };
        }
    }

    if matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    ) {
        return StoreError::Unavailable(err.to_string());
    }

    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<UserEntity>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.with_retry("find_user_by_id", || {
            sqlx::query_as::<_, UserEntity>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let username = username.to_lowercase();
        self.with_retry("find_user_by_username", || {
            sqlx::query_as::<_, UserEntity>(&sql)
                .bind(&username)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserEntity>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let email = email.to_lowercase();
        self.with_retry("find_user_by_email", || {
            sqlx::query_as::<_, UserEntity>(&sql)
                .bind(&email)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserEntity> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, display_name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let username = user.username.to_lowercase();
        let email = user.email.to_lowercase();
        let created = self
            .insert_with_retry("create_user", || {
                sqlx::query_as::<_, UserEntity>(&sql)
                    .bind(&username)
                    .bind(&email)
                    .bind(&user.password_hash)
                    .bind(&user.display_name)
                    .fetch_one(&self.pool)
            })
            .await?;

        tracing::info!("Created user {} ({})", created.username, created.id);
        Ok(created)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<UserEntity> {
        let sql = format!(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                show_profile_picture = COALESCE($4, show_profile_picture),
                profile_picture_url = CASE WHEN $5 THEN $6 ELSE profile_picture_url END,
                theme = COALESCE($7, theme),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let clear_or_set_picture = update.profile_picture_url.is_some();
        let picture_url = update.profile_picture_url.clone().flatten();

        self.with_retry("update_user", || {
            sqlx::query_as::<_, UserEntity>(&sql)
                .bind(id)
                .bind(&update.display_name)
                .bind(&update.bio)
                .bind(update.show_profile_picture)
                .bind(clear_or_set_picture)
                .bind(&picture_url)
                .bind(update.theme.as_ref().map(Json))
                .fetch_optional(&self.pool)
        })
        .await?
        .ok_or_else(|| StoreError::not_found("User", id))
    }

    async fn list_links(&self, owner: UserId) -> StoreResult<Vec<LinkEntity>> {
        let sql =
            format!("SELECT {LINK_COLUMNS} FROM links WHERE user_id = $1 ORDER BY sort_order, id");
        self.with_retry("list_links", || {
            sqlx::query_as::<_, LinkEntity>(&sql)
                .bind(owner)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn create_link(&self, owner: UserId, link: NewLink) -> StoreResult<LinkEntity> {
        let sql = format!(
            "INSERT INTO links (user_id, title, url, visible, sort_order) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {LINK_COLUMNS}"
        );
        self.insert_with_retry("create_link", || {
            sqlx::query_as::<_, LinkEntity>(&sql)
                .bind(owner)
                .bind(&link.title)
                .bind(&link.url)
                .bind(link.visible)
                .bind(link.sort_order)
                .fetch_one(&self.pool)
        })
        .await
    }

    async fn update_link(
        &self,
        owner: UserId,
        id: LinkId,
        changes: LinkChanges,
    ) -> StoreResult<Option<LinkEntity>> {
        let sql = format!(
            "UPDATE links SET \
                title = COALESCE($3, title), \
                url = COALESCE($4, url), \
                visible = COALESCE($5, visible) \
             WHERE id = $1 AND user_id = $2 RETURNING {LINK_COLUMNS}"
        );
        self.with_retry("update_link", || {
            sqlx::query_as::<_, LinkEntity>(&sql)
                .bind(id)
                .bind(owner)
                .bind(&changes.title)
                .bind(&changes.url)
                .bind(changes.visible)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn delete_link(&self, owner: UserId, id: LinkId) -> StoreResult<bool> {
        let result = self
            .with_retry("delete_link", || {
                sqlx::query("DELETE FROM links WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(owner)
                    .execute(&self.pool)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_social_links(&self, owner: UserId) -> StoreResult<Vec<SocialLinkEntity>> {
        let sql = format!("SELECT {SOCIAL_LINK_COLUMNS} FROM social_links WHERE user_id = $1 ORDER BY id");
        self.with_retry("list_social_links", || {
            sqlx::query_as::<_, SocialLinkEntity>(&sql)
                .bind(owner)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn create_social_link(
        &self,
        owner: UserId,
        social: NewSocialLink,
    ) -> StoreResult<SocialLinkEntity> {
        let sql = format!(
            "INSERT INTO social_links (user_id, platform, url, visible) \
             VALUES ($1, $2, $3, $4) RETURNING {SOCIAL_LINK_COLUMNS}"
        );
        self.insert_with_retry("create_social_link", || {
            sqlx::query_as::<_, SocialLinkEntity>(&sql)
                .bind(owner)
                .bind(social.platform.as_str())
                .bind(&social.url)
                .bind(social.visible)
                .fetch_one(&self.pool)
        })
        .await
    }

    async fn update_social_link(
        &self,
        owner: UserId,
        id: SocialLinkId,
        changes: SocialLinkChanges,
    ) -> StoreResult<Option<SocialLinkEntity>> {
        let sql = format!(
            "UPDATE social_links SET \
                platform = COALESCE($3, platform), \
                url = COALESCE($4, url), \
                visible = COALESCE($5, visible) \
             WHERE id = $1 AND user_id = $2 RETURNING {SOCIAL_LINK_COLUMNS}"
        );
        let platform = changes.platform.map(|p| p.as_str());
        self.with_retry("update_social_link", || {
            sqlx::query_as::<_, SocialLinkEntity>(&sql)
                .bind(id)
                .bind(owner)
                .bind(platform)
                .bind(&changes.url)
                .bind(changes.visible)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn delete_social_link(&self, owner: UserId, id: SocialLinkId) -> StoreResult<bool> {
        let result = self
            .with_retry("delete_social_link", || {
                sqlx::query("DELETE FROM social_links WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(owner)
                    .execute(&self.pool)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> sqlx::Error {
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ))
    }

    #[test]
    fn connection_loss_is_retried_only_for_idempotent_statements() {
        assert!(is_transient(&io_error(), Retry::Idempotent));
        assert!(!is_transient(&io_error(), Retry::NotApplied));
    }

    #[test]
    fn pool_timeout_is_always_retried() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut, Retry::Idempotent));
        assert!(is_transient(&sqlx::Error::PoolTimedOut, Retry::NotApplied));
        assert!(!is_transient(&sqlx::Error::RowNotFound, Retry::Idempotent));
    }

    #[test]
    fn connection_errors_map_to_unavailable() {
        assert!(matches!(map_sqlx_error(io_error()), StoreError::Unavailable(_)));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
