//! 存储层
//!
//! 所有处理器只通过 [`Store`] 访问数据。Postgres 实现与内存实现遵守同一契约，
//! [`FallbackStore`] 在主库不可用时自动切换到内存实现。

use async_trait::async_trait;

pub mod models;
pub mod repositories;

pub use models::*;
pub use repositories::{FALLBACK_ID_START, FallbackStore, MemoryStore, PgStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 唯一约束冲突，`field` 为冲突字段
    #[error("{field} already exists")]
    Conflict { field: &'static str },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// 暂时不可用（重试耗尽后）
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 用户及其子集合（链接、社交链接）的存储契约。
///
/// 子集合的所有修改操作都以 `owner` 为范围：不属于该用户的记录视为不存在。
#[async_trait]
pub trait Store: Send + Sync {
    /// 健康检查
    async fn ping(&self) -> StoreResult<()>;

    /// 当前实际提供服务的后端名称
    fn backend(&self) -> &'static str;

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<UserEntity>>;

    /// 用户名查找不区分大小写
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>>;

    /// 邮箱查找不区分大小写
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserEntity>>;

    /// 用户名或邮箱已存在时返回 [`StoreError::Conflict`]
    async fn create_user(&self, user: NewUser) -> StoreResult<UserEntity>;

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<UserEntity>;

    /// 按 `(sort_order, id)` 排序
    async fn list_links(&self, owner: UserId) -> StoreResult<Vec<LinkEntity>>;

    async fn create_link(&self, owner: UserId, link: NewLink) -> StoreResult<LinkEntity>;

    /// 记录不存在或不属于 `owner` 时返回 `None`
    async fn update_link(
        &self,
        owner: UserId,
        id: LinkId,
        changes: LinkChanges,
    ) -> StoreResult<Option<LinkEntity>>;

    async fn delete_link(&self, owner: UserId, id: LinkId) -> StoreResult<bool>;

    /// 按 `id` 排序
    async fn list_social_links(&self, owner: UserId) -> StoreResult<Vec<SocialLinkEntity>>;

    async fn create_social_link(
        &self,
        owner: UserId,
        social: NewSocialLink,
    ) -> StoreResult<SocialLinkEntity>;

    async fn update_social_link(
        &self,
        owner: UserId,
        id: SocialLinkId,
        changes: SocialLinkChanges,
    ) -> StoreResult<Option<SocialLinkEntity>>;

    async fn delete_social_link(&self, owner: UserId, id: SocialLinkId) -> StoreResult<bool>;
}
