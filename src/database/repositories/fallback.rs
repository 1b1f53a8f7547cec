use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use crate::database::{
    LinkChanges, LinkEntity, LinkId, NewLink, NewSocialLink, NewUser, SocialLinkChanges,
    SocialLinkEntity, SocialLinkId, Store, StoreError, StoreResult, UserEntity, UserId, UserUpdate,
};

// 降级期间两次探测主库之间的最小间隔
const CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// 主库不可用时切换到备用存储的网关。
///
/// 每次调用前检查主库状态；降级期间按 [`CHECK_INTERVAL`] 重新探测，
/// 主库恢复后自动切回。调用方只看到 [`Store`] 接口。
pub struct FallbackStore {
    primary: Arc<dyn Store>,
    fallback: Arc<dyn Store>,
    available: AtomicBool,
    last_check: Mutex<Option<Instant>>,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn Store>, fallback: Arc<dyn Store>) -> Self {
        Self {
            primary,
            fallback,
            available: AtomicBool::new(true),
            last_check: Mutex::new(None),
        }
    }

    /// 启动时的健康检查
    pub async fn check_primary(&self) -> bool {
        let healthy = match self.primary.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Primary storage not available: {}", e);
                false
            }
        };
        self.available.store(healthy, Ordering::SeqCst);
        *self.last_check.lock().await = Some(Instant::now());
        healthy
    }

    pub fn is_degraded(&self) -> bool {
        !self.available.load(Ordering::SeqCst)
    }

    async fn primary_available(&self) -> bool {
        if self.available.load(Ordering::SeqCst) {
            return true;
        }

        let mut last_check = self.last_check.lock().await;
        if last_check.is_some_and(|at| at.elapsed() < CHECK_INTERVAL) {
            return false;
        }
        *last_check = Some(Instant::now());

        if self.primary.ping().await.is_ok() {
            tracing::info!("Primary storage reachable again, leaving fallback mode");
            self.available.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    async fn mark_degraded(&self, reason: &str) {
        tracing::warn!("Primary storage unavailable, using fallback: {}", reason);
        self.available.store(false, Ordering::SeqCst);
        *self.last_check.lock().await = Some(Instant::now());
    }

    async fn call<'a, T, F>(&'a self, op: F) -> StoreResult<T>
    where
        F: Fn(&'a dyn Store) -> BoxFuture<'a, StoreResult<T>> + Send + 'a,
        T: Send,
    {
        if self.primary_available().await {
            match op(self.primary.as_ref()).await {
                Err(StoreError::Unavailable(reason)) => self.mark_degraded(&reason).await,
                other => return other,
            }
        }
        op(self.fallback.as_ref()).await
    }

    /// 新建操作。主库在调用途中失败时可能已经提交，因此不重放到备用存储，
    /// 只切换状态并返回错误；之后的调用才会落到备用存储。
    async fn call_insert<'a, T, F>(&'a self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&'a dyn Store) -> BoxFuture<'a, StoreResult<T>> + Send + 'a,
        T: Send,
    {
        if !self.primary_available().await {
            return op(self.fallback.as_ref()).await;
        }

        let result = op(self.primary.as_ref()).await;
        if let Err(StoreError::Unavailable(reason)) = &result {
            self.mark_degraded(reason).await;
        }
        result
    }
}

#[async_trait]
impl Store for FallbackStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.primary_available().await {
            return Ok(());
        }
        self.fallback.ping().await
    }

    fn backend(&self) -> &'static str {
        if self.is_degraded() {
            self.fallback.backend()
        } else {
            self.primary.backend()
        }
    }

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<UserEntity>> {
        self.call(move |store| store.find_user_by_id(id)).await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>> {
        self.call(move |store| store.find_user_by_username(username))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserEntity>> {
        self.call(move |store| store.find_user_by_email(email)).await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserEntity> {
        self.call_insert(move |store| store.create_user(user)).await
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<UserEntity> {
        self.call(move |store| store.update_user(id, update.clone()))
            .await
    }

    async fn list_links(&self, owner: UserId) -> StoreResult<Vec<LinkEntity>> {
        self.call(move |store| store.list_links(owner)).await
    }

    async fn create_link(&self, owner: UserId, link: NewLink) -> StoreResult<LinkEntity> {
        self.call_insert(move |store| store.create_link(owner, link))
            .await
    }

    async fn update_link(
        &self,
        owner: UserId,
        id: LinkId,
        changes: LinkChanges,
    ) -> StoreResult<Option<LinkEntity>> {
        self.call(move |store| store.update_link(owner, id, changes.clone()))
            .await
    }

    async fn delete_link(&self, owner: UserId, id: LinkId) -> StoreResult<bool> {
        self.call(move |store| store.delete_link(owner, id)).await
    }

    async fn list_social_links(&self, owner: UserId) -> StoreResult<Vec<SocialLinkEntity>> {
        self.call(move |store| store.list_social_links(owner)).await
    }

    async fn create_social_link(
        &self,
        owner: UserId,
        social: NewSocialLink,
    ) -> StoreResult<SocialLinkEntity> {
        self.call_insert(move |store| store.create_social_link(owner, social))
            .await
    }

    async fn update_social_link(
        &self,
        owner: UserId,
        id: SocialLinkId,
        changes: SocialLinkChanges,
    ) -> StoreResult<Option<SocialLinkEntity>> {
        self.call(move |store| store.update_social_link(owner, id, changes.clone()))
            .await
    }

    async fn delete_social_link(&self, owner: UserId, id: SocialLinkId) -> StoreResult<bool> {
        self.call(move |store| store.delete_social_link(owner, id))
            .await
    }
}
