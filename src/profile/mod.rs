//! 资料领域逻辑：读取、同步与公开投影

mod locks;
pub mod projection;
pub mod reconcile;
pub mod submission;

pub use locks::OwnerLocks;
pub use projection::PublicProfile;
pub use reconcile::{CollectionReport, ProfileReconciler, ReconcileOutcome, ReconcileReport};
pub use submission::ProfileSubmission;

use crate::database::{LinkEntity, SocialLinkEntity, Store, UserEntity, UserId};
use crate::error::AppResult;

/// 用户及其子集合的完整快照
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: UserEntity,
    pub links: Vec<LinkEntity>,
    pub social_links: Vec<SocialLinkEntity>,
}

/// 读取 `owner` 的完整资料，用户不存在时返回 `None`
pub async fn load_profile(store: &dyn Store, owner: UserId) -> AppResult<Option<Profile>> {
    let Some(user) = store.find_user_by_id(owner).await? else {
        return Ok(None);
    };
    Ok(Some(load_children(store, user).await?))
}

pub(crate) async fn load_children(store: &dyn Store, user: UserEntity) -> AppResult<Profile> {
    let (links, social_links) =
        futures_util::try_join!(store.list_links(user.id), store.list_social_links(user.id))?;

    Ok(Profile {
        user,
        links,
        social_links,
    })
}
