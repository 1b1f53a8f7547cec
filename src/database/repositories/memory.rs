use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::database::{
    LinkChanges, LinkEntity, LinkId, NewLink, NewSocialLink, NewUser, Platform, SocialLinkChanges,
    SocialLinkEntity, SocialLinkId, Store, StoreError, StoreResult, Theme, UserEntity, UserId,
    UserUpdate,
};

/// 备用内存存储的起始 id，远高于主库序列可能达到的范围
pub const FALLBACK_ID_START: i64 = 1_000_000_000_000_000;

#[derive(Debug)]
struct MemoryState {
    users: BTreeMap<UserId, UserEntity>,
    links: BTreeMap<LinkId, LinkEntity>,
    social_links: BTreeMap<SocialLinkId, SocialLinkEntity>,
    next_id: i64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl MemoryState {
    fn starting_at(first_id: i64) -> Self {
        Self {
            users: BTreeMap::new(),
            links: BTreeMap::new(),
            social_links: BTreeMap::new(),
            next_id: first_id,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// 内存存储，与 Postgres 实现遵守同一契约。
///
/// 用于测试以及主库不可用时的降级。
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `first_id` 开始分配 id。作为主库的备用存储时使用
    /// [`FALLBACK_ID_START`]，避免与主库的 id 重叠。
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            state: RwLock::new(MemoryState::starting_at(first_id)),
        }
    }

    /// 预置演示用户 `demo` 及其链接
    pub async fn seed_demo(&self, password_hash: String) -> StoreResult<UserEntity> {
        let user = self
            .create_user(NewUser {
                username: "demo".into(),
                email: "demo@example.com".into(),
                password_hash,
                display_name: "Demo User".into(),
            })
            .await?;

        let user = self
            .update_user(
                user.id,
                UserUpdate {
                    bio: Some("Welcome to LinkTree!".into()),
                    ..Default::default()
                },
            )
            .await?;

        for (sort_order, (title, url)) in [
            ("Instagram", "https://instagram.com"),
            ("YouTube", "https://youtube.com"),
            ("Twitter", "https://twitter.com"),
        ]
        .into_iter()
        .enumerate()
        {
            self.create_link(
                user.id,
                NewLink {
                    title: title.into(),
                    url: url.into(),
                    visible: true,
                    sort_order: sort_order as i32,
                },
            )
            .await?;
        }

        for (platform, url) in [
            (Platform::Twitter, "https://twitter.com"),
            (Platform::Instagram, "https://instagram.com"),
        ] {
            self.create_social_link(
                user.id,
                NewSocialLink {
                    platform,
                    url: url.into(),
                    visible: true,
                },
            )
            .await?;
        }

        tracing::info!("Seeded demo profile into memory store");
        Ok(user)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<UserEntity>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>> {
        let username = username.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserEntity>> {
        let email = email.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserEntity> {
        let mut state = self.state.write().await;
        let username = user.username.to_lowercase();
        let email = user.email.to_lowercase();

        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict { field: "username" });
        }
        if state.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict { field: "email" });
        }

        let now = Utc::now();
        let entity = UserEntity {
            id: state.allocate_id(),
            username,
            email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            bio: String::new(),
            show_profile_picture: true,
            profile_picture_url: None,
            theme: Theme::default(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<UserEntity> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("User", id))?;
        update.apply_to(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_links(&self, owner: UserId) -> StoreResult<Vec<LinkEntity>> {
        let state = self.state.read().await;
        let mut links: Vec<LinkEntity> = state
            .links
            .values()
            .filter(|l| l.user_id == owner)
            .cloned()
            .collect();
        links.sort_by_key(|l| (l.sort_order, l.id));
        Ok(links)
    }

    async fn create_link(&self, owner: UserId, link: NewLink) -> StoreResult<LinkEntity> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&owner) {
            return Err(StoreError::not_found("User", owner));
        }
        let entity = LinkEntity {
            id: state.allocate_id(),
            user_id: owner,
            title: link.title,
            url: link.url,
            visible: link.visible,
            sort_order: link.sort_order,
            created_at: Utc::now(),
        };
        state.links.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_link(
        &self,
        owner: UserId,
        id: LinkId,
        changes: LinkChanges,
    ) -> StoreResult<Option<LinkEntity>> {
        let mut state = self.state.write().await;
        match state.links.get_mut(&id) {
            Some(link) if link.user_id == owner => {
                changes.apply_to(link);
                Ok(Some(link.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_link(&self, owner: UserId, id: LinkId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.links.get(&id).is_some_and(|l| l.user_id == owner) {
            state.links.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_social_links(&self, owner: UserId) -> StoreResult<Vec<SocialLinkEntity>> {
        let state = self.state.read().await;
        Ok(state
            .social_links
            .values()
            .filter(|s| s.user_id == owner)
            .cloned()
            .collect())
    }

    async fn create_social_link(
        &self,
        owner: UserId,
        social: NewSocialLink,
    ) -> StoreResult<SocialLinkEntity> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&owner) {
            return Err(StoreError::not_found("User", owner));
        }
        let entity = SocialLinkEntity {
            id: state.allocate_id(),
            user_id: owner,
            platform: social.platform,
            url: social.url,
            visible: social.visible,
            created_at: Utc::now(),
        };
        state.social_links.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_social_link(
        &self,
        owner: UserId,
        id: SocialLinkId,
        changes: SocialLinkChanges,
    ) -> StoreResult<Option<SocialLinkEntity>> {
        let mut state = self.state.write().await;
        match state.social_links.get_mut(&id) {
            Some(social) if social.user_id == owner => {
                changes.apply_to(social);
                Ok(Some(social.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_social_link(&self, owner: UserId, id: SocialLinkId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.social_links.get(&id).is_some_and(|s| s.user_id == owner) {
            state.social_links.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
            display_name: username.into(),
        }
    }

    #[tokio::test]
    async fn usernames_and_emails_are_unique_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user(new_user("Alice", "a@x.com")).await.unwrap();

        let err = store
            .create_user(new_user("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));

        let err = store.create_user(new_user("bob", "A@X.COM")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email" }));

        let found = store.find_user_by_username("ALICE").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn child_mutations_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        let bob = store.create_user(new_user("bob", "b@x.com")).await.unwrap();

        let link = store
            .create_link(
                bob.id,
                NewLink {
                    title: "B".into(),
                    url: "https://b".into(),
                    visible: true,
                    sort_order: 0,
                },
            )
            .await
            .unwrap();

        let changes = LinkChanges {
            title: Some("hijacked".into()),
            ..Default::default()
        };
        assert!(store.update_link(alice.id, link.id, changes).await.unwrap().is_none());
        assert!(!store.delete_link(alice.id, link.id).await.unwrap());

        let links = store.list_links(bob.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "B");
    }

    #[tokio::test]
    async fn links_are_listed_in_sort_order() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("carol", "c@x.com")).await.unwrap();
        for (title, sort_order) in [("second", 1), ("first", 0), ("third", 2)] {
            store
                .create_link(
                    user.id,
                    NewLink {
                        title: title.into(),
                        url: "https://example.com".into(),
                        visible: true,
                        sort_order,
                    },
                )
                .await
                .unwrap();
        }

        let titles: Vec<String> = store
            .list_links(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn lookups_fold_non_ascii_case() {
        let store = MemoryStore::new();
        store.create_user(new_user("jose", "JOSÉ@x.com")).await.unwrap();

        let found = store.find_user_by_email("José@X.com").await.unwrap().unwrap();
        assert_eq!(found.email, "josé@x.com");

        let err = store.create_user(new_user("other", "josé@X.COM")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email" }));
    }

    #[tokio::test]
    async fn offset_store_allocates_ids_from_start() {
        let store = MemoryStore::starting_at(FALLBACK_ID_START);
        let user = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        assert_eq!(user.id, FALLBACK_ID_START);
        assert!(store.find_user_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn seeded_demo_profile_is_complete() {
        let store = MemoryStore::new();
        let demo = store.seed_demo("hash".into()).await.unwrap();
        assert_eq!(demo.bio, "Welcome to LinkTree!");
        assert_eq!(store.list_links(demo.id).await.unwrap().len(), 3);
        assert_eq!(store.list_social_links(demo.id).await.unwrap().len(), 2);
    }
}
