//! 资料同步
//!
//! 把客户端提交的完整资料与已存储的子集合逐项比对，只执行必要的
//! 新建、更新、删除。同一文档重复提交不会产生任何写入。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::submission::{LinkSubmission, ProfileSubmission, SocialLinkSubmission};
use super::{OwnerLocks, Profile, load_profile};
use crate::database::{
    LinkChanges, LinkEntity, NewLink, NewSocialLink, SocialLinkChanges, SocialLinkEntity, Store,
    UserEntity, UserId, UserUpdate,
};
use crate::error::{AppError, AppResult};

/// 已存储的子记录
pub trait StoredRecord {
    fn record_id(&self) -> i64;
}

impl StoredRecord for LinkEntity {
    fn record_id(&self) -> i64 {
        self.id
    }
}

impl StoredRecord for SocialLinkEntity {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// 提交的子记录
pub trait SubmittedRecord {
    type Stored: StoredRecord;
    type Changes;
    type Draft;

    fn submitted_id(&self) -> Option<i64>;

    /// 与已存储记录的差异；无差异时返回 `None`
    fn changes_against(&self, stored: &Self::Stored) -> Option<Self::Changes>;

    /// 满足新建条件时返回草稿
    fn draft(&self) -> Option<Self::Draft>;
}

fn changed<T: PartialEq + Clone>(submitted: &Option<T>, stored: &T) -> Option<T> {
    submitted.as_ref().filter(|value| *value != stored).cloned()
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.is_empty())
}

impl SubmittedRecord for LinkSubmission {
    type Stored = LinkEntity;
    type Changes = LinkChanges;
    type Draft = LinkSubmission;

    fn submitted_id(&self) -> Option<i64> {
        self.id.as_ref().and_then(|id| id.server_id())
    }

    fn changes_against(&self, stored: &LinkEntity) -> Option<LinkChanges> {
        let changes = LinkChanges {
            title: changed(&self.title, &stored.title),
            url: changed(&self.url, &stored.url),
            visible: changed(&self.visible, &stored.visible),
        };
        (!changes.is_empty()).then_some(changes)
    }

    fn draft(&self) -> Option<LinkSubmission> {
        non_empty(&self.title)?;
        non_empty(&self.url)?;
        Some(self.clone())
    }
}

impl SubmittedRecord for SocialLinkSubmission {
    type Stored = SocialLinkEntity;
    type Changes = SocialLinkChanges;
    type Draft = NewSocialLink;

    fn submitted_id(&self) -> Option<i64> {
        self.id.as_ref().and_then(|id| id.server_id())
    }

    fn changes_against(&self, stored: &SocialLinkEntity) -> Option<SocialLinkChanges> {
        let changes = SocialLinkChanges {
            platform: changed(&self.platform, &stored.platform),
            url: changed(&self.url, &stored.url),
            visible: changed(&self.visible, &stored.visible),
        };
        (!changes.is_empty()).then_some(changes)
    }

    fn draft(&self) -> Option<NewSocialLink> {
        Some(NewSocialLink {
            platform: self.platform?,
            url: non_empty(&self.url)?.clone(),
            visible: self.visible.unwrap_or(true),
        })
    }
}

/// 单个子集合的同步计划
#[derive(Debug)]
pub struct CollectionPlan<C, D> {
    pub deletes: Vec<i64>,
    pub updates: Vec<(i64, C)>,
    pub creates: Vec<D>,
    pub skipped: usize,
}

/// 计算同步计划。
///
/// 只有当前用户已存储的 id 才会被匹配，因此他人的记录不可能进入更新或删除列表。
pub fn plan_collection<S: SubmittedRecord>(
    stored: &[S::Stored],
    submitted: &[S],
) -> CollectionPlan<S::Changes, S::Draft> {
    let by_id: HashMap<i64, &S::Stored> = stored.iter().map(|r| (r.record_id(), r)).collect();
    let mut seen = HashSet::new();
    let mut plan = CollectionPlan {
        deletes: Vec::new(),
        updates: Vec::new(),
        creates: Vec::new(),
        skipped: 0,
    };

    for entry in submitted {
        match entry.submitted_id().and_then(|id| by_id.get(&id).map(|r| (id, *r))) {
            Some((id, existing)) => {
                // 同一 id 重复出现时只处理第一次
                if !seen.insert(id) {
                    plan.skipped += 1;
                    continue;
                }
                if let Some(changes) = entry.changes_against(existing) {
                    plan.updates.push((id, changes));
                }
            }
            None => match entry.draft() {
                Some(draft) => plan.creates.push(draft),
                None => plan.skipped += 1,
            },
        }
    }

    plan.deletes = stored
        .iter()
        .map(StoredRecord::record_id)
        .filter(|id| !seen.contains(id))
        .collect();

    plan
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CollectionReport {
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub profile_updated: bool,
    pub links: CollectionReport,
    pub social_links: CollectionReport,
}

impl ReconcileReport {
    /// 本次同步没有任何写入
    pub fn is_noop(&self) -> bool {
        !self.profile_updated && self.links.writes() == 0 && self.social_links.writes() == 0
    }
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub profile: Profile,
    pub report: ReconcileReport,
}

/// 只保留与已存储值不同的顶层字段
fn user_update(submission: &ProfileSubmission, user: &UserEntity) -> UserUpdate {
    UserUpdate {
        display_name: changed(&submission.display_name, &user.display_name),
        bio: submission
            .bio
            .as_ref()
            .map(|bio| bio.clone().unwrap_or_default())
            .filter(|bio| *bio != user.bio),
        show_profile_picture: changed(&submission.show_profile_picture, &user.show_profile_picture),
        profile_picture_url: changed(&submission.profile_picture_url, &user.profile_picture_url),
        theme: changed(&submission.theme, &user.theme),
    }
}

/// 资料同步器
pub struct ProfileReconciler<'a> {
    store: &'a dyn Store,
    locks: &'a OwnerLocks,
}

impl<'a> ProfileReconciler<'a> {
    pub fn new(store: &'a dyn Store, locks: &'a OwnerLocks) -> Self {
        Self { store, locks }
    }

    /// 同步 `owner` 的资料并返回写入后重新读取的完整资料。
    ///
    /// 校验在任何写入前完成；之后每一项写入相互独立，单项失败只记录不中断。
    pub async fn reconcile(
        &self,
        owner: UserId,
        submission: ProfileSubmission,
    ) -> AppResult<ReconcileOutcome> {
        submission.validate()?;

        let _guard = self.locks.acquire(owner).await;

        let user = self
            .store
            .find_user_by_id(owner)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let mut report = ReconcileReport::default();

        let update = user_update(&submission, &user);
        if !update.is_empty() {
            self.store.update_user(owner, update).await?;
            report.profile_updated = true;
        }

        if let Some(links) = &submission.links {
            report.links = self.sync_links(owner, links).await?;
        }
        if let Some(social_links) = &submission.social_links {
            report.social_links = self.sync_social_links(owner, social_links).await?;
        }

        tracing::info!(
            "Reconciled profile {}: links {:?}, social links {:?}, profile updated: {}",
            owner,
            report.links,
            report.social_links,
            report.profile_updated
        );

        let profile = load_profile(self.store, owner)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        Ok(ReconcileOutcome { profile, report })
    }

    async fn sync_links(
        &self,
        owner: UserId,
        submitted: &[LinkSubmission],
    ) -> AppResult<CollectionReport> {
        let stored = self.store.list_links(owner).await?;
        let plan = plan_collection(&stored, submitted);
        let mut report = CollectionReport {
            skipped: plan.skipped,
            ..Default::default()
        };

        for id in &plan.deletes {
            match self.store.delete_link(owner, *id).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to delete link {} of user {}: {}", id, owner, e);
                    report.failed += 1;
                }
            }
        }

        // 新链接追加到末尾
        let remaining = stored.iter().filter(|l| !plan.deletes.contains(&l.id));
        let max_sort = remaining.clone().map(|l| l.sort_order).max();
        let len = i32::try_from(remaining.count()).unwrap_or(i32::MAX);
        let mut next_sort = max_sort.map_or(len, |max| len.max(max.saturating_add(1)));

        for (id, changes) in plan.updates {
            match self.store.update_link(owner, id, changes).await {
                Ok(Some(_)) => report.updated += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to update link {} of user {}: {}", id, owner, e);
                    report.failed += 1;
                }
            }
        }

        for draft in plan.creates {
            let link = NewLink {
                title: draft.title.unwrap_or_default(),
                url: draft.url.unwrap_or_default(),
                visible: draft.visible.unwrap_or(true),
                sort_order: next_sort,
            };
            match self.store.create_link(owner, link).await {
                Ok(_) => {
                    report.created += 1;
                    next_sort = next_sort.saturating_add(1);
                }
                Err(e) => {
                    tracing::warn!("Failed to create link for user {}: {}", owner, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn sync_social_links(
        &self,
        owner: UserId,
        submitted: &[SocialLinkSubmission],
    ) -> AppResult<CollectionReport> {
        let stored = self.store.list_social_links(owner).await?;
        let plan = plan_collection(&stored, submitted);
        let mut report = CollectionReport {
            skipped: plan.skipped,
            ..Default::default()
        };

        for id in plan.deletes {
            match self.store.delete_social_link(owner, id).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to delete social link {} of user {}: {}", id, owner, e);
                    report.failed += 1;
                }
            }
        }

        for (id, changes) in plan.updates {
            match self.store.update_social_link(owner, id, changes).await {
                Ok(Some(_)) => report.updated += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to update social link {} of user {}: {}", id, owner, e);
                    report.failed += 1;
                }
            }
        }

        for social in plan.creates {
            match self.store.create_social_link(owner, social).await {
                Ok(_) => report.created += 1,
                Err(e) => {
                    tracing::warn!("Failed to create social link for user {}: {}", owner, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, NewUser, Platform};
    use crate::profile::submission::WireId;

    async fn store_with_user(username: &str) -> (MemoryStore, UserId) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: username.into(),
                email: format!("{}@x.com", username),
                password_hash: "hash".into(),
                display_name: username.into(),
            })
            .await
            .unwrap();
        (store, user.id)
    }

    async fn add_link(store: &MemoryStore, owner: UserId, title: &str, visible: bool) -> LinkEntity {
        let sort_order = store.list_links(owner).await.unwrap().len() as i32;
        store
            .create_link(
                owner,
                NewLink {
                    title: title.into(),
                    url: format!("https://{}", title.to_lowercase()),
                    visible,
                    sort_order,
                },
            )
            .await
            .unwrap()
    }

    fn link(id: Option<&str>, title: &str, url: Option<&str>) -> LinkSubmission {
        LinkSubmission {
            id: id.map(|id| WireId::Text(id.into())),
            title: Some(title.into()),
            url: url.map(Into::into),
            visible: None,
        }
    }

    #[tokio::test]
    async fn diff_updates_deletes_and_creates() {
        let (store, owner) = store_with_user("alice").await;
        let locks = OwnerLocks::new();
        let a = add_link(&store, owner, "A", true).await;
        let b = add_link(&store, owner, "B", true).await;

        let submission = ProfileSubmission {
            links: Some(vec![
                link(Some(&a.id.to_string()), "A2", None),
                link(None, "C", Some("https://c")),
            ]),
            ..Default::default()
        };

        let outcome = ProfileReconciler::new(&store, &locks)
            .reconcile(owner, submission)
            .await
            .unwrap();

        let links = &outcome.profile.links;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].id, a.id);
        assert_eq!(links[0].title, "A2");
        assert_eq!(links[0].url, a.url);
        assert_eq!(links[1].title, "C");
        assert!(links[1].id != a.id && links[1].id != b.id);
        assert!(links[1].sort_order > links[0].sort_order);

        assert_eq!(
            outcome.report.links,
            CollectionReport {
                created: 1,
                updated: 1,
                deleted: 1,
                skipped: 0,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn resubmitting_canonical_state_writes_nothing() {
        let (store, owner) = store_with_user("alice").await;
        let locks = OwnerLocks::new();
        let reconciler = ProfileReconciler::new(&store, &locks);

        let first = reconciler
            .reconcile(
                owner,
                ProfileSubmission {
                    display_name: Some("Alice".into()),
                    bio: Some(Some("hello".into())),
                    links: Some(vec![
                        link(Some("1712345678901"), "Blog", Some("https://blog")),
                        link(None, "Shop", Some("shop.example.com")),
                    ]),
                    social_links: Some(vec![SocialLinkSubmission {
                        id: None,
                        platform: Some(Platform::Github),
                        url: Some("https://github.com/alice".into()),
                        visible: Some(false),
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!first.report.is_noop());

        let profile = &first.profile;
        let again = ProfileSubmission {
            display_name: Some(profile.user.display_name.clone()),
            bio: Some(Some(profile.user.bio.clone())),
            theme: Some(profile.user.theme.clone()),
            show_profile_picture: Some(profile.user.show_profile_picture),
            profile_picture_url: Some(profile.user.profile_picture_url.clone()),
            links: Some(
                profile
                    .links
                    .iter()
                    .map(|l| LinkSubmission {
                        id: Some(WireId::Text(l.id.to_string())),
                        title: Some(l.title.clone()),
                        url: Some(l.url.clone()),
                        visible: Some(l.visible),
                    })
                    .collect(),
            ),
            social_links: Some(
                profile
                    .social_links
                    .iter()
                    .map(|s| SocialLinkSubmission {
                        id: Some(WireId::Number(s.id)),
                        platform: Some(s.platform),
                        url: Some(s.url.clone()),
                        visible: Some(s.visible),
                    })
                    .collect(),
            ),
        };

        let second = reconciler.reconcile(owner, again).await.unwrap();
        assert!(second.report.is_noop(), "{:?}", second.report);
        assert_eq!(second.profile.links, first.profile.links);
        assert_eq!(second.profile.social_links, first.profile.social_links);
    }

    #[tokio::test]
    async fn other_owners_records_are_never_touched() {
        let (store, alice) = store_with_user("alice").await;
        let bob = store
            .create_user(NewUser {
                username: "bob".into(),
                email: "bob@x.com".into(),
                password_hash: "hash".into(),
                display_name: "bob".into(),
            })
            .await
            .unwrap()
            .id;
        let locks = OwnerLocks::new();
        let bobs = add_link(&store, bob, "Bob", true).await;

        // 带着 bob 的 id 但缺少 url：不能更新，也不满足新建条件
        let submission = ProfileSubmission {
            links: Some(vec![link(Some(&bobs.id.to_string()), "stolen", None)]),
            ..Default::default()
        };
        let outcome = ProfileReconciler::new(&store, &locks)
            .reconcile(alice, submission)
            .await
            .unwrap();

        assert!(outcome.profile.links.is_empty());
        assert_eq!(outcome.report.links.skipped, 1);
        assert_eq!(store.list_links(bob).await.unwrap(), vec![bobs]);
    }

    #[tokio::test]
    async fn absent_collections_and_fields_are_left_alone() {
        let (store, owner) = store_with_user("alice").await;
        let locks = OwnerLocks::new();
        add_link(&store, owner, "Keep", true).await;
        store
            .update_user(
                owner,
                UserUpdate {
                    bio: Some("old bio".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = ProfileReconciler::new(&store, &locks)
            .reconcile(
                owner,
                ProfileSubmission {
                    display_name: Some("New Name".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.profile.user.display_name, "New Name");
        assert_eq!(outcome.profile.user.bio, "old bio");
        assert_eq!(outcome.profile.links.len(), 1);
    }

    #[tokio::test]
    async fn null_bio_clears_it() {
        let (store, owner) = store_with_user("alice").await;
        let locks = OwnerLocks::new();
        store
            .update_user(
                owner,
                UserUpdate {
                    bio: Some("old bio".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = ProfileReconciler::new(&store, &locks)
            .reconcile(
                owner,
                ProfileSubmission {
                    bio: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.profile.user.bio, "");
    }

    #[tokio::test]
    async fn empty_list_deletes_everything() {
        let (store, owner) = store_with_user("alice").await;
        let locks = OwnerLocks::new();
        add_link(&store, owner, "A", true).await;
        add_link(&store, owner, "B", false).await;

        let outcome = ProfileReconciler::new(&store, &locks)
            .reconcile(
                owner,
                ProfileSubmission {
                    links: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(outcome.profile.links.is_empty());
        assert_eq!(outcome.report.links.deleted, 2);
    }

    #[tokio::test]
    async fn unknown_owner_is_not_found() {
        let store = MemoryStore::new();
        let locks = OwnerLocks::new();
        let err = ProfileReconciler::new(&store, &locks)
            .reconcile(99, ProfileSubmission::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn duplicate_ids_are_processed_once() {
        let stored = vec![LinkEntity {
            id: 5,
            user_id: 1,
            title: "A".into(),
            url: "https://a".into(),
            visible: true,
            sort_order: 0,
            created_at: chrono::Utc::now(),
        }];
        let submitted = vec![link(Some("5"), "first", None), link(Some("5"), "second", None)];

        let plan = plan_collection(&stored, &submitted);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].1.title.as_deref(), Some("first"));
        assert_eq!(plan.skipped, 1);
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn incomplete_new_entries_are_skipped() {
        let stored: Vec<SocialLinkEntity> = Vec::new();
        let submitted = vec![
            SocialLinkSubmission {
                id: Some(WireId::Text("tmp".into())),
                platform: Some(Platform::Twitter),
                url: Some(String::new()),
                visible: None,
            },
            SocialLinkSubmission {
                id: None,
                platform: None,
                url: Some("https://example.com".into()),
                visible: None,
            },
        ];

        let plan = plan_collection(&stored, &submitted);
        assert!(plan.creates.is_empty());
        assert_eq!(plan.skipped, 2);
    }
}
