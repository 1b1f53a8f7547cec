use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

pub type LinkId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LinkEntity {
    pub id: LinkId,
    pub user_id: UserId,
    pub title: String,
    pub url: String,
    pub visible: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub title: String,
    pub url: String,
    pub visible: bool,
    pub sort_order: i32,
}

/// 已有链接的字段变更，`None` 保留原值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkChanges {
    pub title: Option<String>,
    pub url: Option<String>,
    pub visible: Option<bool>,
}

impl LinkChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(self, link: &mut LinkEntity) {
        if let Some(title) = self.title {
            link.title = title;
        }
        if let Some(url) = self.url {
            link.url = url;
        }
        if let Some(visible) = self.visible {
            link.visible = visible;
        }
    }
}
