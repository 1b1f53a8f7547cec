use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Theme;

pub type UserId = i64;

/// 用户数据库实体
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserEntity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub bio: String,
    pub show_profile_picture: bool,
    pub profile_picture_url: Option<String>,
    #[sqlx(json)]
    pub theme: Theme,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 注册时提供的字段，用户名与邮箱由存储层转为小写
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

/// 资料属性的部分更新，`None` 表示保持不变
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub show_profile_picture: Option<bool>,
    /// `Some(None)` 清空头像地址
    pub profile_picture_url: Option<Option<String>>,
    pub theme: Option<Theme>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(self, user: &mut UserEntity) {
        if let Some(display_name) = self.display_name {
            user.display_name = display_name;
        }
        if let Some(bio) = self.bio {
            user.bio = bio;
        }
        if let Some(show) = self.show_profile_picture {
            user.show_profile_picture = show;
        }
        if let Some(url) = self.profile_picture_url {
            user.profile_picture_url = url;
        }
        if let Some(theme) = self.theme {
            user.theme = theme;
        }
    }
}
