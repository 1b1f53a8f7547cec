use serde::Serialize;

use super::{Profile, load_children};
use crate::database::{Platform, Store, Theme};
use crate::error::{AppError, AppResult};
use crate::utils::normalize_url;

/// 公开页面上的链接
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicLink {
    pub id: String,
    pub title: String,
    pub url: String,
    /// 补全协议后的跳转地址
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicSocialLink {
    pub id: String,
    pub platform: Platform,
    pub url: String,
    pub href: String,
}

/// 公开资料：不含邮箱、密码哈希与隐藏项
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub theme: Theme,
    pub show_profile_picture: bool,
    pub profile_picture_url: Option<String>,
    pub links: Vec<PublicLink>,
    pub social_links: Vec<PublicSocialLink>,
}

impl From<Profile> for PublicProfile {
    fn from(profile: Profile) -> Self {
        let Profile {
            user,
            links,
            social_links,
        } = profile;

        Self {
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            theme: user.theme,
            show_profile_picture: user.show_profile_picture,
            profile_picture_url: user.profile_picture_url,
            links: links
                .into_iter()
                .filter(|link| link.visible)
                .map(|link| PublicLink {
                    id: link.id.to_string(),
                    href: normalize_url(&link.url),
                    title: link.title,
                    url: link.url,
                })
                .collect(),
            social_links: social_links
                .into_iter()
                .filter(|social| social.visible)
                .map(|social| PublicSocialLink {
                    id: social.id.to_string(),
                    platform: social.platform,
                    href: normalize_url(&social.url),
                    url: social.url,
                })
                .collect(),
        }
    }
}

/// 按用户名读取公开资料
pub async fn public_profile(store: &dyn Store, username: &str) -> AppResult<PublicProfile> {
    let user = store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(load_children(store, user).await?.into())
}
