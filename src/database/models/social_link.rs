use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

pub type SocialLinkId = i64;

/// 社交平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Instagram,
    Youtube,
    Tiktok,
    Linkedin,
    Github,
    Facebook,
    Twitch,
    Snapchat,
    Discord,
    Whatsapp,
    Email,
    Website,
}

impl Platform {
    pub const ALL: [Platform; 13] = [
        Platform::Twitter,
        Platform::Instagram,
        Platform::Youtube,
        Platform::Tiktok,
        Platform::Linkedin,
        Platform::Github,
        Platform::Facebook,
        Platform::Twitch,
        Platform::Snapchat,
        Platform::Discord,
        Platform::Whatsapp,
        Platform::Email,
        Platform::Website,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
            Self::Tiktok => "tiktok",
            Self::Linkedin => "linkedin",
            Self::Github => "github",
            Self::Facebook => "facebook",
            Self::Twitch => "twitch",
            Self::Snapchat => "snapchat",
            Self::Discord => "discord",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Website => "website",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

impl TryFrom<String> for Platform {
    type Error = UnknownPlatform;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SocialLinkEntity {
    pub id: SocialLinkId,
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub platform: Platform,
    pub url: String,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSocialLink {
    pub platform: Platform,
    pub url: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialLinkChanges {
    pub platform: Option<Platform>,
    pub url: Option<String>,
    pub visible: Option<bool>,
}

impl SocialLinkChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(self, social: &mut SocialLinkEntity) {
        if let Some(platform) = self.platform {
            social.platform = platform;
        }
        if let Some(url) = self.url {
            social.url = url;
        }
        if let Some(visible) = self.visible {
            social.visible = visible;
        }
    }
}
