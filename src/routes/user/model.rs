use serde::Serialize;

use crate::database::{LinkEntity, Platform, SocialLinkEntity, Theme};
use crate::profile::Profile;

#[derive(Debug, Serialize)]
pub struct LinkView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub visible: bool,
}

impl From<LinkEntity> for LinkView {
    fn from(link: LinkEntity) -> Self {
        Self {
            id: link.id.to_string(),
            title: link.title,
            url: link.url,
            visible: link.visible,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SocialLinkView {
    pub id: String,
    pub platform: Platform,
    pub url: String,
    pub visible: bool,
}

impl From<SocialLinkEntity> for SocialLinkView {
    fn from(social: SocialLinkEntity) -> Self {
        Self {
            id: social.id.to_string(),
            platform: social.platform,
            url: social.url,
            visible: social.visible,
        }
    }
}

/// 资料所有者看到的完整资料，包括隐藏项
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub theme: Theme,
    pub show_profile_picture: bool,
    pub profile_picture_url: Option<String>,
    pub links: Vec<LinkView>,
    pub social_links: Vec<SocialLinkView>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        let user = profile.user;
        Self {
            id: user.id.to_string(),
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            theme: user.theme,
            show_profile_picture: user.show_profile_picture,
            profile_picture_url: user.profile_picture_url,
            links: profile.links.into_iter().map(Into::into).collect(),
            social_links: profile.social_links.into_iter().map(Into::into).collect(),
        }
    }
}
