use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

use crate::database::{Platform, Theme};
use crate::error::{AppError, AppResult};

pub const MAX_DISPLAY_NAME_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_URL_LEN: usize = 2048;

/// 客户端提交的 id：可能是服务端 id（数字或数字字符串），也可能是客户端临时生成的 id
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
    /// 小数、超出 i64 范围的数字等其他形式
    Other(IgnoredAny),
}

impl WireId {
    /// 解析为服务端 id；无法解析的 id 视为新记录
    pub fn server_id(&self) -> Option<i64> {
        match self {
            WireId::Number(n) => Some(*n),
            WireId::Text(s) => s.trim().parse().ok(),
            WireId::Other(_) => None,
        }
        .filter(|id| *id > 0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkSubmission {
    #[serde(default)]
    pub id: Option<WireId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialLinkSubmission {
    #[serde(default)]
    pub id: Option<WireId>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
}

/// 客户端提交的完整（或部分）资料文档。
///
/// 未出现的字段保持不变；`bio` 与 `profilePictureUrl` 显式为 `null` 表示清空。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSubmission {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub bio: Option<Option<String>>,
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub show_profile_picture: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub profile_picture_url: Option<Option<String>>,
    #[serde(default)]
    pub links: Option<Vec<LinkSubmission>>,
    #[serde(default)]
    pub social_links: Option<Vec<SocialLinkSubmission>>,
}

// 区分“字段缺失”与“字段为 null”
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProfileSubmission {
    /// 写入前的整体校验，任何一项不通过则整个请求失败
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.display_name {
            check_len("displayName", name, MAX_DISPLAY_NAME_LEN)?;
        }
        if let Some(Some(url)) = &self.profile_picture_url {
            check_len("profilePictureUrl", url, MAX_URL_LEN)?;
        }

        for (index, link) in self.links.iter().flatten().enumerate() {
            if let Some(title) = &link.title {
                check_len(&format!("links[{}].title", index), title, MAX_TITLE_LEN)?;
            }
            if let Some(url) = &link.url {
                check_len(&format!("links[{}].url", index), url, MAX_URL_LEN)?;
            }
        }

        for (index, social) in self.social_links.iter().flatten().enumerate() {
            if let Some(url) = &social.url {
                check_len(&format!("socialLinks[{}].url", index), url, MAX_URL_LEN)?;
            }
        }

        Ok(())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}
