use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    #[default]
    Filled,
    Outline,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// 公开页面的样式。
///
/// 以 JSON 文档整体存储在用户行上，更新时整体替换。缺失的子字段取默认值，
/// 因此存储的主题总是完整的。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub background_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    pub button_color: String,
    pub button_text_color: String,
    pub button_radius: String,
    pub font_family: String,
    pub button_style: ButtonStyle,
    pub button_size: ButtonSize,
    pub text_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background_color: "#000000".into(),
            background_image: None,
            button_color: "#ffffff".into(),
            button_text_color: "#000000".into(),
            button_radius: "8px".into(),
            font_family: "Inter, sans-serif".into(),
            button_style: ButtonStyle::Filled,
            button_size: ButtonSize::Medium,
            text_color: "#ffffff".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_theme_is_completed_with_defaults() {
        let theme: Theme =
            serde_json::from_str(r##"{"backgroundColor":"#0f172a","buttonStyle":"soft"}"##).unwrap();

        assert_eq!(theme.background_color, "#0f172a");
        assert_eq!(theme.button_style, ButtonStyle::Soft);
        assert_eq!(theme.button_size, ButtonSize::Medium);
        assert_eq!(theme.font_family, "Inter, sans-serif");
    }

    #[test]
    fn rejects_unknown_button_style() {
        let result = serde_json::from_str::<Theme>(r#"{"buttonStyle":"glossy"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(Theme::default()).unwrap();
        assert_eq!(value["buttonTextColor"], "#000000");
        assert!(value.get("backgroundImage").is_none());
    }
}
