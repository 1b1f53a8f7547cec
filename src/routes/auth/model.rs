use serde::{Deserialize, Serialize};

use crate::database::UserEntity;
use crate::error::{AppError, AppResult};
use crate::profile::submission::MAX_DISPLAY_NAME_LEN;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 50;
const PASSWORD_MIN_LEN: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// 通过校验的注册信息
#[derive(Debug)]
pub struct ValidSignup {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl SignupRequest {
    pub fn validate(self) -> AppResult<ValidSignup> {
        let (Some(username), Some(email), Some(password)) = (
            required(self.username),
            required(self.email),
            self.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::InvalidInput(
                "Username, email and password are required".into(),
            ));
        };

        let len = username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(AppError::InvalidInput(format!(
                "Username must be between {} and {} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            )));
        }

        // 用户名出现在公开页面地址中
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::InvalidInput(
                "Username may only contain letters, numbers, underscores and hyphens".into(),
            ));
        }

        if !email.contains('@') {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }

        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LEN
            )));
        }

        let display_name = required(self.display_name).unwrap_or_else(|| username.clone());
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(AppError::InvalidInput(format!(
                "displayName must be at most {} characters",
                MAX_DISPLAY_NAME_LEN
            )));
        }

        Ok(ValidSignup {
            username: username.to_lowercase(),
            email: email.to_lowercase(),
            password,
            display_name,
        })
    }
}

/// `email` 字段也接受用户名
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
}

impl From<&UserEntity> for SessionUser {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: SessionUser,
}

impl AuthResponse {
    pub fn new(user: &UserEntity) -> Self {
        Self {
            success: true,
            user: user.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            display_name: None,
        }
    }

    fn message(result: AppResult<ValidSignup>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn valid_signup_is_normalized() {
        let signup = request("Alice_1", "Alice@Example.com", "secret1")
            .validate()
            .unwrap();
        assert_eq!(signup.username, "alice_1");
        assert_eq!(signup.email, "alice@example.com");
        assert_eq!(signup.display_name, "Alice_1");
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut req = request("alice", "a@x.com", "secret1");
        req.password = None;
        assert_eq!(message(req.validate()), "Username, email and password are required");
    }

    #[test]
    fn username_length_is_bounded() {
        assert_eq!(
            message(request("al", "a@x.com", "secret1").validate()),
            "Username must be between 3 and 50 characters"
        );
        assert!(request(&"a".repeat(51), "a@x.com", "secret1").validate().is_err());
        assert!(request(&"a".repeat(50), "a@x.com", "secret1").validate().is_ok());
    }

    #[test]
    fn username_charset_is_restricted() {
        assert!(request("al ice", "a@x.com", "secret1").validate().is_err());
        assert!(request("al/ice", "a@x.com", "secret1").validate().is_err());
        assert!(request("al-ice", "a@x.com", "secret1").validate().is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        assert_eq!(
            message(request("alice", "a@x.com", "12345").validate()),
            "Password must be at least 6 characters"
        );
    }
}
