use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::database::{UserEntity, UserId};
use crate::error::AppError;

/// 会话 cookie 名称
pub const SESSION_COOKIE: &str = "auth-token";

/// 令牌中携带的用户身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<&UserEntity> for AuthUser {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: UserId,
    username: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// 签发与校验无状态令牌。服务端不保存会话，有效性只取决于签名与过期时间。
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration_secs)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// 签发令牌，返回 (token, 过期时间戳)
    pub fn issue_token(&self, user: &AuthUser) -> Result<(String, i64), AppError> {
        let now = chrono::Utc::now().timestamp();
        let exp = now.saturating_add(self.ttl_secs);
        let token = self.encode_claims(user, now, exp)?;
        Ok((token, exp))
    }

    fn encode_claims(&self, user: &AuthUser, iat: i64, exp: i64) -> Result<String, AppError> {
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            iat,
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
    }

    /// 校验签名与过期时间。任何失败（格式错误、过期、签名不符）都返回 `None`。
    pub fn verify_token(&self, token: &str) -> Option<AuthUser> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| AuthUser {
                id: data.claims.id,
                username: data.claims.username,
                email: data.claims.email,
            })
            .ok()
    }

    /// 写入会话 cookie
    pub fn set_session_cookie(&self, jar: CookieJar, token: String, secure: bool) -> CookieJar {
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl_secs))
            .build();
        jar.add(cookie)
    }
}

/// 清除会话 cookie。无论请求是否携带 cookie 都返回过期的同名 cookie。
pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    jar.add(cookie)
}
