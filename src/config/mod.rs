use std::env;
use std::time::Duration;

/// 未设置 `JWT_SECRET` 时使用的签名密钥。知道该值即可伪造令牌，生产环境必须覆盖。
pub const FALLBACK_JWT_SECRET: &str = "linktree-secret-key-change-in-production";

const DEFAULT_TOKEN_HOURS: u64 = 24 * 7;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub production: bool,
    pub server_host: String,
    pub server_port: u16,
    pub store_retry_attempts: u32,
    pub demo_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            jwt_secret: FALLBACK_JWT_SECRET.to_string(),
            jwt_expiration_secs: DEFAULT_TOKEN_HOURS * 3600,
            production: false,
            server_host: "::".to_string(),
            server_port: 3000,
            store_retry_attempts: 3,
            demo_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_hours = match get("JWT_EXPIRATION") {
            Some(raw) => parse_value("JWT_EXPIRATION", raw.trim().trim_end_matches('h'))?,
            None => DEFAULT_TOKEN_HOURS,
        };

        let production = get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Config {
            database_url: get("DATABASE_URL"),
            database_max_connections: match get("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => parse_value("DATABASE_MAX_CONNECTIONS", &raw)?,
                None => defaults.database_max_connections,
            },
            jwt_secret: get("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_expiration_secs: jwt_hours * 3600,
            production,
            server_host: get("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: match get("SERVER_PORT") {
                Some(raw) => parse_value("SERVER_PORT", &raw)?,
                None => defaults.server_port,
            },
            store_retry_attempts: match get("STORE_RETRY_ATTEMPTS") {
                Some(raw) => parse_value("STORE_RETRY_ATTEMPTS", &raw)?,
                None => defaults.store_retry_attempts,
            },
            demo_password: get("DEMO_PASSWORD"),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn uses_fallback_secret(&self) -> bool {
        self.jwt_secret == FALLBACK_JWT_SECRET
    }

    /// 仅生产环境的会话 cookie 带 `Secure` 标记
    pub fn cookie_secure(&self) -> bool {
        self.production
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
