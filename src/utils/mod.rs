use bcrypt::{hash, verify};

/// bcrypt 工作因子
pub const BCRYPT_COST: u32 = 12;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), BCRYPT_COST)
}

/// 校验密码。哈希格式错误同样视为不匹配。
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password.as_bytes(), hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!("Password hash could not be verified: {}", e);
            false
        }
    }
}

/// 将用户输入的链接补全为可跳转的绝对地址，仅用于展示，不写回存储。
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return "#".to_string();
    }

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
    {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hashed = hash_password("secret1").unwrap();
        assert!(verify_password("secret1", &hashed));
        assert!(!verify_password("secret2", &hashed));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("secret1", "not-a-bcrypt-hash"));
    }

    #[test]
    fn normalizes_scheme_less_urls() {
        assert_eq!(normalize_url("example.com/me"), "https://example.com/me");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://Example.com"), "HTTPS://Example.com");
        assert_eq!(normalize_url("mailto:me@example.com"), "mailto:me@example.com");
        assert_eq!(normalize_url("  "), "#");
    }
}
