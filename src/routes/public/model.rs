use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// 当前提供服务的存储后端
    pub storage: &'static str,
}
