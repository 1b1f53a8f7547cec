use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    profile::{PublicProfile, projection::public_profile},
};

use super::model::{HealthResponse, UsernameQuery};

/// 公开资料页，无需登录
#[axum::debug_handler]
pub async fn get_public_profile(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> AppResult<Json<PublicProfile>> {
    let username = query
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Username is required".into()))?;

    let profile = public_profile(state.store.as_ref(), &username).await?;
    Ok(Json(profile))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.store.backend(),
    })
}
