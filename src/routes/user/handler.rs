use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    infrastructure::auth::AuthUser,
    profile::{ProfileReconciler, ProfileSubmission, load_profile},
};

use super::model::ProfileView;

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<ProfileView>> {
    let profile = load_profile(state.store.as_ref(), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(profile.into()))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ProfileSubmission>, JsonRejection>,
) -> AppResult<Json<ProfileView>> {
    let Json(submission) = payload?;

    let outcome = ProfileReconciler::new(state.store.as_ref(), &state.locks)
        .reconcile(user.id, submission)
        .await?;

    if outcome.report.is_noop() {
        tracing::debug!("Profile update for user {} changed nothing", user.id);
    }

    Ok(Json(outcome.profile.into()))
}
