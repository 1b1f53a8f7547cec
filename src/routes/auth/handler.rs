use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};

use crate::{
    AppState,
    database::{NewUser, UserEntity},
    error::{AppError, AppResult},
    infrastructure::auth::{AuthUser, clear_session_cookie},
    utils::{hash_password, verify_password},
};

use super::model::{AuthResponse, LoginRequest, SignupRequest};

// 签发令牌并写入会话 cookie
fn start_session(state: &AppState, jar: CookieJar, user: &UserEntity) -> AppResult<CookieJar> {
    let (token, _) = state.tokens.issue_token(&AuthUser::from(user))?;
    Ok(state
        .tokens
        .set_session_cookie(jar, token, state.config.cookie_secure()))
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;
    let signup = req.validate()?;

    // 提前检查以返回更明确的错误，并发注册由唯一约束兜底
    if state
        .store
        .find_user_by_username(&signup.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already taken".into()));
    }
    if state.store.find_user_by_email(&signup.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password = signup.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;

    let user = state
        .store
        .create_user(NewUser {
            username: signup.username,
            email: signup.email,
            password_hash,
            display_name: signup.display_name,
        })
        .await?;

    tracing::info!("User {} signed up as {}", user.id, user.username);

    let jar = start_session(&state, jar, &user)?;
    Ok((jar, Json(AuthResponse::new(&user))))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;
    let (Some(identifier), Some(password)) = (
        req.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::InvalidInput(
            "Email and password are required".into(),
        ));
    };

    // 先按邮箱查找，再按用户名
    let user = match state.store.find_user_by_email(&identifier).await? {
        Some(user) => Some(user),
        None => state.store.find_user_by_username(&identifier).await?,
    };
    let Some(user) = user else {
        tracing::debug!("Login failed: no account for {}", identifier);
        return Err(AppError::InvalidCredentials);
    };

    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))?;
    if !valid {
        tracing::debug!("Login failed: wrong password for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    let jar = start_session(&state, jar, &user)?;
    Ok((jar, Json(AuthResponse::new(&user))))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (clear_session_cookie(jar), Json(json!({ "success": true })))
}
