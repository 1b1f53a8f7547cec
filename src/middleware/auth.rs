use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{AppState, error::AppError, infrastructure::auth::SESSION_COOKIE};

/// 校验会话 cookie，并把 [`AuthUser`](crate::infrastructure::auth::AuthUser) 注入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(req.headers());
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Not authenticated".into()))?;

    // 过期与格式错误不做区分
    let user = state
        .tokens
        .verify_token(&token)
        .ok_or_else(|| AppError::Unauthenticated("Invalid token".into()))?;

    // 令牌只携带 id：确认该 id 仍指向签发时的同一账户
    let stored = state.store.find_user_by_id(user.id).await?;
    if !stored.is_some_and(|u| u.username == user.username && u.email == user.email) {
        tracing::warn!("Token for user {} no longer matches a stored account", user.id);
        return Err(AppError::Unauthenticated("Invalid token".into()));
    }

    tracing::debug!("Authenticated request for user {}", user.id);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
