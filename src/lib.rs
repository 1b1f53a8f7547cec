use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use config::Config;
use database::Store;
use infrastructure::auth::TokenService;
use middleware::{auth_middleware, log_errors};
use profile::OwnerLocks;

pub mod config;
pub mod database;
pub mod error;
pub mod infrastructure;
pub mod middleware;
pub mod profile;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub tokens: TokenService,
    pub locks: Arc<OwnerLocks>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            tokens: TokenService::from_config(&config),
            store,
            config,
            locks: Arc::new(OwnerLocks::new()),
        }
    }
}

/// 构建完整路由，`main` 与集成测试共用
pub fn app(state: AppState) -> Router {
    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/username", get(routes::public::get_public_profile))
        .route("/health", get(routes::public::health));

    let protected_routes = Router::new()
        .route(
            "/user",
            get(routes::user::get_profile).post(routes::user::update_profile),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(log_errors)),
        );

    // 开发模式允许所有来源
    #[cfg(debug_assertions)]
    let router = router.layer(tower_http::cors::CorsLayer::permissive());

    router.with_state(state)
}
