use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use linkpage::{
    AppState, app,
    config::Config,
    database::{FALLBACK_ID_START, FallbackStore, MemoryStore, PgStore, Store},
    utils::hash_password,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// 构建内存存储，设置了演示密码时写入演示资料
async fn memory_store(config: &Config, first_id: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::starting_at(first_id));
    if let Some(password) = &config.demo_password {
        match hash_password(password) {
            Ok(hash) => {
                if let Err(e) = store.seed_demo(hash).await {
                    tracing::error!("Failed to seed demo profile: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to hash demo password: {}", e),
        }
    }
    store
}

async fn build_store(config: &Config) -> Arc<dyn Store> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, profiles are kept in memory only");
        return memory_store(config, 1).await;
    };

    // 备用存储的 id 与主库不重叠
    let fallback = memory_store(config, FALLBACK_ID_START).await;

    // 延迟连接：数据库暂时不可用时服务仍可启动
    let pool = match PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Invalid DATABASE_URL, using memory store: {}", e);
            return fallback;
        }
    };

    let primary = PgStore::new(pool, config.store_retry_attempts);
    if let Err(e) = primary.migrate().await {
        tracing::error!("Failed to run migrations: {}", e);
    }

    let store = FallbackStore::new(Arc::new(primary), fallback);
    if store.check_primary().await {
        tracing::info!("Connected to Postgres");
    } else {
        tracing::warn!("Starting in fallback mode with the memory store");
    }
    Arc::new(store)
}

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    if config.uses_fallback_secret() {
        tracing::warn!("JWT_SECRET is not set; tokens are signed with the built-in fallback key");
    }

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let store = build_store(&config).await;
    let state = AppState::new(store, config);

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app(state),
    )
    .await
    .expect("Failed to start server");
}
