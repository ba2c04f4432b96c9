use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use gatecache::{
    AppState, cache::Cache, config::Config, database::SessionOperation, routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 后端丢失时的退出码
const EXIT_BACKEND_LOST: i32 = 2;

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

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'gatecache';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let sessions = SessionOperation::new(Arc::new(pool));
    sessions
        .ensure_schema()
        .await
        .expect("Failed to create session tables");

    // 设置缓存后端
    let cache = Cache::connect(&config, Arc::new(sessions))
        .await
        .expect("Failed to initialise cache backend");

    let state = AppState::new(cache, config);
    let fatal = state.fatal.clone();

    let router = routes::router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);

    let shutdown_signal = {
        let fatal = fatal.clone();
        async move {
            tokio::select! {
                _ = fatal.wait() => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C, shutting down"),
            }
        }
    };

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .expect("Failed to start server");

    if fatal.is_tripped() {
        std::process::exit(EXIT_BACKEND_LOST);
    }
}
