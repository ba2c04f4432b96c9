use std::time::Duration;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
};
use tower::ServiceBuilder;

use crate::{
    AppState,
    middleware::{
        RequireSession, RouteLimit, StaticCachePolicy, limiter, log_errors, static_cache,
        verify_request,
    },
};

pub mod bench;
pub mod cache;

pub const CACHE_READ: &str = "app.cache.read";
pub const CACHE_WRITE: &str = "app.cache.write";

const BENCH_HORIZON: Duration = Duration::from_millis(1000);

/// Benchmark routes: the bare handler, the limiter, the static cache and
/// both combined.
fn bench_routes(state: &AppState) -> Router<AppState> {
    let limited = || from_fn_with_state(RouteLimit::new(state.clone(), 1.0), limiter);
    let cached = || from_fn_with_state(StaticCachePolicy::public(state.clone(), BENCH_HORIZON), static_cache);

    Router::new()
        .route("/", get(bench::ok))
        .route("/lim", get(bench::ok).layer(limited()))
        .route("/cache", get(bench::ok).layer(cached()))
        .route("/limcache", get(bench::ok).layer(cached()).layer(limited()))
        .route(
            "/private",
            get(bench::whoami)
                .layer(from_fn_with_state(
                    StaticCachePolicy::private(state.clone(), BENCH_HORIZON),
                    static_cache,
                ))
                .layer(from_fn_with_state(RequireSession::any(state.clone()), verify_request)),
        )
}

fn cache_routes(state: &AppState) -> Router<AppState> {
    let require = |permission| {
        from_fn_with_state(
            RequireSession::with_permission(state.clone(), permission),
            verify_request,
        )
    };

    Router::new()
        .route("/memory", get(cache::memory_usage).layer(require(CACHE_READ)))
        .route("/", delete(cache::wipe).layer(require(CACHE_WRITE)))
        .route("/purge", post(cache::purge).layer(require(CACHE_WRITE)))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/bench", bench_routes(&state))
        .nest("/cache", cache_routes(&state));

    let base = state.config.api_base_uri.trim_end_matches('/').to_string();
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&base, api)
    };

    router
        .layer(ServiceBuilder::new().layer(from_fn(log_errors)))
        .with_state(state)
}
