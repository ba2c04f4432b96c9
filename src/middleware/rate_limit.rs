use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    cache::LimitVerdict,
    error::AppError,
    middleware::auth::AuthenticatedSession,
    utils::client_ip,
};

/// Route limiter settings: every request through the layer costs `cost`.
#[derive(Clone)]
pub struct RouteLimit {
    state: AppState,
    cost: f64,
}

impl RouteLimit {
    pub fn new(state: AppState, cost: f64) -> Self {
        Self { state, cost }
    }
}

/// 限流中间件
///
/// Authenticated requests are limited per session token, anonymous ones
/// per client IP.
pub async fn limiter(
    State(limit): State<RouteLimit>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let state = &limit.state;
    let key = match req.extensions().get::<AuthenticatedSession>() {
        Some(session) => session.token.clone(),
        None => client_ip(&req, state.config.cloudflare_proxy),
    };

    let verdict = state
        .cache
        .limit(&key, limit.cost)
        .await
        .map_err(|e| state.escalate(e))?;

    match verdict {
        LimitVerdict::Allowed => Ok(next.run(req).await),
        LimitVerdict::Blocked { retry_in } => {
            tracing::info!("Rate limited {} for {}ms", key, retry_in.as_millis());
            Err(AppError::TooManyRequests { retry_in })
        }
    }
}
