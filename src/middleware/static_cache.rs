use std::time::Duration;

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    cache::{StaticResponse, StaticResponseEntry},
    error::AppError,
    middleware::auth::AuthenticatedSession,
};

// Larger bodies are passed through uncached.
const MAX_CACHED_BODY: usize = 1024 * 1024;
const CACHE_STATUS: &str = "x-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// One entry per route, shared by every caller.
    Public,
    /// One entry per route and session. Needs `verify_request` in front.
    Private,
}

#[derive(Clone)]
pub struct StaticCachePolicy {
    state: AppState,
    max_age: Duration,
    scope: CacheScope,
}

impl StaticCachePolicy {
    pub fn public(state: AppState, max_age: Duration) -> Self {
        Self {
            state,
            max_age,
            scope: CacheScope::Public,
        }
    }

    pub fn private(state: AppState, max_age: Duration) -> Self {
        Self {
            state,
            max_age,
            scope: CacheScope::Private,
        }
    }
}

/// 静态响应缓存中间件
///
/// Replays a cached body when one is fresh, otherwise runs the handler and
/// captures its successful response.
pub async fn static_cache(
    State(policy): State<StaticCachePolicy>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let state = &policy.state;
    let route = format!("{} {}", req.method(), req.uri().path());
    let token = match policy.scope {
        CacheScope::Public => None,
        CacheScope::Private => Some(
            req.extensions()
                .get::<AuthenticatedSession>()
                .map(|session| session.token.clone())
                .ok_or(AppError::InvalidToken("No Token Provided"))?,
        ),
    };

    let cached = match &token {
        None => state.cache.get_public_response(&route, policy.max_age).await,
        Some(token) => {
            state
                .cache
                .get_private_response(&route, token, policy.max_age)
                .await
        }
    }
    .map_err(|e| state.escalate(e))?;

    if let Some(entry) = cached {
        return Ok(replay(entry));
    }

    let response = next.run(req).await;
    if !response.status().is_success() || declared_len(&response).is_some_and(|n| n > MAX_CACHED_BODY) {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read response body of {}: {}", route, e);
            return Err(AppError::InternalServerError);
        }
    };
    if bytes.len() > MAX_CACHED_BODY {
        tracing::debug!("Not caching {}, body of {} bytes", route, bytes.len());
        return Ok(Response::from_parts(parts, Body::from(bytes)));
    }

    let Ok(body) = String::from_utf8(bytes.to_vec()) else {
        return Ok(Response::from_parts(parts, Body::from(bytes)));
    };
    let captured = StaticResponse {
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string(),
        body,
        status_code: parts.status.as_u16(),
    };

    let written = match &token {
        None => {
            state
                .cache
                .put_public_response(&route, captured, policy.max_age)
                .await
        }
        Some(token) => {
            state
                .cache
                .put_private_response(&route, token, captured, policy.max_age)
                .await
        }
    };
    match written {
        Ok(_) => {
            parts.headers.insert(CACHE_STATUS, HeaderValue::from_static("MISS"));
        }
        Err(e) if e.is_fatal() => return Err(state.escalate(e)),
        Err(e) => tracing::warn!("Failed to cache response for {}: {}", route, e),
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn declared_len(response: &Response) -> Option<usize> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn replay(entry: StaticResponseEntry) -> Response {
    let status = StatusCode::from_u16(entry.status_code).unwrap_or(StatusCode::OK);
    (
        status,
        [
            (header::CONTENT_TYPE, entry.content_type),
            (header::HeaderName::from_static(CACHE_STATUS), "HIT".to_string()),
        ],
        entry.body,
    )
        .into_response()
}
