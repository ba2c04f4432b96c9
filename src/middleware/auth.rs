use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, UserAgent, authorization::Bearer};

use crate::{
    AppState,
    cache::{LimitVerdict, SessionRecord},
    error::AppError,
    utils::{browser_family, client_ip},
};

/// Session attached to a request once `verify_request` accepted it.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub token: String,
    pub record: SessionRecord,
}

/// Settings for `verify_request`: an optional permission the session must
/// carry.
#[derive(Clone)]
pub struct RequireSession {
    state: AppState,
    permission: Option<&'static str>,
}

impl RequireSession {
    pub fn any(state: AppState) -> Self {
        Self {
            state,
            permission: None,
        }
    }

    pub fn with_permission(state: AppState, permission: &'static str) -> Self {
        Self {
            state,
            permission: Some(permission),
        }
    }
}

#[derive(Debug)]
enum TokenCheck {
    Valid(SessionRecord),
    /// No session exists for the token.
    Unknown,
    /// The session exists but is stale or bound to another client.
    Rejected,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .filter(|token| !token.is_empty())
}

/// 认证中间件
pub async fn verify_request(
    State(guard): State<RequireSession>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let state = &guard.state;
    let ip = client_ip(&req, state.config.cloudflare_proxy);

    let precheck = state.cache.ip_check(&ip).await.map_err(|e| state.escalate(e))?;
    if let LimitVerdict::Blocked { retry_in } = precheck {
        return Err(AppError::TooManyRequests { retry_in });
    }

    let token = bearer_token(req.headers()).ok_or(AppError::InvalidToken("No Token Provided"))?;
    let browser = req
        .headers()
        .typed_get::<UserAgent>()
        .map(|ua| browser_family(ua.as_str()))
        .unwrap_or_else(|| browser_family(""));

    let record = match check_webtoken(state, &token, browser, &ip).await? {
        TokenCheck::Valid(record) => record,
        TokenCheck::Unknown => {
            // unknown tokens cost the caller, slowing down token guessing
            let verdict = state.cache.ip_limit(&ip, 1.0).await.map_err(|e| state.escalate(e))?;
            if let LimitVerdict::Blocked { retry_in } = verdict {
                return Err(AppError::TooManyRequests { retry_in });
            }
            return Err(AppError::InvalidToken("Invalid Token"));
        }
        TokenCheck::Rejected => {
            tracing::debug!("Deleting webtoken {} from database and cache", token);
            state
                .cache
                .sessions()
                .delete_session(&token)
                .await
                .map_err(|e| state.escalate(e.into()))?;
            state
                .cache
                .invalidate_session(&token)
                .await
                .map_err(|e| state.escalate(e))?;
            return Err(AppError::InvalidToken("Invalid Token"));
        }
    };

    if let Some(permission) = guard.permission {
        if !record.has_permission(permission) {
            return Err(AppError::PermissionDenied(permission.to_string()));
        }
        tracing::debug!("Permission {} granted to {}", permission, record.username);
    }

    req.extensions_mut().insert(AuthenticatedSession { token, record });
    Ok(next.run(req).await)
}

async fn check_webtoken(
    state: &AppState,
    token: &str,
    browser: &str,
    ip: &str,
) -> Result<TokenCheck, AppError> {
    let Some(record) = state
        .cache
        .resolve_session(token)
        .await
        .map_err(|e| state.escalate(e))?
    else {
        return Ok(TokenCheck::Unknown);
    };

    let ttl_ms = state.cache.settings().session_ttl.as_millis() as i64;
    if record.time.timestamp_millis() + ttl_ms < state.cache.clock().now_ms() {
        tracing::debug!("Webtoken of {} expired", record.username);
        return Ok(TokenCheck::Rejected);
    }

    if record.browser != browser {
        return Ok(TokenCheck::Rejected);
    }

    let same_ip = if state.config.hash_ip_salts != 0 {
        bcrypt::verify(ip, &record.ip).unwrap_or(false)
    } else {
        record.ip == ip
    };
    if !same_ip {
        return Ok(TokenCheck::Rejected);
    }

    Ok(TokenCheck::Valid(record))
}
