use axum::{Extension, response::IntoResponse};

use crate::middleware::AuthenticatedSession;

/// Plain handler, used to measure the cost of the layers in front of it.
pub async fn ok() -> impl IntoResponse {
    "OK"
}

pub async fn whoami(Extension(session): Extension<AuthenticatedSession>) -> impl IntoResponse {
    format!("OK {}", session.record.username)
}
