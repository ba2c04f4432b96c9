mod auth;
mod error_handler;
mod rate_limit;
mod static_cache;

pub use auth::{AuthenticatedSession, RequireSession, bearer_token, verify_request};
pub use error_handler::log_errors;
pub use rate_limit::{RouteLimit, limiter};
pub use static_cache::{CacheScope, StaticCachePolicy, static_cache};
