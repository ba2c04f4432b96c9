// 缓存键模块
// Every record kind lives under its own prefix; a key alone tells which
// model its value decodes to.

const IP_LIMIT_PREFIX: &str = "IPL_";
const KEY_LIMIT_PREFIX: &str = "LIM_";
const WEBTOKEN_PREFIX: &str = "WT_";
const PUBLIC_RESPONSE_PREFIX: &str = "PSR_";
const PRIVATE_RESPONSE_PREFIX: &str = "pSR_";

/// Counter key for IP based limiting
pub fn ip_limit_key(ip: &str) -> String {
    format!("{}{}", IP_LIMIT_PREFIX, ip)
}

/// Counter key for the generic route/action limiter
pub fn key_limit_key(key: &str) -> String {
    format!("{}{}", KEY_LIMIT_PREFIX, key)
}

pub fn webtoken_key(token: &str) -> String {
    format!("{}{}", WEBTOKEN_PREFIX, token)
}

pub fn public_response_key(route: &str) -> String {
    format!("{}{}", PUBLIC_RESPONSE_PREFIX, route)
}

pub fn private_response_key(route: &str, token: &str) -> String {
    format!("{}{}_{}", PRIVATE_RESPONSE_PREFIX, route, token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    RateCounter,
    Webtoken,
    StaticResponse,
}

/// Classifies a raw key by its prefix. Unknown keys return `None`.
pub fn kind_of(key: &str) -> Option<KeyKind> {
    if key.starts_with(IP_LIMIT_PREFIX) || key.starts_with(KEY_LIMIT_PREFIX) {
        Some(KeyKind::RateCounter)
    } else if key.starts_with(WEBTOKEN_PREFIX) {
        Some(KeyKind::Webtoken)
    } else if key.starts_with(PUBLIC_RESPONSE_PREFIX) || key.starts_with(PRIVATE_RESPONSE_PREFIX) {
        Some(KeyKind::StaticResponse)
    } else {
        None
    }
}
