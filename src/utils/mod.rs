use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

use crate::database::UserPermissionEntity;

/// Turns permission grants into the ordered permission strings kept on a
/// session, `<permission>.read` before `<permission>.write`.
pub fn format_permissions(grants: &[UserPermissionEntity]) -> Vec<String> {
    let mut permissions = Vec::with_capacity(grants.len() * 2);
    for grant in grants {
        if grant.read {
            permissions.push(format!("{}.read", grant.permission));
        }
        if grant.write {
            permissions.push(format!("{}.write", grant.permission));
        }
    }
    permissions
}

/// 获取客户端IP
///
/// Behind Cloudflare only `cf-connecting-ip` is trusted, otherwise the first
/// `x-forwarded-for` hop. Falls back to the socket address.
pub fn client_ip<B>(req: &Request<B>, cloudflare_proxy: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    forwarded_ip(req.headers(), cloudflare_proxy)
        .or(remote_ip)
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(headers: &HeaderMap, cloudflare_proxy: bool) -> Option<String> {
    let header = if cloudflare_proxy {
        "cf-connecting-ip"
    } else {
        "x-forwarded-for"
    };
    headers
        .get(header)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        .map(str::to_string)
}

// Checked in order, the first marker found names the family.
const BROWSER_MARKERS: &[(&str, &str)] = &[
    ("Edg/", "Edge"),
    ("Edge/", "Edge"),
    ("OPR/", "Opera"),
    ("Opera", "Opera"),
    ("Firefox/", "Firefox"),
    ("FxiOS/", "Firefox"),
    ("Chromium/", "Chromium"),
    ("Chrome/", "Chrome"),
    ("CriOS/", "Chrome"),
    ("Safari/", "Safari"),
    ("Trident/", "IE"),
    ("MSIE ", "IE"),
];

/// 获取浏览器类型
///
/// Sessions are bound to the browser family, not the full `User-Agent`, so a
/// browser update keeps its sessions. Unrecognised agents are `Other`.
pub fn browser_family(user_agent: &str) -> &'static str {
    BROWSER_MARKERS
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map(|(_, family)| *family)
        .unwrap_or("Other")
}
