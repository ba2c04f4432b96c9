use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话缓存数据模型
///
/// Snapshot of a persisted webtoken row joined with the user's formatted
/// permissions. `ip` is either the plain address or its bcrypt hash.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionRecord {
    pub username: String,
    pub language: String,
    pub permissions: Vec<String>,
    pub ip: String,
    /// Browser family as given by `utils::browser_family`, e.g. `Chrome`.
    pub browser: String,
    pub time: DateTime<Utc>,
}

impl SessionRecord {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
