use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 登录令牌数据库实体
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebtokenEntity {
    pub username: String,
    pub token: String,
    pub ip: Option<String>,
    pub browser: Option<String>,
    pub language: Option<String>,
    pub time: DateTime<Utc>,
}

/// 用户权限数据库实体
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPermissionEntity {
    pub permission: String,
    pub read: bool,
    pub write: bool,
}
