// 数据库模块
// 包含会话实体定义和存储库操作

use async_trait::async_trait;
use sqlx::Error as SqlxError;

pub mod models; // 数据库实体定义
pub mod operations; // 数据库操作实现

pub use models::session::{UserPermissionEntity, WebtokenEntity};
pub use operations::session::SessionOperation;

/// What the session resolver needs from the persistent store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session_by_token(&self, token: &str) -> Result<Vec<WebtokenEntity>, SqlxError>;

    async fn get_user_permissions(&self, username: &str) -> Result<Vec<UserPermissionEntity>, SqlxError>;

    async fn delete_session(&self, token: &str) -> Result<(), SqlxError>;
}
