// 会话存储库
// 包含登录令牌与用户权限相关的数据库操作

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Error as SqlxError, PgPool};

use crate::database::SessionStore;
use crate::database::models::session::{UserPermissionEntity, WebtokenEntity};

/// Postgres backed session store, the source of truth behind the cache.
#[derive(Clone)]
pub struct SessionOperation {
    db: Arc<PgPool>,
}

impl SessionOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    /// 创建会话相关的数据表
    pub async fn ensure_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users_permissions (
                username text,
                permission text,
                read boolean NOT NULL DEFAULT false,
                write boolean NOT NULL DEFAULT false,
                time TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (username, permission)
            )
            "#,
        )
        .execute(&*self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS webtokens (
                username text NOT NULL,
                token text,
                ip text,
                browser text,
                language text,
                time TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (token)
            )
            "#,
        )
        .execute(&*self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SessionOperation {
    async fn get_session_by_token(&self, token: &str) -> Result<Vec<WebtokenEntity>, SqlxError> {
        sqlx::query_as::<_, WebtokenEntity>(
            r#"
            SELECT username, token, ip, browser, language, time
            FROM webtokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_all(&*self.db)
        .await
    }

    async fn get_user_permissions(&self, username: &str) -> Result<Vec<UserPermissionEntity>, SqlxError> {
        sqlx::query_as::<_, UserPermissionEntity>(
            r#"
            SELECT permission, read, write
            FROM users_permissions
            WHERE username = $1
            ORDER BY permission
            "#,
        )
        .bind(username)
        .fetch_all(&*self.db)
        .await
    }

    async fn delete_session(&self, token: &str) -> Result<(), SqlxError> {
        tracing::debug!("Deleting webtoken {} from database", token);
        sqlx::query("DELETE FROM webtokens WHERE token = $1")
            .bind(token)
            .execute(&*self.db)
            .await?;
        Ok(())
    }
}
