use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

use super::{ChatStore, StoreError};
use crate::hub::{RoomId, UserId};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id           TEXT PRIMARY KEY,
        auth_subject TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS chat_participants (
        chat_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS room_members (
        room_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (room_id, user_id)
    )",
];

/// SQLite-backed store. A room id may name a private chat or a public room.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url).await?;
        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Create the lookup tables if they are missing.
    pub async fn init(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        info!("chat store schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn resolve_user(&self, subject: &str) -> Result<Option<UserId>, StoreError> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE auth_subject = ?")
            .bind(subject)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id.map(UserId::from))
    }

    async fn is_member(&self, user: &UserId, room: &RoomId) -> Result<bool, StoreError> {
        let hits: i64 = sqlx::query_scalar(
            "SELECT
                (SELECT COUNT(*) FROM chat_participants WHERE chat_id = ?1 AND user_id = ?2)
              + (SELECT COUNT(*) FROM room_members      WHERE room_id = ?1 AND user_id = ?2)",
        )
        .bind(room.as_str())
        .bind(user.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(hits > 0)
    }

    async fn member_ids(&self, room: &RoomId) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM chat_participants WHERE chat_id = ?1
             UNION
             SELECT user_id FROM room_members WHERE room_id = ?1
             ORDER BY user_id",
        )
        .bind(room.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }
}
