//! Persistence collaborator
//!
//! The hub never owns chat data. It asks the store three questions:
//! who a verified subject is locally, whether a user belongs to a room,
//! and who the members of a room are.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::hub::{RoomId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Map a verified external subject to a local user, if one exists.
    async fn resolve_user(&self, subject: &str) -> Result<Option<UserId>, StoreError>;

    /// Whether `user` participates in the chat or public room `room`.
    async fn is_member(&self, user: &UserId, room: &RoomId) -> Result<bool, StoreError>;

    /// Member ids of a chat or public room, sorted.
    async fn member_ids(&self, room: &RoomId) -> Result<Vec<UserId>, StoreError>;
}
