use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{ChatStore, StoreError};
use crate::hub::{RoomId, UserId};

/// In-process store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subjects: RwLock<HashMap<String, UserId>>,
    members: RwLock<HashMap<RoomId, BTreeSet<UserId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, subject: &str, user: impl Into<UserId>) -> Result<(), StoreError> {
        self.subjects
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .insert(subject.to_string(), user.into());
        Ok(())
    }

    pub fn add_member(&self, room: impl Into<RoomId>, user: impl Into<UserId>) -> Result<(), StoreError> {
        self.members
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .entry(room.into())
            .or_default()
            .insert(user.into());
        Ok(())
    }

    pub fn remove_member(&self, room: &RoomId, user: &UserId) -> Result<(), StoreError> {
        if let Some(set) = self
            .members
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .get_mut(room)
        {
            set.remove(user);
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn resolve_user(&self, subject: &str) -> Result<Option<UserId>, StoreError> {
        let subjects = self
            .subjects
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(subjects.get(subject).cloned())
    }

    async fn is_member(&self, user: &UserId, room: &RoomId) -> Result<bool, StoreError> {
        let members = self
            .members
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(members.get(room).is_some_and(|set| set.contains(user)))
    }

    async fn member_ids(&self, room: &RoomId) -> Result<Vec<UserId>, StoreError> {
        let members = self
            .members
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(members
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}
