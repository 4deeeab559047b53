use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{RoomId, UserId};
use crate::error::HubError;
use crate::store::ChatStore;

pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Join-time room authorization, delegated to the store.
/// Not re-checked per event once a connection is subscribed.
#[derive(Clone)]
pub struct MembershipAuthority {
    store: Arc<dyn ChatStore>,
    timeout: Duration,
}

impl MembershipAuthority {
    pub fn new(store: Arc<dyn ChatStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn can_join(&self, user: &UserId, room: &RoomId) -> Result<bool, HubError> {
        match tokio::time::timeout(self.timeout, self.store.is_member(user, room)).await {
            Ok(Ok(member)) => Ok(member),
            Ok(Err(e)) => {
                warn!(user = %user, room = %room, error = %e, "membership lookup failed");
                Err(HubError::Store(e))
            }
            Err(_) => {
                warn!(user = %user, room = %room, timeout_ms = self.timeout.as_millis() as u64, "membership lookup timed out");
                Err(HubError::Timeout(room.clone()))
            }
        }
    }
}

impl std::fmt::Debug for MembershipAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipAuthority")
            .field("timeout", &self.timeout)
            .finish()
    }
}
