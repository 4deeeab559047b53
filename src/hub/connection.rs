use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{RoomId, UserId};
use crate::error::HubError;

/// Item on a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Pre-encoded JSON text frame, shared between every recipient of a fan-out.
    Frame(Arc<str>),
    /// Heartbeat ping; the peer has until the pong deadline to answer.
    Ping,
    Close { code: u16, reason: String },
}

/// Unbounded so fan-out never waits on a slow reader. A peer that stops
/// reading also stops answering pings, so its queue lives at most one ping
/// interval plus the pong timeout before the connection is torn down.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Closed,
}

impl ConnectionState {
    pub fn transition(self, to: ConnectionState) -> Result<ConnectionState, HubError> {
        use ConnectionState::*;
        match (self, to) {
            (Connecting, Authenticated) | (Connecting, Closed) | (Authenticated, Closed) => Ok(to),
            (from, to) => Err(HubError::InvalidTransition { from, to }),
        }
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Authenticated
    }
}

/// Registry entry. Starts `Connecting`; the registry authenticates it on insert
/// and only open entries take part in fan-out.
#[derive(Debug)]
pub struct ConnectionEntry {
    pub user: UserId,
    pub rooms: HashSet<RoomId>,
    pub state: ConnectionState,
    tx: OutboundSender,
}

impl ConnectionEntry {
    pub(crate) fn new(user: UserId, tx: OutboundSender) -> Self {
        Self {
            user,
            rooms: HashSet::new(),
            state: ConnectionState::Connecting,
            tx,
        }
    }

    pub(crate) fn authenticate(&mut self) -> Result<(), HubError> {
        self.state = self.state.transition(ConnectionState::Authenticated)?;
        Ok(())
    }

    /// Queue an item for the writer task. False once the writer has gone away.
    pub fn send(&self, item: Outbound) -> bool {
        self.tx.send(item).is_ok()
    }
}
