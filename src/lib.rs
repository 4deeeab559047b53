//! chat_hub: presence tracking and room fan-out for a chat backend.
//!
//! Clients hold one WebSocket each; the HTTP layer that owns persistence
//! pushes events through [`realtime::Realtime`] or the internal endpoints
//! after a write commits.

pub mod config;
pub mod error;
pub mod hub;
pub mod identity;
pub mod notify;
pub mod protocol;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils {
    pub mod jwt;
}
