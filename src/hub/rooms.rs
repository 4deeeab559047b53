use std::collections::HashSet;

use dashmap::DashMap;

use super::{ConnectionId, RoomId};

/// Transient room -> live subscriber table. Not authoritative for membership;
/// rebuilt by clients after every reconnect.
#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: DashMap<RoomId, HashSet<ConnectionId>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the connection was already subscribed.
    pub fn add(&self, room: &RoomId, conn: ConnectionId) -> bool {
        self.rooms.entry(room.clone()).or_default().insert(conn)
    }

    /// Returns false if the connection was not subscribed.
    pub fn remove(&self, room: &RoomId, conn: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut subs) => subs.remove(&conn),
            None => false,
        };
        self.rooms.remove_if(room, |_, subs| subs.is_empty());
        removed
    }

    pub fn subscribers(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|subs| subs.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(|subs| subs.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let table = RoomTable::new();
        let room = RoomId::from("general");
        let conn = ConnectionId::new();
        assert!(table.add(&room, conn));
        assert!(!table.add(&room, conn));
        assert_eq!(table.subscriber_count(&room), 1);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let table = RoomTable::new();
        assert!(!table.remove(&RoomId::from("nowhere"), ConnectionId::new()));
        assert_eq!(table.room_count(), 0);
    }

    #[test]
    fn empty_rooms_are_dropped() {
        let table = RoomTable::new();
        let room = RoomId::from("general");
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        table.add(&room, a);
        table.add(&room, b);

        assert!(table.remove(&room, a));
        assert_eq!(table.subscribers(&room), vec![b]);
        assert!(table.remove(&room, b));
        assert_eq!(table.room_count(), 0);
    }
}
