//! Room store: keyed critical sections over live rooms

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::models::Room;

/// All live rooms, keyed by room id.
///
/// Every mutation runs inside a closure holding the room's exclusive entry
/// lock, so membership changes, log appends, and the fan-outs that follow
/// them are a single critical section per room. That is what makes the
/// append order of a room's log identical to the delivery order every
/// member observes.
pub struct RoomStore {
    rooms: DashMap<Uuid, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Run `f` on the room, creating an empty one first if the id is new.
    /// Creation is atomic per id: concurrent first-joins cannot both create.
    pub fn with_room_or_create<R>(
        &self,
        room_id: Uuid,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Room) -> R,
    ) -> R {
        let mut entry = self.rooms.entry(room_id).or_insert_with(|| {
            debug!(room = %room_id, "Created room");
            Room::new(room_id, now)
        });
        f(entry.value_mut())
    }

    /// Run `f` on an existing room. `None` when the room is gone, which
    /// callers treat as a silent no-op.
    pub fn with_room<R>(&self, room_id: Uuid, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        self.rooms.get_mut(&room_id).map(|mut entry| f(entry.value_mut()))
    }

    /// Run `f` on an existing room, then delete the room inside the same
    /// critical section if `f` left it empty. No observer can see an empty
    /// room between the mutation and the delete.
    pub fn with_room_reap<R>(&self, room_id: Uuid, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        match self.rooms.entry(room_id) {
            Entry::Occupied(mut entry) => {
                let out = f(entry.get_mut());
                if entry.get().is_empty() {
                    entry.remove();
                    debug!(room = %room_id, "Room emptied, removed");
                }
                Some(out)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Delete the room if it currently has no members. Used by the token
    /// sweep to reap rooms whose only way in has expired.
    pub fn remove_if_empty(&self, room_id: Uuid) -> bool {
        self.rooms
            .remove_if(&room_id, |_, room| room.is_empty())
            .is_some()
    }

    pub fn contains(&self, room_id: Uuid) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Owned member list, for introspection. `None` when the room is gone.
    pub fn member_names(&self, room_id: Uuid) -> Option<Vec<String>> {
        self.rooms.get(&room_id).map(|room| room.member_names())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionId, Participant};
    use tokio::sync::mpsc;

    // Receiver dropped on purpose: these tests never fan out.
    fn participant(identity: &str) -> Participant {
        let (tx, _rx) = mpsc::unbounded_channel();
        Participant {
            identity: identity.to_string(),
            connection_id: ConnectionId::new(),
            tx,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_is_lazy_and_once() {
        let store = RoomStore::new();
        let id = Uuid::new_v4();
        assert!(!store.contains(id));

        let created_at = store.with_room_or_create(id, Utc::now(), |room| room.created_at);
        assert!(store.contains(id));

        // second call reuses the existing room
        let seen = store.with_room_or_create(id, Utc::now(), |room| room.created_at);
        assert_eq!(created_at, seen);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_with_room_on_missing_room_is_noop() {
        let store = RoomStore::new();
        assert!(store.with_room(Uuid::new_v4(), |_| ()).is_none());
    }

    #[test]
    fn test_reap_deletes_emptied_room() {
        let store = RoomStore::new();
        let id = Uuid::new_v4();
        let alice = participant("alice");
        let alice_conn = alice.connection_id;

        store.with_room_or_create(id, Utc::now(), |room| {
            room.try_add_member(alice).unwrap();
        });

        store.with_room_reap(id, |room| {
            room.remove_member(alice_conn);
        });
        assert!(!store.contains(id));
    }

    #[test]
    fn test_reap_keeps_occupied_room() {
        let store = RoomStore::new();
        let id = Uuid::new_v4();
        let alice = participant("alice");
        let bob = participant("bob");
        let bob_conn = bob.connection_id;

        store.with_room_or_create(id, Utc::now(), |room| {
            room.try_add_member(alice).unwrap();
            room.try_add_member(bob).unwrap();
        });

        store.with_room_reap(id, |room| {
            room.remove_member(bob_conn);
        });
        assert!(store.contains(id));
        assert_eq!(store.member_names(id), Some(vec!["alice".to_string()]));
    }

    #[test]
    fn test_remove_if_empty_spares_members() {
        let store = RoomStore::new();
        let occupied = Uuid::new_v4();
        let empty = Uuid::new_v4();

        store.with_room_or_create(occupied, Utc::now(), |room| {
            room.try_add_member(participant("alice")).unwrap();
        });
        store.with_room_or_create(empty, Utc::now(), |_| ());

        assert!(!store.remove_if_empty(occupied));
        assert!(store.remove_if_empty(empty));
        assert!(store.contains(occupied));
        assert!(!store.contains(empty));
    }
}
