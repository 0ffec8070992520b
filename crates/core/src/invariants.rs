//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Binding, Room, ROOM_CAPACITY};

/// Validate that a Room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    // Never more members than the capacity
    debug_assert!(
        room.members.len() <= ROOM_CAPACITY,
        "Room {} holds {} members, capacity is {}",
        room.id,
        room.members.len(),
        ROOM_CAPACITY
    );

    // Identities within a room are unique
    debug_assert!(
        {
            let mut names: Vec<&str> = room.members.iter().map(|p| p.identity.as_str()).collect();
            let before = names.len();
            names.sort_unstable();
            names.dedup();
            names.len() == before
        },
        "Room {} has duplicate identities",
        room.id
    );

    // Log timestamps never move backwards
    debug_assert!(
        room.log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "Room {} log timestamps regressed",
        room.id
    );
}

/// Validate that a binding is valid
pub fn assert_binding_invariants(binding: &Binding) {
    debug_assert!(
        !binding.identity.trim().is_empty(),
        "Binding for connection {} has empty identity",
        binding.connection_id
    );

    debug_assert!(
        !binding.token_id.is_empty(),
        "Binding for connection {} has empty token id",
        binding.connection_id
    );
}
