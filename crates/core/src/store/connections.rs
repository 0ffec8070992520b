//! Connection registry: which identity a connection is, and where

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::invariants;
use crate::models::{Binding, ConnectionId};

/// Live connection-to-room bindings, keyed by connection id.
///
/// Lookups clone the binding out, so no lock is ever held while the caller
/// goes on to take a room lock.
pub struct ConnectionRegistry {
    bindings: DashMap<ConnectionId, Binding>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Record a binding. Returns false and leaves the existing binding
    /// untouched if the connection is already bound; a connection joins at
    /// most once.
    pub fn bind(&self, binding: Binding) -> bool {
        invariants::assert_binding_invariants(&binding);
        match self.bindings.entry(binding.connection_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(binding);
                true
            }
        }
    }

    /// Owned copy of the connection's binding, if it has one.
    pub fn resolve(&self, connection_id: ConnectionId) -> Option<Binding> {
        self.bindings
            .get(&connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Remove and return the binding. The disconnect path calls this exactly
    /// once per connection.
    pub fn unbind(&self, connection_id: ConnectionId) -> Option<Binding> {
        self.bindings.remove(&connection_id).map(|(_, binding)| binding)
    }

    pub fn is_bound(&self, connection_id: ConnectionId) -> bool {
        self.bindings.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
