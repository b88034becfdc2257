//! Routing Table Store - bounded, lock-protected routing table
//!
//! The table itself is private to the store. Callers can only swap it
//! wholesale or copy it out, and the lock is never held across I/O.

use meshroute_core::NodeAddress;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;

/// Consistent copy of the routing table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<NodeAddress>,
}

impl RouteTable {
    /// Addresses in transmission order.
    pub fn entries(&self) -> &[NodeAddress] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take the addresses out of the snapshot.
    pub fn into_entries(self) -> Vec<NodeAddress> {
        self.entries
    }
}

/// Shared container for the currently known routing table.
#[derive(Debug)]
pub struct RouteTableStore {
    capacity: usize,
    table: Mutex<RouteTable>,
}

impl RouteTableStore {
    /// Create an empty store bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            table: Mutex::new(RouteTable::default()),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the stored table. Oversized tables are rejected before the
    /// lock is taken, so a failed call leaves the store untouched.
    pub fn replace(&self, addresses: Vec<NodeAddress>) -> Result<(), StoreError> {
        if addresses.len() > self.capacity {
            return Err(StoreError::CapacityExceeded {
                len: addresses.len(),
                capacity: self.capacity,
            });
        }
        let previous = {
            let mut guard = self.lock();
            std::mem::replace(&mut guard.entries, addresses)
        };
        drop(previous);
        Ok(())
    }

    /// Copy of the current table taken under the lock.
    pub fn snapshot(&self) -> RouteTable {
        self.lock().clone()
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every write is a single mem::replace, so a poisoned lock still guards a
    // whole table.
    fn lock(&self) -> MutexGuard<'_, RouteTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
