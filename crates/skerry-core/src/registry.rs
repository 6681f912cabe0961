//! Registry of live sandboxes keyed by session.

use crate::record::{ContainerRecord, SessionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;

/// Concurrent map from session ID to the live sandbox's record.
///
/// This is the single source of truth for whether a sandbox is live.
/// Entries are only inserted and removed by the [`SandboxManager`].
///
/// [`SandboxManager`]: crate::SandboxManager
#[derive(Debug, Default)]
pub struct SandboxRegistry {
    entries: DashMap<SessionId, ContainerRecord>,
}

impl SandboxRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless the session already has one.
    ///
    /// On conflict the rejected record is handed back so the caller can
    /// clean it up.
    pub(crate) fn insert_new(&self, record: ContainerRecord) -> Result<(), ContainerRecord> {
        match self.entries.entry(record.session_id.clone()) {
            Entry::Occupied(_) => Err(record),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Remove and return a session's record.
    pub(crate) fn remove(&self, session_id: &SessionId) -> Option<ContainerRecord> {
        self.entries.remove(session_id).map(|(_, record)| record)
    }

    /// Remove and return a session's record if `matches` holds for it.
    pub(crate) fn remove_if<F>(&self, session_id: &SessionId, matches: F) -> Option<ContainerRecord>
    where
        F: FnOnce(&ContainerRecord) -> bool,
    {
        self.entries
            .remove_if(session_id, |_, record| matches(record))
            .map(|(_, record)| record)
    }

    /// Clone of a session's record.
    pub fn get(&self, session_id: &SessionId) -> Option<ContainerRecord> {
        self.entries.get(session_id).map(|r| r.value().clone())
    }

    /// Whether a session has a live sandbox.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.entries.contains_key(session_id)
    }

    /// Point-in-time copy of every record.
    pub fn snapshot(&self) -> HashMap<SessionId, ContainerRecord> {
        self.entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// All registered session IDs.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of live sandboxes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no sandbox is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
