//! # Relationship Store
//!
//! The keyed record store the engine reads from and conditionally writes to.
//!
//! All mutations go through [`RelationshipStore::update`], which is
//! conditional on the record's optimistic version being unchanged since the
//! read. On mismatch the store returns [`KinshipError::Conflict`] and the
//! engine retries from a fresh read — this is the serialized-per-relationship
//! discipline without locks.
//!
//! ## Storage Backends
//!
//! - `InMemory`: a `BTreeMap` store (fast, volatile; deterministic tests)
//! - `Persistent`: [`RedbStore`] for disk-backed ACID storage

use crate::relationship::Relationship;
use crate::storage::RedbStore;
use crate::types::{KinshipError, RelationshipId};
use std::collections::BTreeMap;

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Keyed record store with conditional (optimistic) updates.
pub trait RelationshipStore {
    /// Fetch a record by id.
    fn get(&self, id: RelationshipId) -> Result<Option<Relationship>, KinshipError>;

    /// Insert a new record. Fails with `Validation` if the id exists.
    fn insert(&mut self, record: &Relationship) -> Result<(), KinshipError>;

    /// Conditionally write a record read at `record.version`.
    ///
    /// Succeeds only if the stored version still equals `record.version`;
    /// the write bumps the version and returns the new value. Returns
    /// `Conflict` on mismatch so the caller can re-read and retry.
    fn update(&mut self, record: &Relationship) -> Result<u64, KinshipError>;

    /// All record ids, ascending.
    fn ids(&self) -> Result<Vec<RelationshipId>, KinshipError>;

    /// Number of records.
    fn count(&self) -> Result<usize, KinshipError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// In-memory store. `BTreeMap` keeps iteration deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<RelationshipId, Relationship>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelationshipStore for MemoryStore {
    fn get(&self, id: RelationshipId) -> Result<Option<Relationship>, KinshipError> {
        Ok(self.records.get(&id).cloned())
    }

    fn insert(&mut self, record: &Relationship) -> Result<(), KinshipError> {
        if self.records.contains_key(&record.id) {
            return Err(KinshipError::validation("relationship already exists"));
        }
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn update(&mut self, record: &Relationship) -> Result<u64, KinshipError> {
        let stored = self
            .records
            .get_mut(&record.id)
            .ok_or(KinshipError::NotFound)?;
        if stored.version != record.version {
            return Err(KinshipError::Conflict);
        }
        let mut written = record.clone();
        written.version = record.version.saturating_add(1);
        let new_version = written.version;
        *stored = written;
        Ok(new_version)
    }

    fn ids(&self) -> Result<Vec<RelationshipId>, KinshipError> {
        Ok(self.records.keys().copied().collect())
    }

    fn count(&self) -> Result<usize, KinshipError> {
        Ok(self.records.len())
    }
}

// =============================================================================
// STORE BACKEND
// =============================================================================

/// Storage backend selection for an engine instance.
///
/// NOTE: does NOT implement Clone — the persistent variant holds a database
/// handle that cannot be safely cloned.
#[derive(Debug)]
pub enum StoreBackend {
    /// In-memory records (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed records using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl RelationshipStore for StoreBackend {
    fn get(&self, id: RelationshipId) -> Result<Option<Relationship>, KinshipError> {
        match self {
            StoreBackend::InMemory(store) => store.get(id),
            StoreBackend::Persistent(store) => store.get(id),
        }
    }

    fn insert(&mut self, record: &Relationship) -> Result<(), KinshipError> {
        match self {
            StoreBackend::InMemory(store) => store.insert(record),
            StoreBackend::Persistent(store) => store.insert(record),
        }
    }

    fn update(&mut self, record: &Relationship) -> Result<u64, KinshipError> {
        match self {
            StoreBackend::InMemory(store) => store.update(record),
            StoreBackend::Persistent(store) => store.update(record),
        }
    }

    fn ids(&self) -> Result<Vec<RelationshipId>, KinshipError> {
        match self {
            StoreBackend::InMemory(store) => store.ids(),
            StoreBackend::Persistent(store) => store.ids(),
        }
    }

    fn count(&self) -> Result<usize, KinshipError> {
        match self {
            StoreBackend::InMemory(store) => store.count(),
            StoreBackend::Persistent(store) => store.count(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
