//! # redb-backed Relationship Store
//!
//! A disk-backed record store using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Records are serialized with postcard. The optimistic version check runs
//! inside the write transaction, so a conditional update is atomic: either
//! the stored version matched and the bumped record is committed, or nothing
//! is written and the caller sees `Conflict`.

use crate::relationship::Relationship;
use crate::store::RelationshipStore;
use crate::types::{KinshipError, RelationshipId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for relationships: RelationshipId(u64) -> serialized Relationship bytes
const RELATIONSHIPS: TableDefinition<u64, &[u8]> = TableDefinition::new("relationships");

/// A disk-backed relationship store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a relationship database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KinshipError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| KinshipError::Io(e.to_string()))?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| KinshipError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(RELATIONSHIPS)
                .map_err(|e| KinshipError::Io(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| KinshipError::Io(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), KinshipError> {
        self.db
            .compact()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        Ok(())
    }
}

fn encode(record: &Relationship) -> Result<Vec<u8>, KinshipError> {
    postcard::to_stdvec(record).map_err(|e| KinshipError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Relationship, KinshipError> {
    postcard::from_bytes(bytes).map_err(|e| KinshipError::Serialization(e.to_string()))
}

impl RelationshipStore for RedbStore {
    fn get(&self, id: RelationshipId) -> Result<Option<Relationship>, KinshipError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(RELATIONSHIPS)
            .map_err(|e| KinshipError::Io(e.to_string()))?;

        match table.get(id.0).map_err(|e| KinshipError::Io(e.to_string()))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn insert(&mut self, record: &Relationship) -> Result<(), KinshipError> {
        let bytes = encode(record)?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(RELATIONSHIPS)
                .map_err(|e| KinshipError::Io(e.to_string()))?;

            let exists = table
                .get(record.id.0)
                .map_err(|e| KinshipError::Io(e.to_string()))?
                .is_some();
            if exists {
                return Err(KinshipError::validation("relationship already exists"));
            }

            table
                .insert(record.id.0, bytes.as_slice())
                .map_err(|e| KinshipError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        Ok(())
    }

    fn update(&mut self, record: &Relationship) -> Result<u64, KinshipError> {
        let mut written = record.clone();
        written.version = record.version.saturating_add(1);
        let bytes = encode(&written)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(RELATIONSHIPS)
                .map_err(|e| KinshipError::Io(e.to_string()))?;

            // Version check inside the write transaction: this IS the
            // conditional-update primitive.
            let stored_version = match table
                .get(record.id.0)
                .map_err(|e| KinshipError::Io(e.to_string()))?
            {
                Some(guard) => decode(guard.value())?.version,
                None => return Err(KinshipError::NotFound),
            };
            if stored_version != record.version {
                return Err(KinshipError::Conflict);
            }

            table
                .insert(record.id.0, bytes.as_slice())
                .map_err(|e| KinshipError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        Ok(written.version)
    }

    fn ids(&self) -> Result<Vec<RelationshipId>, KinshipError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(RELATIONSHIPS)
            .map_err(|e| KinshipError::Io(e.to_string()))?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(|e| KinshipError::Io(e.to_string()))? {
            let (key, _) = entry.map_err(|e| KinshipError::Io(e.to_string()))?;
            ids.push(RelationshipId(key.value()));
        }
        Ok(ids)
    }

    fn count(&self) -> Result<usize, KinshipError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(RELATIONSHIPS)
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        let len = table
            .len()
            .map_err(|e| KinshipError::Io(e.to_string()))?;
        Ok(len as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
