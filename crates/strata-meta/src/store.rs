//! [`MetaStore`] implementation wrapping Fjall keyspaces.

use std::path::Path as FsPath;

use bytes::Bytes;
use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use serde::{Deserialize, Serialize};
use strata_chain::Chain;
use strata_types::{NodeId, Path, Tick, Tock};
use tempfile::TempDir;
use tracing::{debug, trace};

use crate::MetaError;

type Result<T> = std::result::Result<T, MetaError>;

/// A persisted entry: the tree's current data for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub path: Path,
    /// `None` for a tombstone.
    pub value: Option<Bytes>,
    pub chain: Chain,
    pub tock: Tock,
}

/// Persisted high-water mark for one origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node: NodeId,
    /// Highest tick seen from `node`.
    pub tick: Tick,
    /// Store tock when the record was written.
    pub tock: Tock,
}

/// Entry and node-counter store backed by Fjall.
pub struct MetaStore {
    #[allow(dead_code)]
    db: Database,
    /// Encoded path → [`EntryRecord`].
    entries: Keyspace,
    /// NodeId bytes → [`NodeRecord`].
    nodes: Keyspace,
    /// Held for temporary stores so the directory outlives the database.
    _tmp: Option<TempDir>,
}

impl MetaStore {
    /// Open a persistent store at the given directory.
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        let db = Database::builder(path).open()?;
        Self::init_keyspaces(db, None)
    }

    /// Open a temporary store that is removed on drop.
    ///
    /// Useful for tests.
    pub fn open_temporary() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let db = Database::builder(tmp.path()).temporary(true).open()?;
        Self::init_keyspaces(db, Some(tmp))
    }

    fn init_keyspaces(db: Database, tmp: Option<TempDir>) -> Result<Self> {
        let entries = db.keyspace("entries", KeyspaceCreateOptions::default)?;
        let nodes = db.keyspace("nodes", KeyspaceCreateOptions::default)?;
        Ok(Self {
            db,
            entries,
            nodes,
            _tmp: tmp,
        })
    }

    // ----- Entries -----

    /// Store or replace the record for `record.path`.
    pub fn put_entry(&self, record: &EntryRecord) -> Result<()> {
        let key = postcard::to_allocvec(&record.path)?;
        let value = postcard::to_allocvec(record)?;
        self.entries.insert(key.as_slice(), value.as_slice())?;
        trace!(path = %record.path, tock = record.tock, "stored entry");
        Ok(())
    }

    /// Fetch the record for `path`.
    pub fn get_entry(&self, path: &Path) -> Result<Option<EntryRecord>> {
        let key = postcard::to_allocvec(path)?;
        match self.entries.get(key.as_slice())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove the record for `path` (after compaction dropped it).
    pub fn remove_entry(&self, path: &Path) -> Result<()> {
        let key = postcard::to_allocvec(path)?;
        self.entries.remove(key.as_slice())?;
        debug!(%path, "removed entry");
        Ok(())
    }

    /// Every stored entry, in key order.
    pub fn list_entries(&self) -> Result<Vec<EntryRecord>> {
        let mut records = Vec::new();
        for guard in self.entries.iter() {
            let v = guard.value()?;
            records.push(postcard::from_bytes(&v)?);
        }
        Ok(records)
    }

    // ----- Node counters -----

    /// Store or replace the counter record for `record.node`.
    pub fn put_node(&self, record: &NodeRecord) -> Result<()> {
        let value = postcard::to_allocvec(record)?;
        self.nodes.insert(record.node.as_bytes(), value.as_slice())?;
        trace!(node = %record.node.short(), tick = record.tick, "stored node record");
        Ok(())
    }

    /// Fetch the counter record for `node`.
    pub fn get_node(&self, node: &NodeId) -> Result<Option<NodeRecord>> {
        match self.nodes.get(node.as_bytes())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every stored node record.
    pub fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        let mut records = Vec::new();
        for guard in self.nodes.iter() {
            let (k, v) = guard.into_inner()?;
            if k.len() != 32 {
                return Err(MetaError::BadNodeKey(k.len()));
            }
            records.push(postcard::from_bytes(&v)?);
        }
        Ok(records)
    }
}
