//! Metadata index - durable fingerprint -> record mapping
//!
//! The whole mapping lives in one JSON document that is rewritten on every
//! mutation. Memory is updated first, then the document is replaced
//! atomically ([`atomic::write_atomic`]). If the write fails the caller gets
//! [`Error::MetadataPersist`] but the in-memory mapping keeps the change:
//! only durability is lost, not the current process's view.
//!
//! ## Write Sequence
//!
//! ```text
//! lock metadata.lock (optional)
//!   -> re-read document, adopt records written by other processes
//!      (except ones this process removed)
//!   -> write .metadata.json.tmp.<pid>, fsync, rename over metadata.json
//! unlock
//! ```
//!
//! A missing document is a fresh index; a malformed one degrades to an
//! empty index. The index is a cache, never a source of truth.

pub mod atomic;
mod record;

pub use record::{MetadataRecord, MetadataRecordBuilder};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::fingerprint::Fingerprint;
use crate::{Error, Result};

use self::atomic::{write_atomic, IndexLock};

/// Outcome of reading the index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLoad {
    /// No document yet (first run).
    Fresh,
    /// Document read; `skipped` entries had an invalid key or record.
    Loaded {
        /// Records loaded
        entries: usize,
        /// Entries not understood; kept verbatim on the next write
        skipped: usize,
    },
    /// Document unreadable; the index starts empty.
    Corrupt {
        /// Why the document was rejected
        reason: String,
    },
}

impl IndexLoad {
    /// Check whether anything in the document had to be ignored.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::Loaded { skipped: 1.., .. }
        )
    }
}

/// Contents of one index document.
#[derive(Debug, Default)]
struct Document {
    records: BTreeMap<Fingerprint, MetadataRecord>,
    /// Entries whose key or record could not be read, by document key
    unparsed: BTreeMap<String, Value>,
}

impl Document {
    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.records
            .keys()
            .map(|fp| fp.as_str().to_string())
            .chain(self.unparsed.keys().cloned())
    }
}

/// In-memory index mirrored to a single document on disk.
#[derive(Debug)]
pub struct MetadataIndex {
    path: PathBuf,
    lock_path: Option<PathBuf>,
    records: BTreeMap<Fingerprint, MetadataRecord>,
    unparsed: BTreeMap<String, Value>,
    /// Document keys removed here and not yet confirmed gone on disk
    removed: BTreeSet<String>,
}

impl MetadataIndex {
    /// Open the index stored at `path`.
    ///
    /// Never fails: absence and corruption both yield an empty index, with
    /// the reason reported in the returned [`IndexLoad`].
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> (Self, IndexLoad) {
        let path = path.into();
        let (document, load) = Self::read(&path);
        let index = Self {
            path,
            lock_path: None,
            records: document.records,
            unparsed: document.unparsed,
            removed: BTreeSet::new(),
        };
        (index, load)
    }

    /// Hold an exclusive lock on `lock_path` around every write.
    #[must_use]
    pub fn with_lock_file(mut self, lock_path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(lock_path.into());
        self
    }

    /// Read the records of the document at `path` without touching any index.
    #[must_use]
    pub fn load(path: &Path) -> (BTreeMap<Fingerprint, MetadataRecord>, IndexLoad) {
        let (document, load) = Self::read(path);
        (document.records, load)
    }

    fn read(path: &Path) -> (Document, IndexLoad) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return (Document::default(), IndexLoad::Fresh)
            }
            Err(e) => {
                return (
                    Document::default(),
                    IndexLoad::Corrupt {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let entries: Map<String, Value> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                return (
                    Document::default(),
                    IndexLoad::Corrupt {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let mut document = Document::default();
        for (key, value) in entries {
            let fingerprint = Fingerprint::parse(&key).ok();
            let record = serde_json::from_value::<MetadataRecord>(value.clone()).ok();
            match fingerprint.zip(record) {
                Some((fingerprint, record)) => {
                    document.records.insert(fingerprint, record);
                }
                None => {
                    document.unparsed.insert(key, value);
                }
            }
        }

        let load = IndexLoad::Loaded {
            entries: document.records.len(),
            skipped: document.unparsed.len(),
        };
        (document, load)
    }

    /// Discard memory and re-read the document.
    pub fn reload(&mut self) -> IndexLoad {
        let (document, load) = Self::read(&self.path);
        self.records = document.records;
        self.unparsed = document.unparsed;
        self.removed.clear();
        load
    }

    /// Get the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a record by fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&MetadataRecord> {
        self.records.get(fingerprint)
    }

    /// Check whether a fingerprint has a record.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.records.contains_key(fingerprint)
    }

    /// Check whether the document has any entry for a fingerprint, readable
    /// or not.
    #[must_use]
    pub fn references(&self, fingerprint: &Fingerprint) -> bool {
        self.contains(fingerprint) || self.unparsed.contains_key(fingerprint.as_str())
    }

    /// Fingerprints with an entry in the document, readable or not.
    #[must_use]
    pub fn referenced(&self) -> Vec<Fingerprint> {
        let mut fingerprints: Vec<Fingerprint> = self.records.keys().cloned().collect();
        fingerprints.extend(
            self.unparsed
                .keys()
                .filter_map(|key| Fingerprint::parse(key).ok()),
        );
        fingerprints
    }

    /// Get the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the number of entries carried without being understood.
    #[must_use]
    pub fn unparsed_len(&self) -> usize {
        self.unparsed.len()
    }

    /// Iterate records in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &MetadataRecord)> {
        self.records.iter()
    }

    /// Insert or overwrite a record, then persist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataPersist`] if the document could not be
    /// written. The record stays in memory.
    pub fn put(&mut self, fingerprint: Fingerprint, record: MetadataRecord) -> Result<()> {
        self.removed.remove(fingerprint.as_str());
        self.unparsed.remove(fingerprint.as_str());
        self.records.insert(fingerprint, record);
        self.persist()
    }

    /// Remove the entry for a fingerprint, readable or not, then persist.
    ///
    /// Returns `false` without writing anything if the fingerprint is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataPersist`] if the document could not be
    /// written. The record stays removed in memory.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Result<bool> {
        let record = self.records.remove(fingerprint).is_some();
        let unparsed = self.unparsed.remove(fingerprint.as_str()).is_some();
        if !record && !unparsed {
            return Ok(false);
        }
        self.removed.insert(fingerprint.as_str().to_string());
        self.persist()?;
        Ok(true)
    }

    /// Remove every entry, then persist an empty document.
    ///
    /// Entries other processes committed before this call are dropped too.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataPersist`] if the document could not be
    /// written. Memory is empty regardless.
    pub fn clear(&mut self) -> Result<()> {
        let (on_disk, _) = Self::read(&self.path);
        self.removed.extend(on_disk.keys());
        let in_memory = Document {
            records: std::mem::take(&mut self.records),
            unparsed: std::mem::take(&mut self.unparsed),
        };
        self.removed.extend(in_memory.keys());
        self.persist()
    }

    /// Write the full mapping to disk.
    ///
    /// Once the write lands, removed keys are no longer tracked: the
    /// document itself is the record of their absence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataPersist`] on lock, serialization or write
    /// failure.
    pub fn persist(&mut self) -> Result<()> {
        let _guard = match &self.lock_path {
            Some(lock_path) => Some(IndexLock::acquire(lock_path).map_err(|e| self.persist_error(e))?),
            None => None,
        };

        self.merge_from_disk();

        let mut entries = self.unparsed.clone();
        for (fingerprint, record) in &self.records {
            let value = serde_json::to_value(record)
                .map_err(|e| self.persist_error(std::io::Error::other(e)))?;
            entries.insert(fingerprint.as_str().to_string(), value);
        }
        let bytes = serde_json::to_vec_pretty(&entries)
            .map_err(|e| self.persist_error(std::io::Error::other(e)))?;
        write_atomic(&self.path, &bytes).map_err(|e| self.persist_error(e))?;

        self.removed.clear();
        Ok(())
    }

    /// Adopt entries another writer committed since we last looked.
    fn merge_from_disk(&mut self) {
        let (on_disk, _) = Self::read(&self.path);
        for (fingerprint, record) in on_disk.records {
            if !self.removed.contains(fingerprint.as_str())
                && !self.unparsed.contains_key(fingerprint.as_str())
            {
                self.records.entry(fingerprint).or_insert(record);
            }
        }
        for (key, value) in on_disk.unparsed {
            let known = Fingerprint::parse(&key).is_ok_and(|fp| self.records.contains_key(&fp));
            if !self.removed.contains(&key) && !known {
                self.unparsed.entry(key).or_insert(value);
            }
        }
    }

    #[cfg(test)]
    fn pending_removals(&self) -> usize {
        self.removed.len()
    }

    fn persist_error(&self, source: std::io::Error) -> Error {
        Error::MetadataPersist {
            path: self.path.clone(),
            source,
        }
    }
}
