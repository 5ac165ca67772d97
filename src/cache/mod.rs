//! Cache facade - compute-or-fetch for training stages, inspection and
//! deletion for operators
//!
//! ## Lookup States
//!
//! ```text
//! no record                         -> Miss
//! record + artifact loads           -> Hit
//! record + artifact missing/broken  -> Stale   (record left untouched)
//! ```
//!
//! Stale entries are reported, never repaired on the read path; a transient
//! I/O failure must not cost the only pointer to a valid artifact. Records
//! disappear only through [`ModelCache::delete`] or [`ModelCache::clear`].
//!
//! ## Commit Order
//!
//! [`ModelCache::put`] writes the artifact before the record. A crash in
//! between leaves an unindexed artifact directory (see
//! [`ModelCache::orphans`]), never a record pointing at nothing.

mod observer;

pub use observer::{CacheEvent, CacheObserver, NullObserver, TracingObserver};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::CacheConfig;
use crate::descriptor::ArtifactDescriptor;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::index::{MetadataIndex, MetadataRecord};
use crate::store::{remove_tree, Artifact, ArtifactStore, StoredDir};
use crate::{Error, Result};

/// Why an indexed artifact could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Nothing exists at the artifact location.
    Missing,
    /// The artifact exists but failed to decode.
    Unreadable(String),
}

/// Result of a cache lookup.
#[derive(Debug)]
pub enum CacheLookup<A> {
    /// Record present and artifact loaded.
    Hit(A),
    /// No record for the fingerprint.
    Miss,
    /// Record present, artifact unusable. Callers treat this as a miss.
    Stale(StaleReason),
}

impl<A> CacheLookup<A> {
    /// The artifact on a hit, `None` otherwise.
    pub fn into_option(self) -> Option<A> {
        match self {
            Self::Hit(artifact) => Some(artifact),
            Self::Miss | Self::Stale(_) => None,
        }
    }

    /// Check for a hit.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// One listed cache entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    /// Entry fingerprint
    pub fingerprint: Fingerprint,
    /// When the entry was committed
    pub created_at: DateTime<Utc>,
    /// Input domain description
    pub data_descriptor: Map<String, Value>,
    /// Training hyperparameters
    pub training_config: Map<String, Value>,
    /// Recorded artifact location
    pub path: PathBuf,
}

impl CacheEntry {
    fn from_record(fingerprint: &Fingerprint, record: &MetadataRecord) -> Self {
        Self {
            fingerprint: fingerprint.clone(),
            created_at: record.created_at(),
            data_descriptor: record.data_descriptor().clone(),
            training_config: record.training_config().clone(),
            path: record.storage_path().to_path_buf(),
        }
    }
}

/// Outcome of [`ModelCache::clear`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Records dropped from the index
    pub entries: usize,
    /// Artifact directories removed
    pub artifacts_removed: usize,
    /// Artifacts that could not be removed, with the reason
    pub failures: Vec<(Fingerprint, String)>,
    /// Whether the emptied index reached disk
    pub persisted: bool,
}

/// Entry count and disk usage of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    /// Records in the index
    pub entry_count: usize,
    /// Bytes under the indexed artifact directories
    pub total_bytes: u64,
}

/// Content-addressed cache of trained artifacts.
///
/// Owns the artifact store and the metadata index for the lifetime of the
/// process. All calls are synchronous; one instance is meant to be shared
/// sequentially by the stages of a pipeline.
///
/// # Example
///
/// ```rust
/// use model_cache::cache::{ModelCache, NullObserver};
/// use model_cache::config::CacheConfig;
/// use model_cache::descriptor::{ArtifactDescriptor, LayerDescriptor};
/// use model_cache::store::SequentialModel;
/// use serde_json::json;
///
/// # fn main() -> model_cache::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// let mut cache = ModelCache::open_with_observer(
///     CacheConfig::new(dir.path()),
///     Box::new(NullObserver),
/// )?;
///
/// let layers = vec![LayerDescriptor::new("Dense").with_param("units", 5)];
/// let descriptor = ArtifactDescriptor::from_serializable(
///     layers.clone(),
///     &json!({"epochs": 5, "optimizer": "adam"}),
///     &json!({"class_count": 3}),
/// )?;
///
/// let fp = cache.compute_fingerprint(&descriptor)?;
/// assert!(cache.try_get::<SequentialModel>(&fp).is_none());
///
/// cache.put(&descriptor, &SequentialModel::new("demo", layers))?;
/// assert!(cache.try_get::<SequentialModel>(&fp).is_some());
/// # Ok(())
/// # }
/// ```
pub struct ModelCache {
    config: CacheConfig,
    store: ArtifactStore,
    index: MetadataIndex,
    observer: Box<dyn CacheObserver>,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("config", &self.config)
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl ModelCache {
    /// Open a cache that reports through [`TracingObserver`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreIo`] if the root directory cannot be created.
    /// An unreadable index is not an error.
    pub fn open(config: CacheConfig) -> Result<Self> {
        Self::open_with_observer(config, Box::new(TracingObserver))
    }

    /// Open a cache that reports through `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreIo`] if the root directory cannot be created.
    pub fn open_with_observer(
        config: CacheConfig,
        observer: Box<dyn CacheObserver>,
    ) -> Result<Self> {
        fs::create_dir_all(config.root()).map_err(|e| Error::store_io(config.root(), e))?;

        let (index, load) = MetadataIndex::open(config.index_path());
        let index = if config.lock_index() {
            index.with_lock_file(config.lock_path())
        } else {
            index
        };
        observer.on_event(&CacheEvent::IndexOpened {
            path: index.path(),
            load: &load,
        });

        Ok(Self {
            store: ArtifactStore::new(config.root()),
            config,
            index,
            observer,
        })
    }

    /// Get the cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fingerprint a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the descriptor has no canonical
    /// form.
    pub fn compute_fingerprint(&self, descriptor: &ArtifactDescriptor) -> Result<Fingerprint> {
        fingerprint(descriptor)
    }

    /// Look up an artifact, distinguishing misses from stale entries.
    pub fn lookup<A: Artifact>(&self, fingerprint: &Fingerprint) -> CacheLookup<A> {
        if !self.index.contains(fingerprint) {
            self.emit(&CacheEvent::Miss { fingerprint });
            return CacheLookup::Miss;
        }

        let reason = match self.store.load::<A>(fingerprint) {
            Ok(Some(artifact)) => {
                self.emit(&CacheEvent::Hit { fingerprint });
                return CacheLookup::Hit(artifact);
            }
            Ok(None) => StaleReason::Missing,
            Err(e) => StaleReason::Unreadable(e.to_string()),
        };
        self.emit(&CacheEvent::Stale {
            fingerprint,
            reason: &reason,
        });
        CacheLookup::Stale(reason)
    }

    /// Fetch a usable artifact, or `None` on a miss or stale entry.
    pub fn try_get<A: Artifact>(&self, fingerprint: &Fingerprint) -> Option<A> {
        self.lookup(fingerprint).into_option()
    }

    /// Store a freshly trained artifact and record it.
    ///
    /// The artifact is written before the record. A failure to persist the
    /// index is reported to the observer and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the descriptor cannot be
    /// fingerprinted and [`Error::StoreIo`] if the artifact cannot be
    /// written. Either way nothing is recorded.
    pub fn put<A: Artifact>(
        &mut self,
        descriptor: &ArtifactDescriptor,
        artifact: &A,
    ) -> Result<Fingerprint> {
        let fingerprint = fingerprint(descriptor)?;
        let path = self.store.save(&fingerprint, artifact)?;

        let record = MetadataRecord::new(descriptor, &path);
        match self.index.put(fingerprint.clone(), record) {
            Ok(()) => {}
            Err(e) if e.is_persist_failure() => self.emit(&CacheEvent::PersistFailed { error: &e }),
            Err(e) => return Err(e),
        }
        self.emit(&CacheEvent::Stored {
            fingerprint: &fingerprint,
            path: &path,
        });
        Ok(fingerprint)
    }

    /// Delete an entry's artifact and record.
    ///
    /// The artifact is removed first; if that fails the record is kept.
    /// An artifact without a record is still removed. Returns whether
    /// anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreIo`] if the artifact exists but cannot be
    /// removed.
    pub fn delete(&mut self, fingerprint: &Fingerprint) -> Result<bool> {
        let artifact_removed = self.store.delete(fingerprint)?;

        let record_removed = match self.index.remove(fingerprint) {
            Ok(removed) => removed,
            Err(e) if e.is_persist_failure() => {
                self.emit(&CacheEvent::PersistFailed { error: &e });
                true
            }
            Err(e) => return Err(e),
        };

        let removed = artifact_removed || record_removed;
        if removed {
            self.emit(&CacheEvent::Deleted {
                fingerprint,
                artifact_removed,
                record_removed,
            });
        }
        Ok(removed)
    }

    /// Remove every indexed artifact (best effort) and empty the index.
    ///
    /// Artifacts of index entries that could not be read are removed too.
    /// Artifacts that cannot be removed are logged and left behind as
    /// orphans; the index is emptied regardless.
    pub fn clear(&mut self) -> ClearReport {
        let fingerprints = self.index.referenced();
        let mut report = ClearReport {
            entries: fingerprints.len(),
            ..ClearReport::default()
        };

        for fingerprint in &fingerprints {
            match self.store.delete(fingerprint) {
                Ok(true) => report.artifacts_removed += 1,
                Ok(false) => {}
                Err(e) => {
                    self.emit(&CacheEvent::ClearEntryFailed {
                        fingerprint,
                        error: &e,
                    });
                    report.failures.push((fingerprint.clone(), e.to_string()));
                }
            }
        }

        match self.index.clear() {
            Ok(()) => report.persisted = true,
            Err(e) => self.emit(&CacheEvent::PersistFailed { error: &e }),
        }

        self.emit(&CacheEvent::Cleared {
            entries: report.entries,
            failures: report.failures.len(),
        });
        report
    }

    /// Listed entries, oldest first. Reads only the in-memory index.
    #[must_use]
    pub fn entries(&self) -> Vec<CacheEntry> {
        entries_of(&self.index)
    }

    /// Get the record for a fingerprint.
    #[must_use]
    pub fn record(&self, fingerprint: &Fingerprint) -> Option<&MetadataRecord> {
        self.index.get(fingerprint)
    }

    /// Check whether a fingerprint is indexed.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains(fingerprint)
    }

    /// Get the number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Entry count plus bytes under every indexed artifact directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if an artifact tree cannot be walked.
    pub fn summary(&self) -> Result<CacheSummary> {
        summarize(&self.index, &self.store)
    }

    /// Artifact directories no index entry points at, plus abandoned saves.
    ///
    /// An entry counts even when it could not be read, so artifacts of
    /// records written in another layout are never treated as orphans.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the cache root cannot be listed.
    pub fn orphans(&self) -> Result<Vec<PathBuf>> {
        let mut orphans: Vec<PathBuf> = self
            .store
            .artifact_dirs()?
            .into_iter()
            .filter_map(|dir| match dir {
                StoredDir::Artifact(fp) if self.index.references(&fp) => None,
                StoredDir::Artifact(fp) => Some(self.store.path_for(&fp)),
                StoredDir::Staging(path) => Some(path),
            })
            .collect();
        orphans.sort();
        Ok(orphans)
    }

    /// Remove every orphan reported by [`ModelCache::orphans`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreIo`] on the first directory that cannot be
    /// removed; earlier removals stand.
    pub fn prune_orphans(&mut self) -> Result<Vec<PathBuf>> {
        let orphans = self.orphans()?;
        for path in &orphans {
            remove_tree(path).map_err(|e| Error::store_io(path, e))?;
            self.emit(&CacheEvent::OrphanRemoved { path });
        }
        Ok(orphans)
    }

    fn emit(&self, event: &CacheEvent<'_>) {
        self.observer.on_event(event);
    }
}

/// Entries of `index`, oldest first, ties broken by fingerprint.
pub(crate) fn entries_of(index: &MetadataIndex) -> Vec<CacheEntry> {
    let mut entries: Vec<CacheEntry> = index
        .iter()
        .map(|(fp, record)| CacheEntry::from_record(fp, record))
        .collect();
    entries.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
    entries
}

pub(crate) fn summarize(index: &MetadataIndex, store: &ArtifactStore) -> Result<CacheSummary> {
    let mut total_bytes = 0;
    for (fingerprint, _) in index.iter() {
        total_bytes += store.size_of(fingerprint)?;
    }
    Ok(CacheSummary {
        entry_count: index.len(),
        total_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::LayerDescriptor;
    use crate::store::SequentialModel;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn kinds(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl CacheObserver for Recorder {
        fn on_event(&self, event: &CacheEvent<'_>) {
            let kind = match event {
                CacheEvent::IndexOpened { .. } => "opened",
                CacheEvent::Hit { .. } => "hit",
                CacheEvent::Miss { .. } => "miss",
                CacheEvent::Stale {
                    reason: StaleReason::Missing,
                    ..
                } => "stale-missing",
                CacheEvent::Stale { .. } => "stale-unreadable",
                CacheEvent::Stored { .. } => "stored",
                CacheEvent::PersistFailed { .. } => "persist-failed",
                CacheEvent::Deleted { .. } => "deleted",
                CacheEvent::ClearEntryFailed { .. } => "clear-entry-failed",
                CacheEvent::Cleared { .. } => "cleared",
                CacheEvent::OrphanRemoved { .. } => "orphan-removed",
            };
            self.0.lock().unwrap().push(kind.to_string());
        }
    }

    fn descriptor(epochs: u32) -> ArtifactDescriptor {
        ArtifactDescriptor::from_serializable(
            vec![LayerDescriptor::new("Dense").with_param("units", 5)],
            &json!({"epochs": epochs, "optimizer": "adam"}),
            &json!({"class_count": 3}),
        )
        .unwrap()
    }

    fn model() -> SequentialModel {
        SequentialModel::new("m", vec![LayerDescriptor::new("Dense").with_param("units", 5)])
    }

    fn open(root: &Path) -> (ModelCache, Recorder) {
        let recorder = Recorder::default();
        let cache =
            ModelCache::open_with_observer(CacheConfig::new(root), Box::new(recorder.clone()))
                .unwrap();
        (cache, recorder)
    }

    #[test]
    fn test_open_creates_root_and_reports_index() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("cache");
        let (cache, recorder) = open(&root);

        assert!(root.is_dir());
        assert!(cache.is_empty());
        assert_eq!(recorder.kinds(), vec!["opened"]);
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempdir().unwrap();
        let (mut cache, recorder) = open(dir.path());
        let fp = cache.compute_fingerprint(&descriptor(5)).unwrap();

        assert!(matches!(cache.lookup::<SequentialModel>(&fp), CacheLookup::Miss));
        let stored = cache.put(&descriptor(5), &model()).unwrap();
        assert_eq!(stored, fp);
        assert_eq!(cache.try_get::<SequentialModel>(&fp), Some(model()));

        assert_eq!(recorder.kinds(), vec!["opened", "miss", "stored", "hit"]);
    }

    #[test]
    fn test_record_points_at_artifact() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        let fp = cache.put(&descriptor(5), &model()).unwrap();

        let record = cache.record(&fp).unwrap();
        assert_eq!(record.storage_path(), dir.path().join(fp.as_str()));
        assert_eq!(record.descriptor(), Some(descriptor(5)));
    }

    #[test]
    fn test_stale_when_artifact_removed_externally() {
        let dir = tempdir().unwrap();
        let (mut cache, recorder) = open(dir.path());
        let fp = cache.put(&descriptor(5), &model()).unwrap();
        fs::remove_dir_all(dir.path().join(fp.as_str())).unwrap();

        assert!(matches!(
            cache.lookup::<SequentialModel>(&fp),
            CacheLookup::Stale(StaleReason::Missing)
        ));
        // Read path never repairs
        assert!(cache.contains(&fp));
        assert_eq!(recorder.kinds().last().unwrap(), "stale-missing");
    }

    #[test]
    fn test_stale_when_artifact_corrupt() {
        let dir = tempdir().unwrap();
        let (mut cache, recorder) = open(dir.path());
        let fp = cache.put(&descriptor(5), &model()).unwrap();
        fs::write(dir.path().join(fp.as_str()).join("model.json"), b"[").unwrap();

        assert!(cache.try_get::<SequentialModel>(&fp).is_none());
        assert!(cache.contains(&fp));
        assert_eq!(recorder.kinds().last().unwrap(), "stale-unreadable");
    }

    #[test]
    fn test_unindexed_artifact_is_miss() {
        let dir = tempdir().unwrap();
        let (cache, _) = open(dir.path());
        let fp = cache.compute_fingerprint(&descriptor(5)).unwrap();
        ArtifactStore::new(dir.path()).save(&fp, &model()).unwrap();

        assert!(matches!(cache.lookup::<SequentialModel>(&fp), CacheLookup::Miss));
    }

    #[test]
    fn test_delete_twice() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        let fp = cache.put(&descriptor(5), &model()).unwrap();

        assert!(cache.delete(&fp).unwrap());
        assert!(!cache.delete(&fp).unwrap());
        assert!(!dir.path().join(fp.as_str()).exists());
    }

    #[test]
    fn test_delete_removes_unindexed_artifact() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        let fp = cache.compute_fingerprint(&descriptor(5)).unwrap();
        ArtifactStore::new(dir.path()).save(&fp, &model()).unwrap();

        assert!(cache.delete(&fp).unwrap());
        assert!(!dir.path().join(fp.as_str()).exists());
    }

    #[test]
    fn test_delete_stale_record() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        let fp = cache.put(&descriptor(5), &model()).unwrap();
        fs::remove_dir_all(dir.path().join(fp.as_str())).unwrap();

        assert!(cache.delete(&fp).unwrap());
        assert!(!cache.contains(&fp));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        cache.put(&descriptor(5), &model()).unwrap();
        cache.put(&descriptor(10), &model()).unwrap();

        let first = cache.clear();
        assert_eq!(first.entries, 2);
        assert_eq!(first.artifacts_removed, 2);
        assert!(first.failures.is_empty());
        assert!(first.persisted);

        let second = cache.clear();
        assert_eq!(second.entries, 0);
        assert!(cache.entries().is_empty());
    }

    #[test]
    fn test_entries_sorted_oldest_first() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        let older = cache.put(&descriptor(10), &model()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let newer = cache.put(&descriptor(5), &model()).unwrap();

        let listed: Vec<Fingerprint> = cache.entries().into_iter().map(|e| e.fingerprint).collect();
        assert_eq!(listed, vec![older, newer]);
    }

    #[test]
    fn test_summary_counts_bytes() {
        let dir = tempdir().unwrap();
        let (mut cache, _) = open(dir.path());
        assert_eq!(cache.summary().unwrap(), CacheSummary::default());

        let fp = cache.put(&descriptor(5), &model()).unwrap();
        let size = fs::metadata(dir.path().join(fp.as_str()).join("model.json"))
            .unwrap()
            .len();

        let summary = cache.summary().unwrap();
        assert_eq!(summary.entry_count, 1);
        assert_eq!(summary.total_bytes, size);
    }

    #[test]
    fn test_orphans_and_prune() {
        let dir = tempdir().unwrap();
        let (mut cache, recorder) = open(dir.path());
        let kept = cache.put(&descriptor(5), &model()).unwrap();
        let orphan = cache.compute_fingerprint(&descriptor(10)).unwrap();
        ArtifactStore::new(dir.path()).save(&orphan, &model()).unwrap();
        fs::create_dir(dir.path().join(".staging-dead-1")).unwrap();

        let orphans = cache.orphans().unwrap();
        assert_eq!(orphans.len(), 2);
        assert!(orphans.contains(&dir.path().join(orphan.as_str())));

        cache.prune_orphans().unwrap();
        assert!(cache.orphans().unwrap().is_empty());
        assert!(dir.path().join(kept.as_str()).exists());
        assert_eq!(
            recorder.kinds().iter().filter(|k| *k == "orphan-removed").count(),
            2
        );
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempdir().unwrap();
        let fp = {
            let (mut cache, _) = open(dir.path());
            cache.put(&descriptor(5), &model()).unwrap()
        };

        let (cache, _) = open(dir.path());
        assert_eq!(cache.len(), 1);
        assert!(cache.try_get::<SequentialModel>(&fp).is_some());
    }

    #[test]
    fn test_corrupt_index_opens_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("metadata.json"), b"not json at all").unwrap();

        let (cache, recorder) = open(dir.path());
        assert!(cache.is_empty());
        assert_eq!(recorder.kinds(), vec!["opened"]);
    }

    #[test]
    fn test_unreadable_entry_artifact_is_not_an_orphan() {
        let dir = tempdir().unwrap();
        let fp = Fingerprint::parse("0123456789abcdef0123456789abcdef").unwrap();
        ArtifactStore::new(dir.path()).save(&fp, &model()).unwrap();
        fs::write(
            dir.path().join("metadata.json"),
            serde_json::to_vec(&json!({fp.as_str(): {"layers": 3}})).unwrap(),
        )
        .unwrap();
        let (mut cache, _) = open(dir.path());

        cache.put(&descriptor(5), &model()).unwrap();

        assert!(cache.orphans().unwrap().is_empty());
        let report = cache.clear();
        assert_eq!(report.entries, 2);
        assert_eq!(report.artifacts_removed, 2);
        assert!(!dir.path().join(fp.as_str()).exists());
    }

    /// Make `dir` read-only. Returns `false` (and restores it) when the
    /// process can still write there, as privileged users can.
    #[cfg(unix)]
    fn make_read_only(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
        let check = dir.join(".write-check");
        if fs::write(&check, b"").is_ok() {
            fs::remove_file(&check).unwrap();
            make_writable(dir);
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn make_writable(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_keeps_record_when_artifact_cannot_be_removed() {
        let dir = tempdir().unwrap();
        let (mut cache, recorder) = open(dir.path());
        let fp = cache.put(&descriptor(5), &model()).unwrap();
        let artifact = dir.path().join(fp.as_str());
        if !make_read_only(&artifact) {
            return;
        }

        let err = cache.delete(&fp).unwrap_err();
        make_writable(&artifact);

        assert!(matches!(err, Error::StoreIo { .. }));
        assert!(cache.contains(&fp));
        assert!(!recorder.kinds().contains(&"deleted".to_string()));
        let (reopened, _) = open(dir.path());
        assert!(reopened.contains(&fp));
    }

    #[cfg(unix)]
    #[test]
    fn test_clear_continues_past_undeletable_artifact() {
        let dir = tempdir().unwrap();
        let (mut cache, recorder) = open(dir.path());
        let stuck = cache.put(&descriptor(5), &model()).unwrap();
        let freed = cache.put(&descriptor(10), &model()).unwrap();
        let artifact = dir.path().join(stuck.as_str());
        if !make_read_only(&artifact) {
            return;
        }

        let report = cache.clear();
        make_writable(&artifact);

        assert_eq!(report.entries, 2);
        assert_eq!(report.artifacts_removed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, stuck);
        assert!(report.persisted);
        assert!(cache.is_empty());
        assert!(!dir.path().join(freed.as_str()).exists());
        assert!(recorder.kinds().contains(&"clear-entry-failed".to_string()));

        let (reopened, _) = open(dir.path());
        assert!(reopened.is_empty());
        // Left behind for gc
        assert_eq!(reopened.orphans().unwrap(), vec![artifact]);
    }
}
