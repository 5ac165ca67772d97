//! Operator operations over a cache root
//!
//! Each function opens the cache at `root` with the default layout, does one
//! thing, and drops it. Listing reads only the index document; nothing is
//! created on disk for a root that does not exist yet. How the index was
//! found is reported through [`TracingObserver`] unless the `_with_observer`
//! variant is given another observer.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::cache::{
    entries_of, summarize, CacheEntry, CacheEvent, CacheObserver, CacheSummary, ClearReport,
    ModelCache, TracingObserver,
};
use crate::config::CacheConfig;
use crate::fingerprint::Fingerprint;
use crate::index::MetadataIndex;
use crate::store::ArtifactStore;
use crate::Result;

/// Every entry in the index at `root`, oldest first.
///
/// A missing or unreadable index lists as empty; an unreadable one is
/// logged at warn.
#[must_use]
pub fn list_entries(root: impl AsRef<Path>) -> Vec<CacheEntry> {
    list_entries_with_observer(root, &TracingObserver)
}

/// [`list_entries`], reporting the index load to `observer`.
#[must_use]
pub fn list_entries_with_observer(
    root: impl AsRef<Path>,
    observer: &dyn CacheObserver,
) -> Vec<CacheEntry> {
    let config = CacheConfig::new(root.as_ref());
    entries_of(&open_index(&config, observer))
}

/// Delete one entry by its fingerprint string.
///
/// Returns `false` when neither a record nor an artifact existed.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidFingerprint`] for a malformed hash and
/// [`crate::Error::StoreIo`] if the artifact cannot be removed.
pub fn delete_entry(fingerprint: &str, root: impl AsRef<Path>) -> Result<bool> {
    let fingerprint = Fingerprint::parse(fingerprint)?;
    let mut cache = ModelCache::open(CacheConfig::new(root.as_ref()))?;
    cache.delete(&fingerprint)
}

/// Remove every entry under `root`.
///
/// # Errors
///
/// Returns [`crate::Error::StoreIo`] if the root cannot be created.
pub fn clear(root: impl AsRef<Path>) -> Result<ClearReport> {
    let mut cache = ModelCache::open(CacheConfig::new(root.as_ref()))?;
    Ok(cache.clear())
}

/// Entry count and bytes used by indexed artifacts under `root`.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if an artifact tree cannot be walked.
pub fn summary(root: impl AsRef<Path>) -> Result<CacheSummary> {
    summary_with_observer(root, &TracingObserver)
}

/// [`summary`], reporting the index load to `observer`.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if an artifact tree cannot be walked.
pub fn summary_with_observer(
    root: impl AsRef<Path>,
    observer: &dyn CacheObserver,
) -> Result<CacheSummary> {
    let config = CacheConfig::new(root.as_ref());
    let index = open_index(&config, observer);
    summarize(&index, &ArtifactStore::new(config.root()))
}

/// Read-only index open; creates nothing on disk.
fn open_index(config: &CacheConfig, observer: &dyn CacheObserver) -> MetadataIndex {
    let (index, load) = MetadataIndex::open(config.index_path());
    observer.on_event(&CacheEvent::IndexOpened {
        path: index.path(),
        load: &load,
    });
    index
}

/// Remove unindexed artifact directories and abandoned saves under `root`.
///
/// # Errors
///
/// Returns [`crate::Error::StoreIo`] on the first directory that cannot be
/// removed.
pub fn prune_orphans(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut cache = ModelCache::open(CacheConfig::new(root.as_ref()))?;
    cache.prune_orphans()
}

/// Human-readable listing of `entries`.
#[must_use]
pub fn render_listing(entries: &[CacheEntry]) -> String {
    if entries.is_empty() {
        return "No cached models found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Found {} cached models:", entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "{}. Model {}...", i + 1, entry.fingerprint.short());
        let _ = writeln!(out, "   Created: {}", entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "   Dataset: {} properties", entry.data_descriptor.len());
        let _ = writeln!(out, "   Config: {} parameters", entry.training_config.len());
        let _ = writeln!(out, "   Path: {}", entry.path.display());
        out.push('\n');
    }
    out
}

/// Format a byte count as megabytes with two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
