//! Cache events and the observers that receive them
//!
//! The facade never logs on its own. Every notable outcome is handed to the
//! observer it was constructed with; [`TracingObserver`] turns them into
//! `tracing` events.

use std::path::Path;

use crate::fingerprint::Fingerprint;
use crate::index::IndexLoad;
use crate::Error;

use super::StaleReason;

/// Something the cache facade did or noticed.
#[derive(Debug)]
pub enum CacheEvent<'a> {
    /// The index document was read at start-up.
    IndexOpened {
        /// Index document path
        path: &'a Path,
        /// What was found
        load: &'a IndexLoad,
    },
    /// Record present and artifact loaded.
    Hit {
        /// Looked-up fingerprint
        fingerprint: &'a Fingerprint,
    },
    /// No record for the fingerprint.
    Miss {
        /// Looked-up fingerprint
        fingerprint: &'a Fingerprint,
    },
    /// Record present but the artifact is missing or unreadable.
    Stale {
        /// Looked-up fingerprint
        fingerprint: &'a Fingerprint,
        /// Why the artifact was unusable
        reason: &'a StaleReason,
    },
    /// Artifact written and recorded.
    Stored {
        /// Fingerprint of the new entry
        fingerprint: &'a Fingerprint,
        /// Artifact location
        path: &'a Path,
    },
    /// The index document could not be written; memory is still current.
    PersistFailed {
        /// The persistence failure
        error: &'a Error,
    },
    /// An entry was deleted.
    Deleted {
        /// Deleted fingerprint
        fingerprint: &'a Fingerprint,
        /// Whether an artifact existed and was removed
        artifact_removed: bool,
        /// Whether an index record existed and was removed
        record_removed: bool,
    },
    /// Clearing could not remove one artifact; clearing continued.
    ClearEntryFailed {
        /// Fingerprint whose artifact remains
        fingerprint: &'a Fingerprint,
        /// The removal failure
        error: &'a Error,
    },
    /// The cache was cleared.
    Cleared {
        /// Records dropped from the index
        entries: usize,
        /// Artifacts that could not be removed
        failures: usize,
    },
    /// An unindexed artifact directory was removed.
    OrphanRemoved {
        /// Removed directory
        path: &'a Path,
    },
}

/// Receiver of cache events.
pub trait CacheObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &CacheEvent<'_>);
}

/// Observer that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, event: &CacheEvent<'_>) {
        match event {
            CacheEvent::IndexOpened { path, load } => match load {
                IndexLoad::Fresh => {
                    tracing::debug!(path = %path.display(), "no cache index yet");
                }
                IndexLoad::Loaded { entries, skipped: 0 } => {
                    tracing::debug!(path = %path.display(), entries, "loaded cache index");
                }
                IndexLoad::Loaded { entries, skipped } => {
                    tracing::warn!(
                        path = %path.display(),
                        entries,
                        skipped,
                        "cache index has unreadable entries; keeping them unchanged"
                    );
                }
                IndexLoad::Corrupt { reason } => {
                    tracing::warn!(
                        path = %path.display(),
                        reason = %reason,
                        "failed to load cache metadata, starting empty"
                    );
                }
            },
            CacheEvent::Hit { fingerprint } => {
                tracing::info!(fingerprint = %fingerprint, "cache hit");
            }
            CacheEvent::Miss { fingerprint } => {
                tracing::info!(fingerprint = %fingerprint, "cache miss");
            }
            CacheEvent::Stale {
                fingerprint,
                reason: StaleReason::Missing,
            } => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    "indexed artifact is missing; run delete to drop the record"
                );
            }
            CacheEvent::Stale {
                fingerprint,
                reason: StaleReason::Unreadable(reason),
            } => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    reason = %reason,
                    "failed to load cached artifact"
                );
            }
            CacheEvent::Stored { fingerprint, path } => {
                tracing::info!(fingerprint = %fingerprint, path = %path.display(), "cached artifact");
            }
            CacheEvent::PersistFailed { error } => {
                tracing::warn!(error = %error, "failed to save cache metadata");
            }
            CacheEvent::Deleted {
                fingerprint,
                artifact_removed,
                record_removed,
            } => {
                tracing::info!(
                    fingerprint = %fingerprint,
                    artifact_removed,
                    record_removed,
                    "deleted cache entry"
                );
            }
            CacheEvent::ClearEntryFailed { fingerprint, error } => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %error,
                    "failed to delete cached artifact"
                );
            }
            CacheEvent::Cleared { entries, failures } => {
                tracing::info!(entries, failures, "cache cleared");
            }
            CacheEvent::OrphanRemoved { path } => {
                tracing::info!(path = %path.display(), "removed orphaned artifact");
            }
        }
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl CacheObserver for NullObserver {
    fn on_event(&self, _event: &CacheEvent<'_>) {}
}
