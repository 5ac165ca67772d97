//! Error types for model-cache
//!
//! A cache miss is not an error: lookups return `Option`/`CacheLookup`.
//! The variants below are the failures a caller can actually act on.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// model-cache error types
#[derive(Error, Debug)]
pub enum Error {
    /// A descriptor part cannot be written in canonical form
    #[error("Serialization error: {0}\nFingerprint not computed")]
    Serialization(String),

    /// A string is not a 32-character lowercase hex fingerprint
    #[error("Invalid fingerprint: {0:?}\nExpected 32 lowercase hexadecimal characters")]
    InvalidFingerprint(String),

    /// Artifact bytes exist but could not be decoded
    #[error("Failed to load artifact {fingerprint}: {reason}")]
    ArtifactLoad {
        /// Fingerprint of the unreadable artifact
        fingerprint: String,
        /// Decoder failure message
        reason: String,
    },

    /// Filesystem failure while saving or deleting an artifact
    #[error("Artifact store I/O error at {}: {source}", path.display())]
    StoreIo {
        /// Path being written or removed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The metadata index document could not be written
    #[error("Metadata index not persisted to {}: {source}\nIn-memory index is still current", path.display())]
    MetadataPersist {
        /// Index document path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a store-side I/O failure with the path it happened on.
    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreIo {
            path: path.into(),
            source,
        }
    }

    /// True for failures that only affect durability of the index.
    #[must_use]
    pub const fn is_persist_failure(&self) -> bool {
        matches!(self, Self::MetadataPersist { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
