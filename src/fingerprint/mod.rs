//! Fingerprint function - stable identity for a cacheable artifact
//!
//! ## Algorithm
//!
//! ```text
//! {"layers": structure, "model_config": training_config, "dataset_info": data_descriptor}
//!     -> canonical JSON (keys sorted at every level, sequences untouched)
//!     -> MD5 over the UTF-8 bytes
//!     -> 32 lowercase hex characters
//! ```
//!
//! MD5 is a cache key here, not a security boundary.
//!
//! ## Usage
//!
//! ```rust
//! use model_cache::descriptor::{ArtifactDescriptor, LayerDescriptor};
//! use model_cache::fingerprint::fingerprint;
//! use serde_json::json;
//!
//! let descriptor = ArtifactDescriptor::from_serializable(
//!     vec![LayerDescriptor::new("Dense").with_param("units", 5)],
//!     &json!({"epochs": 5, "optimizer": "adam"}),
//!     &json!({"class_count": 3}),
//! )?;
//!
//! let fp = fingerprint(&descriptor)?;
//! assert_eq!(fp.as_str(), "5bb472deae959c78de3b65bdca2369d7");
//! # Ok::<(), model_cache::Error>(())
//! ```

pub mod canonical;

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::descriptor::{ArtifactDescriptor, LayerDescriptor};
use crate::{Error, Result};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Fixed-length lowercase hex digest of a descriptor.
///
/// Doubles as the primary key of the metadata index and as the directory
/// name of the stored artifact, so construction is validated: a
/// `Fingerprint` never contains path separators or dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a fingerprint string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFingerprint`] unless `s` is exactly 32
    /// lowercase hexadecimal characters.
    pub fn parse(s: &str) -> Result<Self> {
        let valid = s.len() == FINGERPRINT_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidFingerprint(s.to_string()))
        }
    }

    /// Digest arbitrary bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(bytes)))
    }

    /// Get the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for listings.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Fingerprint a descriptor.
///
/// Pure and deterministic: equal descriptors (same layer order, same
/// mappings regardless of key order) always produce the same value.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if any part has no canonical form.
pub fn fingerprint(descriptor: &ArtifactDescriptor) -> Result<Fingerprint> {
    fingerprint_parts(
        descriptor.structure(),
        descriptor.training_config(),
        descriptor.data_descriptor(),
    )
}

/// Fingerprint the three descriptor parts without building a descriptor.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if any part has no canonical form.
pub fn fingerprint_parts(
    structure: &[LayerDescriptor],
    training_config: &Map<String, Value>,
    data_descriptor: &Map<String, Value>,
) -> Result<Fingerprint> {
    let composite = json!({
        "layers": serde_json::to_value(structure)?,
        "model_config": training_config,
        "dataset_info": data_descriptor,
    });
    let text = canonical::to_canonical_string(&composite)?;
    Ok(Fingerprint::of_bytes(text.as_bytes()))
}
