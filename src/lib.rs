//! # model-cache: Content-Addressed Cache for Trained Models
//!
//! **Version**: 0.1.0
//!
//! Memoizes trained models keyed by a hash of their architecture, training
//! configuration and dataset shape, so repeated pipeline runs with the same
//! configuration skip retraining.
//!
//! ## Design Principles
//!
//! - **Deterministic keys**: canonical JSON + MD5, independent of map order
//! - **Artifact before record**: a crash never leaves a record without data
//! - **Atomic index writes**: temp file + rename, never a torn document
//! - **Cache is optional**: every cache failure degrades to "train anyway"
//!
//! ## Layout
//!
//! ```text
//! <cache_root>/
//!   metadata.json          # fingerprint -> MetadataRecord
//!   metadata.lock          # advisory lock held during index writes
//!   <fingerprint_A>/...    # serialized artifact for fingerprint A
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use model_cache::{CacheConfig, ModelCache};
//! use model_cache::descriptor::{ArtifactDescriptor, DataDescriptor, LayerDescriptor, TrainingConfig};
//! use model_cache::store::SequentialModel;
//!
//! let mut cache = ModelCache::open(CacheConfig::from_env())?;
//!
//! let layers = vec![LayerDescriptor::new("Dense").with_param("units", 10)];
//! let descriptor = ArtifactDescriptor::from_serializable(
//!     layers.clone(),
//!     &TrainingConfig::default(),
//!     &DataDescriptor::new(10, vec![64, 64, 3]),
//! )?;
//!
//! let fp = cache.compute_fingerprint(&descriptor)?;
//! let model = match cache.try_get::<SequentialModel>(&fp) {
//!     Some(model) => model,
//!     None => {
//!         let model = SequentialModel::new("classifier", layers);
//!         cache.put(&descriptor, &model)?;
//!         model
//!     }
//! };
//! println!("{} layers", model.layers().len());
//! # Ok::<(), model_cache::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod admin;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod pipeline;
pub mod store;

pub use cache::{CacheLookup, ModelCache};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
