//! Cache configuration

use std::path::{Path, PathBuf};

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".model_cache";

/// Default index document name inside the cache root.
pub const DEFAULT_INDEX_FILE: &str = "metadata.json";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "MODEL_CACHE_DIR";

/// Where the cache lives and how its index is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    root: PathBuf,
    index_file: String,
    lock_index: bool,
}

impl CacheConfig {
    /// Configuration with defaults for everything but the root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::builder().root(root).build()
    }

    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Defaults, with the root taken from `MODEL_CACHE_DIR` when set.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var_os(CACHE_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map_or_else(Self::default, Self::new)
    }

    /// Get the cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the index document.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index_file)
    }

    /// Path of the advisory lock file, next to the index document.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.index_path().with_extension("lock")
    }

    /// Whether index writes take the advisory lock.
    #[must_use]
    pub const fn lock_index(&self) -> bool {
        self.lock_index
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for `CacheConfig`.
#[derive(Debug)]
pub struct CacheConfigBuilder {
    root: PathBuf,
    index_file: String,
    lock_index: bool,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_DIR),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            lock_index: true,
        }
    }
}

impl CacheConfigBuilder {
    /// Set the cache root directory
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the index document file name
    #[must_use]
    pub fn index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    /// Enable or disable the advisory lock around index writes
    #[must_use]
    pub const fn lock_index(mut self, enabled: bool) -> Self {
        self.lock_index = enabled;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            root: self.root,
            index_file: self.index_file,
            lock_index: self.lock_index,
        }
    }
}
