//! Artifact store - serialized artifacts under `<root>/<fingerprint>/`
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   <fingerprint_A>/...            # one directory per artifact
//!   .staging-<fingerprint>-<pid>/  # in-flight save, renamed into place
//! ```
//!
//! A save writes into a staging directory and renames it over the final
//! path, so a crash mid-save never leaves a half-written artifact under a
//! fingerprint name. Absence is `Ok(None)`, not an error.

mod model;

pub use model::SequentialModel;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::fingerprint::Fingerprint;
use crate::{Error, Result};

/// Prefix of in-flight save directories.
pub const STAGING_PREFIX: &str = ".staging-";

/// A trainable artifact that can be persisted to a directory.
///
/// The on-disk format belongs to the implementation; the store only
/// decides where the directory lives.
pub trait Artifact: Sized {
    /// Write the artifact into `dir`, which exists and is empty.
    ///
    /// # Errors
    ///
    /// Returns any I/O failure; the store reports it as
    /// [`Error::StoreIo`].
    fn write_to(&self, dir: &Path) -> std::io::Result<()>;

    /// Read an artifact previously written by [`Artifact::write_to`].
    ///
    /// # Errors
    ///
    /// Returns a description of why the bytes could not be decoded; the
    /// store reports it as [`Error::ArtifactLoad`].
    fn read_from(dir: &Path) -> anyhow::Result<Self>;
}

/// Filesystem store keyed by fingerprint.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. No I/O is performed.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage location of an artifact. Pure, no I/O.
    #[must_use]
    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(fingerprint.as_str())
    }

    /// Check whether anything exists at the artifact location.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.path_for(fingerprint).exists()
    }

    /// Persist `artifact`, replacing whatever was stored under `fingerprint`.
    ///
    /// A previous artifact is moved aside before the rename and put back if
    /// the rename fails, so a failed save leaves the old artifact loadable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreIo`] if staging, writing or the final rename
    /// fails. The staging directory is removed on failure.
    pub fn save<A: Artifact>(&self, fingerprint: &Fingerprint, artifact: &A) -> Result<PathBuf> {
        let dest = self.path_for(fingerprint);
        let staging = self.staging_path(fingerprint, "");
        let previous = self.staging_path(fingerprint, "-previous");

        for leftover in [&staging, &previous] {
            remove_tree(leftover).map_err(|e| Error::store_io(leftover, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| Error::store_io(&staging, e))?;

        if let Err(e) = artifact.write_to(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(Error::store_io(&staging, e));
        }

        let had_previous = match fs::rename(&dest, &previous) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(Error::store_io(&dest, e));
            }
        };

        if let Err(e) = fs::rename(&staging, &dest) {
            let _ = remove_tree(&staging);
            if had_previous {
                let _ = fs::rename(&previous, &dest);
            }
            return Err(Error::store_io(&dest, e));
        }
        if had_previous {
            // A leftover keeps the staging prefix and is collected as an orphan
            let _ = remove_tree(&previous);
        }
        fsync_dir(&self.root).ok();

        Ok(dest)
    }

    /// Load the artifact stored under `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactLoad`] if the location exists but cannot be
    /// decoded. A missing artifact is `Ok(None)`.
    pub fn load<A: Artifact>(&self, fingerprint: &Fingerprint) -> Result<Option<A>> {
        let path = self.path_for(fingerprint);
        if !path.exists() {
            return Ok(None);
        }

        A::read_from(&path)
            .map(Some)
            .map_err(|e| Error::ArtifactLoad {
                fingerprint: fingerprint.to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Remove the artifact stored under `fingerprint`.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreIo`] if the location exists but cannot be
    /// removed.
    pub fn delete(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let path = self.path_for(fingerprint);
        remove_tree(&path).map_err(|e| Error::store_io(&path, e))
    }

    /// Total size in bytes of the files under an artifact location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the tree cannot be walked.
    pub fn size_of(&self, fingerprint: &Fingerprint) -> Result<u64> {
        Ok(tree_size(&self.path_for(fingerprint))?)
    }

    /// Root entries that look like artifacts or abandoned saves.
    ///
    /// Yields directories named like a fingerprint and leftover staging
    /// directories. Anything else in the root (the index document, its lock)
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the root cannot be listed. A missing root is
    /// an empty store.
    pub fn artifact_dirs(&self) -> Result<Vec<StoredDir>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(fingerprint) = Fingerprint::parse(&name) {
                dirs.push(StoredDir::Artifact(fingerprint));
            } else if name.starts_with(STAGING_PREFIX) {
                dirs.push(StoredDir::Staging(entry.path()));
            }
        }
        Ok(dirs)
    }

    fn staging_path(&self, fingerprint: &Fingerprint, suffix: &str) -> PathBuf {
        self.root.join(format!(
            "{STAGING_PREFIX}{fingerprint}-{}{suffix}",
            std::process::id()
        ))
    }
}

/// A directory found in the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredDir {
    /// Directory named by a fingerprint
    Artifact(Fingerprint),
    /// Leftover staging directory of an interrupted save
    Staging(PathBuf),
}

/// Remove a file or directory tree. Returns whether anything existed.
pub(crate) fn remove_tree(path: &Path) -> std::io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

fn tree_size(path: &Path) -> std::io::Result<u64> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    if !meta.is_dir() {
        return Ok(meta.len());
    }

    let mut total = 0;
    for entry in fs::read_dir(path)? {
        total += tree_size(&entry?.path())?;
    }
    Ok(total)
}

pub(crate) fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let file = fs::File::open(dir)?;
    file.sync_all()
}
