//! On-disk repository storage removal

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};

use crate::error::{Error, Result};

/// Trait for deleting a repository's storage - allows failure injection in
/// tests.
pub trait RepoStorage: Send + Sync {
    /// Delete everything at `path`. A path that is already gone is not an
    /// error.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Removes bare repositories from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl RepoStorage for FsStorage {
    fn remove(&self, path: &Path) -> Result<()> {
        let removal = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match removal {
            Ok(()) => {
                info!("removed repository storage {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("repository storage {} already gone", path.display());
                Ok(())
            }
            Err(source) => Err(Error::StorageRemoval {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
