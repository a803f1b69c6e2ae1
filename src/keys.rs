//! # Public Key Files
//!
//! gitolite identifies SSH users by the file name of their public key in
//! `keydir/`: `keydir/alice.pub` authenticates as `alice`. [`KeyDir`] writes
//! and removes those files inside a transaction's clone. Nothing is durable
//! until the enclosing transaction publishes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::git::GitOperations;
use crate::workspace::KEY_DIR;

/// Key directory of one workspace clone.
pub struct KeyDir<'a> {
    clone_dir: &'a Path,
    git: &'a dyn GitOperations,
}

impl<'a> KeyDir<'a> {
    pub fn new(clone_dir: &'a Path, git: &'a dyn GitOperations) -> Self {
        Self { clone_dir, git }
    }

    /// Write `key` as the public key of `id`, replacing any previous key.
    /// Line breaks are stripped so the file holds exactly one key line.
    pub fn write_key(&self, id: &str, key: &str) -> Result<()> {
        let relative = key_file(id)?;
        let path = self.clone_dir.join(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line: String = key.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();
        fs::write(&path, line)?;
        debug!("wrote key {}", relative.display());
        Ok(())
    }

    /// Delete the key of `id` and stage the removal.
    pub fn rm_key(&self, id: &str) -> Result<()> {
        let relative = key_file(id)?;
        match fs::remove_file(self.clone_dir.join(&relative)) {
            Ok(()) => debug!("removed key {}", relative.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("key {} not present, nothing to remove", relative.display())
            }
            Err(e) => return Err(e.into()),
        }
        self.git.rm_cached(self.clone_dir, &relative)
    }

    pub fn key_path(&self, id: &str) -> Result<PathBuf> {
        Ok(self.clone_dir.join(key_file(id)?))
    }
}

/// `keydir/<id>.pub`, after checking that `id` stays inside the key
/// directory.
fn key_file(id: &str) -> Result<PathBuf> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0']);
    if !valid {
        return Err(Error::InvalidKeyId { id: id.to_string() });
    }
    Ok(Path::new(KEY_DIR).join(format!("{id}.pub")))
}
