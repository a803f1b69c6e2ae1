//! # Settings
//!
//! Runtime settings for the synchronizer: where the gitolite admin
//! repository lives, where workspaces are created, and how long a
//! transaction may take. Settings are plain serde structs loaded from YAML,
//! with defaults for everything except the admin repository URI.
//!
//! ```
//! use gitolite_sync::settings::Settings;
//!
//! let settings = Settings::from_yaml_str(
//!     "admin_uri: git@localhost:gitolite-admin.git\ntimeout_ms: 10000\n",
//! )
//! .unwrap();
//! assert_eq!(settings.timeout().as_secs(), 10);
//! assert_eq!(settings.clone_subdir, "gitolite");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default transaction deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Settings controlling the transaction coordinator and its workspaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// URI of the gitolite admin repository, as understood by `git clone`.
    pub admin_uri: String,

    /// Directory in which per-transaction workspaces are created.
    #[serde(default = "default_tmp_root")]
    pub tmp_root: PathBuf,

    /// Prefix of every workspace directory name.
    #[serde(default = "default_workspace_prefix")]
    pub workspace_prefix: String,

    /// Name of the clone directory inside a workspace.
    #[serde(default = "default_clone_subdir")]
    pub clone_subdir: String,

    /// Message used for every published commit.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Deadline for a whole transaction, lock wait included.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional host-wide lock file, taken after the in-process lock.
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
}

fn default_tmp_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_workspace_prefix() -> String {
    "gitolite-sync".to_string()
}

fn default_clone_subdir() -> String {
    "gitolite".to_string()
}

fn default_commit_message() -> String {
    "gitolite-sync".to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Settings {
    /// Settings for `admin_uri` with every other field defaulted.
    pub fn new(admin_uri: impl Into<String>) -> Self {
        Self {
            admin_uri: admin_uri.into(),
            tmp_root: default_tmp_root(),
            workspace_prefix: default_workspace_prefix(),
            clone_subdir: default_clone_subdir(),
            commit_message: default_commit_message(),
            timeout_ms: default_timeout_ms(),
            lock_file: None,
        }
    }

    /// Parse and validate settings from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a YAML settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn with_tmp_root(mut self, tmp_root: impl Into<PathBuf>) -> Self {
        self.tmp_root = tmp_root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_lock_file(mut self, lock_file: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(lock_file.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject settings that cannot produce a working transaction.
    pub fn validate(&self) -> Result<()> {
        if self.admin_uri.trim().is_empty() {
            return Err(invalid("admin_uri must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms must be greater than zero"));
        }
        for (field, value) in [
            ("workspace_prefix", &self.workspace_prefix),
            ("clone_subdir", &self.clone_subdir),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) || value == ".." || value == "." {
                return Err(invalid(format!(
                    "{field} must be a single path component, got {value:?}"
                )));
            }
        }
        if self.commit_message.trim().is_empty() {
            return Err(invalid("commit_message must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Settings {
        message: message.into(),
    }
}
