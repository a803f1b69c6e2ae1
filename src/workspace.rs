//! # Transaction Workspace
//!
//! Each transaction works on its own throwaway clone of the gitolite admin
//! repository:
//!
//! ```text
//! <tmp_root>/<prefix>-<unix-seconds>-<pid>-<seq>/<clone_subdir>/
//!     conf/gitolite.conf
//!     keydir/<id>.pub
//! ```
//!
//! The directory name combines a coarse timestamp with the process id and a
//! process-wide counter, so two workspaces never share a name even when
//! transactions follow each other within the same second.
//!
//! A workspace is removed only after a successful publish. Directories of
//! failed transactions stay behind for inspection and are reclaimed by
//! [`sweep_stale`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::git::GitOperations;
use crate::settings::Settings;

/// gitolite.conf location inside the clone.
pub const CONF_FILE: &str = "conf/gitolite.conf";

/// Public key directory inside the clone.
pub const KEY_DIR: &str = "keydir";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// One transaction's working copy.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    root: PathBuf,
    clone_dir: PathBuf,
}

impl Workspace {
    /// Reserve a fresh, unique workspace name. Nothing is created on disk.
    pub fn allocate(settings: &Settings) -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let id = format!(
            "{}-{}-{}-{}",
            settings.workspace_prefix,
            seconds,
            std::process::id(),
            sequence
        );
        let root = settings.tmp_root.join(&id);
        let clone_dir = root.join(&settings.clone_subdir);
        Self {
            id,
            root,
            clone_dir,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The workspace directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The admin repository clone inside the workspace.
    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    pub fn conf_path(&self) -> PathBuf {
        self.clone_dir.join(CONF_FILE)
    }

    pub fn key_dir(&self) -> PathBuf {
        self.clone_dir.join(KEY_DIR)
    }

    /// Create the workspace directory and clone the admin repository.
    ///
    /// The directory must not exist yet.
    pub fn pull(&self, git: &dyn GitOperations, uri: &str) -> Result<()> {
        if let Some(parent) = self.root.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&self.root)?;
        debug!("cloning {} into {}", uri, self.clone_dir.display());
        git.clone_repo(uri, &self.clone_dir)
            .map_err(|e| Error::Clone {
                uri: uri.to_string(),
                source: Box::new(e),
            })
    }

    /// Stage everything, commit and push. A clean tree publishes nothing.
    pub fn publish(&self, git: &dyn GitOperations, message: &str) -> Result<()> {
        self.try_publish(git, message)
            .map_err(|e| Error::Publish {
                source: Box::new(e),
            })
    }

    fn try_publish(&self, git: &dyn GitOperations, message: &str) -> Result<()> {
        git.add_all(&self.clone_dir)?;
        if !git.has_changes(&self.clone_dir)? {
            info!("gitolite config unchanged, nothing to publish");
            return Ok(());
        }
        git.commit(&self.clone_dir, message)?;
        git.push(&self.clone_dir)?;
        info!("published gitolite config from workspace {}", self.id);
        Ok(())
    }

    /// Remove the workspace directory.
    pub fn cleanup(self) -> Result<()> {
        fs::remove_dir_all(&self.root)?;
        debug!("removed workspace {}", self.root.display());
        Ok(())
    }
}

/// Remove workspace directories under `tmp_root` whose name starts with
/// `prefix-` and that were last modified more than `older_than` ago.
///
/// Returns how many directories were removed. Entries that vanish or cannot
/// be removed are logged and skipped.
pub fn sweep_stale(tmp_root: &Path, prefix: &str, older_than: Duration) -> Result<usize> {
    let marker = format!("{prefix}-");
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(tmp_root)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(&marker) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => continue,
            Err(e) => {
                warn!("skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < older_than {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => {
                info!("removed stale workspace {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("cannot remove {}: {}", entry.path().display(), e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingGit {
        calls: Mutex<Vec<String>>,
        dirty: bool,
        fail_on: Option<&'static str>,
    }

    impl RecordingGit {
        fn step(&self, name: &'static str, dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.fail_on == Some(name) {
                return Err(Error::GitCommand {
                    command: name.to_string(),
                    dir: dir.to_path_buf(),
                    status: Some(128),
                    stderr: format!("{name} refused"),
                });
            }
            Ok(())
        }
    }

    impl GitOperations for RecordingGit {
        fn clone_repo(&self, _uri: &str, target: &Path) -> Result<()> {
            self.step("clone", target)?;
            fs::create_dir_all(target.join("conf"))?;
            Ok(())
        }
        fn add_all(&self, repo: &Path) -> Result<()> {
            self.step("add", repo)
        }
        fn has_changes(&self, repo: &Path) -> Result<bool> {
            self.step("status", repo)?;
            Ok(self.dirty)
        }
        fn commit(&self, repo: &Path, _message: &str) -> Result<()> {
            self.step("commit", repo)
        }
        fn push(&self, repo: &Path) -> Result<()> {
            self.step("push", repo)
        }
        fn rm_cached(&self, repo: &Path, _path: &Path) -> Result<()> {
            self.step("rm", repo)
        }
    }

    fn settings(temp: &TempDir) -> Settings {
        Settings::new("git@localhost:gitolite-admin").with_tmp_root(temp.path())
    }

    #[test]
    fn test_allocate_layout() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::allocate(&settings(&temp));
        assert!(ws.id().starts_with("gitolite-sync-"));
        assert_eq!(ws.root(), temp.path().join(ws.id()));
        assert_eq!(ws.clone_dir(), ws.root().join("gitolite"));
        assert_eq!(ws.conf_path(), ws.clone_dir().join("conf/gitolite.conf"));
        assert_eq!(ws.key_dir(), ws.clone_dir().join("keydir"));
        assert!(!ws.root().exists());
    }

    #[test]
    fn test_allocate_unique_in_rapid_succession() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        let ids: HashSet<String> = (0..100)
            .map(|_| Workspace::allocate(&settings).id().to_string())
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_pull_creates_clone() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit::default();
        let ws = Workspace::allocate(&settings(&temp));
        ws.pull(&git, "uri").unwrap();
        assert!(ws.clone_dir().join("conf").is_dir());
        assert_eq!(*git.calls.lock().unwrap(), ["clone"]);
    }

    #[test]
    fn test_pull_refuses_existing_directory() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit::default();
        let ws = Workspace::allocate(&settings(&temp));
        fs::create_dir_all(ws.root()).unwrap();
        assert!(matches!(ws.pull(&git, "uri"), Err(Error::Io(_))));
        assert!(git.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pull_failure_is_clone_error() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit {
            fail_on: Some("clone"),
            ..Default::default()
        };
        let ws = Workspace::allocate(&settings(&temp));
        let err = ws.pull(&git, "git@nowhere:admin").unwrap_err();
        match err {
            Error::Clone { uri, source } => {
                assert_eq!(uri, "git@nowhere:admin");
                assert!(matches!(*source, Error::GitCommand { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_publish_clean_tree_skips_commit() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit::default();
        let ws = Workspace::allocate(&settings(&temp));
        ws.publish(&git, "msg").unwrap();
        assert_eq!(*git.calls.lock().unwrap(), ["add", "status"]);
    }

    #[test]
    fn test_publish_dirty_tree_commits_and_pushes() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit {
            dirty: true,
            ..Default::default()
        };
        let ws = Workspace::allocate(&settings(&temp));
        ws.publish(&git, "msg").unwrap();
        assert_eq!(
            *git.calls.lock().unwrap(),
            ["add", "status", "commit", "push"]
        );
    }

    #[test]
    fn test_publish_push_rejection() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit {
            dirty: true,
            fail_on: Some("push"),
            ..Default::default()
        };
        let ws = Workspace::allocate(&settings(&temp));
        let err = ws.publish(&git, "msg").unwrap_err();
        assert!(matches!(err, Error::Publish { .. }));
        assert!(err.to_string().contains("push refused"));
    }

    #[test]
    fn test_cleanup_removes_root() {
        let temp = TempDir::new().unwrap();
        let git = RecordingGit::default();
        let ws = Workspace::allocate(&settings(&temp));
        ws.pull(&git, "uri").unwrap();
        let root = ws.root().to_path_buf();
        ws.cleanup().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_sweep_stale_matches_prefix_and_age() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("gitolite-sync-1-2-3")).unwrap();
        fs::create_dir(temp.path().join("gitolite-sync-4-5-6")).unwrap();
        fs::create_dir(temp.path().join("unrelated")).unwrap();
        fs::write(temp.path().join("gitolite-sync-file"), b"x").unwrap();

        assert_eq!(
            sweep_stale(temp.path(), "gitolite-sync", Duration::from_secs(3600)).unwrap(),
            0
        );
        assert_eq!(
            sweep_stale(temp.path(), "gitolite-sync", Duration::ZERO).unwrap(),
            2
        );
        assert!(temp.path().join("unrelated").exists());
        assert!(temp.path().join("gitolite-sync-file").exists());
    }
}
