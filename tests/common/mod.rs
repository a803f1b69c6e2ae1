//! Shared test utilities for integration tests.
//!
//! [`FakeRemote`] stands in for the gitolite admin repository. It implements
//! `GitOperations` on plain files: cloning writes the remote's files into
//! the workspace, pushing copies the committed workspace back. Every call is
//! recorded so tests can check ordering.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//! ```

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gitolite_sync::conf::{self, Config};
use gitolite_sync::error::{Error, Result};
use gitolite_sync::git::GitOperations;
use gitolite_sync::lock::ProcessLock;
use gitolite_sync::settings::Settings;
use gitolite_sync::storage::{FsStorage, RepoStorage};
use gitolite_sync::GitoliteSync;
use tempfile::TempDir;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use super::{configs, FailingStorage, FakeRemote, Harness};
    pub use gitolite_sync::conf::Permission;
    pub use gitolite_sync::error::Error;
    pub use gitolite_sync::project::ProjectAccess;
    pub use std::time::Duration;
}

/// gitolite.conf documents used as remote seeds.
pub mod configs {
    pub const ADMIN_ONLY: &str = "repo gitolite-admin\n    RW+ = admin\n";

    pub const WITH_PROJECT: &str =
        "repo gitolite-admin\n    RW+ = admin\n\nrepo team/app\n    R = old-reader\n";

    pub const NO_OWNER: &str = "repo gitolite-admin\n    R = watcher\n";
}

#[derive(Debug, Default, Clone)]
pub struct Behavior {
    pub fail_clone: bool,
    pub fail_push: bool,
    pub clone_delay: Duration,
}

#[derive(Default)]
struct State {
    files: BTreeMap<PathBuf, String>,
    pending: Option<BTreeMap<PathBuf, String>>,
    events: Vec<String>,
    behavior: Behavior,
}

/// In-memory admin repository.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<State>>,
}

impl FakeRemote {
    pub fn with_conf(conf: &str) -> Self {
        let remote = Self::default();
        remote.set_file("conf/gitolite.conf", conf);
        remote
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(PathBuf::from(path), content.to_string());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(Path::new(path)).cloned()
    }

    pub fn conf_text(&self) -> String {
        self.file("conf/gitolite.conf").unwrap_or_default()
    }

    pub fn config(&self) -> Config {
        conf::parse(&self.conf_text()).unwrap()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn behave(&self, behavior: Behavior) {
        self.state.lock().unwrap().behavior = behavior;
    }

    fn record(&self, event: &str) -> Behavior {
        let mut state = self.state.lock().unwrap();
        state.events.push(event.to_string());
        state.behavior.clone()
    }
}

fn refused(command: &str, dir: &Path) -> Error {
    Error::GitCommand {
        command: command.to_string(),
        dir: dir.to_path_buf(),
        status: Some(128),
        stderr: format!("fake remote refused {command}"),
    }
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<PathBuf, String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(relative, fs::read_to_string(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

impl GitOperations for FakeRemote {
    fn clone_repo(&self, _uri: &str, target: &Path) -> Result<()> {
        let behavior = self.record("clone");
        thread::sleep(behavior.clone_delay);
        if behavior.fail_clone {
            return Err(refused("clone", target));
        }
        fs::create_dir_all(target)?;
        let files = self.state.lock().unwrap().files.clone();
        for (path, content) in files {
            let full = target.join(path);
            fs::create_dir_all(full.parent().unwrap())?;
            fs::write(full, content)?;
        }
        Ok(())
    }

    fn add_all(&self, _repo: &Path) -> Result<()> {
        Ok(())
    }

    fn has_changes(&self, repo: &Path) -> Result<bool> {
        Ok(snapshot(repo) != self.state.lock().unwrap().files)
    }

    fn commit(&self, repo: &Path, _message: &str) -> Result<()> {
        self.record("commit");
        self.state.lock().unwrap().pending = Some(snapshot(repo));
        Ok(())
    }

    fn push(&self, repo: &Path) -> Result<()> {
        let behavior = self.record("push");
        if behavior.fail_push {
            return Err(refused("push", repo));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(files) = state.pending.take() {
            state.files = files;
        }
        Ok(())
    }

    fn rm_cached(&self, _repo: &Path, _path: &Path) -> Result<()> {
        self.record("rm");
        Ok(())
    }
}

/// Storage that always refuses, counting attempts.
#[derive(Clone, Default)]
pub struct FailingStorage {
    pub attempts: Arc<Mutex<usize>>,
}

impl RepoStorage for FailingStorage {
    fn remove(&self, path: &Path) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(Error::StorageRemoval {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

/// A coordinator wired to a fake remote and a private lock.
pub struct Harness {
    pub tmp: TempDir,
    pub remote: FakeRemote,
    pub lock: Arc<ProcessLock>,
    pub sync: GitoliteSync,
}

impl Harness {
    pub fn new(conf: &str) -> Self {
        Self::build(conf, Duration::from_secs(30), Box::new(FsStorage), None)
    }

    pub fn with_timeout(conf: &str, timeout: Duration) -> Self {
        Self::build(conf, timeout, Box::new(FsStorage), None)
    }

    pub fn with_storage(conf: &str, storage: Box<dyn RepoStorage>) -> Self {
        Self::build(conf, Duration::from_secs(30), storage, None)
    }

    /// Same as `with_timeout`, but sharing `lock`.
    pub fn with_lock(conf: &str, timeout: Duration, lock: Arc<ProcessLock>) -> Self {
        Self::build(conf, timeout, Box::new(FsStorage), Some(lock))
    }

    fn build(
        conf: &str,
        timeout: Duration,
        storage: Box<dyn RepoStorage>,
        lock: Option<Arc<ProcessLock>>,
    ) -> Self {
        let tmp = TempDir::new().unwrap();
        let remote = FakeRemote::with_conf(conf);
        let lock = lock.unwrap_or_else(|| Arc::new(ProcessLock::new()));
        let settings = Settings::new("fake://gitolite-admin")
            .with_tmp_root(tmp.path())
            .with_timeout(timeout);
        let sync = GitoliteSync::with_operations(
            settings,
            Box::new(remote.clone()),
            storage,
            Arc::clone(&lock),
        )
        .unwrap();
        Self {
            tmp,
            remote,
            lock,
            sync,
        }
    }

    /// Workspace directories left under the temp root.
    pub fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.tmp.path()).unwrap().count()
    }
}
