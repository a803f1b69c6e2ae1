//! # Transaction Coordinator
//!
//! [`GitoliteSync::apply`] is the only way the gitolite admin repository is
//! changed. One call is one transaction:
//!
//! 1. take the process-wide config lock (and the lock file, if configured),
//! 2. clone the admin repository into a fresh workspace,
//! 3. run the caller's mutation against a [`ConfigSession`],
//! 4. commit and push,
//! 5. remove the workspace.
//!
//! The whole sequence runs under one deadline. Stages are not interrupted
//! while running; the deadline is checked between them and an expired
//! deadline turns the transaction into a failure.
//!
//! Every failure is logged and returned as [`Error::AccessDenied`]. The
//! original error is kept as its cause. The workspace of a failed
//! transaction is left on disk, and the remote may already hold a push that
//! happened before the failure was detected.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error};

use crate::error::{Error, Result};
use crate::git::{GitOperations, SystemGit};
use crate::lock::{FileLock, ProcessLock};
use crate::project::ProjectAccess;
use crate::session::ConfigSession;
use crate::settings::Settings;
use crate::storage::{FsStorage, RepoStorage};
use crate::workspace::Workspace;

/// Transaction budget measured from the start of `apply`.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        if self.started.elapsed() > self.budget {
            return Err(Error::DeadlineExceeded {
                stage,
                budget: self.budget,
            });
        }
        Ok(())
    }
}

/// Publishes gitolite configuration changes, one transaction at a time.
pub struct GitoliteSync {
    settings: Settings,
    git: Box<dyn GitOperations>,
    storage: Box<dyn RepoStorage>,
    lock: Arc<ProcessLock>,
}

impl GitoliteSync {
    /// A coordinator using the system `git`, the local filesystem and the
    /// process-wide lock.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_operations(
            settings,
            Box::new(SystemGit),
            Box::new(FsStorage),
            ProcessLock::global(),
        )
    }

    /// A coordinator with custom git, storage and lock implementations.
    pub fn with_operations(
        settings: Settings,
        git: Box<dyn GitOperations>,
        storage: Box<dyn RepoStorage>,
        lock: Arc<ProcessLock>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            git,
            storage,
            lock,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `mutation` inside one pull-mutate-publish transaction.
    ///
    /// Returns the mutation's value on success. Any failure, including an
    /// error returned by `mutation`, comes back as `Error::AccessDenied`.
    pub fn apply<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut ConfigSession<'_>) -> Result<T>,
    {
        let deadline = Deadline::start(self.settings.timeout());
        self.run(&deadline, mutation).map_err(|cause| {
            error!("{}", cause);
            Error::access_denied(cause)
        })
    }

    fn run<T, F>(&self, deadline: &Deadline, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut ConfigSession<'_>) -> Result<T>,
    {
        let _guard = self.lock.acquire(deadline.remaining())?;
        let _file_lock = match &self.settings.lock_file {
            Some(path) => Some(FileLock::acquire(path, deadline.remaining())?),
            None => None,
        };
        deadline.check("lock")?;

        let workspace = Workspace::allocate(&self.settings);
        debug!("transaction {} started", workspace.id());
        workspace.pull(self.git.as_ref(), &self.settings.admin_uri)?;
        deadline.check("clone")?;

        let value = {
            let mut session =
                ConfigSession::new(&workspace, self.git.as_ref(), self.storage.as_ref());
            mutation(&mut session)?
        };
        deadline.check("mutation")?;

        workspace.publish(self.git.as_ref(), &self.settings.commit_message)?;
        deadline.check("publish")?;

        let id = workspace.id().to_string();
        workspace.cleanup()?;
        debug!("transaction {} finished in {:?}", id, deadline.started.elapsed());
        Ok(value)
    }

    /// Create or update one repository entry.
    pub fn update_project(&self, project: &ProjectAccess) -> Result<()> {
        self.apply(|session| session.update_project(project))
    }

    /// Create or update many repository entries with a single clone and
    /// publish.
    pub fn update_projects(&self, projects: &[ProjectAccess]) -> Result<()> {
        self.apply(|session| session.update_projects(projects))
    }

    /// Remove a repository's storage and its entry.
    pub fn destroy_project(&self, project: &ProjectAccess) -> Result<()> {
        self.apply(|session| session.destroy_project(project))
    }

    /// Grant the gitolite-admin owner write access to every repository.
    pub fn admin_all_repo(&self) -> Result<()> {
        self.apply(|session| session.admin_all_repo())
    }

    /// Install or replace one public key.
    pub fn write_key(&self, id: &str, key: &str) -> Result<()> {
        self.apply(|session| session.write_key(id, key))
    }

    /// Remove one public key.
    pub fn rm_key(&self, id: &str) -> Result<()> {
        self.apply(|session| session.rm_key(id))
    }
}
