//! # Configuration Session
//!
//! A [`ConfigSession`] is the handle a transaction passes to its mutation
//! callback. It borrows the transaction's workspace, so nothing obtained
//! through it can outlive the transaction.
//!
//! Every operation loads `conf/gitolite.conf` from the clone, edits the
//! in-memory [`Config`], and writes it back. Publishing is left to the
//! transaction coordinator once the callback returns.

use std::fs;
use std::io::ErrorKind;

use log::{error, info, warn};

use crate::conf::{self, Config, Repo, ADMIN_REPO, ALL_REPOS};
use crate::error::{Error, Result};
use crate::git::GitOperations;
use crate::keys::KeyDir;
use crate::permissions;
use crate::project::ProjectAccess;
use crate::storage::RepoStorage;
use crate::workspace::Workspace;

/// Mutation handle bound to one transaction's workspace.
pub struct ConfigSession<'a> {
    workspace: &'a Workspace,
    git: &'a dyn GitOperations,
    storage: &'a dyn RepoStorage,
}

impl<'a> ConfigSession<'a> {
    pub fn new(
        workspace: &'a Workspace,
        git: &'a dyn GitOperations,
        storage: &'a dyn RepoStorage,
    ) -> Self {
        Self {
            workspace,
            git,
            storage,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        self.workspace
    }

    /// Read the clone's gitolite.conf. A missing file is an empty config.
    pub fn load(&self) -> Result<Config> {
        match fs::read_to_string(self.workspace.conf_path()) {
            Ok(text) => conf::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `config` to the clone's gitolite.conf.
    pub fn save(&self, config: &Config) -> Result<()> {
        let path = self.workspace.conf_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, config.render())?;
        Ok(())
    }

    /// Look up or create the entry for `project` and recompile its rules.
    ///
    /// `config` is not modified; add the returned entry with
    /// [`Config::add_repo`] and `overwrite` set.
    pub fn update_project_config(project: &ProjectAccess, config: &Config) -> Repo {
        let mut repo = config.repo_or_new(&project.path);
        permissions::apply_to(&mut repo, &project.roles, &project.protected_branches);
        repo
    }

    /// Create or update the entry of one project.
    pub fn update_project(&mut self, project: &ProjectAccess) -> Result<()> {
        self.update_projects(std::slice::from_ref(project))
    }

    /// Create or update many entries with a single load and save.
    ///
    /// Projects are applied in order; a later project with the same path
    /// replaces the earlier one entirely.
    pub fn update_projects(&mut self, projects: &[ProjectAccess]) -> Result<()> {
        let mut config = self.load()?;
        for project in projects {
            let repo = Self::update_project_config(project, &config);
            config.add_repo(repo, true);
        }
        self.save(&config)?;
        info!("updated {} repository entries", projects.len());
        Ok(())
    }

    /// Delete a project's storage, then drop its entry from the config.
    ///
    /// The two steps are not atomic. When the storage is removed but saving
    /// the config fails, the entry survives while the repository is gone.
    pub fn destroy_project(&mut self, project: &ProjectAccess) -> Result<()> {
        self.storage.remove(&project.storage_path)?;

        let result = self.load().and_then(|mut config| {
            if config.rm_repo(&project.path).is_none() {
                warn!("no gitolite entry for {}", project.path);
            }
            self.save(&config)
        });
        if let Err(e) = &result {
            error!(
                "storage of {} removed but its gitolite entry was not: {}",
                project.path, e
            );
        }
        result
    }

    /// Grant the gitolite-admin owner `RW+` on every repository through the
    /// `@all` entry.
    ///
    /// The owner is the first principal of the first unrestricted `RW+` rule
    /// on `gitolite-admin`.
    pub fn admin_all_repo(&mut self) -> Result<()> {
        let mut config = self.load()?;

        let owner = admin_owner(&config)
            .inspect_err(|e| error!("{}", e))?;

        let all = config.entry(ALL_REPOS);
        if all.grant_unrestricted_write(&owner) {
            info!("granted {} RW+ on {}", owner, ALL_REPOS);
        }
        self.save(&config)
    }

    pub fn keys(&self) -> KeyDir<'_> {
        KeyDir::new(self.workspace.clone_dir(), self.git)
    }

    /// See [`KeyDir::write_key`].
    pub fn write_key(&mut self, id: &str, key: &str) -> Result<()> {
        self.keys().write_key(id, key)
    }

    /// See [`KeyDir::rm_key`].
    pub fn rm_key(&mut self, id: &str) -> Result<()> {
        self.keys().rm_key(id)
    }
}

fn admin_owner(config: &Config) -> Result<String> {
    let repo = config.get_repo(ADMIN_REPO).ok_or_else(|| Error::OwnerUnknown {
        message: format!("no {ADMIN_REPO} entry"),
    })?;
    match repo.first_unrestricted_writer() {
        Some(owner) if !owner.trim().is_empty() => Ok(owner.to_string()),
        _ => Err(Error::OwnerUnknown {
            message: format!("{ADMIN_REPO} has no RW+ owner"),
        }),
    }
}
