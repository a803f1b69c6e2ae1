//! Role memberships supplied by the project management application

use std::path::PathBuf;

/// Principals holding each role on one repository.
///
/// Names are opaque: a user login, a key id or an `@group`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roles {
    pub readers: Vec<String>,
    pub writers: Vec<String>,
    pub masters: Vec<String>,
}

/// Everything the synchronizer needs to know about one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAccess {
    /// Repository entry name in gitolite.conf, e.g. `group/project`.
    pub path: String,
    /// On-disk location of the bare repository, removed on destroy.
    pub storage_path: PathBuf,
    pub roles: Roles,
    pub protected_branches: Vec<String>,
}

impl ProjectAccess {
    pub fn new(path: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            storage_path: storage_path.into(),
            roles: Roles::default(),
            protected_branches: Vec::new(),
        }
    }

    pub fn with_readers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.readers = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_writers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.writers = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_masters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.masters = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_protected_branches<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_branches = names.into_iter().map(Into::into).collect();
        self
    }
}
