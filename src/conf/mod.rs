//! # gitolite.conf Model
//!
//! In-memory representation of a gitolite access-control file. A [`Config`]
//! holds includes, group definitions and repository entries in the order
//! they were declared; each [`Repo`] holds an ordered list of [`Permission`] rules.
//! Rule order matters: gitolite evaluates rules top to bottom and stops at
//! the first match.
//!
//! Parsing lives in [`parser`], rendering in [`writer`]. Saving writes the
//! rendered model back: statement order survives, comments and blank-line
//! layout of the loaded file do not.

pub mod parser;
pub mod writer;

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

pub use parser::parse;
pub use writer::render;

/// Name of gitolite's own administrative repository.
pub const ADMIN_REPO: &str = "gitolite-admin";

/// Wildcard entry matching every repository.
pub const ALL_REPOS: &str = "@all";

fn access_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(-|C|R|RW\+?(?:C?D?|D?C?)M?)$").expect("access pattern is valid")
    })
}

/// Access level of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Access {
    /// `-`: matching principals are refused.
    Deny,
    /// `R`
    Read,
    /// `RW`
    ReadWrite,
    /// `RW+`: read, write and rewind.
    ReadWriteForce,
    /// Any other gitolite permission token (`C`, `RWC`, `RW+CD`, ...).
    Other(String),
}

impl Access {
    pub fn as_str(&self) -> &str {
        match self {
            Access::Deny => "-",
            Access::Read => "R",
            Access::ReadWrite => "RW",
            Access::ReadWriteForce => "RW+",
            Access::Other(token) => token,
        }
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(token: &str) -> std::result::Result<Self, Self::Err> {
        match token {
            "-" => Ok(Access::Deny),
            "R" => Ok(Access::Read),
            "RW" => Ok(Access::ReadWrite),
            "RW+" => Ok(Access::ReadWriteForce),
            other if access_pattern().is_match(other) => Ok(Access::Other(other.to_string())),
            other => Err(format!("unknown permission {other:?}")),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access rule: who gets which access on which refs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub access: Access,
    /// Ref pattern; empty matches every ref.
    pub refspec: String,
    pub principals: Vec<String>,
}

impl Permission {
    pub fn new<I, S>(access: Access, refspec: impl Into<String>, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            access,
            refspec: refspec.into(),
            principals: principals.into_iter().map(Into::into).collect(),
        }
    }

    pub fn deny<I, S>(refspec: impl Into<String>, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Access::Deny, refspec, principals)
    }

    pub fn read<I, S>(principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Access::Read, "", principals)
    }

    pub fn read_write_force<I, S>(principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Access::ReadWriteForce, "", principals)
    }

    /// True for a rule granting `RW+` on every ref.
    pub fn is_unrestricted_write(&self) -> bool {
        self.access == Access::ReadWriteForce && self.refspec.trim().is_empty()
    }
}

/// A repository entry and its ordered rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub name: String,
    pub permissions: Vec<Permission>,
    /// `config` / `option` lines, kept as `(keyword + " " + key, value)`.
    pub options: Vec<(String, String)>,
}

impl Repo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn clean_permissions(&mut self) {
        self.permissions.clear();
    }

    pub fn push_permission(&mut self, permission: Permission) {
        self.permissions.push(permission);
    }

    /// The principal holding unrestricted write, if any.
    pub fn first_unrestricted_writer(&self) -> Option<&str> {
        self.permissions
            .iter()
            .find(|p| p.is_unrestricted_write())
            .and_then(|p| p.principals.first())
            .map(String::as_str)
    }

    /// Make sure `principal` holds `RW+` on all refs.
    ///
    /// Joins the first existing unrestricted write rule when there is one,
    /// otherwise appends a new rule. Returns false when nothing changed.
    pub fn grant_unrestricted_write(&mut self, principal: &str) -> bool {
        if let Some(rule) = self
            .permissions
            .iter_mut()
            .find(|p| p.is_unrestricted_write())
        {
            if rule.principals.iter().any(|p| p == principal) {
                return false;
            }
            rule.principals.push(principal.to_string());
            return true;
        }
        self.permissions
            .push(Permission::read_write_force([principal]));
        true
    }
}

/// A group definition (`@name = members`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
}

/// One top-level statement of gitolite.conf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// `include` or `subconf` line, verbatim.
    Include(String),
    Group(Group),
    Repo(Repo),
}

/// A whole gitolite.conf.
///
/// Entries keep their declaration order. An `include` after the repository
/// blocks stays after them and the included rules keep their precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    entries: Vec<Entry>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn repos(&self) -> impl Iterator<Item = &Repo> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Repo(repo) => Some(repo),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Group(group) => Some(group),
            _ => None,
        })
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Include(line) => Some(line.as_str()),
            _ => None,
        })
    }

    /// Append an `include`/`subconf` line at the current end of the file.
    pub fn add_include(&mut self, line: impl Into<String>) {
        self.entries.push(Entry::Include(line.into()));
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| matches!(entry, Entry::Repo(repo) if repo.name == name))
    }

    pub fn has_repo(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get_repo(&self, name: &str) -> Option<&Repo> {
        self.repos().find(|r| r.name == name)
    }

    pub fn get_repo_mut(&mut self, name: &str) -> Option<&mut Repo> {
        self.entries.iter_mut().find_map(|entry| match entry {
            Entry::Repo(repo) if repo.name == name => Some(repo),
            _ => None,
        })
    }

    /// Existing entry for `name` or a fresh empty one; does not insert.
    pub fn repo_or_new(&self, name: &str) -> Repo {
        self.get_repo(name)
            .cloned()
            .unwrap_or_else(|| Repo::new(name))
    }

    /// Add `repo`. An existing entry with the same name is replaced in
    /// place when `overwrite` is set; otherwise it is kept and false is
    /// returned.
    pub fn add_repo(&mut self, repo: Repo, overwrite: bool) -> bool {
        match self.get_repo_mut(&repo.name) {
            Some(existing) if overwrite => {
                *existing = repo;
                true
            }
            Some(_) => false,
            None => {
                self.entries.push(Entry::Repo(repo));
                true
            }
        }
    }

    pub fn rm_repo(&mut self, name: &str) -> Option<Repo> {
        let index = self.position(name)?;
        match self.entries.remove(index) {
            Entry::Repo(repo) => Some(repo),
            _ => None,
        }
    }

    /// Entry for `name`, created at the end when missing.
    pub(crate) fn entry(&mut self, name: &str) -> &mut Repo {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.entries.push(Entry::Repo(Repo::new(name)));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[index] {
            Entry::Repo(repo) => repo,
            _ => unreachable!("position only matches repository entries"),
        }
    }

    /// Extend group `name`, defining it at the end when missing.
    pub fn add_group_members<I, S>(&mut self, name: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into);
        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            Entry::Group(group) if group.name == name => Some(group),
            _ => None,
        });
        match existing {
            Some(group) => group.members.extend(members),
            None => self.entries.push(Entry::Group(Group {
                name: name.to_string(),
                members: members.collect(),
            })),
        }
    }

    /// Parse `text` as gitolite.conf.
    pub fn parse(text: &str) -> Result<Self> {
        parse(text)
    }

    pub fn render(&self) -> String {
        render(self)
    }
}

pub(crate) fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::ConfParse {
        line,
        message: message.into(),
    }
}
