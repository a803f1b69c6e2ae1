//! # Error Handling
//!
//! This module defines the centralized error type for `gitolite-sync`. It
//! uses `thiserror` to derive a tagged `Error` enum, one variant per failure
//! mode a configuration transaction can run into.
//!
//! ## Key Components
//!
//! - **`Error`**: every failure the crate can produce. Internal stages raise
//!   the specific variant (`Clone`, `Publish`, `LockTimeout`, ...). The
//!   transaction boundary wraps whatever it caught into
//!   `Error::AccessDenied`, so callers see a single failure kind while the
//!   root cause stays reachable through [`Error::cause`].
//!
//! - **`Result<T>`**: a type alias for `std::result::Result<T, Error>`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for gitolite-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration transaction failed.
    ///
    /// This is the only error `GitoliteSync::apply` returns. The wrapped
    /// cause tells operators which stage failed.
    #[error("gitolite access denied: {cause}")]
    AccessDenied {
        #[source]
        cause: Box<Error>,
    },

    /// The exclusive configuration lock could not be taken in time.
    #[error("timed out after {waited:?} waiting for the gitolite config lock")]
    LockTimeout { waited: Duration },

    /// The transaction deadline expired before the named stage completed.
    #[error("transaction deadline of {budget:?} exceeded during {stage}")]
    DeadlineExceeded { stage: &'static str, budget: Duration },

    /// Cloning the admin repository into the workspace failed.
    #[error("failed to clone gitolite admin repository {uri}: {source}")]
    Clone {
        uri: String,
        #[source]
        source: Box<Error>,
    },

    /// Staging, committing or pushing the workspace failed.
    #[error("failed to publish gitolite config: {source}")]
    Publish {
        #[source]
        source: Box<Error>,
    },

    /// A git command exited unsuccessfully or could not be spawned.
    ///
    /// `status` is `None` when the process never ran or was killed by a
    /// signal.
    #[error("git {command} failed in {} (status {}): {stderr}", .dir.display(), .status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()))]
    GitCommand {
        command: String,
        dir: PathBuf,
        status: Option<i32>,
        stderr: String,
    },

    /// A caller-supplied mutation reported a failure of its own.
    #[error("config mutation failed: {message}")]
    Mutation { message: String },

    /// The owner of the gitolite-admin repository could not be read.
    #[error("cannot determine gitolite-admin owner: {message}")]
    OwnerUnknown { message: String },

    /// Deleting a repository's on-disk storage failed.
    #[error("failed to remove repository storage {}: {source}", .path.display())]
    StorageRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key id would escape the key directory or is empty.
    #[error("invalid key id {id:?}")]
    InvalidKeyId { id: String },

    /// The gitolite.conf file could not be parsed.
    #[error("gitolite.conf line {line}: {message}")]
    ConfParse { line: usize, message: String },

    /// The settings are incomplete or inconsistent.
    #[error("invalid settings: {message}")]
    Settings { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Build a mutation failure from any message.
    pub fn mutation(message: impl Into<String>) -> Self {
        Error::Mutation {
            message: message.into(),
        }
    }

    /// Wrap `cause` into the boundary error, unless it already is one.
    pub fn access_denied(cause: Error) -> Self {
        match cause {
            denied @ Error::AccessDenied { .. } => denied,
            other => Error::AccessDenied {
                cause: Box::new(other),
            },
        }
    }

    /// The innermost error behind `AccessDenied`, `Clone` and `Publish`.
    pub fn cause(&self) -> &Error {
        match self {
            Error::AccessDenied { cause } => cause.cause(),
            Error::Clone { source, .. } | Error::Publish { source } => source.cause(),
            other => other,
        }
    }

    /// The error one level below `AccessDenied`, identifying the failed stage.
    pub fn stage(&self) -> &Error {
        match self {
            Error::AccessDenied { cause } => cause,
            other => other,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::AccessDenied { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
