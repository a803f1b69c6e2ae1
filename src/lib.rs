//! # gitolite-sync
//!
//! This library keeps a gitolite administration repository in step with the
//! access rules of a set of source repositories. It turns per-repository
//! role memberships (readers, writers, masters) and protected branch names
//! into gitolite permission rules, and publishes every change by cloning,
//! editing, committing and pushing the admin repository. gitolite itself
//! enforces the published rules; this crate never authorizes anything.
//!
//! ## Quick Example
//!
//! ```no_run
//! use gitolite_sync::project::ProjectAccess;
//! use gitolite_sync::settings::Settings;
//! use gitolite_sync::transaction::GitoliteSync;
//!
//! let sync = GitoliteSync::new(Settings::new("git@localhost:gitolite-admin")).unwrap();
//!
//! let project = ProjectAccess::new("team/app", "/srv/repositories/team/app.git")
//!     .with_readers(["reporter"])
//!     .with_writers(["dev"])
//!     .with_masters(["lead"])
//!     .with_protected_branches(["master"]);
//!
//! sync.apply(|session| {
//!     session.update_project(&project)?;
//!     session.write_key("dev", "ssh-ed25519 AAAA... dev@laptop")
//! })
//! .unwrap();
//! ```
//!
//! ## Core Concepts
//!
//! - **Permissions (`permissions`)**: the pure rule compiler. Rule order is
//!   significant because gitolite stops at the first matching rule.
//! - **Config model (`conf`)**: gitolite.conf parsed into repositories and
//!   ordered rules, and rendered back.
//! - **Sessions (`session`, `keys`)**: what a mutation callback can do to the
//!   checked-out config: update or destroy entries, bootstrap the admin
//!   owner, manage key files.
//! - **Transactions (`transaction`, `workspace`, `lock`, `git`)**: one global
//!   lock, one deadline, one clone per transaction, and one coarse
//!   `AccessDenied` error for every failure.

pub mod conf;
pub mod error;
pub mod git;
pub mod keys;
pub mod lock;
pub mod permissions;
pub mod project;
pub mod session;
pub mod settings;
pub mod storage;
pub mod transaction;
pub mod workspace;

pub use error::{Error, Result};
pub use project::{ProjectAccess, Roles};
pub use session::ConfigSession;
pub use settings::Settings;
pub use transaction::GitoliteSync;
