//! # Permission Compiler
//!
//! Turns role memberships and protected branch names into the ordered rule
//! list of one repository entry. This module does no I/O.
//!
//! gitolite evaluates a repository's rules top to bottom and the first
//! matching rule decides. The compiled order is therefore fixed:
//!
//! 1. deny writers on protected branches (only when both exist),
//! 2. read for readers,
//! 3. `RW+` for writers,
//! 4. `RW+` for masters.
//!
//! Masters never appear in the deny rule, so protected branches stay
//! writable for them.
//!
//! ```
//! use gitolite_sync::conf::Permission;
//! use gitolite_sync::permissions::compile;
//! use gitolite_sync::project::Roles;
//!
//! let roles = Roles {
//!     readers: vec!["alice".into()],
//!     writers: vec!["bob".into()],
//!     masters: vec![],
//! };
//! let rules = compile(&roles, &["release".to_string()]);
//! assert_eq!(
//!     rules,
//!     vec![
//!         Permission::deny("release$ ", ["bob"]),
//!         Permission::read(["alice"]),
//!         Permission::read_write_force(["bob"]),
//!     ]
//! );
//! ```

use crate::conf::{Permission, Repo};
use crate::project::Roles;

/// Compile the rule list for a repository.
pub fn compile(roles: &Roles, protected_branches: &[String]) -> Vec<Permission> {
    let mut rules = Vec::with_capacity(4);

    let protected = protected_refspec(protected_branches);
    if !roles.writers.is_empty() {
        if let Some(refspec) = protected {
            rules.push(Permission::deny(refspec, roles.writers.iter().cloned()));
        }
    }
    if !roles.readers.is_empty() {
        rules.push(Permission::read(roles.readers.iter().cloned()));
    }
    if !roles.writers.is_empty() {
        rules.push(Permission::read_write_force(roles.writers.iter().cloned()));
    }
    if !roles.masters.is_empty() {
        rules.push(Permission::read_write_force(roles.masters.iter().cloned()));
    }

    rules
}

/// Replace every rule of `repo` with the compiled list.
pub fn apply_to(repo: &mut Repo, roles: &Roles, protected_branches: &[String]) {
    repo.clean_permissions();
    repo.permissions
        .extend(compile(roles, protected_branches));
}

/// Combined refspec anchoring each protected branch at its end, e.g.
/// `["a", "b"]` gives `"a$ b$ "`. Blank names are skipped; `None` when
/// nothing is left.
pub fn protected_refspec(branches: &[String]) -> Option<String> {
    let refspec: String = branches
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| format!("{name}$ "))
        .collect();
    (!refspec.is_empty()).then_some(refspec)
}
