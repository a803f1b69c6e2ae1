//! Rendering of a [`Config`] back to gitolite.conf text

use std::fmt::Write;

use super::{Config, Entry, Permission, Repo};

/// Render `config` as gitolite.conf.
///
/// Entries come out in declaration order, one blank line between blocks.
/// Consecutive includes or group definitions form a single block, and every
/// repository is a block of its own. Rule order inside a repository is
/// preserved exactly.
pub fn render(config: &Config) -> String {
    let mut out = String::new();
    let mut previous: Option<&Entry> = None;

    for entry in config.entries() {
        let same_block = matches!(
            (previous, entry),
            (Some(Entry::Include(_)), Entry::Include(_)) | (Some(Entry::Group(_)), Entry::Group(_))
        );
        if previous.is_some() && !same_block {
            out.push('\n');
        }
        match entry {
            Entry::Include(line) => {
                let _ = writeln!(out, "{line}");
            }
            Entry::Group(group) => {
                let _ = writeln!(out, "{} = {}", group.name, group.members.join(" "));
            }
            Entry::Repo(repo) => render_repo(&mut out, repo),
        }
        previous = Some(entry);
    }

    out
}

fn render_repo(out: &mut String, repo: &Repo) {
    let _ = writeln!(out, "repo {}", repo.name);
    for permission in &repo.permissions {
        let _ = writeln!(out, "    {}", rule_line(permission));
    }
    for (key, value) in &repo.options {
        let _ = writeln!(out, "    {key} = {value}");
    }
}

fn rule_line(permission: &Permission) -> String {
    let refspec = permission.refspec.trim();
    let principals = permission.principals.join(" ");
    if refspec.is_empty() {
        format!("{} = {}", permission.access, principals)
    } else {
        format!("{} {} = {}", permission.access, refspec, principals)
    }
}
