//! # Git Process Abstraction
//!
//! Every git interaction the synchronizer needs goes through the
//! [`GitOperations`] trait, so the transaction logic can be exercised
//! against a fake remote in tests. [`SystemGit`] is the real implementation;
//! it shells out to the `git` binary, which picks up SSH keys, credential
//! helpers and `~/.gitconfig` the same way an interactive user would.
//!
//! Failures come back as [`Error::GitCommand`] carrying the subcommand, the
//! working directory, the exit status and stderr.

use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::error::{Error, Result};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Clone `uri` into `target`, which must not exist yet or be empty.
    fn clone_repo(&self, uri: &str, target: &Path) -> Result<()>;

    /// Stage every modification, addition and removal in `repo`.
    fn add_all(&self, repo: &Path) -> Result<()>;

    /// Whether `repo` has anything to commit.
    fn has_changes(&self, repo: &Path) -> Result<bool>;

    /// Commit the staged changes.
    fn commit(&self, repo: &Path, message: &str) -> Result<()>;

    /// Push the current branch to its upstream.
    fn push(&self, repo: &Path) -> Result<()>;

    /// Remove `path` (relative to `repo`) from the index. Paths that are
    /// not tracked are ignored.
    fn rm_cached(&self, repo: &Path, path: &Path) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

impl SystemGit {
    fn run(&self, dir: &Path, command: &str, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.current_dir(dir);
        self.execute(cmd, dir, command, args)
    }

    /// Run `git <command> <args>` as prepared in `cmd`. `dir` is only
    /// reported in errors.
    fn execute(
        &self,
        mut cmd: Command,
        dir: &Path,
        command: &str,
        args: &[&str],
    ) -> Result<Output> {
        debug!("git {} {:?} in {}", command, args, dir.display());
        let output = cmd
            .arg(command)
            .args(args)
            .output()
            .map_err(|e| Error::GitCommand {
                command: command.to_string(),
                dir: dir.to_path_buf(),
                status: None,
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::GitCommand {
                command: command.to_string(),
                dir: dir.to_path_buf(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

impl GitOperations for SystemGit {
    fn clone_repo(&self, uri: &str, target: &Path) -> Result<()> {
        // No current_dir: a relative target or local URI resolves against
        // the caller's working directory.
        let path = target.to_string_lossy();
        self.execute(
            Command::new("git"),
            target,
            "clone",
            &["--quiet", uri, path.as_ref()],
        )?;
        Ok(())
    }

    fn add_all(&self, repo: &Path) -> Result<()> {
        self.run(repo, "add", &["-A"])?;
        Ok(())
    }

    fn has_changes(&self, repo: &Path) -> Result<bool> {
        let output = self.run(repo, "status", &["--porcelain"])?;
        Ok(!output.stdout.iter().all(u8::is_ascii_whitespace))
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.run(repo, "commit", &["--quiet", "-m", message])?;
        Ok(())
    }

    fn push(&self, repo: &Path) -> Result<()> {
        self.run(repo, "push", &["--quiet"])?;
        Ok(())
    }

    fn rm_cached(&self, repo: &Path, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.run(
            repo,
            "rm",
            &["--cached", "--ignore-unmatch", "--quiet", "--", path.as_ref()],
        )?;
        Ok(())
    }
}
