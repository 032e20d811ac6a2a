//! Version-control capability
//!
//! The reconciler never talks to git directly. Everything it needs from the
//! repository goes through [`VcsService`], which keeps the engine testable
//! against an in-memory repository.

mod git;

pub use git::GitRepository;

use crate::error::Result;
use crate::types::{CommitInfo, GitRemote};

/// Options for [`VcsService::rebase`]
#[derive(Debug, Clone, Default)]
pub struct RebaseRequest {
    /// Upstream: commits reachable from it are not replayed
    pub upstream: String,
    /// New base (`--onto`); defaults to `upstream`
    pub onto: Option<String>,
    /// Branch to rebase; defaults to the current branch
    pub branch: Option<String>,
    /// Open the todo list in the editor
    pub interactive: bool,
}

/// Repository operations used by ghchain
pub trait VcsService {
    /// Name of the checked-out branch; `None` when HEAD is detached
    fn current_branch(&self) -> Result<Option<String>>;

    /// Resolve any revision (branch, remote ref, sha) to a commit sha
    fn resolve(&self, rev: &str) -> Result<String>;

    /// Merge base of two commits, `None` if the histories are unrelated
    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>>;

    /// Commits reachable from `tip` but not from `exclude`, oldest first
    fn walk_range(&self, exclude: &str, tip: &str) -> Result<Vec<CommitInfo>>;

    /// Read a single commit
    fn commit(&self, sha: &str) -> Result<CommitInfo>;

    /// `user.name` from git config
    fn user_name(&self) -> Result<String>;

    /// Configured remotes
    fn remotes(&self) -> Result<Vec<GitRemote>>;

    /// Note text attached to `sha` in `notes_ref`
    fn read_note(&self, notes_ref: &str, sha: &str) -> Result<Option<String>>;

    /// Attach (overwrite) a note
    fn write_note(&self, notes_ref: &str, sha: &str, text: &str) -> Result<()>;

    /// Remove a note if present
    fn remove_note(&self, notes_ref: &str, sha: &str) -> Result<()>;

    /// All local branches with their tip sha
    fn local_branches(&self) -> Result<Vec<(String, String)>>;

    /// Tip sha of a local branch
    fn branch_tip(&self, name: &str) -> Result<Option<String>>;

    /// Create `name` at `sha`, or move it there when `force`
    fn set_branch(&self, name: &str, sha: &str, force: bool) -> Result<()>;

    /// Check out a local branch
    fn checkout(&self, name: &str) -> Result<()>;

    /// Delete a local branch
    fn delete_branch(&self, name: &str) -> Result<()>;

    /// Tip of the remote-tracking ref `<remote>/<branch>`
    fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>>;

    /// Push branches with `--force-with-lease`
    fn push(&self, remote: &str, branches: &[String]) -> Result<()>;

    /// Delete a branch on the remote
    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Rebase with `--update-refs` so branch pointers follow their commits
    fn rebase(&self, request: &RebaseRequest) -> Result<()>;

    /// Read a repository-local config value
    fn config_get(&self, key: &str) -> Result<Option<String>>;

    /// Write a repository-local config value
    fn config_set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a repository-local config value (no error when absent)
    fn config_unset(&self, key: &str) -> Result<()>;
}
