//! Commit sequence extraction
//!
//! The stack is recomputed from the repository on every invocation: the
//! commits between the merge base of the base ref and `HEAD`, oldest first,
//! each paired with its annotation.

use crate::annotation::{Annotation, AnnotationStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::CommitInfo;
use crate::vcs::VcsService;
use tracing::debug;

/// One position of the stack
#[derive(Debug, Clone)]
pub struct StackEntry {
    /// Position, bottom = 0
    pub position: usize,
    /// The commit at this position
    pub commit: CommitInfo,
    /// Annotation loaded for the commit (empty when none)
    pub annotation: Annotation,
}

impl StackEntry {
    /// Branch recorded in the annotation
    pub fn annotated_branch(&self) -> Option<&str> {
        self.annotation.branch.as_deref()
    }
}

/// The current stack
#[derive(Debug, Clone)]
pub struct Stack {
    /// Base branch name PRs at the bottom target (e.g. `main`)
    pub base_branch: String,
    /// Ref the range starts from (e.g. `origin/main`)
    pub base_ref: String,
    /// Sha of the merge base
    pub merge_base: String,
    /// Checked-out development branch
    pub dev_branch: String,
    /// Entries, oldest first
    pub entries: Vec<StackEntry>,
}

impl Stack {
    /// Whether there is nothing between base and tip
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry whose commit is `sha` (full or abbreviated)
    pub fn entry_for_sha(&self, sha: &str) -> Option<&StackEntry> {
        self.entries
            .iter()
            .find(|e| e.commit.sha == sha || (sha.len() >= 7 && e.commit.sha.starts_with(sha)))
    }

    /// Entry whose annotation names `branch`
    pub fn entry_for_branch(&self, branch: &str) -> Option<&StackEntry> {
        self.entries
            .iter()
            .find(|e| e.annotated_branch() == Some(branch))
    }
}

/// Extract the stack between `config.base_branch` and the checked-out branch
pub fn extract_stack(vcs: &dyn VcsService, config: &Config) -> Result<Stack> {
    let dev_branch = vcs
        .current_branch()?
        .ok_or_else(|| Error::InvalidRange("HEAD is detached; check out a branch".to_string()))?;

    let base_ref = config.base_branch.clone();
    let base_sha = vcs
        .resolve(&base_ref)
        .map_err(|e| Error::InvalidRange(format!("cannot resolve base '{base_ref}': {e}")))?;
    let tip = vcs.resolve("HEAD")?;

    let merge_base = vcs.merge_base(&base_sha, &tip)?.ok_or_else(|| {
        Error::InvalidRange(format!("'{base_ref}' and '{dev_branch}' share no history"))
    })?;

    let commits = vcs.walk_range(&merge_base, &tip)?;
    let store = AnnotationStore::new(vcs);

    let mut entries = Vec::with_capacity(commits.len());
    for commit in commits {
        if commit.parents.len() > 1 {
            return Err(Error::InvalidRange(format!(
                "merge commit {} in {base_ref}..{dev_branch}; the stack must be linear",
                commit.short_sha()
            )));
        }
        if commit.is_fixup() {
            debug!(sha = commit.short_sha(), summary = %commit.summary, "skipping fixup commit");
            continue;
        }
        let annotation = store.load(&commit.sha)?;
        entries.push(StackEntry {
            position: entries.len(),
            commit,
            annotation,
        });
    }

    debug!(
        dev_branch,
        base = %base_ref,
        count = entries.len(),
        "extracted stack"
    );

    Ok(Stack {
        base_branch: config.base_branch_name().to_string(),
        base_ref,
        merge_base,
        dev_branch,
        entries,
    })
}
