//! Rebase and fixup coordination
//!
//! A fixup is two commands apart: `start` parks the dev branch and checks out
//! the branch to amend, `done` replays the rest of the stack on top of the
//! amended commit. The only state in between is three keys in the
//! repository's git config.
//!
//! Both `done` and [`rebase`] carry annotations from old tips to new tips for
//! every branch the rebase moved, then reconcile without creating branches
//! or opening PRs.

use crate::annotation::AnnotationStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::reconcile::{ProgressCallback, ReconcileOptions, ReconcileReport, reconcile};
use crate::stack::extract_stack;
use crate::vcs::{RebaseRequest, VcsService};
use tracing::{debug, info};

/// Git config key holding the branch to return to
pub const DEV_BRANCH_KEY: &str = "ghchain.fixup.devbranch";
/// Git config key holding the branch being amended
pub const TARGET_KEY: &str = "ghchain.fixup.target";
/// Git config key holding the target's tip when the fixup started
pub const OLD_TIP_KEY: &str = "ghchain.fixup.oldtip";

/// An in-progress fixup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupMarker {
    /// Branch to return to
    pub dev_branch: String,
    /// Branch being amended
    pub target: String,
    /// Tip of `target` when the fixup started
    pub old_tip: String,
}

impl FixupMarker {
    /// Read the marker; `None` when no fixup is in progress
    pub fn load(vcs: &dyn VcsService) -> Result<Option<Self>> {
        let Some(dev_branch) = vcs.config_get(DEV_BRANCH_KEY)? else {
            return Ok(None);
        };
        let missing =
            |key: &str| Error::FixupState(format!("marker is incomplete: {key} is not set"));
        let target = vcs.config_get(TARGET_KEY)?.ok_or_else(|| missing(TARGET_KEY))?;
        let old_tip = vcs.config_get(OLD_TIP_KEY)?.ok_or_else(|| missing(OLD_TIP_KEY))?;
        Ok(Some(Self {
            dev_branch,
            target,
            old_tip,
        }))
    }

    fn save(&self, vcs: &dyn VcsService) -> Result<()> {
        vcs.config_set(DEV_BRANCH_KEY, &self.dev_branch)?;
        vcs.config_set(TARGET_KEY, &self.target)?;
        vcs.config_set(OLD_TIP_KEY, &self.old_tip)
    }

    fn clear(vcs: &dyn VcsService) -> Result<()> {
        vcs.config_unset(DEV_BRANCH_KEY)?;
        vcs.config_unset(TARGET_KEY)?;
        vcs.config_unset(OLD_TIP_KEY)
    }
}

/// Resolve a fixup target to a branch name
///
/// A local branch name wins; otherwise `target` is a sha (or prefix) of a
/// stack commit and its bound branch is used.
fn resolve_target(vcs: &dyn VcsService, config: &Config, target: &str) -> Result<String> {
    if vcs.branch_tip(target)?.is_some() {
        return Ok(target.to_string());
    }

    let stack = extract_stack(vcs, config)?;
    let entry = stack
        .entry_for_sha(target)
        .ok_or_else(|| Error::BranchNotInStack(target.to_string()))?;
    entry
        .annotated_branch()
        .filter(|b| matches!(vcs.branch_tip(b), Ok(Some(_))))
        .map(str::to_string)
        .ok_or_else(|| {
            Error::FixupState(format!(
                "commit {} has no branch yet; run ghchain first",
                entry.commit.short_sha()
            ))
        })
}

/// Start a fixup of `target` (a branch or a stack commit)
///
/// Records the marker and checks out the target branch.
pub fn start(vcs: &dyn VcsService, config: &Config, target: &str) -> Result<FixupMarker> {
    if let Some(marker) = FixupMarker::load(vcs)? {
        return Err(Error::FixupState(format!(
            "a fixup of {} is already in progress; run `ghchain fixup done` first",
            marker.target
        )));
    }

    let dev_branch = vcs
        .current_branch()?
        .ok_or_else(|| Error::InvalidRange("HEAD is detached; check out a branch".to_string()))?;
    let branch = resolve_target(vcs, config, target)?;
    if branch == dev_branch {
        return Err(Error::FixupState(format!(
            "{branch} is the checked-out branch; amend it directly"
        )));
    }
    let old_tip = vcs
        .branch_tip(&branch)?
        .ok_or_else(|| Error::BranchNotInStack(branch.clone()))?;

    let marker = FixupMarker {
        dev_branch,
        target: branch,
        old_tip,
    };
    marker.save(vcs)?;
    vcs.checkout(&marker.target)?;
    info!(target = %marker.target, dev = %marker.dev_branch, "fixup started");
    Ok(marker)
}

/// Local branch tips before a rewrite
fn snapshot(vcs: &dyn VcsService) -> Result<Vec<(String, String)>> {
    vcs.local_branches()
}

/// Copy annotations from old tips to new tips for branches a rebase moved
///
/// A branch that only advanced (its old tip is an ancestor of the new one)
/// keeps its annotation where it was. Returns the number copied.
pub fn carry_annotations(vcs: &dyn VcsService, before: &[(String, String)]) -> Result<usize> {
    let store = AnnotationStore::new(vcs);
    let mut copied = 0;

    for (name, old_tip) in before {
        let Some(new_tip) = vcs.branch_tip(name)? else {
            continue;
        };
        if &new_tip == old_tip {
            continue;
        }
        if vcs.merge_base(old_tip, &new_tip)?.as_deref() == Some(old_tip.as_str()) {
            debug!(branch = %name, "branch advanced; annotation stays");
            continue;
        }
        if store.copy_forward(old_tip, &new_tip)? {
            copied += 1;
        }
    }

    Ok(copied)
}

fn after_rewrite_options() -> ReconcileOptions {
    ReconcileOptions {
        open_prs: false,
        create_branches: false,
        ..ReconcileOptions::default()
    }
}

/// Finish a fixup
///
/// Returns `None` when the target was left unchanged (nothing to replay).
#[allow(clippy::future_not_send)]
pub async fn done(
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    config: &Config,
    progress: &dyn ProgressCallback,
) -> Result<Option<ReconcileReport>> {
    let marker = FixupMarker::load(vcs)?
        .ok_or_else(|| Error::FixupState("no fixup in progress".to_string()))?;

    let new_tip = vcs
        .branch_tip(&marker.target)?
        .ok_or_else(|| Error::FixupState(format!("branch {} no longer exists", marker.target)))?;

    if new_tip == marker.old_tip {
        FixupMarker::clear(vcs)?;
        vcs.checkout(&marker.dev_branch)?;
        info!(target = %marker.target, "target unchanged; nothing to replay");
        return Ok(None);
    }

    AnnotationStore::new(vcs).copy_forward(&marker.old_tip, &new_tip)?;
    let before = snapshot(vcs)?;
    // Cleared first: after a conflicted rebase the user finishes with git
    // and a plain `ghchain` run re-links the rewritten commits.
    FixupMarker::clear(vcs)?;
    vcs.rebase(&RebaseRequest {
        upstream: marker.old_tip.clone(),
        onto: Some(marker.target.clone()),
        branch: Some(marker.dev_branch.clone()),
        interactive: false,
    })?;

    let copied = carry_annotations(vcs, &before)?;
    info!(target = %marker.target, copied, "fixup replayed");

    reconcile(vcs, platform, config, after_rewrite_options(), progress)
        .await
        .map(Some)
}

/// Rebase the stack onto `onto` and reconcile
#[allow(clippy::future_not_send)]
pub async fn rebase(
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    config: &Config,
    onto: &str,
    interactive: bool,
    progress: &dyn ProgressCallback,
) -> Result<ReconcileReport> {
    if let Some(marker) = FixupMarker::load(vcs)? {
        return Err(Error::FixupState(format!(
            "a fixup of {} is in progress; run `ghchain fixup done` first",
            marker.target
        )));
    }

    let before = snapshot(vcs)?;
    vcs.rebase(&RebaseRequest {
        upstream: onto.to_string(),
        onto: None,
        branch: None,
        interactive,
    })?;

    let copied = carry_annotations(vcs, &before)?;
    info!(onto, copied, "stack rebased");

    reconcile(vcs, platform, config, after_rewrite_options(), progress).await
}
