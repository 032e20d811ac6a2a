//! Branch repair after a rebase done without `--update-refs`
//!
//! Stack branches left behind on pre-rewrite commits are found through the
//! same correlation the reconciler uses and moved onto the rewritten commits.

use crate::annotation::AnnotationStore;
use crate::config::Config;
use crate::error::Result;
use crate::reconcile::{Binding, correlate};
use crate::stack::extract_stack;
use crate::vcs::VcsService;
use tracing::info;

/// A branch to move onto its rewritten commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefFix {
    /// Branch name
    pub branch: String,
    /// Where it points now (`None` if missing locally)
    pub from: Option<String>,
    /// Commit it should point at
    pub to: String,
    /// Summary of that commit
    pub summary: String,
}

/// List the branches that no longer point at their stack commit
pub fn find_ref_fixes(vcs: &dyn VcsService, config: &Config) -> Result<Vec<RefFix>> {
    let stack = extract_stack(vcs, config)?;
    let slots = correlate(vcs, &stack, &config.remote)?;

    Ok(slots
        .into_iter()
        .filter_map(|slot| {
            let branch = slot.branch?;
            let from = match slot.binding {
                Binding::Rewritten { previous_sha } => Some(previous_sha),
                Binding::Annotation
                    if slot.local_tip.as_deref() != Some(slot.commit.sha.as_str()) =>
                {
                    slot.local_tip
                }
                _ => return None,
            };
            Some(RefFix {
                branch,
                from,
                to: slot.commit.sha,
                summary: slot.commit.summary,
            })
        })
        .collect())
}

/// Move the branch and carry its annotation over
pub fn apply_ref_fix(vcs: &dyn VcsService, fix: &RefFix) -> Result<()> {
    vcs.set_branch(&fix.branch, &fix.to, true)?;
    if let Some(from) = &fix.from {
        AnnotationStore::new(vcs).copy_forward(from, &fix.to)?;
    }
    info!(branch = %fix.branch, to = %fix.to, "branch repaired");
    Ok(())
}
