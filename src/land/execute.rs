//! Land execution - effectful operations
//!
//! Merges bottom-up and stops at the first failure. Retargets run right after
//! the merge that requires them so a stacked PR is never left pointing at a
//! merged branch.

use crate::error::{Error, Result};
use crate::land::plan::{LandPlan, LandStep};
use crate::platform::PlatformService;
use crate::reconcile::ProgressCallback;
use crate::vcs::VcsService;
use tracing::warn;

/// Outcome of landing
#[derive(Debug, Default)]
pub struct LandReport {
    /// Branches whose PR was merged
    pub merged: Vec<String>,
    /// PR numbers moved to a new base
    pub retargeted: Vec<u64>,
    /// Branches deleted after merging
    pub deleted: Vec<String>,
    /// Branch whose merge (or follow-up) failed
    pub failed_branch: Option<String>,
    /// The failure
    pub error: Option<Error>,
}

impl LandReport {
    /// Whether every planned merge happened
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Where merged branches are cleaned up
pub struct BranchCleanup<'a> {
    /// Repository
    pub vcs: &'a dyn VcsService,
    /// Remote to delete from
    pub remote: &'a str,
}

#[allow(clippy::future_not_send)]
async fn land_step(
    step: &LandStep,
    platform: &dyn PlatformService,
    report: &mut LandReport,
    progress: &dyn ProgressCallback,
) -> Result<()> {
    progress
        .on_message(&format!("Merging PR #{}: {}", step.pr_number, step.title))
        .await;

    let result = platform
        .merge_pr(step.pr_number, step.method)
        .await
        .map_err(|e| Error::remote(format!("merge PR #{}", step.pr_number), e))?;
    if !result.merged {
        return Err(Error::remote(
            format!("merge PR #{}", step.pr_number),
            result.message.as_deref().unwrap_or("not merged"),
        ));
    }
    let sha = result.sha.as_deref().unwrap_or("(no sha)");
    progress
        .on_message(&format!("Merged #{}: {sha}", step.pr_number))
        .await;
    report.merged.push(step.branch.clone());

    for retarget in &step.retargets {
        platform
            .update_pr_base(retarget.pr_number, &retarget.new_base)
            .await
            .map_err(|e| Error::remote(format!("retarget PR #{}", retarget.pr_number), e))?;
        progress
            .on_message(&format!(
                "Retargeted #{} ({}) onto {}",
                retarget.pr_number, retarget.branch, retarget.new_base
            ))
            .await;
        report.retargeted.push(retarget.pr_number);
    }
    Ok(())
}

fn delete_branch(cleanup: &BranchCleanup<'_>, branch: &str) -> bool {
    let mut ok = true;
    if let Err(e) = cleanup.vcs.delete_remote_branch(cleanup.remote, branch) {
        warn!(branch, error = %e, "failed to delete remote branch");
        ok = false;
    }
    if let Err(e) = cleanup.vcs.delete_branch(branch) {
        warn!(branch, error = %e, "failed to delete local branch");
        ok = false;
    }
    ok
}

/// Execute the land plan (EFFECTFUL)
///
/// Branch deletion failures are logged and do not stop the sequence.
#[allow(clippy::future_not_send)]
pub async fn execute_land(
    plan: &LandPlan,
    platform: &dyn PlatformService,
    cleanup: Option<&BranchCleanup<'_>>,
    progress: &dyn ProgressCallback,
) -> LandReport {
    let mut report = LandReport::default();

    for step in &plan.steps {
        if let Err(e) = land_step(step, platform, &mut report, progress).await {
            report.failed_branch = Some(step.branch.clone());
            report.error = Some(e);
            break;
        }

        if let Some(cleanup) = cleanup
            && delete_branch(cleanup, &step.branch)
        {
            report.deleted.push(step.branch.clone());
        }
    }

    report
}
