//! Land engine for stacked PRs
//!
//! Three-phase pattern matching reconcile/:
//! 1. Gather - fresh PR status for every slot of the stack
//! 2. Plan - create `LandPlan` (pure, testable)
//! 3. Execute - merge bottom-up, retarget dependents, delete branches

mod execute;
mod plan;

pub use execute::{BranchCleanup, LandReport, execute_land};
pub use plan::{LandCandidate, LandPlan, LandStep, Retarget, blocking_reasons, create_land_plan};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::stack::Stack;
use tracing::debug;

/// Fetch fresh status for every slot that has a branch
///
/// Slots without a bound branch cannot be landed and are left out.
pub async fn gather_land_candidates(
    stack: &Stack,
    platform: &dyn PlatformService,
) -> Result<Vec<LandCandidate>> {
    let mut candidates = Vec::with_capacity(stack.len());

    for entry in &stack.entries {
        let Some(branch) = entry.annotated_branch() else {
            continue;
        };
        let status = match entry.annotation.pr_id() {
            Some(number) => Some(
                platform
                    .get_pr_status(number)
                    .await
                    .map_err(|e| Error::remote(format!("fetch status of PR #{number}"), e))?,
            ),
            None => None,
        };
        debug!(branch, has_pr = status.is_some(), "land candidate");
        candidates.push(LandCandidate {
            position: entry.position,
            branch: branch.to_string(),
            status,
        });
    }

    Ok(candidates)
}

/// Plan landing `branch` with the configured merge method
pub async fn plan_land(
    stack: &Stack,
    platform: &dyn PlatformService,
    config: &Config,
    branch: &str,
) -> Result<LandPlan> {
    if stack.entry_for_branch(branch).is_none() {
        return Err(Error::BranchNotInStack(branch.to_string()));
    }
    let candidates = gather_land_candidates(stack, platform).await?;
    create_land_plan(branch, &candidates, config.merge_method)
}
