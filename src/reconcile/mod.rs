//! Reconcile engine for stacked PRs
//!
//! Three phases:
//! 1. Gather - correlate commits with branches, look up PRs and issues
//! 2. Plan - create `ReconcilePlan` (pure, testable)
//! 3. Execute - move/create branches, push, open and retarget PRs, record
//!    annotations, refresh PR descriptions

mod analysis;
mod execute;
mod plan;
mod progress;

pub use analysis::{Binding, SlotFacts, StackAnalysis, analyze_stack, correlate};
pub use execute::{ReconcileReport, SlotOutcome, execute_reconcile};
pub use plan::{
    ReconcileOptions, ReconcilePlan, SlotPlan, SlotState, SlotStep, create_reconcile_plan,
};
pub use progress::{NoopProgress, ProgressCallback};

use crate::config::Config;
use crate::error::Result;
use crate::platform::PlatformService;
use crate::stack::extract_stack;
use crate::vcs::VcsService;
use tracing::info;

/// Gather facts and build the plan without touching anything
///
/// Template and issue pattern are validated before the first remote call.
#[allow(clippy::future_not_send)]
pub async fn plan_reconcile(
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    config: &Config,
    options: ReconcileOptions,
) -> Result<ReconcilePlan> {
    let stack = extract_stack(vcs, config)?;
    let template = config.branch_template()?;
    let issue_pattern = config.issue_pattern()?;

    info!(
        commits = stack.len(),
        base = %stack.base_ref,
        dev = %stack.dev_branch,
        "reconciling stack"
    );

    let analysis = analyze_stack(
        vcs,
        platform,
        &stack,
        &config.remote,
        issue_pattern.as_ref(),
        options.create_branches,
    )
    .await?;

    Ok(create_reconcile_plan(
        analysis,
        &template,
        options,
        &config.workflows,
        &config.remote,
    ))
}

/// Plan and execute one reconcile pass
#[allow(clippy::future_not_send)]
pub async fn reconcile(
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    config: &Config,
    options: ReconcileOptions,
    progress: &dyn ProgressCallback,
) -> Result<ReconcileReport> {
    let plan = plan_reconcile(vcs, platform, config, options).await?;
    execute_reconcile(&plan, vcs, platform, progress).await
}
