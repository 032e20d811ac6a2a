//! Run-workflows command

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check};
use anstream::println;
use ghchain::error::Result;
use ghchain::workflows::{WorkflowTarget, run_workflows as dispatch};

/// `ghchain run-workflows <branch|.|pr-number>`
#[allow(clippy::future_not_send)]
pub async fn run_workflows(ctx: &CommandContext, target: &str) -> Result<bool> {
    let platform = ctx.platform().await?;
    let result = dispatch(
        ctx.vcs(),
        platform.as_ref(),
        &ctx.config.workflows,
        &WorkflowTarget::parse(target),
    )
    .await?;

    println!(
        "{} Dispatched {} on {}",
        check(),
        result.workflows.join(", ").accent(),
        result.branch.accent()
    );
    if let Some(number) = result.pr_number {
        println!("{}", format!("Badges updated on PR #{number}").muted());
    }
    Ok(true)
}
