//! Land command - merge the stack bottom-up through a branch

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, arrow, check, spinner_style};
use crate::cli::{CliProgress, confirm};
use anstream::println;
use ghchain::land::{BranchCleanup, LandPlan, LandReport, execute_land, plan_land};
use ghchain::error::Result;
use ghchain::stack::extract_stack;
use indicatif::ProgressBar;
use std::time::Duration;

/// Run the land command
#[allow(clippy::future_not_send)]
pub async fn run_land(ctx: &CommandContext, branch: &str, ask: bool) -> Result<bool> {
    let platform = ctx.platform().await?;
    let stack = extract_stack(ctx.vcs(), &ctx.config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message("Checking PR status...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let plan = plan_land(&stack, platform.as_ref(), &ctx.config, branch).await;
    spinner.finish_and_clear();
    let plan = plan?;

    if plan.is_empty() {
        println!("{}", format!("Nothing to land up to {branch}").muted());
        return Ok(true);
    }

    if ask {
        print_plan(&plan);
        if !confirm("Proceed with land?", true)? {
            println!("{}", "Aborted".muted());
            return Ok(true);
        }
        println!();
    }

    println!(
        "{} {}",
        "Landing".emphasis(),
        format!("{} PR(s)...", plan.steps.len()).accent()
    );

    let cleanup = BranchCleanup {
        vcs: ctx.vcs(),
        remote: &ctx.config.remote,
    };
    let progress = CliProgress::compact();
    let report = execute_land(
        &plan,
        platform.as_ref(),
        ctx.config.delete_branch_after_merge.then_some(&cleanup),
        &progress,
    )
    .await;

    print_summary(&report);
    if report.is_success() {
        println!(
            "{}",
            format!(
                "Fetch and run `ghchain rebase {}` to move the rest of the stack.",
                ctx.config.base_branch
            )
            .muted()
        );
    }
    Ok(report.is_success())
}

fn print_plan(plan: &LandPlan) {
    println!("{}:", "Land plan".emphasis());
    println!();
    for step in &plan.steps {
        println!("  {} {step}", arrow());
        for retarget in &step.retargets {
            println!(
                "      {} retarget #{} ({}) onto {}",
                arrow(),
                retarget.pr_number,
                retarget.branch,
                retarget.new_base.accent()
            );
        }
    }
    println!();
}

fn print_summary(report: &LandReport) {
    println!();
    if report.is_success() {
        println!("{} {}", check(), "Land complete!".success());
    } else {
        println!("{}", "Land partially complete".warn());
    }

    if !report.merged.is_empty() {
        println!("   Merged: {}", report.merged.join(", ").accent());
    }
    if !report.deleted.is_empty() {
        println!("   Deleted: {}", report.deleted.join(", ").muted());
    }
    if let Some(failed) = &report.failed_branch {
        println!("   {} {}", "Failed:".warn(), failed.warn());
        if let Some(error) = &report.error {
            println!("          {}", error.to_string().muted());
        }
    }
}
