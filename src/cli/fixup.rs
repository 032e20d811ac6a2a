//! Fixup and rebase commands

use crate::cli::context::CommandContext;
use crate::cli::process::print_report;
use crate::cli::style::{Stylize, check};
use crate::cli::CliProgress;
use anstream::println;
use ghchain::error::Result;
use ghchain::fixup;

/// `ghchain fixup start <target>`
pub fn run_fixup_start(ctx: &CommandContext, target: &str) -> Result<bool> {
    let marker = fixup::start(ctx.vcs(), &ctx.config, target)?;
    println!(
        "{} Checked out {} (from {})",
        check(),
        marker.target.accent(),
        marker.dev_branch.accent()
    );
    println!(
        "{}",
        "Amend the commit, then run `ghchain fixup done`.".muted()
    );
    Ok(true)
}

/// `ghchain fixup done`
#[allow(clippy::future_not_send)]
pub async fn run_fixup_done(ctx: &CommandContext) -> Result<bool> {
    let platform = ctx.platform().await?;
    let progress = CliProgress::compact();

    match fixup::done(ctx.vcs(), platform.as_ref(), &ctx.config, &progress).await? {
        Some(report) => {
            print_report(&report);
            Ok(report.is_success())
        }
        None => {
            println!("{}", "Target unchanged; back on the dev branch".muted());
            Ok(true)
        }
    }
}

/// `ghchain rebase <onto> [-i]`
#[allow(clippy::future_not_send)]
pub async fn run_rebase(ctx: &CommandContext, onto: &str, interactive: bool) -> Result<bool> {
    let platform = ctx.platform().await?;
    let progress = CliProgress::compact();

    println!("{} {}", "Rebasing onto".emphasis(), onto.accent());
    let report = fixup::rebase(
        ctx.vcs(),
        platform.as_ref(),
        &ctx.config,
        onto,
        interactive,
        &progress,
    )
    .await?;
    print_report(&report);
    Ok(report.is_success())
}
