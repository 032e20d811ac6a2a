//! Process command - bring every commit of the stack to a linked PR

use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, arrow, check, cross, link, spinner_style};
use crate::cli::{CliProgress, ProcessArgs, confirm};
use anstream::println;
use ghchain::error::Result;
use ghchain::reconcile::{
    ReconcileOptions, ReconcilePlan, ReconcileReport, execute_reconcile, plan_reconcile,
};
use indicatif::ProgressBar;
use std::time::Duration;

impl ProcessArgs {
    fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            open_prs: !self.no_pr,
            draft: self.draft,
            with_tests: self.with_tests,
            create_branches: true,
        }
    }
}

/// Run the default command
#[allow(clippy::future_not_send)]
pub async fn run_process(ctx: &CommandContext, args: &ProcessArgs) -> Result<bool> {
    let platform = ctx.platform().await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message("Analyzing stack...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let plan = plan_reconcile(ctx.vcs(), platform.as_ref(), &ctx.config, args.options()).await;
    spinner.finish_and_clear();
    let plan = plan?;

    if plan.slots.is_empty() {
        println!(
            "{}",
            format!("No commits between {} and {}", ctx.config.base_branch, plan.dev_branch).muted()
        );
        return Ok(true);
    }

    if args.dry_run || args.confirm {
        print_plan(&plan);
        if args.dry_run {
            println!("{}", "Dry run: nothing changed".muted());
            return Ok(true);
        }
        if !confirm("Proceed?", true)? {
            println!("{}", "Aborted".muted());
            return Ok(true);
        }
        println!();
    }

    println!(
        "{} {} {} {}",
        "Processing stack:".emphasis(),
        plan.dev_branch.accent(),
        arrow(),
        plan.base_branch.accent()
    );

    let progress = CliProgress::compact();
    let report = execute_reconcile(&plan, ctx.vcs(), platform.as_ref(), &progress).await?;

    print_report(&report);
    Ok(report.is_success())
}

/// Print the planned steps per slot
pub fn print_plan(plan: &ReconcilePlan) {
    println!("{}:", "Plan".emphasis());
    println!();
    for slot in &plan.slots {
        let branch = slot.branch.as_deref().unwrap_or("-");
        println!(
            "  {} {} {} {}",
            slot.commit.short_sha().muted(),
            branch.accent(),
            slot.commit.summary,
            format!("({})", slot.state).muted()
        );
        if let Some(reason) = &slot.skip_reason {
            println!("    {} skipped: {reason}", arrow());
            continue;
        }
        if let Some(error) = &slot.lookup_error {
            println!("    {} {}", cross(), error.failure());
        }
        for step in slot.actions() {
            println!("    {} {step}", arrow());
        }
    }
    println!();
    if plan.is_noop() {
        println!("  {}", "Stack is up to date".muted());
    } else {
        println!(
            "  {} push(es), {} new PR(s), {} retarget(s)",
            plan.count_pushes().accent(),
            plan.count_creates().accent(),
            plan.count_retargets().accent()
        );
    }
    println!();
}

/// Print one line per slot and a summary
pub fn print_report(report: &ReconcileReport) {
    println!();
    for outcome in &report.outcomes {
        let mark = if outcome.is_failed() { cross() } else { check() };
        let branch = outcome.branch.as_deref().unwrap_or("-");
        let pr = match (&outcome.pr_number, &outcome.pr_url) {
            (Some(number), Some(url)) => link(&format!("#{number}"), url),
            _ => String::new(),
        };
        println!(
            "{mark} {} {} {} {}",
            outcome.sha[..outcome.sha.len().min(8)].muted(),
            branch.accent(),
            pr,
            outcome.summary
        );
        if let Some(reason) = &outcome.skipped {
            println!("    {}", format!("skipped: {reason}").muted());
        }
        if let Some(error) = &outcome.error {
            println!("    {}", error.to_string().failure());
        }
    }

    println!();
    if report.is_success() {
        println!(
            "{} {} pushed, {} created, {} retargeted",
            format!("{CHECK} Stack processed:").success(),
            report.pushed().accent(),
            report.created_prs().accent(),
            report.retargeted().accent()
        );
    } else {
        println!(
            "{} {} of {} commit(s) failed; rerun to resume",
            "Stack partially processed:".warn(),
            report.failures().count().accent(),
            report.outcomes.len()
        );
    }
}
