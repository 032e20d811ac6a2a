//! Status and refresh commands

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check, link, spinner_style};
use anstream::println;
use ghchain::annotation::Annotation;
use ghchain::error::Result;
use ghchain::stack::extract_stack;
use ghchain::status::{StatusAggregator, StatusView, poll, refresh};
use ghchain::types::{MergeableState, ReviewDecision, WorkflowStatus};
use indicatif::ProgressBar;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One table row, from an annotation or a fresh query
struct Row {
    sha: String,
    summary: String,
    branch: String,
    pr: Option<(String, String)>,
    review: ReviewDecision,
    mergeable: MergeableState,
    draft: bool,
    workflows: Vec<WorkflowStatus>,
    error: Option<String>,
}

impl Row {
    fn from_annotation(sha: &str, summary: &str, annotation: &Annotation) -> Self {
        Self {
            sha: sha.to_string(),
            summary: summary.to_string(),
            branch: annotation.branch.clone().unwrap_or_default(),
            pr: annotation
                .pr_id()
                .zip(annotation.pr_url.clone())
                .map(|(id, url)| (format!("#{id}"), url)),
            review: annotation.review_decision,
            mergeable: annotation.mergeable,
            draft: annotation.is_draft,
            workflows: annotation.workflow_statuses.clone(),
            error: None,
        }
    }
}

fn rows_from_view(view: &StatusView) -> Vec<Row> {
    view.slots
        .iter()
        .map(|slot| Row {
            sha: slot.sha.clone(),
            summary: slot.summary.clone(),
            branch: slot.branch.clone().unwrap_or_default(),
            pr: slot
                .pr
                .as_ref()
                .map(|pr| (format!("#{}", pr.number), pr.html_url.clone())),
            review: slot.pr.as_ref().map_or(ReviewDecision::None, |pr| pr.review_decision),
            mergeable: slot.pr.as_ref().map_or(MergeableState::Unknown, |pr| pr.mergeable),
            draft: slot.pr.as_ref().is_some_and(|pr| pr.is_draft),
            workflows: slot.workflows.clone(),
            error: slot.error.clone(),
        })
        .collect()
}

fn workflow_cell(status: &WorkflowStatus) -> String {
    if status.is_pending() {
        format!("{} {}", status.name, status.status).warn()
    } else if status.is_success() {
        status.name.success()
    } else {
        format!("{} {}", status.name, status.conclusion).failure()
    }
}

fn print_table(base: &str, dev: &str, rows: &[Row]) {
    println!("{} {} → {}", "Stack".emphasis(), dev.accent(), base.accent());
    println!();
    // Newest on top, like the stack list in PR descriptions
    for row in rows.iter().rev() {
        let pr = row
            .pr
            .as_ref()
            .map_or_else(|| "-".muted(), |(text, url)| link(text, url));
        let review = match row.review {
            ReviewDecision::Approved => "approved".success(),
            ReviewDecision::ChangesRequested => "changes requested".failure(),
            ReviewDecision::ReviewRequired => "review required".warn(),
            ReviewDecision::None => String::new(),
        };
        let mergeable = match row.mergeable {
            MergeableState::Mergeable => String::new(),
            MergeableState::Conflicting => "conflicts".failure(),
            MergeableState::Unknown if row.pr.is_some() => "mergeable?".muted(),
            MergeableState::Unknown => String::new(),
        };
        let draft = if row.draft { "draft".muted() } else { String::new() };

        println!(
            "  {} {:>6} {} {}",
            row.sha[..row.sha.len().min(8)].muted(),
            pr,
            row.branch.accent(),
            row.summary
        );
        let flags: Vec<String> = [review, mergeable, draft]
            .into_iter()
            .chain(row.workflows.iter().map(workflow_cell))
            .filter(|s| !s.is_empty())
            .collect();
        if !flags.is_empty() {
            println!("           {}", flags.join("  "));
        }
        if let Some(error) = &row.error {
            println!("           {}", error.failure());
        }
    }
    println!();
}

/// `ghchain refresh`
#[allow(clippy::future_not_send)]
pub async fn run_refresh(ctx: &CommandContext) -> Result<bool> {
    let platform = ctx.platform().await?;
    let aggregator = StatusAggregator::from_config(platform, &ctx.config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message("Querying PR status...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let view = refresh(ctx.vcs(), &aggregator, &ctx.config).await;
    spinner.finish_and_clear();
    let view = view?;

    let failed = view.errors().count();
    println!(
        "{} Refreshed {} commit(s)",
        check(),
        view.slots.len().accent()
    );
    for slot in view.errors() {
        println!(
            "  {} {}",
            slot.sha[..slot.sha.len().min(8)].muted(),
            slot.error.as_deref().unwrap_or_default().failure()
        );
    }
    Ok(failed == 0)
}

/// `ghchain status [--live]`
///
/// Without `--live` this shows what the last refresh recorded and makes no
/// network calls.
#[allow(clippy::future_not_send)]
pub async fn run_status(ctx: &CommandContext, live: bool) -> Result<bool> {
    if !live {
        let stack = extract_stack(ctx.vcs(), &ctx.config)?;
        let rows: Vec<Row> = stack
            .entries
            .iter()
            .map(|e| Row::from_annotation(&e.commit.sha, &e.commit.summary, &e.annotation))
            .collect();
        print_table(&stack.base_branch, &stack.dev_branch, &rows);
        return Ok(true);
    }

    let platform = ctx.platform().await?;
    let aggregator = StatusAggregator::from_config(platform, &ctx.config);

    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let interval = ctx.config.poll_interval_secs;
    let cache = poll(ctx.vcs(), &aggregator, &ctx.config, &token, |view| {
        // Clear and home the cursor before repainting
        anstream::print!("\x1b[2J\x1b[H");
        print_table(&view.base_branch, &view.dev_branch, &rows_from_view(view));
        println!(
            "{}",
            format!(
                "Updated {}; next poll in {interval}s (Ctrl-C to stop)",
                view.refreshed_at.format("%H:%M:%S")
            )
            .muted()
        );
    })
    .await?;

    Ok(cache.view().is_none_or(|v| v.errors().next().is_none()))
}
