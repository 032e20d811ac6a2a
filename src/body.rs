//! Marker-delimited sections in PR descriptions
//!
//! ghchain owns a few blocks inside each PR body. Each block sits between an
//! HTML comment pair, is replaced in place when present, and is appended when
//! missing. Text outside the markers belongs to the author and is never
//! touched.

use crate::types::PlatformConfig;
use std::fmt::Write;

/// Start of the stack list section
pub const STACK_LIST_START: &str = "<!-- STACK_LIST_START -->";
/// End of the stack list section
pub const STACK_LIST_END: &str = "<!-- STACK_LIST_END -->";
/// Start of the workflow badge section
pub const WORKFLOW_BADGES_START: &str = "<!-- WORKFLOW_BADGES_START -->";
/// End of the workflow badge section
pub const WORKFLOW_BADGES_END: &str = "<!-- WORKFLOW_BADGES_END -->";
/// Start of the linked issue section
pub const ISSUE_START: &str = "<!-- GHCHAIN_ISSUE_START -->";
/// End of the linked issue section
pub const ISSUE_END: &str = "<!-- GHCHAIN_ISSUE_END -->";

const PROJECT_URL: &str = "https://github.com/Jimmy2027/ghchain";

/// Replace the `start`..`end` block of `body` with `section`, or append it
///
/// `section` must include both markers. A start marker without a matching
/// end marker is treated as absent.
pub fn upsert_section(body: &str, start: &str, end: &str, section: &str) -> String {
    if let Some(from) = body.find(start)
        && let Some(rel_end) = body[from..].find(end)
    {
        let to = from + rel_end + end.len();
        return format!("{}{section}{}", &body[..from], &body[to..]);
    }

    let trimmed = body.trim_end();
    if trimmed.is_empty() {
        section.to_string()
    } else {
        format!("{trimmed}\n\n{section}")
    }
}

/// Remove the `start`..`end` block if present
pub fn remove_section(body: &str, start: &str, end: &str) -> String {
    let Some(from) = body.find(start) else {
        return body.to_string();
    };
    let Some(rel_end) = body[from..].find(end) else {
        return body.to_string();
    };
    let to = from + rel_end + end.len();
    let before = body[..from].trim_end();
    let after = body[to..].trim_start();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{before}\n\n{after}"),
    }
}

/// Render the stack list: newest PR first, `current` marked with `->`
///
/// `stack_urls` is in stack order (bottom first).
pub fn render_stack_list(stack_urls: &[String], current: &str) -> String {
    let mut out = format!(
        "{STACK_LIST_START}\nStack from [ghchain]({PROJECT_URL}) (oldest at the bottom):\n"
    );
    for url in stack_urls.iter().rev() {
        if url == current {
            let _ = writeln!(out, "- -> {url}");
        } else {
            let _ = writeln!(out, "- {url}");
        }
    }
    out.push_str(STACK_LIST_END);
    out
}

/// Render the issue section for a linked issue URL
pub fn render_issue_section(issue_url: &str) -> String {
    format!("{ISSUE_START}\nIssue: {issue_url}\n{ISSUE_END}")
}

/// Markdown badge for the latest run of `workflow` on `branch`
pub fn workflow_badge(platform: &PlatformConfig, workflow: &str, branch: &str) -> String {
    let repo_url = platform.repo_url();
    let query = url::form_urlencoded::byte_serialize(branch.as_bytes()).collect::<String>();
    format!(
        "[![{workflow}]({repo_url}/actions/workflows/{workflow}.yml/badge.svg?branch={query})]\
         ({repo_url}/actions/workflows/{workflow}.yml?query=branch%3A{query})"
    )
}

/// Render the workflow badge section
pub fn render_workflow_section(
    platform: &PlatformConfig,
    workflows: &[String],
    branch: &str,
) -> String {
    let mut out = format!("{WORKFLOW_BADGES_START}\n# Workflow Results\n");
    for workflow in workflows {
        out.push_str(&workflow_badge(platform, workflow, branch));
        out.push('\n');
    }
    out.push_str(WORKFLOW_BADGES_END);
    out
}

/// Compose the body ghchain wants for a PR
///
/// Starts from the current body, refreshes the stack list and sets or clears
/// the issue section. Workflow badges are left alone; they are written by
/// `run-workflows`.
pub fn compose_body(
    current: &str,
    stack_urls: &[String],
    pr_url: &str,
    issue_url: Option<&str>,
) -> String {
    let body = match issue_url {
        Some(url) => upsert_section(current, ISSUE_START, ISSUE_END, &render_issue_section(url)),
        None => remove_section(current, ISSUE_START, ISSUE_END),
    };
    upsert_section(
        &body,
        STACK_LIST_START,
        STACK_LIST_END,
        &render_stack_list(stack_urls, pr_url),
    )
}
