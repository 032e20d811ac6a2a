//! Text layout of an annotation note
//!
//! ```text
//! [ghchain]
//! branch = jane-12
//! pr url = https://github.com/acme/widgets/pull/12
//! Review Decision = APPROVED
//! Mergable = MERGEABLE
//! is_draft = false
//! title = Add parser
//! issue = https://github.com/acme/widgets/issues/9
//!
//! [[workflow_statuses]]
//! ci | completed | success
//! ```

use super::Annotation;
use crate::error::{Error, Result};
use crate::types::{MergeableState, ReviewDecision, WorkflowStatus};
use std::fmt::Write;
use tracing::debug;

const MAIN_SECTION: &str = "[ghchain]";
const WORKFLOW_SECTION: &str = "[[workflow_statuses]]";
const ROW_SEPARATOR: &str = " | ";

/// Render an annotation as note text
pub fn render_annotation(annotation: &Annotation) -> String {
    let mut lines = vec![MAIN_SECTION.to_string()];

    let mut field = |key: &str, value: &str| {
        lines.push(format!("{key} = {value}").trim_end().to_string());
    };
    if let Some(branch) = &annotation.branch {
        field("branch", branch);
    }
    if let Some(url) = &annotation.pr_url {
        field("pr url", url);
    }
    field("Review Decision", annotation.review_decision.as_str());
    field("Mergable", annotation.mergeable.as_str());
    field("is_draft", if annotation.is_draft { "true" } else { "false" });
    field("title", &single_line(&annotation.title));
    if let Some(issue) = &annotation.issue {
        field("issue", issue);
    }

    let mut text = lines.join("\n");
    if !annotation.workflow_statuses.is_empty() {
        text.push_str("\n\n");
        text.push_str(WORKFLOW_SECTION);
        for status in &annotation.workflow_statuses {
            let row = format!(
                "{}{ROW_SEPARATOR}{}{ROW_SEPARATOR}{}",
                cell(&status.name),
                cell(&status.status),
                cell(&status.conclusion)
            );
            let _ = write!(text, "\n{}", row.trim_end());
        }
    }
    text.push('\n');
    text
}

fn single_line(value: &str) -> String {
    value.lines().next().unwrap_or_default().trim().to_string()
}

fn cell(value: &str) -> String {
    single_line(value).replace('|', "/")
}

#[derive(Clone, Copy)]
enum Section {
    Preamble,
    Main,
    Workflows,
    Unknown,
}

/// Parse note text into an annotation
///
/// Unknown keys and unknown sections are skipped. Malformed lines and
/// invalid values are errors.
pub fn parse_annotation(text: &str) -> Result<Annotation> {
    let mut annotation = Annotation::default();
    let mut section = Section::Preamble;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = match line {
                MAIN_SECTION => Section::Main,
                WORKFLOW_SECTION => Section::Workflows,
                other => {
                    debug!(section = other, "skipping unknown annotation section");
                    Section::Unknown
                }
            };
            continue;
        }

        match section {
            Section::Main => parse_field(&mut annotation, line, index + 1)?,
            Section::Workflows => annotation
                .workflow_statuses
                .push(parse_row(line, index + 1)?),
            Section::Unknown => {}
            Section::Preamble => {
                return Err(Error::Annotation(format!(
                    "line {}: content before {MAIN_SECTION}",
                    index + 1
                )));
            }
        }
    }

    Ok(annotation)
}

fn parse_field(annotation: &mut Annotation, line: &str, line_no: usize) -> Result<()> {
    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| Error::Annotation(format!("line {line_no}: expected `key = value`")))?;
    let (key, value) = (key.trim(), value.trim());
    let optional = || (!value.is_empty()).then(|| value.to_string());

    match key {
        "branch" => annotation.branch = optional(),
        "pr url" => annotation.pr_url = optional(),
        "Review Decision" => annotation.review_decision = ReviewDecision::parse(value),
        "Mergable" | "Mergeable" => annotation.mergeable = MergeableState::parse(value),
        "is_draft" => {
            annotation.is_draft = match value.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" | "" => false,
                other => {
                    return Err(Error::Annotation(format!(
                        "line {line_no}: is_draft must be true or false, got `{other}`"
                    )));
                }
            };
        }
        "title" => annotation.title = value.to_string(),
        "issue" => annotation.issue = optional(),
        unknown => debug!(key = unknown, "ignoring unknown annotation key"),
    }
    Ok(())
}

fn parse_row(line: &str, line_no: usize) -> Result<WorkflowStatus> {
    let cells: Vec<&str> = line.split('|').map(str::trim).collect();
    let [name, status, conclusion] = cells.as_slice() else {
        return Err(Error::Annotation(format!(
            "line {line_no}: workflow row needs `name | status | conclusion`"
        )));
    };
    Ok(WorkflowStatus {
        name: (*name).to_string(),
        status: (*status).to_string(),
        conclusion: (*conclusion).to_string(),
    })
}
