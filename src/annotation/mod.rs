//! Per-commit annotations
//!
//! The only durable state ghchain keeps: a small record attached to each
//! commit as a git note. A rewritten commit (new sha) starts without one
//! until the rebase coordinator or the reconciler re-links it.

mod format;
mod store;

pub use format::{parse_annotation, render_annotation};
pub use store::{AnnotationStore, NOTES_REF};

use crate::types::{MergeableState, PrStatus, ReviewDecision, WorkflowStatus};

/// Structured metadata stored on a commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Branch bound to this commit
    pub branch: Option<String>,
    /// Web URL of the PR opened for this commit
    pub pr_url: Option<String>,
    /// Last observed review decision
    pub review_decision: ReviewDecision,
    /// Last observed mergeable state
    pub mergeable: MergeableState,
    /// Last observed draft flag
    pub is_draft: bool,
    /// PR title
    pub title: String,
    /// Linked issue URL
    pub issue: Option<String>,
    /// Latest run per configured workflow
    pub workflow_statuses: Vec<WorkflowStatus>,
}

impl Annotation {
    /// PR number, parsed from the last path segment of `pr_url`
    pub fn pr_id(&self) -> Option<u64> {
        let url = self.pr_url.as_deref()?;
        url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the status fields from a fresh remote query
    pub fn apply_status(&mut self, status: &PrStatus, workflows: Vec<WorkflowStatus>) {
        self.pr_url = Some(status.html_url.clone());
        self.review_decision = status.review_decision;
        self.mergeable = status.mergeable;
        self.is_draft = status.is_draft;
        self.title.clone_from(&status.title);
        self.workflow_statuses = workflows;
    }
}
