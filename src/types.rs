//! Core types for ghchain

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit as read from the repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit sha (hex)
    pub sha: String,
    /// Parent commit shas
    pub parents: Vec<String>,
    /// Full commit message
    pub message: String,
    /// First line of the message
    pub summary: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
}

impl CommitInfo {
    /// Message without the summary line, trimmed
    pub fn body(&self) -> &str {
        self.message
            .split_once('\n')
            .map_or("", |(_, rest)| rest.trim())
    }

    /// Whether this commit is meant to be folded into another by autosquash
    pub fn is_fixup(&self) -> bool {
        ["fixup!", "squash!", "amend!"]
            .iter()
            .any(|prefix| self.summary.starts_with(prefix))
    }

    /// Abbreviated sha for display
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(8)]
    }
}

/// A pull request as returned from create/update calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for the PR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR title
    pub title: String,
    /// Whether PR is a draft
    pub is_draft: bool,
}

/// PR state (open, closed, merged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrState {
    /// PR is open
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Extended PR details, including the body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestDetails {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// Current state of the PR
    pub state: PrState,
    /// Whether PR is a draft
    pub is_draft: bool,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// Web URL for the PR
    pub html_url: String,
}

/// GitHub review decision for a PR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    /// At least one approving review, none blocking
    Approved,
    /// A reviewer requested changes
    ChangesRequested,
    /// Branch protection requires a review that has not happened
    ReviewRequired,
    /// No decision (no reviews, no requirement)
    #[default]
    #[serde(other)]
    None,
}

impl ReviewDecision {
    /// Wire spelling (`APPROVED`, ..., empty for none)
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::ChangesRequested => "CHANGES_REQUESTED",
            Self::ReviewRequired => "REVIEW_REQUIRED",
            Self::None => "",
        }
    }

    /// Parse the wire spelling; anything unknown is `None`
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "APPROVED" => Self::Approved,
            "CHANGES_REQUESTED" => Self::ChangesRequested,
            "REVIEW_REQUIRED" => Self::ReviewRequired,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether GitHub considers the PR mergeable into its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeableState {
    /// No conflicts
    Mergeable,
    /// Has merge conflicts
    Conflicting,
    /// Not computed yet
    #[default]
    #[serde(other)]
    Unknown,
}

impl MergeableState {
    /// Wire spelling
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mergeable => "MERGEABLE",
            Self::Conflicting => "CONFLICTING",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse the wire spelling; anything unknown is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "MERGEABLE" => Self::Mergeable,
            "CONFLICTING" => Self::Conflicting,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for MergeableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review/merge state of a PR as shown in status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrStatus {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// Web URL
    pub html_url: String,
    /// Open / closed / merged
    pub state: PrState,
    /// Review decision
    pub review_decision: ReviewDecision,
    /// Mergeable state
    pub mergeable: MergeableState,
    /// Draft flag
    pub is_draft: bool,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
}

/// Latest run of one workflow for a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    /// Workflow name (file stem in `.github/workflows`)
    pub name: String,
    /// Run status (`queued`, `in_progress`, `completed`, ...)
    pub status: String,
    /// Conclusion once completed (`success`, `failure`, ...); empty otherwise
    pub conclusion: String,
}

impl WorkflowStatus {
    /// Whether the run finished successfully
    pub fn is_success(&self) -> bool {
        self.conclusion.eq_ignore_ascii_case("success")
    }

    /// Whether the run is still queued or running
    pub fn is_pending(&self) -> bool {
        !self.status.eq_ignore_ascii_case("completed")
    }
}

/// A workflow run with timing information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    /// Status summary
    pub status: WorkflowStatus,
    /// Commit the run was for
    pub head_sha: String,
    /// Run web URL
    pub html_url: String,
    /// When the run was created
    pub created_at: Option<DateTime<Utc>>,
}

/// An issue on the hosting platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    /// Issue number
    pub number: u64,
    /// Issue title
    pub title: String,
    /// Web URL
    pub html_url: String,
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}

impl PlatformConfig {
    /// Web URL of the repository
    pub fn repo_url(&self) -> String {
        let host = self.host.as_deref().unwrap_or("github.com");
        format!("https://{host}/{}/{}", self.owner, self.repo)
    }
}

/// Result of a merge operation
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    Squash,
    /// Create a merge commit
    #[default]
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// A git remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRemote {
    /// Remote name (e.g., "origin")
    pub name: String,
    /// Remote URL
    pub url: String,
}
