//! Code-hosting capability
//!
//! Everything ghchain asks of GitHub goes through [`PlatformService`], so the
//! reconciler, status aggregator and land sequencer can run against a mock.

mod detection;
mod github;

pub use detection::{parse_repo_info, select_remote};
pub use github::GitHubService;

use crate::error::Result;
use crate::types::{
    IssueRef, MergeMethod, MergeResult, PlatformConfig, PrStatus, PullRequest,
    PullRequestDetails, WorkflowRun,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Build the GitHub service for `config`, resolving a token first
pub async fn create_platform_service(config: &PlatformConfig) -> Result<Arc<dyn PlatformService>> {
    let auth = crate::auth::get_github_auth(config.host.as_deref()).await?;
    let service = GitHubService::new(
        &auth.token,
        config.owner.clone(),
        config.repo.clone(),
        config.host.clone(),
    )?;
    Ok(Arc::new(service))
}

/// Platform service trait for PR, workflow and issue operations
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Find an existing open PR for a head branch
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>>;

    /// Create a PR from `head` onto `base`
    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest>;

    /// Get full PR details including body and state
    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails>;

    /// Update the base branch of an existing PR
    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest>;

    /// Replace the PR description
    async fn update_pr_body(&self, pr_number: u64, body: &str) -> Result<()>;

    /// Review decision, mergeable state, draft flag and state of a PR
    async fn get_pr_status(&self, pr_number: u64) -> Result<PrStatus>;

    /// Merge a PR with the specified method
    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult>;

    /// Dispatch `workflow` (`.github/workflows/<workflow>.yml`) on `branch`
    ///
    /// Fire-and-forget: returns once the run is queued.
    async fn trigger_workflow(&self, workflow: &str, branch: &str) -> Result<()>;

    /// Most recent run of `workflow` on `branch`
    async fn latest_workflow_run(&self, workflow: &str, branch: &str)
    -> Result<Option<WorkflowRun>>;

    /// Look up an issue by number; `None` if it does not exist
    async fn find_issue(&self, number: u64) -> Result<Option<IssueRef>>;

    /// Next free stack id: one past the highest PR or issue number
    async fn next_stack_id(&self) -> Result<u64>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
