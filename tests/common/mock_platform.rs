//! Mock platform service for testing
//!
//! Stateful: created PRs can be found, retargeted, edited and merged, so a
//! second reconcile run sees what the first one did.

#![allow(dead_code)]

use async_trait::async_trait;
use ghchain::error::{Error, Result};
use ghchain::platform::PlatformService;
use ghchain::types::{
    IssueRef, MergeMethod, MergeResult, MergeableState, PlatformConfig, PrState, PrStatus,
    PullRequest, PullRequestDetails, ReviewDecision, WorkflowRun, WorkflowStatus,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Call record for `create_pr_with_options`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: Option<String>,
    pub draft: bool,
}

/// Call record for `update_pr_base`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBaseCall {
    pub pr_number: u64,
    pub new_base: String,
}

/// Call record for `update_pr_body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBodyCall {
    pub pr_number: u64,
    pub body: String,
}

/// Call record for `merge_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub method: MergeMethod,
}

/// Call record for `trigger_workflow`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCall {
    pub workflow: String,
    pub branch: String,
}

#[derive(Default)]
struct Remote {
    prs: BTreeMap<u64, PullRequestDetails>,
    reviews: HashMap<u64, ReviewDecision>,
    mergeable: HashMap<u64, MergeableState>,
    issues: BTreeMap<u64, IssueRef>,
    runs: HashMap<(String, String), WorkflowRun>,
}

#[derive(Default)]
struct Failures {
    find_pr: Option<String>,
    create_pr_heads: HashSet<String>,
    update_base: Option<String>,
    update_body: Option<String>,
    merge_prs: HashSet<u64>,
    status_prs: HashSet<u64>,
    next_id: Option<String>,
}

#[derive(Default)]
struct Calls {
    find_pr: Vec<String>,
    create_pr: Vec<CreatePrCall>,
    update_base: Vec<UpdateBaseCall>,
    update_body: Vec<UpdateBodyCall>,
    merge_pr: Vec<MergePrCall>,
    trigger: Vec<TriggerCall>,
    status: Vec<u64>,
    next_id: usize,
}

/// In-memory GitHub
pub struct MockPlatformService {
    config: PlatformConfig,
    remote: Mutex<Remote>,
    failures: Mutex<Failures>,
    calls: Mutex<Calls>,
    status_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockPlatformService {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            remote: Mutex::new(Remote::default()),
            failures: Mutex::new(Failures::default()),
            calls: Mutex::new(Calls::default()),
            status_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn url(&self, kind: &str, number: u64) -> String {
        format!("{}/{kind}/{number}", self.config.repo_url())
    }

    // === Remote state setup ===

    /// Add an open PR as if someone created it earlier
    pub fn add_pr(&self, number: u64, head: &str, base: &str, title: &str) -> PullRequestDetails {
        let details = PullRequestDetails {
            number,
            title: title.to_string(),
            body: None,
            state: PrState::Open,
            is_draft: false,
            head_ref: head.to_string(),
            base_ref: base.to_string(),
            html_url: self.url("pull", number),
        };
        self.remote
            .lock()
            .unwrap()
            .prs
            .insert(number, details.clone());
        details
    }

    /// Add an issue
    pub fn add_issue(&self, number: u64, title: &str) {
        let issue = IssueRef {
            number,
            title: title.to_string(),
            html_url: self.url("issues", number),
        };
        self.remote.lock().unwrap().issues.insert(number, issue);
    }

    /// Change a PR's state (closed / merged)
    pub fn set_pr_state(&self, number: u64, state: PrState) {
        if let Some(pr) = self.remote.lock().unwrap().prs.get_mut(&number) {
            pr.state = state;
        }
    }

    /// Mark a PR as draft
    pub fn set_draft(&self, number: u64, draft: bool) {
        if let Some(pr) = self.remote.lock().unwrap().prs.get_mut(&number) {
            pr.is_draft = draft;
        }
    }

    /// Set the review decision reported for a PR
    pub fn set_review(&self, number: u64, decision: ReviewDecision) {
        self.remote.lock().unwrap().reviews.insert(number, decision);
    }

    /// Set the mergeable state reported for a PR
    pub fn set_mergeable(&self, number: u64, state: MergeableState) {
        self.remote.lock().unwrap().mergeable.insert(number, state);
    }

    /// Approve every PR currently known
    pub fn approve_all(&self) {
        let mut remote = self.remote.lock().unwrap();
        let numbers: Vec<u64> = remote.prs.keys().copied().collect();
        for number in numbers {
            remote.reviews.insert(number, ReviewDecision::Approved);
        }
    }

    /// Set the latest run of `workflow` on `branch`
    pub fn set_workflow_run(&self, workflow: &str, branch: &str, status: &str, conclusion: &str) {
        let run = WorkflowRun {
            status: WorkflowStatus {
                name: workflow.to_string(),
                status: status.to_string(),
                conclusion: conclusion.to_string(),
            },
            head_sha: String::new(),
            html_url: format!("{}/actions/runs/1", self.config.repo_url()),
            created_at: None,
        };
        self.remote
            .lock()
            .unwrap()
            .runs
            .insert((workflow.to_string(), branch.to_string()), run);
    }

    /// Delay every `get_pr_status` call (for concurrency tests)
    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    // === Error injection methods ===

    /// Make `find_existing_pr` return an error
    pub fn fail_find_pr(&self, msg: &str) {
        self.failures.lock().unwrap().find_pr = Some(msg.to_string());
    }

    /// Make `create_pr_with_options` fail for one head branch
    pub fn fail_create_pr_for(&self, head: &str) {
        self.failures
            .lock()
            .unwrap()
            .create_pr_heads
            .insert(head.to_string());
    }

    /// Stop failing `create_pr_with_options`
    pub fn clear_create_pr_failures(&self) {
        self.failures.lock().unwrap().create_pr_heads.clear();
    }

    /// Make `update_pr_base` return an error
    pub fn fail_update_base(&self, msg: &str) {
        self.failures.lock().unwrap().update_base = Some(msg.to_string());
    }

    /// Make `update_pr_body` return an error
    pub fn fail_update_body(&self, msg: &str) {
        self.failures.lock().unwrap().update_body = Some(msg.to_string());
    }

    /// Make `merge_pr` fail for one PR
    pub fn fail_merge_pr(&self, number: u64) {
        self.failures.lock().unwrap().merge_prs.insert(number);
    }

    /// Make `get_pr_status` fail for one PR
    pub fn fail_status_for(&self, number: u64) {
        self.failures.lock().unwrap().status_prs.insert(number);
    }

    /// Make `next_stack_id` return an error
    pub fn fail_next_id(&self, msg: &str) {
        self.failures.lock().unwrap().next_id = Some(msg.to_string());
    }

    // === Call verification methods ===

    pub fn get_find_pr_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().find_pr.clone()
    }

    pub fn get_create_pr_calls(&self) -> Vec<CreatePrCall> {
        self.calls.lock().unwrap().create_pr.clone()
    }

    pub fn get_update_base_calls(&self) -> Vec<UpdateBaseCall> {
        self.calls.lock().unwrap().update_base.clone()
    }

    pub fn get_update_body_calls(&self) -> Vec<UpdateBodyCall> {
        self.calls.lock().unwrap().update_body.clone()
    }

    pub fn get_merge_pr_calls(&self) -> Vec<MergePrCall> {
        self.calls.lock().unwrap().merge_pr.clone()
    }

    pub fn get_trigger_calls(&self) -> Vec<TriggerCall> {
        self.calls.lock().unwrap().trigger.clone()
    }

    pub fn get_status_calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().status.clone()
    }

    pub fn next_id_calls(&self) -> usize {
        self.calls.lock().unwrap().next_id
    }

    /// Number of calls that changed something on the remote
    pub fn mutation_count(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.create_pr.len()
            + calls.update_base.len()
            + calls.update_body.len()
            + calls.merge_pr.len()
            + calls.trigger.len()
    }

    /// Forget recorded calls (remote state is kept)
    pub fn reset_calls(&self) {
        *self.calls.lock().unwrap() = Calls::default();
    }

    /// Highest number of concurrent `get_pr_status` calls seen
    pub fn max_concurrent_status(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current state of a PR
    pub fn pr(&self, number: u64) -> Option<PullRequestDetails> {
        self.remote.lock().unwrap().prs.get(&number).cloned()
    }

    /// Open PR whose head is `branch`
    pub fn pr_for(&self, branch: &str) -> Option<PullRequestDetails> {
        self.remote
            .lock()
            .unwrap()
            .prs
            .values()
            .find(|pr| pr.head_ref == branch && pr.state == PrState::Open)
            .cloned()
    }

    /// Number of PRs ever created or added
    pub fn pr_count(&self) -> usize {
        self.remote.lock().unwrap().prs.len()
    }

    /// Assert that a PR was created with specific head and base
    pub fn assert_create_pr_called(&self, head: &str, base: &str) {
        let calls = self.get_create_pr_calls();
        assert!(
            calls.iter().any(|c| c.head == head && c.base == base),
            "Expected create_pr({head}, {base}) but got: {calls:?}"
        );
    }

    /// Assert that `update_pr_base` was called with specific args
    pub fn assert_update_base_called(&self, pr_number: u64, new_base: &str) {
        let calls = self.get_update_base_calls();
        assert!(
            calls
                .iter()
                .any(|c| c.pr_number == pr_number && c.new_base == new_base),
            "Expected update_pr_base({pr_number}, {new_base}) but got: {calls:?}"
        );
    }

    /// Assert that `merge_pr` was called for a specific PR
    pub fn assert_merge_called(&self, pr_number: u64) {
        let calls = self.get_merge_pr_calls();
        assert!(
            calls.iter().any(|c| c.pr_number == pr_number),
            "Expected merge_pr({pr_number}) but got: {calls:?}"
        );
    }

    /// Assert that `merge_pr` was NOT called for a specific PR
    pub fn assert_merge_not_called(&self, pr_number: u64) {
        let calls = self.get_merge_pr_calls();
        assert!(
            !calls.iter().any(|c| c.pr_number == pr_number),
            "Expected merge_pr({pr_number}) NOT to be called but it was: {calls:?}"
        );
    }

    fn summary(details: &PullRequestDetails) -> PullRequest {
        PullRequest {
            number: details.number,
            html_url: details.html_url.clone(),
            base_ref: details.base_ref.clone(),
            head_ref: details.head_ref.clone(),
            title: details.title.clone(),
            is_draft: details.is_draft,
        }
    }

    fn not_found(number: u64) -> Error {
        Error::GitHubApi(format!("PR #{number} not found"))
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        self.calls
            .lock()
            .unwrap()
            .find_pr
            .push(head_branch.to_string());

        if let Some(msg) = self.failures.lock().unwrap().find_pr.as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }

        Ok(self.pr_for(head_branch).as_ref().map(Self::summary))
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        self.calls.lock().unwrap().create_pr.push(CreatePrCall {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.map(ToString::to_string),
            draft,
        });

        if self.failures.lock().unwrap().create_pr_heads.contains(head) {
            return Err(Error::GitHubApi(format!("cannot create PR for {head}")));
        }

        let mut remote = self.remote.lock().unwrap();
        let number = remote
            .prs
            .keys()
            .chain(remote.issues.keys())
            .max()
            .copied()
            .unwrap_or(0)
            + 1;
        let details = PullRequestDetails {
            number,
            title: title.to_string(),
            body: body.map(ToString::to_string),
            state: PrState::Open,
            is_draft: draft,
            head_ref: head.to_string(),
            base_ref: base.to_string(),
            html_url: self.url("pull", number),
        };
        remote.prs.insert(number, details.clone());
        Ok(Self::summary(&details))
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        self.pr(pr_number).ok_or_else(|| Self::not_found(pr_number))
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        self.calls.lock().unwrap().update_base.push(UpdateBaseCall {
            pr_number,
            new_base: new_base.to_string(),
        });

        if let Some(msg) = self.failures.lock().unwrap().update_base.as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }

        let mut remote = self.remote.lock().unwrap();
        let pr = remote
            .prs
            .get_mut(&pr_number)
            .ok_or_else(|| Self::not_found(pr_number))?;
        pr.base_ref = new_base.to_string();
        Ok(Self::summary(pr))
    }

    async fn update_pr_body(&self, pr_number: u64, body: &str) -> Result<()> {
        self.calls.lock().unwrap().update_body.push(UpdateBodyCall {
            pr_number,
            body: body.to_string(),
        });

        if let Some(msg) = self.failures.lock().unwrap().update_body.as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }

        let mut remote = self.remote.lock().unwrap();
        let pr = remote
            .prs
            .get_mut(&pr_number)
            .ok_or_else(|| Self::not_found(pr_number))?;
        pr.body = Some(body.to_string());
        Ok(())
    }

    async fn get_pr_status(&self, pr_number: u64) -> Result<PrStatus> {
        self.calls.lock().unwrap().status.push(pr_number);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.lock().unwrap().status_prs.contains(&pr_number) {
            return Err(Error::GitHubApi(format!("status of #{pr_number} unavailable")));
        }

        let remote = self.remote.lock().unwrap();
        let pr = remote
            .prs
            .get(&pr_number)
            .ok_or_else(|| Self::not_found(pr_number))?;
        Ok(PrStatus {
            number: pr.number,
            title: pr.title.clone(),
            html_url: pr.html_url.clone(),
            state: pr.state,
            review_decision: remote.reviews.get(&pr_number).copied().unwrap_or_default(),
            mergeable: remote
                .mergeable
                .get(&pr_number)
                .copied()
                .unwrap_or(MergeableState::Mergeable),
            is_draft: pr.is_draft,
            head_ref: pr.head_ref.clone(),
            base_ref: pr.base_ref.clone(),
        })
    }

    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult> {
        self.calls
            .lock()
            .unwrap()
            .merge_pr
            .push(MergePrCall { pr_number, method });

        if self.failures.lock().unwrap().merge_prs.contains(&pr_number) {
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: Some("Base branch was modified".to_string()),
            });
        }

        let mut remote = self.remote.lock().unwrap();
        let pr = remote
            .prs
            .get_mut(&pr_number)
            .ok_or_else(|| Self::not_found(pr_number))?;
        pr.state = PrState::Merged;
        Ok(MergeResult {
            merged: true,
            sha: Some(format!("merged_sha_{pr_number}")),
            message: None,
        })
    }

    async fn trigger_workflow(&self, workflow: &str, branch: &str) -> Result<()> {
        self.calls.lock().unwrap().trigger.push(TriggerCall {
            workflow: workflow.to_string(),
            branch: branch.to_string(),
        });
        Ok(())
    }

    async fn latest_workflow_run(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Option<WorkflowRun>> {
        Ok(self
            .remote
            .lock()
            .unwrap()
            .runs
            .get(&(workflow.to_string(), branch.to_string()))
            .cloned())
    }

    async fn find_issue(&self, number: u64) -> Result<Option<IssueRef>> {
        Ok(self.remote.lock().unwrap().issues.get(&number).cloned())
    }

    async fn next_stack_id(&self) -> Result<u64> {
        self.calls.lock().unwrap().next_id += 1;
        if let Some(msg) = self.failures.lock().unwrap().next_id.as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }
        let remote = self.remote.lock().unwrap();
        Ok(remote
            .prs
            .keys()
            .chain(remote.issues.keys())
            .max()
            .copied()
            .unwrap_or(0)
            + 1)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
