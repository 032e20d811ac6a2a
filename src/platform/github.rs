//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    IssueRef, MergeMethod, MergeResult, MergeableState, PlatformConfig, PrState, PrStatus,
    PullRequest, PullRequestDetails, ReviewDecision, WorkflowRun, WorkflowStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

// GraphQL response types for the PR status query

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct StatusData {
    repository: Option<StatusRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRepository {
    pull_request: Option<GraphQlPullRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlPullRequest {
    number: u64,
    title: String,
    url: String,
    state: String,
    review_decision: Option<String>,
    mergeable: String,
    is_draft: bool,
    head_ref_name: String,
    base_ref_name: String,
}

impl From<GraphQlPullRequest> for PrStatus {
    fn from(pr: GraphQlPullRequest) -> Self {
        let state = match pr.state.as_str() {
            "OPEN" => PrState::Open,
            "MERGED" => PrState::Merged,
            _ => PrState::Closed,
        };
        Self {
            number: pr.number,
            title: pr.title,
            html_url: pr.url,
            state,
            review_decision: pr
                .review_decision
                .as_deref()
                .map_or(ReviewDecision::None, ReviewDecision::parse),
            mergeable: MergeableState::parse(&pr.mergeable),
            is_draft: pr.is_draft,
            head_ref: pr.head_ref_name,
            base_ref: pr.base_ref_name,
        }
    }
}

const STATUS_QUERY: &str = r"
    query PullRequestStatus($owner: String!, $repo: String!, $number: Int!) {
        repository(owner: $owner, name: $repo) {
            pullRequest(number: $number) {
                number
                title
                url
                state
                reviewDecision
                mergeable
                isDraft
                headRefName
                baseRefName
            }
        }
    }
";

// REST response types for endpoints called through reqwest

#[derive(Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<RestWorkflowRun>,
}

#[derive(Deserialize)]
struct RestWorkflowRun {
    status: Option<String>,
    conclusion: Option<String>,
    head_sha: String,
    html_url: String,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RestIssue {
    number: u64,
    title: String,
    html_url: String,
}

#[derive(Deserialize)]
struct Numbered {
    number: u64,
}

/// Workflow file for a configured workflow name
fn workflow_file(name: &str) -> String {
    if name.ends_with(".yml") || name.ends_with(".yaml") {
        name.to_string()
    } else {
        format!("{name}.yml")
    }
}

/// GitHub service using octocrab, with reqwest for Actions and lookups
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// REST API root, e.g. `https://api.github.com`
    api_base: String,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let api_base = host.as_ref().map_or_else(
            || "https://api.github.com".to_string(),
            |h| format!("https://{h}/api/v3"),
        );
        Self::with_api_base(
            token,
            PlatformConfig { owner, repo, host },
            &api_base,
        )
    }

    /// Create a service talking to an explicit API root
    pub fn with_api_base(token: &str, config: PlatformConfig, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(&api_base)
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent(concat!("ghchain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token: token.to_string(),
            http_client,
            api_base,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/repos/{}/{}/{path}",
            self.api_base, self.config.owner, self.config.repo
        );
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Number of the most recently created item of a listing endpoint
    async fn latest_number(&self, path: &str) -> Result<u64> {
        let response = self
            .request(Method::GET, path)
            .query(&[
                ("state", "all"),
                ("sort", "created"),
                ("direction", "desc"),
                ("per_page", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to list {path}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "Listing {path} returned {}",
                response.status()
            )));
        }

        let items: Vec<Numbered> = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse {path}: {e}")))?;
        Ok(items.first().map_or(0, |item| item.number))
    }
}

/// Helper to convert octocrab PR to our `PullRequest` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        is_draft: pr.draft.unwrap_or(false),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        debug!(head_branch, "finding existing PR");
        let head = format!("{}:{}", &self.config.owner, head_branch);

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        let result = prs.items.first().map(pr_from_octocrab);
        if let Some(ref pr) = result {
            debug!(pr_number = pr.number, "found existing PR");
        } else {
            debug!("no existing PR found");
        }
        Ok(result)
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        debug!(head, base, draft, "creating PR");
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut builder = pulls.create(title, head, base).draft(draft);

        if let Some(body_text) = body {
            builder = builder.body(body_text);
        }

        let pr = builder.send().await?;

        let result = pr_from_octocrab(&pr);
        debug!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        debug!(pr_number, "getting PR details");

        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await?;

        let state = match pr.state {
            Some(octocrab::models::IssueState::Open) => PrState::Open,
            Some(octocrab::models::IssueState::Closed) if pr.merged_at.is_some() => PrState::Merged,
            // IssueState is non-exhaustive, so use wildcard for Closed and any future variants
            Some(_) | None => PrState::Closed,
        };

        let details = PullRequestDetails {
            number: pr.number,
            title: pr.title.clone().unwrap_or_default(),
            body: pr.body.clone(),
            state,
            is_draft: pr.draft.unwrap_or(false),
            head_ref: pr.head.ref_field.clone(),
            base_ref: pr.base.ref_field.clone(),
            html_url: pr
                .html_url
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        };

        debug!(pr_number, state = ?details.state, "got PR details");
        Ok(details)
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        debug!(pr_number, new_base, "updating PR base");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .base(new_base)
            .send()
            .await?;

        debug!(pr_number, "updated PR base");
        Ok(pr_from_octocrab(&pr))
    }

    async fn update_pr_body(&self, pr_number: u64, body: &str) -> Result<()> {
        debug!(pr_number, "updating PR body");
        self.client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .body(body)
            .send()
            .await?;
        Ok(())
    }

    async fn get_pr_status(&self, pr_number: u64) -> Result<PrStatus> {
        debug!(pr_number, "querying PR status");
        let response: GraphQlResponse<StatusData> = self
            .client
            .graphql(&serde_json::json!({
                "query": STATUS_QUERY,
                "variables": {
                    "owner": self.config.owner,
                    "repo": self.config.repo,
                    "number": pr_number,
                }
            }))
            .await
            .map_err(|e| Error::GitHubApi(format!("GraphQL query failed: {e}")))?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(Error::GitHubApi(format!(
                "GraphQL error: {}",
                messages.join(", ")
            )));
        }

        let pr = response
            .data
            .and_then(|d| d.repository)
            .and_then(|r| r.pull_request)
            .ok_or_else(|| Error::GitHubApi(format!("PR #{pr_number} not found")))?;

        Ok(pr.into())
    }

    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult> {
        debug!(pr_number, %method, "merging PR");

        // Squash commits take the PR title and body
        let details = self.get_pr_details(pr_number).await?;

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);

        let result = if method == MergeMethod::Squash {
            let mut builder = pulls.merge(pr_number).method(octocrab_method);
            builder = builder.title(format!("{} (#{})", details.title, pr_number));
            if let Some(ref body) = details.body {
                builder = builder.message(body);
            }
            builder.send().await
        } else {
            pulls.merge(pr_number).method(octocrab_method).send().await
        }
        .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        let merge_result = MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        };

        debug!(
            pr_number,
            merged = merge_result.merged,
            sha = ?merge_result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }

    async fn trigger_workflow(&self, workflow: &str, branch: &str) -> Result<()> {
        let file = workflow_file(workflow);
        debug!(workflow = %file, branch, "dispatching workflow");

        let response = self
            .request(Method::POST, &format!("actions/workflows/{file}/dispatches"))
            .json(&serde_json::json!({ "ref": branch }))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to dispatch {file}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Dispatching {file} on {branch} returned {status}: {text}"
            )));
        }
        Ok(())
    }

    async fn latest_workflow_run(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Option<WorkflowRun>> {
        let file = workflow_file(workflow);
        let response = self
            .request(Method::GET, &format!("actions/workflows/{file}/runs"))
            .query(&[("branch", branch), ("per_page", "1")])
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch runs of {file}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(workflow = %file, "workflow not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "Fetching runs of {file} returned {}",
                response.status()
            )));
        }

        let runs: WorkflowRunsResponse = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse runs of {file}: {e}")))?;

        Ok(runs.workflow_runs.into_iter().next().map(|run| WorkflowRun {
            status: WorkflowStatus {
                name: workflow.to_string(),
                status: run.status.unwrap_or_default(),
                conclusion: run.conclusion.unwrap_or_default(),
            },
            head_sha: run.head_sha,
            html_url: run.html_url,
            created_at: run.created_at,
        }))
    }

    async fn find_issue(&self, number: u64) -> Result<Option<IssueRef>> {
        let response = self
            .request(Method::GET, &format!("issues/{number}"))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch issue #{number}: {e}")))?;

        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!(number, "issue not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "Fetching issue #{number} returned {}",
                response.status()
            )));
        }

        let issue: RestIssue = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse issue #{number}: {e}")))?;
        Ok(Some(IssueRef {
            number: issue.number,
            title: issue.title,
            html_url: issue.html_url,
        }))
    }

    async fn next_stack_id(&self) -> Result<u64> {
        let latest_pr = self.latest_number("pulls").await?;
        let latest_issue = self.latest_number("issues").await?;
        let next = latest_pr.max(latest_issue) + 1;
        debug!(latest_pr, latest_issue, next, "allocated stack id");
        Ok(next)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
