//! Remote status aggregation
//!
//! Queries review/merge state and the latest workflow runs for every stack
//! entry that has a PR. Queries fan out over a bounded [`JoinSet`]; the view
//! is only written back to annotations once every query has finished.

use crate::annotation::AnnotationStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::stack::{Stack, extract_stack};
use crate::types::{PrStatus, WorkflowStatus};
use crate::vcs::VcsService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Status of one stack entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    /// Position, bottom = 0
    pub position: usize,
    /// Commit sha
    pub sha: String,
    /// Commit summary
    pub summary: String,
    /// Bound branch
    pub branch: Option<String>,
    /// Fresh PR status; `None` when the entry has no PR or the query failed
    pub pr: Option<PrStatus>,
    /// Latest run per configured workflow
    pub workflows: Vec<WorkflowStatus>,
    /// Query failure
    pub error: Option<String>,
}

/// Snapshot of the whole stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    /// Base branch name
    pub base_branch: String,
    /// Development branch
    pub dev_branch: String,
    /// One row per stack entry, stack order
    pub slots: Vec<SlotStatus>,
    /// When the queries finished
    pub refreshed_at: DateTime<Utc>,
}

impl StatusView {
    /// Rows whose query failed
    pub fn errors(&self) -> impl Iterator<Item = &SlotStatus> {
        self.slots.iter().filter(|s| s.error.is_some())
    }
}

/// Latest complete view; each poll replaces it entirely
#[derive(Debug, Default)]
pub struct StatusCache {
    view: Option<StatusView>,
}

impl StatusCache {
    /// Empty cache
    pub const fn new() -> Self {
        Self { view: None }
    }

    /// Replace the cached view, returning the new one
    pub fn replace(&mut self, view: StatusView) -> &StatusView {
        self.view.insert(view)
    }

    /// Current view, if any poll has finished
    pub const fn view(&self) -> Option<&StatusView> {
        self.view.as_ref()
    }
}

/// Runs status queries with bounded concurrency
pub struct StatusAggregator {
    platform: Arc<dyn PlatformService>,
    workflows: Vec<String>,
    concurrency: usize,
}

struct Query {
    index: usize,
    pr_number: u64,
    branch: Option<String>,
}

type QueryResult = (usize, Result<(PrStatus, Vec<WorkflowStatus>)>);

impl StatusAggregator {
    /// Aggregator over `platform`, tracking `workflows`
    pub fn new(
        platform: Arc<dyn PlatformService>,
        workflows: Vec<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            platform,
            workflows,
            concurrency: concurrency.max(1),
        }
    }

    /// Aggregator configured from `config`
    pub fn from_config(platform: Arc<dyn PlatformService>, config: &Config) -> Self {
        Self::new(platform, config.workflows.clone(), config.status_concurrency)
    }

    async fn query(
        platform: Arc<dyn PlatformService>,
        workflows: Vec<String>,
        pr_number: u64,
        branch: Option<String>,
    ) -> Result<(PrStatus, Vec<WorkflowStatus>)> {
        let status = platform.get_pr_status(pr_number).await?;
        let branch = branch.unwrap_or_else(|| status.head_ref.clone());

        let mut runs = Vec::with_capacity(workflows.len());
        for workflow in &workflows {
            if let Some(run) = platform.latest_workflow_run(workflow, &branch).await? {
                runs.push(WorkflowStatus {
                    name: workflow.clone(),
                    ..run.status
                });
            }
        }
        Ok((status, runs))
    }

    /// Query every entry with a PR and build a complete view
    ///
    /// Per-entry failures are kept in the view; only a broken worker pool is
    /// an error.
    pub async fn collect(&self, stack: &Stack) -> Result<StatusView> {
        let mut slots: Vec<SlotStatus> = stack
            .entries
            .iter()
            .map(|entry| SlotStatus {
                position: entry.position,
                sha: entry.commit.sha.clone(),
                summary: entry.commit.summary.clone(),
                branch: entry.annotation.branch.clone(),
                pr: None,
                workflows: Vec::new(),
                error: None,
            })
            .collect();

        let queries: Vec<Query> = stack
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                Some(Query {
                    index,
                    pr_number: entry.annotation.pr_id()?,
                    branch: entry.annotation.branch.clone(),
                })
            })
            .collect();

        debug!(queries = queries.len(), concurrency = self.concurrency, "querying status");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set: JoinSet<QueryResult> = JoinSet::new();

        for query in queries {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("status worker pool closed: {e}")))?;
            let platform = Arc::clone(&self.platform);
            let workflows = self.workflows.clone();
            set.spawn(async move {
                let _permit = permit;
                let result = Self::query(platform, workflows, query.pr_number, query.branch).await;
                (query.index, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (index, result) =
                joined.map_err(|e| Error::Internal(format!("status query panicked: {e}")))?;
            let slot = &mut slots[index];
            match result {
                Ok((status, workflows)) => {
                    slot.pr = Some(status);
                    slot.workflows = workflows;
                }
                Err(e) => {
                    warn!(sha = %slot.sha, error = %e, "status query failed");
                    slot.error = Some(e.to_string());
                }
            }
        }

        Ok(StatusView {
            base_branch: stack.base_branch.clone(),
            dev_branch: stack.dev_branch.clone(),
            slots,
            refreshed_at: Utc::now(),
        })
    }
}

/// Write fresh status into each entry's annotation, returning how many changed
pub fn write_back(vcs: &dyn VcsService, stack: &Stack, view: &StatusView) -> Result<usize> {
    let store = AnnotationStore::new(vcs);
    let mut written = 0;

    for (entry, slot) in stack.entries.iter().zip(&view.slots) {
        let Some(status) = &slot.pr else {
            continue;
        };
        let mut annotation = entry.annotation.clone();
        annotation.apply_status(status, slot.workflows.clone());
        if store.save(&entry.commit.sha, &annotation)? {
            written += 1;
        }
    }

    Ok(written)
}

/// Aggregate once and record the result
#[allow(clippy::future_not_send)]
pub async fn refresh(
    vcs: &dyn VcsService,
    aggregator: &StatusAggregator,
    config: &Config,
) -> Result<StatusView> {
    let stack = extract_stack(vcs, config)?;
    let view = aggregator.collect(&stack).await?;
    let written = write_back(vcs, &stack, &view)?;
    info!(entries = view.slots.len(), written, "status refreshed");
    Ok(view)
}

/// Refresh until `token` is cancelled, handing each new view to `on_view`
///
/// The stack is rebuilt every cycle. Cancellation is honoured between
/// cycles only; a cycle in flight always completes.
#[allow(clippy::future_not_send)]
pub async fn poll(
    vcs: &dyn VcsService,
    aggregator: &StatusAggregator,
    config: &Config,
    token: &CancellationToken,
    mut on_view: impl FnMut(&StatusView),
) -> Result<StatusCache> {
    let mut cache = StatusCache::new();

    while !token.is_cancelled() {
        let view = refresh(vcs, aggregator, config).await?;
        on_view(cache.replace(view));

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(config.poll_interval()) => {}
        }
    }

    debug!("status polling stopped");
    Ok(cache)
}
