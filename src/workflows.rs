//! Manual workflow dispatch (`run-workflows`)

use crate::body::{
    WORKFLOW_BADGES_END, WORKFLOW_BADGES_START, render_workflow_section, upsert_section,
};
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::vcs::VcsService;
use tracing::info;

/// What `run-workflows` was pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowTarget {
    /// The checked-out branch (`.`)
    Current,
    /// A PR by number
    PullRequest(u64),
    /// A branch by name
    Branch(String),
}

impl WorkflowTarget {
    /// Parse the command-line argument
    pub fn parse(arg: &str) -> Self {
        if arg == "." {
            Self::Current
        } else if let Ok(number) = arg.trim_start_matches('#').parse() {
            Self::PullRequest(number)
        } else {
            Self::Branch(arg.to_string())
        }
    }
}

/// Result of a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDispatch {
    /// Branch the workflows ran on
    pub branch: String,
    /// Workflows dispatched
    pub workflows: Vec<String>,
    /// PR whose badge section was refreshed
    pub pr_number: Option<u64>,
}

/// Dispatch every configured workflow on the target's branch
///
/// When the branch has an open PR its badge section is added or refreshed.
#[allow(clippy::future_not_send)]
pub async fn run_workflows(
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    workflows: &[String],
    target: &WorkflowTarget,
) -> Result<WorkflowDispatch> {
    if workflows.is_empty() {
        return Err(Error::Config(
            "no workflows configured; add `workflows = [...]` to .ghchain.toml".to_string(),
        ));
    }

    let (branch, pr) = match target {
        WorkflowTarget::Current => {
            let branch = vcs
                .current_branch()?
                .ok_or_else(|| Error::InvalidRange("HEAD is detached".to_string()))?;
            let pr = platform.find_existing_pr(&branch).await?;
            (branch, pr.map(|p| p.number))
        }
        WorkflowTarget::Branch(branch) => {
            let pr = platform.find_existing_pr(branch).await?;
            (branch.clone(), pr.map(|p| p.number))
        }
        WorkflowTarget::PullRequest(number) => {
            let details = platform.get_pr_details(*number).await?;
            (details.head_ref, Some(*number))
        }
    };

    for workflow in workflows {
        platform
            .trigger_workflow(workflow, &branch)
            .await
            .map_err(|e| Error::remote(format!("run {workflow} on {branch}"), e))?;
        info!(workflow = %workflow, branch = %branch, "workflow dispatched");
    }

    if let Some(number) = pr {
        let details = platform.get_pr_details(number).await?;
        let current = details.body.unwrap_or_default();
        let section = render_workflow_section(platform.config(), workflows, &branch);
        let desired =
            upsert_section(&current, WORKFLOW_BADGES_START, WORKFLOW_BADGES_END, &section);
        if desired != current {
            platform
                .update_pr_body(number, &desired)
                .await
                .map_err(|e| Error::remote(format!("update PR #{number} description"), e))?;
        }
    }

    Ok(WorkflowDispatch {
        branch,
        workflows: workflows.to_vec(),
        pr_number: pr,
    })
}
