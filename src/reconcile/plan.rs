//! Reconcile planning - pure functions
//!
//! No I/O happens here: the gathered facts go in, the list of steps per slot
//! comes out. Running the planner twice on the same facts gives the same plan,
//! and a fully reconciled stack plans nothing but no-op records.

use crate::annotation::Annotation;
use crate::naming::{BranchNameResolver, BranchTemplate};
use crate::reconcile::analysis::{Binding, SlotFacts, StackAnalysis};
use crate::types::{CommitInfo, IssueRef, PullRequestDetails};
use std::fmt;

/// Options for a reconcile pass
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Open PRs for slots that have none
    pub open_prs: bool,
    /// Open new PRs as drafts
    pub draft: bool,
    /// Dispatch the configured workflows on every slot's branch
    pub with_tests: bool,
    /// Create branches for untracked commits (off after a rebase)
    pub create_branches: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            open_prs: true,
            draft: false,
            with_tests: false,
            create_branches: true,
        }
    }
}

/// Where a slot stands, derived from facts at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlotState {
    /// No branch bound
    Untracked,
    /// Branch exists but the remote does not have this commit
    BranchCreated,
    /// Remote has the commit; no PR
    Pushed,
    /// PR open but base or issue link out of date
    PrOpen,
    /// Everything in place
    Linked,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Untracked => "untracked",
            Self::BranchCreated => "branch created",
            Self::Pushed => "pushed",
            Self::PrOpen => "PR open",
            Self::Linked => "linked",
        };
        f.write_str(text)
    }
}

/// One operation on a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStep {
    /// Create a branch at the commit
    CreateBranch {
        /// New branch name
        branch: String,
        /// Commit to point at
        sha: String,
    },
    /// Point an existing (or locally missing) bound branch at the commit
    MoveBranch {
        /// Branch name
        branch: String,
        /// Current local tip
        from: Option<String>,
        /// Commit to point at
        to: String,
    },
    /// Push with `--force-with-lease`
    Push {
        /// Branch name
        branch: String,
    },
    /// Open a PR
    CreatePr {
        /// Head branch
        branch: String,
        /// Base branch
        base: String,
        /// Title (commit summary)
        title: String,
        /// Initial body (commit message body)
        body: String,
        /// Open as draft
        draft: bool,
    },
    /// Change a PR's base branch
    RetargetBase {
        /// PR number
        pr_number: u64,
        /// Head branch
        branch: String,
        /// Base on the remote now
        current_base: String,
        /// Base it must have
        new_base: String,
    },
    /// Record the referenced issue
    LinkIssue {
        /// Issue number
        number: u64,
        /// Issue URL
        url: String,
    },
    /// Dispatch workflows on the branch
    RunWorkflows {
        /// Branch name
        branch: String,
        /// Workflow names
        workflows: Vec<String>,
    },
    /// Write the annotation if it changed
    Record,
}

impl SlotStep {
    /// Whether this step changes something on the remote
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Push { .. }
                | Self::CreatePr { .. }
                | Self::RetargetBase { .. }
                | Self::RunWorkflows { .. }
        )
    }
}

impl fmt::Display for SlotStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateBranch { branch, sha } => {
                write!(f, "create branch {branch} at {}", &sha[..sha.len().min(8)])
            }
            Self::MoveBranch { branch, to, .. } => {
                write!(f, "move branch {branch} to {}", &to[..to.len().min(8)])
            }
            Self::Push { branch } => write!(f, "push {branch}"),
            Self::CreatePr {
                branch, base, draft, ..
            } => {
                let kind = if *draft { "draft PR" } else { "PR" };
                write!(f, "open {kind} {branch} -> {base}")
            }
            Self::RetargetBase {
                pr_number,
                current_base,
                new_base,
                ..
            } => write!(f, "retarget PR #{pr_number}: {current_base} -> {new_base}"),
            Self::LinkIssue { number, .. } => write!(f, "link issue #{number}"),
            Self::RunWorkflows { branch, workflows } => {
                write!(f, "run {} on {branch}", workflows.join(", "))
            }
            Self::Record => write!(f, "record annotation"),
        }
    }
}

/// Planned work for one slot
#[derive(Debug, Clone)]
pub struct SlotPlan {
    /// Position, bottom = 0
    pub position: usize,
    /// Commit at this position
    pub commit: CommitInfo,
    /// Bound or newly allocated branch; `None` when skipped
    pub branch: Option<String>,
    /// How the branch was found
    pub binding: Binding,
    /// Branch this slot's PR must target
    pub prev_head: String,
    /// Observed state before the run
    pub state: SlotState,
    /// Annotation to start from
    pub annotation: Annotation,
    /// Open PR, if known
    pub pr: Option<PullRequestDetails>,
    /// Referenced issue, if resolved
    pub issue: Option<IssueRef>,
    /// Steps in order
    pub steps: Vec<SlotStep>,
    /// Why the slot is skipped entirely
    pub skip_reason: Option<String>,
    /// Remote lookup failure carried over from the gather phase
    pub lookup_error: Option<String>,
}

impl SlotPlan {
    /// Steps other than the final record
    pub fn actions(&self) -> impl Iterator<Item = &SlotStep> {
        self.steps.iter().filter(|s| !matches!(s, SlotStep::Record))
    }
}

/// The full reconcile plan
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    /// Base branch name
    pub base_branch: String,
    /// Development branch
    pub dev_branch: String,
    /// Options the plan was made with
    pub options: ReconcileOptions,
    /// Configured workflows
    pub workflows: Vec<String>,
    /// Remote to push to
    pub remote: String,
    /// Slots in stack order
    pub slots: Vec<SlotPlan>,
}

impl ReconcilePlan {
    /// Whether no slot has any action
    pub fn is_noop(&self) -> bool {
        self.slots.iter().all(|s| s.actions().next().is_none())
    }

    fn count(&self, pred: impl Fn(&SlotStep) -> bool) -> usize {
        self.slots
            .iter()
            .flat_map(|s| s.steps.iter())
            .filter(|&s| pred(s))
            .count()
    }

    /// Number of PRs to open
    pub fn count_creates(&self) -> usize {
        self.count(|s| matches!(s, SlotStep::CreatePr { .. }))
    }

    /// Number of pushes
    pub fn count_pushes(&self) -> usize {
        self.count(|s| matches!(s, SlotStep::Push { .. }))
    }

    /// Number of base retargets
    pub fn count_retargets(&self) -> usize {
        self.count(|s| matches!(s, SlotStep::RetargetBase { .. }))
    }

    /// Number of remote mutations planned
    pub fn count_remote(&self) -> usize {
        self.count(SlotStep::is_remote)
    }
}

fn observed_state(facts: &SlotFacts, prev_head: &str) -> SlotState {
    let sha = facts.commit.sha.as_str();
    if facts.branch.is_none() {
        return SlotState::Untracked;
    }
    if facts.remote_tip.as_deref() != Some(sha) {
        return SlotState::BranchCreated;
    }
    let Some(pr) = &facts.pr else {
        return SlotState::Pushed;
    };
    let issue_current = facts
        .issue
        .as_ref()
        .is_none_or(|i| facts.annotation.issue.as_deref() == Some(i.html_url.as_str()));
    if pr.base_ref != prev_head || !issue_current {
        SlotState::PrOpen
    } else {
        SlotState::Linked
    }
}

/// Create the reconcile plan (PURE - no I/O)
///
/// `prev_head` for a slot is the branch of the nearest earlier slot that has
/// one, or the base branch. New names come from `template` starting at the
/// analysis' stack id.
pub fn create_reconcile_plan(
    analysis: StackAnalysis,
    template: &BranchTemplate,
    options: ReconcileOptions,
    workflows: &[String],
    remote: &str,
) -> ReconcilePlan {
    let mut resolver = analysis.next_stack_id.map(|id| {
        BranchNameResolver::new(
            template.clone(),
            analysis.author.clone(),
            id,
            analysis.taken_branches.clone(),
        )
    });

    let mut prev_head = analysis.base_branch.clone();
    let mut slots = Vec::with_capacity(analysis.slots.len());

    for facts in analysis.slots {
        let state = observed_state(&facts, &prev_head);
        let sha = facts.commit.sha.clone();
        let mut steps = Vec::new();

        let branch = match (&facts.branch, resolver.as_mut()) {
            (Some(branch), _) => {
                if facts.local_tip.as_deref() != Some(sha.as_str()) {
                    steps.push(SlotStep::MoveBranch {
                        branch: branch.clone(),
                        from: facts.local_tip.clone(),
                        to: sha.clone(),
                    });
                }
                Some(branch.clone())
            }
            (None, Some(resolver)) if options.create_branches => {
                let (name, _) = resolver.allocate();
                steps.push(SlotStep::CreateBranch {
                    branch: name.clone(),
                    sha: sha.clone(),
                });
                Some(name)
            }
            (None, _) => None,
        };

        let Some(branch) = branch else {
            slots.push(SlotPlan {
                position: facts.position,
                commit: facts.commit,
                branch: None,
                binding: facts.binding,
                prev_head: prev_head.clone(),
                state,
                annotation: facts.annotation,
                pr: facts.pr,
                issue: facts.issue,
                steps: Vec::new(),
                skip_reason: Some("no branch and branch creation is off".to_string()),
                lookup_error: facts.lookup_error,
            });
            continue;
        };

        if facts.lookup_error.is_none() {
            if facts.remote_tip.as_deref() != Some(sha.as_str()) {
                steps.push(SlotStep::Push {
                    branch: branch.clone(),
                });
            }

            match &facts.pr {
                None if options.open_prs => steps.push(SlotStep::CreatePr {
                    branch: branch.clone(),
                    base: prev_head.clone(),
                    title: facts.commit.summary.clone(),
                    body: facts.commit.body().to_string(),
                    draft: options.draft,
                }),
                Some(pr) if pr.base_ref != prev_head => steps.push(SlotStep::RetargetBase {
                    pr_number: pr.number,
                    branch: branch.clone(),
                    current_base: pr.base_ref.clone(),
                    new_base: prev_head.clone(),
                }),
                _ => {}
            }

            if let Some(issue) = &facts.issue
                && facts.annotation.issue.as_deref() != Some(issue.html_url.as_str())
            {
                steps.push(SlotStep::LinkIssue {
                    number: issue.number,
                    url: issue.html_url.clone(),
                });
            }

            if options.with_tests && !workflows.is_empty() {
                steps.push(SlotStep::RunWorkflows {
                    branch: branch.clone(),
                    workflows: workflows.to_vec(),
                });
            }
        }
        steps.push(SlotStep::Record);

        slots.push(SlotPlan {
            position: facts.position,
            commit: facts.commit,
            branch: Some(branch.clone()),
            binding: facts.binding,
            prev_head: std::mem::replace(&mut prev_head, branch),
            state,
            annotation: facts.annotation,
            pr: facts.pr,
            issue: facts.issue,
            steps,
            skip_reason: None,
            lookup_error: facts.lookup_error,
        });
    }

    ReconcilePlan {
        base_branch: analysis.base_branch,
        dev_branch: analysis.dev_branch,
        options,
        workflows: workflows.to_vec(),
        remote: remote.to_string(),
        slots,
    }
}
