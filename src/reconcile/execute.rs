//! Reconcile execution - effectful operations
//!
//! Runs a [`ReconcilePlan`] slot by slot. A failing step ends its slot only;
//! the annotation keeps whatever progress was made and later slots still run.
//! After all slots, PR descriptions are refreshed where they differ.

use crate::annotation::{Annotation, AnnotationStore};
use crate::body::{
    WORKFLOW_BADGES_END, WORKFLOW_BADGES_START, compose_body, render_workflow_section,
    upsert_section,
};
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::reconcile::ProgressCallback;
use crate::reconcile::plan::{ReconcilePlan, SlotPlan, SlotStep};
use crate::vcs::VcsService;
use std::collections::HashSet;
use tracing::{debug, warn};

/// What happened to one slot
#[derive(Debug)]
pub struct SlotOutcome {
    /// Position, bottom = 0
    pub position: usize,
    /// Commit sha
    pub sha: String,
    /// Commit summary
    pub summary: String,
    /// Bound branch
    pub branch: Option<String>,
    /// PR number after the run
    pub pr_number: Option<u64>,
    /// PR URL after the run
    pub pr_url: Option<String>,
    /// Steps that completed
    pub completed: Vec<SlotStep>,
    /// Whether the PR description was rewritten
    pub body_updated: bool,
    /// Why the slot was skipped
    pub skipped: Option<String>,
    /// First failure, if any
    pub error: Option<Error>,
}

impl SlotOutcome {
    fn new(slot: &SlotPlan) -> Self {
        Self {
            position: slot.position,
            sha: slot.commit.sha.clone(),
            summary: slot.commit.summary.clone(),
            branch: slot.branch.clone(),
            pr_number: slot.pr.as_ref().map(|pr| pr.number),
            pr_url: slot.pr.as_ref().map(|pr| pr.html_url.clone()),
            completed: Vec::new(),
            body_updated: false,
            skipped: slot.skip_reason.clone(),
            error: None,
        }
    }

    /// Whether the slot failed
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Completed steps that touched the remote
    pub fn remote_mutations(&self) -> usize {
        self.completed.iter().filter(|s| s.is_remote()).count() + usize::from(self.body_updated)
    }
}

/// Result of a reconcile pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// One outcome per slot, stack order
    pub outcomes: Vec<SlotOutcome>,
}

impl ReconcileReport {
    /// Whether every slot succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| !o.is_failed())
    }

    /// Failed slots
    pub fn failures(&self) -> impl Iterator<Item = &SlotOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Total remote mutations performed
    pub fn remote_mutations(&self) -> usize {
        self.outcomes.iter().map(SlotOutcome::remote_mutations).sum()
    }

    /// Number of PRs opened
    pub fn created_prs(&self) -> usize {
        self.count(|s| matches!(s, SlotStep::CreatePr { .. }))
    }

    /// Number of branches pushed
    pub fn pushed(&self) -> usize {
        self.count(|s| matches!(s, SlotStep::Push { .. }))
    }

    /// Number of PRs retargeted
    pub fn retargeted(&self) -> usize {
        self.count(|s| matches!(s, SlotStep::RetargetBase { .. }))
    }

    fn count(&self, pred: impl Fn(&SlotStep) -> bool) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| o.completed.iter())
            .filter(|&s| pred(s))
            .count()
    }
}

/// A PR whose description is refreshed in the body phase
struct BodyTarget {
    outcome: usize,
    number: u64,
    url: String,
    branch: String,
    body: String,
    issue: Option<String>,
}

struct Executor<'a> {
    plan: &'a ReconcilePlan,
    vcs: &'a dyn VcsService,
    platform: &'a dyn PlatformService,
    store: AnnotationStore<'a>,
    /// Branches known to exist on the remote
    on_remote: HashSet<String>,
}

impl Executor<'_> {
    fn require_on_remote(&self, operation: String, base: &str) -> Result<()> {
        if base == self.plan.base_branch || self.on_remote.contains(base) {
            Ok(())
        } else {
            Err(Error::remote(
                operation,
                format!("depends on {base}, which was never pushed"),
            ))
        }
    }

    #[allow(clippy::future_not_send)]
    async fn run_step(
        &mut self,
        slot: &SlotPlan,
        step: &SlotStep,
        annotation: &mut Annotation,
        pr: &mut Option<(u64, String, String)>,
    ) -> Result<()> {
        let sha = slot.commit.sha.as_str();
        match step {
            SlotStep::CreateBranch { branch, sha } => {
                self.vcs.set_branch(branch, sha, false)?;
                annotation.branch = Some(branch.clone());
            }
            SlotStep::MoveBranch { branch, to, .. } => {
                self.vcs.set_branch(branch, to, true)?;
            }
            SlotStep::Push { branch } => {
                self.vcs
                    .push(&self.plan.remote, std::slice::from_ref(branch))
                    .map_err(|e| Error::remote(format!("push {branch}"), e))?;
                self.on_remote.insert(branch.clone());
            }
            SlotStep::CreatePr {
                branch,
                base,
                title,
                body,
                draft,
            } => {
                let operation = format!("create PR for {branch}");
                self.require_on_remote(operation.clone(), base)?;
                let body_opt = (!body.is_empty()).then_some(body.as_str());
                let created = self
                    .platform
                    .create_pr_with_options(branch, base, title, body_opt, *draft)
                    .await
                    .map_err(|e| Error::remote(operation, e))?;
                annotation.pr_url = Some(created.html_url.clone());
                *pr = Some((created.number, created.html_url, body.clone()));
            }
            SlotStep::RetargetBase {
                pr_number,
                new_base,
                ..
            } => {
                let operation = format!("retarget PR #{pr_number}");
                self.require_on_remote(operation.clone(), new_base)?;
                self.platform
                    .update_pr_base(*pr_number, new_base)
                    .await
                    .map_err(|e| Error::remote(operation, e))?;
            }
            SlotStep::LinkIssue { url, .. } => {
                annotation.issue = Some(url.clone());
            }
            SlotStep::RunWorkflows { branch, workflows } => {
                for workflow in workflows {
                    self.platform
                        .trigger_workflow(workflow, branch)
                        .await
                        .map_err(|e| Error::remote(format!("run {workflow} on {branch}"), e))?;
                }
            }
            SlotStep::Record => {
                if self.store.save(sha, annotation)? {
                    debug!(sha, "annotation updated");
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::future_not_send)]
    async fn run_slot(
        &mut self,
        slot: &SlotPlan,
        outcome: &mut SlotOutcome,
        progress: &dyn ProgressCallback,
    ) -> Option<BodyTarget> {
        let mut annotation = slot.annotation.clone();
        annotation.branch.clone_from(&slot.branch);
        // Status fields (title, draft, review, mergeable) belong to the
        // status aggregator; only the binding is recorded here.
        let mut pr = slot.pr.as_ref().map(|details| {
            annotation.pr_url = Some(details.html_url.clone());
            (
                details.number,
                details.html_url.clone(),
                details.body.clone().unwrap_or_default(),
            )
        });

        if let Some(message) = &slot.lookup_error {
            outcome.error = Some(Error::remote(
                format!("reconcile {}", slot.commit.short_sha()),
                message,
            ));
        }

        for step in &slot.steps {
            if outcome.error.is_some() && !matches!(step, SlotStep::Record) {
                continue;
            }
            match self.run_step(slot, step, &mut annotation, &mut pr).await {
                Ok(()) => {
                    if !matches!(step, SlotStep::Record) {
                        progress.on_step_done(slot.position, &step.to_string()).await;
                    }
                    outcome.completed.push(step.clone());
                }
                Err(e) if matches!(step, SlotStep::Record) => {
                    warn!(sha = %slot.commit.sha, error = %e, "failed to record annotation");
                    outcome.error.get_or_insert(e);
                }
                Err(e) => {
                    outcome.error = Some(e);
                }
            }
        }

        if let Some(error) = &outcome.error {
            progress.on_slot_error(slot.position, error).await;
        }

        let (number, url, body) = pr?;
        outcome.pr_number = Some(number);
        outcome.pr_url = Some(url.clone());
        Some(BodyTarget {
            outcome: 0,
            number,
            url,
            branch: slot.branch.clone().unwrap_or_default(),
            body,
            issue: annotation.issue,
        })
    }
}

/// Execute the reconcile plan (EFFECTFUL)
///
/// Never fails as a whole for remote errors; those end up in the report.
/// Failing to read remote-tracking refs up front is fatal.
#[allow(clippy::future_not_send)]
pub async fn execute_reconcile(
    plan: &ReconcilePlan,
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    progress: &dyn ProgressCallback,
) -> Result<ReconcileReport> {
    let mut on_remote = HashSet::new();
    for branch in plan.slots.iter().filter_map(|slot| slot.branch.as_ref()) {
        if vcs.remote_branch_tip(&plan.remote, branch)?.is_some() {
            on_remote.insert(branch.clone());
        }
    }

    let mut executor = Executor {
        plan,
        vcs,
        platform,
        store: AnnotationStore::new(vcs),
        on_remote,
    };

    let mut report = ReconcileReport::default();
    let mut targets = Vec::new();

    for slot in &plan.slots {
        let mut outcome = SlotOutcome::new(slot);
        if outcome.skipped.is_none() {
            progress
                .on_slot_start(slot.position, &slot.commit.summary)
                .await;
            if let Some(mut target) = executor.run_slot(slot, &mut outcome, progress).await {
                target.outcome = report.outcomes.len();
                targets.push(target);
            }
        }
        report.outcomes.push(outcome);
    }

    update_bodies(plan, platform, &targets, &mut report, progress).await;

    Ok(report)
}

/// Refresh stack list, issue and (with tests) badge sections
async fn update_bodies(
    plan: &ReconcilePlan,
    platform: &dyn PlatformService,
    targets: &[BodyTarget],
    report: &mut ReconcileReport,
    progress: &dyn ProgressCallback,
) {
    let urls: Vec<String> = targets.iter().map(|t| t.url.clone()).collect();

    for target in targets {
        let mut desired = compose_body(&target.body, &urls, &target.url, target.issue.as_deref());
        if plan.options.with_tests && !plan.workflows.is_empty() {
            let section =
                render_workflow_section(platform.config(), &plan.workflows, &target.branch);
            desired =
                upsert_section(&desired, WORKFLOW_BADGES_START, WORKFLOW_BADGES_END, &section);
        }
        if desired == target.body {
            continue;
        }

        let outcome = &mut report.outcomes[target.outcome];
        let step = format!("update PR #{} description", target.number);
        match platform.update_pr_body(target.number, &desired).await {
            Ok(()) => {
                outcome.body_updated = true;
                progress.on_step_done(outcome.position, &step).await;
            }
            Err(e) => {
                let error = Error::remote(step, e);
                progress.on_slot_error(outcome.position, &error).await;
                outcome.error.get_or_insert(error);
            }
        }
    }
}
