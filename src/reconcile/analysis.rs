//! Gather phase: correlate stack commits with branches and PRs
//!
//! Everything the planner needs is collected here, from local facts first
//! (annotations, branch tips, remote-tracking refs) and then from the remote
//! (PR lookup, issue lookup, stack id). Remote failures are recorded per slot
//! so one bad slot does not stop the others.

use crate::annotation::{Annotation, AnnotationStore};
use crate::error::{Error, Result};
use crate::issue::IssuePattern;
use crate::platform::PlatformService;
use crate::stack::{Stack, StackEntry};
use crate::types::{CommitInfo, IssueRef, PrState, PullRequestDetails};
use crate::vcs::VcsService;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// How a commit was matched to its branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The commit's annotation names the branch
    Annotation,
    /// A local branch points at the commit
    BranchTip,
    /// The commit replaces the tip of an orphaned stack branch with the same
    /// summary or at the same position (amend, reword, cherry-pick)
    Rewritten {
        /// Tip the branch pointed at before
        previous_sha: String,
    },
    /// No branch yet
    Untracked,
}

/// Observed facts about one stack slot
#[derive(Debug, Clone)]
pub struct SlotFacts {
    /// Position, bottom = 0
    pub position: usize,
    /// Commit at this position
    pub commit: CommitInfo,
    /// Annotation to start from (stored, or inherited from a rewritten tip)
    pub annotation: Annotation,
    /// How the branch was found
    pub binding: Binding,
    /// Bound branch
    pub branch: Option<String>,
    /// Local tip of the bound branch
    pub local_tip: Option<String>,
    /// Remote-tracking tip of the bound branch
    pub remote_tip: Option<String>,
    /// Open PR for the branch
    pub pr: Option<PullRequestDetails>,
    /// Issue referenced by the commit message
    pub issue: Option<IssueRef>,
    /// Remote lookup failure for this slot
    pub lookup_error: Option<String>,
}

/// Output of the gather phase
#[derive(Debug, Clone)]
pub struct StackAnalysis {
    /// Base branch name PRs at the bottom target
    pub base_branch: String,
    /// Development branch
    pub dev_branch: String,
    /// Facts per slot, stack order
    pub slots: Vec<SlotFacts>,
    /// First id for new branches, if any slot needs one
    pub next_stack_id: Option<u64>,
    /// `user.name`, used for new branch names
    pub author: String,
    /// Branch names that must not be reused
    pub taken_branches: Vec<String>,
}

struct Orphan {
    name: String,
    tip: String,
    summary: String,
    annotation: Annotation,
}

/// Match every stack entry to at most one branch using local facts only
///
/// Order: the annotation's branch; a local branch whose tip is the commit;
/// an orphaned stack branch whose tip has the same summary. Commits still
/// unbound after that take an orphan that sat at the same position on the
/// same merge base. A branch is bound to at most one slot, bottom-most first.
pub fn correlate(vcs: &dyn VcsService, stack: &Stack, remote: &str) -> Result<Vec<SlotFacts>> {
    let branches: BTreeMap<String, String> = vcs.local_branches()?.into_iter().collect();
    let in_stack: HashSet<&str> = stack.entries.iter().map(|e| e.commit.sha.as_str()).collect();
    let reserved = |name: &str| name == stack.dev_branch || name == stack.base_branch;
    let store = AnnotationStore::new(vcs);

    let mut claimed: HashSet<String> = HashSet::new();
    let annotated: Vec<Option<String>> = stack
        .entries
        .iter()
        .map(|entry| {
            let name = entry.annotated_branch().filter(|b| !reserved(b))?;
            if claimed.insert(name.to_string()) {
                Some(name.to_string())
            } else {
                warn!(
                    branch = name,
                    sha = entry.commit.short_sha(),
                    "branch already bound lower in the stack; ignoring annotation"
                );
                None
            }
        })
        .collect();

    let mut orphans = Vec::new();
    for (name, tip) in &branches {
        if claimed.contains(name) || reserved(name) || in_stack.contains(tip.as_str()) {
            continue;
        }
        let annotation = match store.load(tip) {
            Ok(annotation) => annotation,
            Err(e) => {
                debug!(branch = %name, error = %e, "ignoring unreadable annotation");
                continue;
            }
        };
        if annotation.branch.as_deref() == Some(name.as_str()) {
            let summary = vcs.commit(tip)?.summary;
            orphans.push(Orphan {
                name: name.clone(),
                tip: tip.clone(),
                summary,
                annotation,
            });
        }
    }

    let mut bound: Vec<(Binding, Option<String>, Annotation)> =
        Vec::with_capacity(stack.entries.len());
    for (entry, annotated_branch) in stack.entries.iter().zip(annotated) {
        let sha = entry.commit.sha.as_str();

        if let Some(name) = annotated_branch {
            bound.push((Binding::Annotation, Some(name), entry.annotation.clone()));
        } else if let Some(name) = branches
            .iter()
            .find(|(name, tip)| tip.as_str() == sha && !reserved(name) && !claimed.contains(*name))
            .map(|(name, _)| name.clone())
        {
            claimed.insert(name.clone());
            bound.push((Binding::BranchTip, Some(name), entry.annotation.clone()));
        } else if let Some(orphan) = orphans
            .iter()
            .find(|o| o.summary == entry.commit.summary && !claimed.contains(&o.name))
        {
            claimed.insert(orphan.name.clone());
            bound.push(relink(entry, orphan));
        } else {
            bound.push((Binding::Untracked, None, entry.annotation.clone()));
        }
    }

    // Second chance for commits whose subject changed: an orphan that sat at
    // the same position on the same fork point.
    if bound.iter().any(|(binding, ..)| *binding == Binding::Untracked) {
        for orphan in &orphans {
            if claimed.contains(&orphan.name) {
                continue;
            }
            let Some(position) = orphan_position(vcs, &stack.merge_base, &orphan.tip)? else {
                continue;
            };
            if let Some(entry) = stack.entries.get(position)
                && let Some(slot) = bound.get_mut(position)
                && slot.0 == Binding::Untracked
            {
                claimed.insert(orphan.name.clone());
                *slot = relink(entry, orphan);
            }
        }
    }

    let mut slots = Vec::with_capacity(stack.entries.len());
    for (entry, (binding, branch, annotation)) in stack.entries.iter().zip(bound) {
        let (local_tip, remote_tip) = match branch.as_deref() {
            Some(name) => (
                branches.get(name).cloned(),
                vcs.remote_branch_tip(remote, name)?,
            ),
            None => (None, None),
        };

        slots.push(SlotFacts {
            position: entry.position,
            commit: entry.commit.clone(),
            annotation,
            binding,
            branch,
            local_tip,
            remote_tip,
            pr: None,
            issue: None,
            lookup_error: None,
        });
    }

    Ok(slots)
}

/// Bind `entry` to an orphaned branch, inheriting its annotation when the
/// commit has none
fn relink(entry: &StackEntry, orphan: &Orphan) -> (Binding, Option<String>, Annotation) {
    debug!(
        branch = %orphan.name,
        from = %orphan.tip,
        to = %entry.commit.sha,
        "re-linking rewritten commit"
    );
    let annotation = if entry.annotation.is_empty() {
        orphan.annotation.clone()
    } else {
        entry.annotation.clone()
    };
    (
        Binding::Rewritten {
            previous_sha: orphan.tip.clone(),
        },
        Some(orphan.name.clone()),
        annotation,
    )
}

/// Stack position `tip` had when it was built on `merge_base`
///
/// `None` when `tip` does not descend from `merge_base` or its range is not a
/// linear stack.
fn orphan_position(vcs: &dyn VcsService, merge_base: &str, tip: &str) -> Result<Option<usize>> {
    if vcs.merge_base(merge_base, tip)?.as_deref() != Some(merge_base) {
        return Ok(None);
    }
    let range = vcs.walk_range(merge_base, tip)?;
    if range.iter().any(|c| c.parents.len() > 1) {
        return Ok(None);
    }
    Ok(range
        .iter()
        .filter(|c| !c.is_fixup())
        .count()
        .checked_sub(1))
}

/// Find the open PR for a slot: the recorded one, else one by head branch
async fn lookup_pr(
    platform: &dyn PlatformService,
    slot: &SlotFacts,
) -> Result<Option<PullRequestDetails>> {
    let Some(branch) = slot.branch.as_deref() else {
        return Ok(None);
    };

    if let Some(id) = slot.annotation.pr_id() {
        let details = platform.get_pr_details(id).await?;
        if details.state == PrState::Open && details.head_ref == branch {
            return Ok(Some(details));
        }
        debug!(
            pr_number = id,
            state = %details.state,
            head = %details.head_ref,
            "recorded PR no longer matches, searching by branch"
        );
    }

    match platform.find_existing_pr(branch).await? {
        Some(pr) => Ok(Some(platform.get_pr_details(pr.number).await?)),
        None => Ok(None),
    }
}

/// Resolve the issue referenced by the commit message
async fn lookup_issue(
    platform: &dyn PlatformService,
    pattern: &IssuePattern,
    slot: &SlotFacts,
) -> Result<Option<IssueRef>> {
    let Some(number) = pattern.extract(&slot.commit.message) else {
        return Ok(None);
    };

    if let Some(url) = slot.annotation.issue.as_deref()
        && url.ends_with(&format!("/issues/{number}"))
    {
        return Ok(Some(IssueRef {
            number,
            title: String::new(),
            html_url: url.to_string(),
        }));
    }

    let issue = platform.find_issue(number).await?;
    if issue.is_none() {
        warn!(number, sha = slot.commit.short_sha(), "referenced issue does not exist");
    }
    Ok(issue)
}

/// Gather everything the planner needs
#[allow(clippy::future_not_send)]
pub async fn analyze_stack(
    vcs: &dyn VcsService,
    platform: &dyn PlatformService,
    stack: &Stack,
    remote: &str,
    issue_pattern: Option<&IssuePattern>,
    create_branches: bool,
) -> Result<StackAnalysis> {
    let mut slots = correlate(vcs, stack, remote)?;

    for slot in &mut slots {
        match lookup_pr(platform, slot).await {
            Ok(pr) => slot.pr = pr,
            Err(e) => {
                slot.lookup_error = Some(format!("PR lookup failed: {e}"));
                continue;
            }
        }
        if let Some(pattern) = issue_pattern {
            match lookup_issue(platform, pattern, slot).await {
                Ok(issue) => slot.issue = issue,
                Err(e) => slot.lookup_error = Some(format!("issue lookup failed: {e}")),
            }
        }
    }

    let needs_names = create_branches && slots.iter().any(|s| s.branch.is_none());
    let (next_stack_id, author) = if needs_names {
        let id = platform
            .next_stack_id()
            .await
            .map_err(|e| Error::remote("allocate stack id", e))?;
        (Some(id), vcs.user_name()?)
    } else {
        (None, String::new())
    };

    let mut taken_branches: Vec<String> = vcs
        .local_branches()?
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    taken_branches.extend(slots.iter().filter_map(|s| s.branch.clone()));

    Ok(StackAnalysis {
        base_branch: stack.base_branch.clone(),
        dev_branch: stack.dev_branch.clone(),
        slots,
        next_stack_id,
        author,
        taken_branches,
    })
}
