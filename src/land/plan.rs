//! Land planning - pure functions
//!
//! No I/O happens here: fresh PR status for the stack goes in, the ordered
//! merges and the retargets they imply come out. A single blocker anywhere
//! below the target rejects the whole plan.

use crate::error::{Error, Result};
use crate::types::{MergeMethod, MergeableState, PrState, PrStatus, ReviewDecision};
use std::collections::BTreeMap;

/// Gathered state of one stack slot
#[derive(Debug, Clone)]
pub struct LandCandidate {
    /// Position, bottom = 0
    pub position: usize,
    /// Bound branch
    pub branch: String,
    /// Fresh PR status; `None` when the slot has no PR
    pub status: Option<PrStatus>,
}

/// Why a PR cannot be merged right now; empty when it can
pub fn blocking_reasons(status: &PrStatus) -> Vec<String> {
    let mut reasons = Vec::new();
    match status.state {
        PrState::Open => {}
        PrState::Closed => reasons.push("closed".to_string()),
        PrState::Merged => reasons.push("already merged".to_string()),
    }
    if status.is_draft {
        reasons.push("draft".to_string());
    }
    match status.mergeable {
        MergeableState::Mergeable => {}
        MergeableState::Conflicting => reasons.push("has conflicts".to_string()),
        MergeableState::Unknown => reasons.push("mergeability unknown".to_string()),
    }
    if status.review_decision == ReviewDecision::ChangesRequested {
        reasons.push("changes requested".to_string());
    }
    reasons
}

/// A PR whose base must move once a merge lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retarget {
    /// PR number
    pub pr_number: u64,
    /// Head branch of that PR
    pub branch: String,
    /// Base it gets
    pub new_base: String,
}

/// One merge, bottom-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandStep {
    /// Head branch
    pub branch: String,
    /// PR number
    pub pr_number: u64,
    /// PR title
    pub title: String,
    /// Base the PR merges into
    pub base: String,
    /// Merge method
    pub method: MergeMethod,
    /// PRs stacked on this one, moved to `base` after the merge
    pub retargets: Vec<Retarget>,
}

impl std::fmt::Display for LandStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} PR #{} ({} -> {}): {}",
            self.method, self.pr_number, self.branch, self.base, self.title
        )
    }
}

/// The land plan
#[derive(Debug, Clone)]
pub struct LandPlan {
    /// Requested branch
    pub target: String,
    /// Merges in order
    pub steps: Vec<LandStep>,
}

impl LandPlan {
    /// Whether nothing is left to merge
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Create a land plan (PURE - no I/O)
///
/// `candidates` is the whole stack in order. Slots up to and including
/// `target` whose PR is not yet merged are landed; slots above only matter
/// as retarget candidates.
pub fn create_land_plan(
    target: &str,
    candidates: &[LandCandidate],
    method: MergeMethod,
) -> Result<LandPlan> {
    let target_index = candidates
        .iter()
        .position(|c| c.branch == target)
        .ok_or_else(|| Error::BranchNotInStack(target.to_string()))?;

    let (to_land, above) = candidates.split_at(target_index + 1);

    let mut reasons = Vec::new();
    let mut landing = Vec::new();
    for candidate in to_land {
        let Some(status) = &candidate.status else {
            reasons.push(format!("{}: no pull request", candidate.branch));
            continue;
        };
        if status.state == PrState::Merged {
            continue;
        }
        let blockers = blocking_reasons(status);
        if blockers.is_empty() {
            landing.push((candidate, status));
        } else {
            reasons.push(format!(
                "#{} {}: {}",
                status.number,
                candidate.branch,
                blockers.join(", ")
            ));
        }
    }

    if !reasons.is_empty() {
        return Err(Error::NotMergeable {
            branch: target.to_string(),
            reasons,
        });
    }

    // Current base of every open PR, updated as planned retargets land
    let mut bases: BTreeMap<u64, (String, String)> = to_land
        .iter()
        .chain(above)
        .filter_map(|c| c.status.as_ref().map(|s| (c, s)))
        .filter(|(_, s)| s.state == PrState::Open)
        .map(|(c, s)| (s.number, (c.branch.clone(), s.base_ref.clone())))
        .collect();

    let mut steps = Vec::with_capacity(landing.len());
    for (candidate, status) in landing {
        let base = bases
            .get(&status.number)
            .map_or_else(|| status.base_ref.clone(), |(_, base)| base.clone());

        let mut retargets = Vec::new();
        for (&number, (branch, pr_base)) in &mut bases {
            if number != status.number && *pr_base == candidate.branch {
                pr_base.clone_from(&base);
                retargets.push(Retarget {
                    pr_number: number,
                    branch: branch.clone(),
                    new_base: base.clone(),
                });
            }
        }
        bases.remove(&status.number);

        steps.push(LandStep {
            branch: candidate.branch.clone(),
            pr_number: status.number,
            title: status.title.clone(),
            base,
            method,
            retargets,
        });
    }

    Ok(LandPlan {
        target: target.to_string(),
        steps,
    })
}
