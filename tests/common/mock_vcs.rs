//! In-memory repository implementing `VcsService`
//!
//! Commits form a first-parent chain; rebase replays them with fresh shas
//! and moves every branch that pointed at a replayed commit, like
//! `git rebase --update-refs`.

#![allow(dead_code)]

use ghchain::error::{Error, Result};
use ghchain::types::{CommitInfo, GitRemote};
use ghchain::vcs::{RebaseRequest, VcsService};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Call record for `push`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCall {
    pub remote: String,
    pub branches: Vec<String>,
}

/// Fake git repository
pub struct MockRepo {
    commits: RefCell<HashMap<String, CommitInfo>>,
    branches: RefCell<BTreeMap<String, String>>,
    head: RefCell<String>,
    remote_refs: RefCell<BTreeMap<String, String>>,
    notes: RefCell<HashMap<(String, String), String>>,
    config: RefCell<HashMap<String, String>>,
    user_name: String,
    remotes: Vec<GitRemote>,
    fail_push: RefCell<HashSet<String>>,
    fail_remote_reads: Cell<bool>,
    pushes: RefCell<Vec<PushCall>>,
    rebases: RefCell<Vec<RebaseRequest>>,
    counter: Cell<u64>,
}

impl MockRepo {
    /// Repository with one root commit on `main`, pushed to `origin/main`,
    /// and `dev` checked out at the same commit
    pub fn new() -> Self {
        let repo = Self {
            commits: RefCell::new(HashMap::new()),
            branches: RefCell::new(BTreeMap::new()),
            head: RefCell::new("main".to_string()),
            remote_refs: RefCell::new(BTreeMap::new()),
            notes: RefCell::new(HashMap::new()),
            config: RefCell::new(HashMap::new()),
            user_name: "Test User".to_string(),
            remotes: vec![GitRemote {
                name: "origin".to_string(),
                url: "git@github.com:acme/widgets.git".to_string(),
            }],
            fail_push: RefCell::new(HashSet::new()),
            fail_remote_reads: Cell::new(false),
            pushes: RefCell::new(Vec::new()),
            rebases: RefCell::new(Vec::new()),
            counter: Cell::new(0),
        };
        let root = repo.make_commit(None, "Initial commit");
        repo.branches
            .borrow_mut()
            .insert("main".to_string(), root.clone());
        repo.remote_refs
            .borrow_mut()
            .insert("origin/main".to_string(), root.clone());
        repo.branches.borrow_mut().insert("dev".to_string(), root);
        *repo.head.borrow_mut() = "dev".to_string();
        repo
    }

    /// `new()` plus one commit per message on `dev`; returns their shas
    pub fn with_stack(messages: &[&str]) -> (Self, Vec<String>) {
        let repo = Self::new();
        let shas = messages.iter().map(|m| repo.commit_on_head(m)).collect();
        (repo, shas)
    }

    fn make_commit(&self, parent: Option<&str>, message: &str) -> String {
        let n = self.counter.get() + 1;
        self.counter.set(n);

        let mut hasher = DefaultHasher::new();
        (n, parent, message).hash(&mut hasher);
        let sha = format!("{:016x}{:024x}", hasher.finish(), n);

        let info = CommitInfo {
            sha: sha.clone(),
            parents: parent.map(str::to_string).into_iter().collect(),
            message: message.to_string(),
            summary: message.lines().next().unwrap_or_default().to_string(),
            author_name: self.user_name.clone(),
            author_email: "test@example.com".to_string(),
        };
        self.commits.borrow_mut().insert(sha.clone(), info);
        sha
    }

    fn head_branch(&self) -> String {
        self.head.borrow().clone()
    }

    fn tip(&self, branch: &str) -> String {
        self.branches.borrow()[branch].clone()
    }

    fn parent(&self, sha: &str) -> Option<String> {
        self.commits
            .borrow()
            .get(sha)
            .and_then(|c| c.parents.first().cloned())
    }

    fn ancestors(&self, sha: &str) -> Vec<String> {
        let mut out = vec![sha.to_string()];
        let mut current = sha.to_string();
        while let Some(parent) = self.parent(&current) {
            out.push(parent.clone());
            current = parent;
        }
        out
    }

    // === History editing ===

    /// Commit on the checked-out branch
    pub fn commit_on_head(&self, message: &str) -> String {
        let branch = self.head_branch();
        let parent = self.tip(&branch);
        let sha = self.make_commit(Some(&parent), message);
        self.branches.borrow_mut().insert(branch, sha.clone());
        sha
    }

    /// Merge commit on the checked-out branch
    pub fn merge_commit_on_head(&self, other: &str, message: &str) -> String {
        let branch = self.head_branch();
        let parent = self.tip(&branch);
        let sha = self.make_commit(Some(&parent), message);
        self.commits
            .borrow_mut()
            .get_mut(&sha)
            .unwrap()
            .parents
            .push(other.to_string());
        self.branches.borrow_mut().insert(branch, sha.clone());
        sha
    }

    /// Replace the tip of the checked-out branch (`git commit --amend`)
    pub fn amend_head(&self, message: &str) -> String {
        let branch = self.head_branch();
        let old = self.tip(&branch);
        let parent = self.parent(&old);
        let sha = self.make_commit(parent.as_deref(), message);
        self.branches.borrow_mut().insert(branch, sha.clone());
        sha
    }

    /// Rewrite the stack above `main` so that the commit at `index` gets
    /// `message`, WITHOUT moving any other branch (plain `git rebase -i`)
    ///
    /// Returns the new shas, oldest first.
    pub fn reword(&self, index: usize, message: &str) -> Vec<String> {
        let mut messages = self.stack_messages();
        messages[index] = message.to_string();
        self.rewrite_dev(&messages)
    }

    /// Reorder the stack; `order` lists old indexes in their new order
    pub fn reorder(&self, order: &[usize]) -> Vec<String> {
        let messages = self.stack_messages();
        let reordered: Vec<String> = order.iter().map(|&i| messages[i].clone()).collect();
        self.rewrite_dev(&reordered)
    }

    /// Drop the commit at `index` from the stack
    pub fn drop_commit(&self, index: usize) -> Vec<String> {
        let mut messages = self.stack_messages();
        messages.remove(index);
        self.rewrite_dev(&messages)
    }

    fn stack_messages(&self) -> Vec<String> {
        let base = self.resolve("origin/main").unwrap();
        self.walk_range(&base, &self.tip("dev"))
            .unwrap()
            .into_iter()
            .map(|c| c.message)
            .collect()
    }

    fn rewrite_dev(&self, messages: &[String]) -> Vec<String> {
        let mut parent = self.resolve("origin/main").unwrap();
        let mut shas = Vec::new();
        for message in messages {
            parent = self.make_commit(Some(&parent), message);
            shas.push(parent.clone());
        }
        self.branches
            .borrow_mut()
            .insert("dev".to_string(), parent);
        shas
    }

    /// Advance `origin/main` by one commit (someone else merged something)
    pub fn advance_remote_main(&self, message: &str) -> String {
        let parent = self.remote_refs.borrow()["origin/main"].clone();
        let sha = self.make_commit(Some(&parent), message);
        self.remote_refs
            .borrow_mut()
            .insert("origin/main".to_string(), sha.clone());
        sha
    }

    /// Point a branch anywhere, bypassing the capability
    pub fn set_branch_for_test(&self, name: &str, sha: &str) {
        self.branches
            .borrow_mut()
            .insert(name.to_string(), sha.to_string());
    }

    /// Switch branches, bypassing the capability
    pub fn checkout_for_test(&self, name: &str) {
        *self.head.borrow_mut() = name.to_string();
    }

    // === Inspection ===

    /// First parent of a commit
    pub fn commit_parent(&self, sha: &str) -> Option<String> {
        self.parent(sha)
    }

    /// Shas of the stack, oldest first
    pub fn stack_shas(&self) -> Vec<String> {
        let base = self.resolve("origin/main").unwrap();
        self.walk_range(&base, &self.tip("dev"))
            .unwrap()
            .into_iter()
            .map(|c| c.sha)
            .collect()
    }

    /// Tip of a local branch
    pub fn branch(&self, name: &str) -> Option<String> {
        self.branches.borrow().get(name).cloned()
    }

    /// Tip of `origin/<name>`
    pub fn remote_branch(&self, name: &str) -> Option<String> {
        self.remote_refs.borrow().get(&format!("origin/{name}")).cloned()
    }

    /// Checked-out branch
    pub fn head(&self) -> String {
        self.head_branch()
    }

    /// Raw note text
    pub fn note(&self, notes_ref: &str, sha: &str) -> Option<String> {
        self.notes
            .borrow()
            .get(&(notes_ref.to_string(), sha.to_string()))
            .cloned()
    }

    /// Number of notes under `notes_ref`
    pub fn note_count(&self, notes_ref: &str) -> usize {
        self.notes
            .borrow()
            .keys()
            .filter(|(r, _)| r == notes_ref)
            .count()
    }

    /// Recorded pushes
    pub fn pushes(&self) -> Vec<PushCall> {
        self.pushes.borrow().clone()
    }

    /// Recorded rebases
    pub fn rebases(&self) -> Vec<RebaseRequest> {
        self.rebases.borrow().clone()
    }

    /// Forget recorded pushes and rebases
    pub fn reset_calls(&self) {
        self.pushes.borrow_mut().clear();
        self.rebases.borrow_mut().clear();
    }

    /// Make pushes of `branch` fail
    pub fn fail_push(&self, branch: &str) {
        self.fail_push.borrow_mut().insert(branch.to_string());
    }

    /// Stop failing pushes
    pub fn clear_push_failures(&self) {
        self.fail_push.borrow_mut().clear();
    }

    /// Make every remote-tracking ref read fail
    pub fn fail_remote_reads(&self) {
        self.fail_remote_reads.set(true);
    }

    /// Raw config value
    pub fn config_value(&self, key: &str) -> Option<String> {
        self.config.borrow().get(key).cloned()
    }
}

impl VcsService for MockRepo {
    fn current_branch(&self) -> Result<Option<String>> {
        Ok(Some(self.head_branch()))
    }

    fn resolve(&self, rev: &str) -> Result<String> {
        if rev == "HEAD" {
            return Ok(self.tip(&self.head_branch()));
        }
        if let Some(tip) = self.branches.borrow().get(rev) {
            return Ok(tip.clone());
        }
        if let Some(tip) = self.remote_refs.borrow().get(rev) {
            return Ok(tip.clone());
        }
        let commits = self.commits.borrow();
        let matches: Vec<&String> = commits.keys().filter(|sha| sha.starts_with(rev)).collect();
        match matches.as_slice() {
            [sha] if rev.len() >= 4 => Ok((*sha).clone()),
            _ => Err(Error::GitCommand {
                command: format!("rev-parse {rev}"),
                stderr: "unknown revision".to_string(),
            }),
        }
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        let of_a: HashSet<String> = self.ancestors(a).into_iter().collect();
        Ok(self.ancestors(b).into_iter().find(|sha| of_a.contains(sha)))
    }

    fn walk_range(&self, exclude: &str, tip: &str) -> Result<Vec<CommitInfo>> {
        let excluded: HashSet<String> = self.ancestors(exclude).into_iter().collect();
        let commits = self.commits.borrow();
        let mut out: Vec<CommitInfo> = self
            .ancestors(tip)
            .into_iter()
            .take_while(|sha| !excluded.contains(sha))
            .map(|sha| commits[&sha].clone())
            .collect();
        out.reverse();
        Ok(out)
    }

    fn commit(&self, sha: &str) -> Result<CommitInfo> {
        let sha = self.resolve(sha)?;
        Ok(self.commits.borrow()[&sha].clone())
    }

    fn user_name(&self) -> Result<String> {
        Ok(self.user_name.clone())
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        Ok(self.remotes.clone())
    }

    fn read_note(&self, notes_ref: &str, sha: &str) -> Result<Option<String>> {
        Ok(self.note(notes_ref, sha))
    }

    fn write_note(&self, notes_ref: &str, sha: &str, text: &str) -> Result<()> {
        self.notes
            .borrow_mut()
            .insert((notes_ref.to_string(), sha.to_string()), text.to_string());
        Ok(())
    }

    fn remove_note(&self, notes_ref: &str, sha: &str) -> Result<()> {
        self.notes
            .borrow_mut()
            .remove(&(notes_ref.to_string(), sha.to_string()));
        Ok(())
    }

    fn local_branches(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .branches
            .borrow()
            .iter()
            .map(|(name, tip)| (name.clone(), tip.clone()))
            .collect())
    }

    fn branch_tip(&self, name: &str) -> Result<Option<String>> {
        Ok(self.branch(name))
    }

    fn set_branch(&self, name: &str, sha: &str, force: bool) -> Result<()> {
        let mut branches = self.branches.borrow_mut();
        if !force && branches.contains_key(name) {
            return Err(Error::GitCommand {
                command: format!("branch {name}"),
                stderr: format!("a branch named '{name}' already exists"),
            });
        }
        branches.insert(name.to_string(), sha.to_string());
        Ok(())
    }

    fn checkout(&self, name: &str) -> Result<()> {
        if !self.branches.borrow().contains_key(name) {
            return Err(Error::GitCommand {
                command: format!("checkout {name}"),
                stderr: "no such branch".to_string(),
            });
        }
        *self.head.borrow_mut() = name.to_string();
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.branches.borrow_mut().remove(name);
        Ok(())
    }

    fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        if self.fail_remote_reads.get() {
            return Err(Error::GitCommand {
                command: format!("show-ref {remote}/{branch}"),
                stderr: "cannot lock ref".to_string(),
            });
        }
        Ok(self
            .remote_refs
            .borrow()
            .get(&format!("{remote}/{branch}"))
            .cloned())
    }

    fn push(&self, remote: &str, branches: &[String]) -> Result<()> {
        self.pushes.borrow_mut().push(PushCall {
            remote: remote.to_string(),
            branches: branches.to_vec(),
        });
        if let Some(failed) = branches
            .iter()
            .find(|b| self.fail_push.borrow().contains(*b))
        {
            return Err(Error::GitCommand {
                command: format!("push {remote} {failed}"),
                stderr: "remote rejected".to_string(),
            });
        }
        for branch in branches {
            let tip = self.tip(branch);
            self.remote_refs
                .borrow_mut()
                .insert(format!("{remote}/{branch}"), tip);
        }
        Ok(())
    }

    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.remote_refs
            .borrow_mut()
            .remove(&format!("{remote}/{branch}"));
        Ok(())
    }

    fn rebase(&self, request: &RebaseRequest) -> Result<()> {
        self.rebases.borrow_mut().push(request.clone());

        let branch = request.branch.clone().unwrap_or_else(|| self.head_branch());
        let upstream = self.resolve(&request.upstream)?;
        let onto = self.resolve(request.onto.as_deref().unwrap_or(&request.upstream))?;
        let replay = self.walk_range(&upstream, &self.tip(&branch))?;

        let mut mapping = HashMap::new();
        let mut parent = onto;
        for commit in &replay {
            let sha = self.make_commit(Some(&parent), &commit.message);
            mapping.insert(commit.sha.clone(), sha.clone());
            parent = sha;
        }

        let mut branches = self.branches.borrow_mut();
        for tip in branches.values_mut() {
            if let Some(new) = mapping.get(tip) {
                tip.clone_from(new);
            }
        }
        branches.insert(branch.clone(), parent);
        drop(branches);

        *self.head.borrow_mut() = branch;
        Ok(())
    }

    fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.config_value(key))
    }

    fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.config
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn config_unset(&self, key: &str) -> Result<()> {
        self.config.borrow_mut().remove(key);
        Ok(())
    }
}
