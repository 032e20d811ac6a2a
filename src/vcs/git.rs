//! git backend: `git2` for reads and ref/note writes, the `git` CLI for
//! push, checkout and rebase (libgit2 has no `--update-refs` and no
//! credential helpers).

use super::{RebaseRequest, VcsService};
use crate::error::{Error, Result};
use crate::types::{CommitInfo, GitRemote};
use git2::{BranchType, ConfigLevel, ErrorCode, Oid, Repository, Sort};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// A git repository opened from a path inside its working tree
pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepository {
    /// Discover the repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::InvalidRange("bare repositories are not supported".to_string()))?
            .to_path_buf();
        debug!(workdir = %workdir.display(), "opened git repository");
        Ok(Self { repo, workdir })
    }

    /// Root of the working tree
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn oid(&self, rev: &str) -> Result<Oid> {
        Ok(self.repo.revparse_single(rev)?.peel_to_commit()?.id())
    }

    fn run_git(&self, args: &[&str]) -> Result<String> {
        trace!(?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(Error::GitCommand {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn commit_info(commit: &git2::Commit<'_>) -> CommitInfo {
        let author = commit.author();
        CommitInfo {
            sha: commit.id().to_string(),
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            message: commit.message().unwrap_or_default().to_string(),
            summary: commit.summary().unwrap_or_default().to_string(),
            author_name: author.name().unwrap_or_default().to_string(),
            author_email: author.email().unwrap_or_default().to_string(),
        }
    }
}

fn not_found_as_none<T>(result: std::result::Result<T, git2::Error>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl VcsService for GitRepository {
    fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(ToString::to_string))
    }

    fn resolve(&self, rev: &str) -> Result<String> {
        Ok(self.oid(rev)?.to_string())
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        let (a, b) = (self.oid(a)?, self.oid(b)?);
        Ok(not_found_as_none(self.repo.merge_base(a, b))?.map(|oid| oid.to_string()))
    }

    fn walk_range(&self, exclude: &str, tip: &str) -> Result<Vec<CommitInfo>> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(self.oid(tip)?)?;
        walk.hide(self.oid(exclude)?)?;

        walk.map(|oid| -> Result<CommitInfo> {
            let commit = self.repo.find_commit(oid?)?;
            Ok(Self::commit_info(&commit))
        })
        .collect()
    }

    fn commit(&self, sha: &str) -> Result<CommitInfo> {
        let commit = self.repo.find_commit(self.oid(sha)?)?;
        Ok(Self::commit_info(&commit))
    }

    fn user_name(&self) -> Result<String> {
        Ok(self.repo.config()?.get_string("user.name")?)
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        let names = self.repo.remotes()?;
        let mut remotes = Vec::new();
        for name in names.iter().flatten() {
            let remote = self.repo.find_remote(name)?;
            if let Some(url) = remote.url() {
                remotes.push(GitRemote {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
        }
        Ok(remotes)
    }

    fn read_note(&self, notes_ref: &str, sha: &str) -> Result<Option<String>> {
        let oid = Oid::from_str(sha)?;
        let note = not_found_as_none(self.repo.find_note(Some(notes_ref), oid))?;
        Ok(note.and_then(|n| n.message().map(ToString::to_string)))
    }

    fn write_note(&self, notes_ref: &str, sha: &str, text: &str) -> Result<()> {
        let oid = Oid::from_str(sha)?;
        let signature = self.repo.signature()?;
        self.repo
            .note(&signature, &signature, Some(notes_ref), oid, text, true)?;
        Ok(())
    }

    fn remove_note(&self, notes_ref: &str, sha: &str) -> Result<()> {
        let oid = Oid::from_str(sha)?;
        let signature = self.repo.signature()?;
        not_found_as_none(
            self.repo
                .note_delete(oid, Some(notes_ref), &signature, &signature),
        )?;
        Ok(())
    }

    fn local_branches(&self) -> Result<Vec<(String, String)>> {
        let mut branches = Vec::new();
        for entry in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = entry?;
            let Some(name) = branch.name()? else {
                continue;
            };
            if let Some(target) = branch.get().target() {
                branches.push((name.to_string(), target.to_string()));
            }
        }
        Ok(branches)
    }

    fn branch_tip(&self, name: &str) -> Result<Option<String>> {
        let branch = not_found_as_none(self.repo.find_branch(name, BranchType::Local))?;
        Ok(branch.and_then(|b| b.get().target()).map(|oid| oid.to_string()))
    }

    fn set_branch(&self, name: &str, sha: &str, force: bool) -> Result<()> {
        debug!(name, sha, force, "setting branch");
        let commit = self.repo.find_commit(Oid::from_str(sha)?)?;
        self.repo.branch(name, &commit, force)?;
        Ok(())
    }

    fn checkout(&self, name: &str) -> Result<()> {
        debug!(name, "checking out branch");
        self.run_git(&["checkout", "--quiet", name])?;
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        debug!(name, "deleting local branch");
        self.repo.find_branch(name, BranchType::Local)?.delete()?;
        Ok(())
    }

    fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        let name = format!("refs/remotes/{remote}/{branch}");
        let reference = not_found_as_none(self.repo.find_reference(&name))?;
        Ok(reference.and_then(|r| r.target()).map(|oid| oid.to_string()))
    }

    fn push(&self, remote: &str, branches: &[String]) -> Result<()> {
        if branches.is_empty() {
            return Ok(());
        }
        debug!(remote, ?branches, "pushing");
        let mut args = vec!["push", "--quiet", "--force-with-lease", "--set-upstream", remote];
        args.extend(branches.iter().map(String::as_str));
        self.run_git(&args)?;
        Ok(())
    }

    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        debug!(remote, branch, "deleting remote branch");
        self.run_git(&["push", "--quiet", remote, "--delete", branch])?;
        Ok(())
    }

    fn rebase(&self, request: &RebaseRequest) -> Result<()> {
        let mut args = vec!["rebase", "--update-refs"];
        if request.interactive {
            args.push("--interactive");
        }
        if let Some(onto) = &request.onto {
            args.extend(["--onto", onto.as_str()]);
        }
        args.push(&request.upstream);
        if let Some(branch) = &request.branch {
            args.push(branch);
        }
        debug!(?args, "rebasing");

        let mut command = Command::new("git");
        command.args(&args).current_dir(&self.workdir);

        // The todo editor needs the terminal
        let (success, stderr) = if request.interactive {
            (command.status()?.success(), String::new())
        } else {
            let output = command.stdin(Stdio::null()).output()?;
            (
                output.status.success(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )
        };

        if !success {
            return Err(Error::Rebase(format!(
                "git {} did not complete. Resolve conflicts, run `git rebase --continue`, \
                 then re-run ghchain. {stderr}",
                args.join(" ")
            )));
        }
        Ok(())
    }

    fn config_get(&self, key: &str) -> Result<Option<String>> {
        let config = self.repo.config()?.open_level(ConfigLevel::Local)?;
        not_found_as_none(config.get_string(key))
    }

    fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.repo.config()?.open_level(ConfigLevel::Local)?;
        config.set_str(key, value)?;
        Ok(())
    }

    fn config_unset(&self, key: &str) -> Result<()> {
        let mut config = self.repo.config()?.open_level(ConfigLevel::Local)?;
        not_found_as_none(config.remove(key))?;
        Ok(())
    }
}
