//! Shared test fixtures

#![allow(dead_code)]

mod mock_platform;
mod mock_vcs;

pub use mock_platform::*;
pub use mock_vcs::*;

use ghchain::config::Config;
use ghchain::types::{PlatformConfig, PrState, PrStatus, PullRequestDetails};
use git2::{Repository, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Platform config for acme/widgets on github.com
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
        host: None,
    }
}

/// Fresh mock platform for acme/widgets
pub fn mock_platform() -> MockPlatformService {
    MockPlatformService::with_config(github_config())
}

/// Default configuration
pub fn test_config() -> Config {
    Config::default()
}

/// Configuration with workflows and an issue pattern
pub fn config_with(workflows: &[&str], issue_pattern: Option<&str>) -> Config {
    Config {
        workflows: workflows.iter().map(ToString::to_string).collect(),
        issue_pattern: issue_pattern.map(ToString::to_string),
        ..Config::default()
    }
}

/// Open PR details for planner tests
pub fn make_pr(number: u64, head: &str, base: &str) -> PullRequestDetails {
    PullRequestDetails {
        number,
        title: format!("Change on {head}"),
        body: None,
        state: PrState::Open,
        is_draft: false,
        head_ref: head.to_string(),
        base_ref: base.to_string(),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
    }
}

/// PR status for land planner tests
pub fn make_status(number: u64, head: &str, base: &str) -> PrStatus {
    PrStatus {
        number,
        title: format!("Change on {head}"),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        state: PrState::Open,
        review_decision: ghchain::types::ReviewDecision::Approved,
        mergeable: ghchain::types::MergeableState::Mergeable,
        is_draft: false,
        head_ref: head.to_string(),
        base_ref: base.to_string(),
    }
}

/// Real git repository in a temp dir, with a bare `origin`
///
/// `main` is pushed to origin; `dev` is checked out on top of it.
pub struct TempGitRepo {
    _dir: TempDir,
    path: PathBuf,
    origin: PathBuf,
    repo: Repository,
}

impl TempGitRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("work");
        let origin = dir.path().join("origin.git");
        Repository::init_bare(&origin).unwrap();

        let repo = Repository::init(&path).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        repo.remote("origin", origin.to_str().unwrap()).unwrap();
        repo.set_head("refs/heads/main").unwrap();

        let fixture = Self {
            _dir: dir,
            path,
            origin,
            repo,
        };
        let root = fixture.commit_file("README.md", "widgets\n", "Initial commit");
        {
            let commit = fixture.repo.find_commit(root).unwrap();
            fixture
                .repo
                .reference("refs/remotes/origin/main", root, true, "fixture")
                .unwrap();
            fixture.repo.branch("dev", &commit, true).unwrap();
        }
        fixture.repo.set_head("refs/heads/dev").unwrap();
        fixture
    }

    /// Working tree path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bare origin path
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Underlying git2 handle
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Write a file and commit it on HEAD
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> git2::Oid {
        fs::write(self.path.join(name), content).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let signature = Signature::now("Test User", "test@example.com").unwrap();

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| self.repo.find_commit(oid).unwrap());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }

    /// Write `.ghchain.toml`
    pub fn write_config(&self, content: &str) {
        fs::write(self.path.join(ghchain::config::CONFIG_FILE), content).unwrap();
    }
}
