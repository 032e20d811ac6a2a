//! Repository configuration (`.ghchain.toml`).

use crate::error::{Error, Result};
use crate::issue::IssuePattern;
use crate::naming::BranchTemplate;
use crate::types::MergeMethod;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Filename looked up at the repository root
pub const CONFIG_FILE: &str = ".ghchain.toml";

/// Settings that drive every command
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Workflow file stems (`.github/workflows/<name>.yml`) to run and track
    pub workflows: Vec<String>,
    /// Ref the stack is based on, usually a remote-tracking ref
    pub base_branch: String,
    /// Template for new branch names
    pub branch_name_template: String,
    /// Delete a branch locally and on the remote once its PR is landed
    pub delete_branch_after_merge: bool,
    /// Regex with one capture group for the issue number
    pub issue_pattern: Option<String>,
    /// Extra log destination
    pub log_file: Option<PathBuf>,
    /// Log level (`trace`..`error`; `WARNING` etc. accepted)
    pub log_level: String,
    /// Remote to push to
    pub remote: String,
    /// Merge method used by `land`
    pub merge_method: MergeMethod,
    /// Parallel status queries
    pub status_concurrency: usize,
    /// Seconds between polls of `status --live`
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflows: Vec::new(),
            base_branch: "origin/main".to_string(),
            branch_name_template: "{git_config_author}-{pr_id}".to_string(),
            delete_branch_after_merge: false,
            issue_pattern: None,
            log_file: None,
            log_level: "info".to_string(),
            remote: "origin".to_string(),
            merge_method: MergeMethod::Merge,
            status_concurrency: 4,
            poll_interval_secs: 60,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration for the repository rooted at `workdir`
    ///
    /// Uses `<workdir>/.ghchain.toml`, falling back to
    /// `<config dir>/ghchain/config.toml`, falling back to defaults.
    pub fn load(workdir: &Path) -> Result<Self> {
        let candidates = [
            Some(workdir.join(CONFIG_FILE)),
            dirs::config_dir().map(|dir| dir.join("ghchain").join("config.toml")),
        ];

        for path in candidates.into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            let config = Self::from_toml(&content).map_err(|e| match e {
                Error::Config(message) => Error::Config(format!("{}: {message}", path.display())),
                other => other,
            })?;
            debug!(path = %path.display(), "loaded config");
            return Ok(config);
        }

        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Check everything that can be checked without the network
    pub fn validate(&self) -> Result<()> {
        self.branch_template()?;
        self.issue_pattern()?;
        if self.base_branch.trim().is_empty() {
            return Err(Error::Config("base_branch must not be empty".to_string()));
        }
        if self.status_concurrency == 0 {
            return Err(Error::Config(
                "status_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed branch name template
    pub fn branch_template(&self) -> Result<BranchTemplate> {
        BranchTemplate::parse(&self.branch_name_template)
    }

    /// Compiled issue pattern, if configured
    pub fn issue_pattern(&self) -> Result<Option<IssuePattern>> {
        self.issue_pattern
            .as_deref()
            .map(IssuePattern::new)
            .transpose()
    }

    /// Branch name PRs at the bottom of the stack target
    ///
    /// `origin/main` becomes `main`; a plain `main` stays as is.
    pub fn base_branch_name(&self) -> &str {
        self.base_branch
            .strip_prefix(&format!("{}/", self.remote))
            .unwrap_or(&self.base_branch)
    }

    /// Interval between live status polls
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.base_branch_name(), "main");
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::from_toml(
            r#"
            workflows = ["ci", "lint"]
            base_branch = "upstream/develop"
            remote = "upstream"
            branch_name_template = "{author}/stack-{id}"
            delete_branch_after_merge = true
            issue_pattern = '\(#(\d+)\)'
            log_level = "DEBUG"
            merge_method = "squash"
            "#,
        )
        .unwrap();

        assert_eq!(config.workflows, vec!["ci", "lint"]);
        assert_eq!(config.base_branch_name(), "develop");
        assert!(config.delete_branch_after_merge);
        assert_eq!(config.merge_method, MergeMethod::Squash);
        assert!(config.issue_pattern().unwrap().is_some());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml("workflow = [\"ci\"]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_template_is_template_error() {
        let err = Config::from_toml("branch_name_template = \"{nope}-{pr_id}\"").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_issue_pattern_needs_one_group() {
        let err = Config::from_toml("issue_pattern = '#\\d+'").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(Config::from_toml("status_concurrency = 0").is_err());
    }

    #[test]
    fn test_load_reads_repo_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "workflows = [\"tests\"]\nbase_branch = \"origin/trunk\"\n",
        )
        .unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.workflows, vec!["tests"]);
        assert_eq!(config.base_branch_name(), "trunk");
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "workflows = 3\n").unwrap();

        let err = Config::load(temp.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_load_validates_like_from_toml() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "status_concurrency = 0\n").unwrap();

        let err = Config::load(temp.path()).unwrap_err();
        assert!(matches!(&err, Error::Config(_)));
        let message = err.to_string();
        assert!(message.contains(CONFIG_FILE), "{message}");
        assert!(message.contains("status_concurrency"), "{message}");
    }
}
