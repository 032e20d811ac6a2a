//! Shared command context for CLI commands
//!
//! Opens the repository and loads its configuration. The platform service is
//! created on demand because `fixup start` and `fix-refs` never talk to
//! GitHub.

use ghchain::config::Config;
use ghchain::error::Result;
use ghchain::platform::{PlatformService, create_platform_service, parse_repo_info, select_remote};
use ghchain::vcs::{GitRepository, VcsService};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Shared context for CLI commands
pub struct CommandContext {
    /// The repository
    pub repo: GitRepository,
    /// Loaded configuration
    pub config: Config,
}

impl CommandContext {
    /// Open the repository containing `path` and load its configuration
    pub fn open(path: &Path) -> Result<Self> {
        let repo = GitRepository::open(path)?;
        let config = Config::load(repo.workdir())?;
        Ok(Self { repo, config })
    }

    /// The repository as a version-control capability
    pub fn vcs(&self) -> &dyn VcsService {
        &self.repo
    }

    /// Detect the platform from the configured remote and authenticate
    #[allow(clippy::future_not_send)]
    pub async fn platform(&self) -> Result<Arc<dyn PlatformService>> {
        let remotes = self.repo.remotes()?;
        let remote = select_remote(&remotes, &self.config.remote)?;
        let platform_config = parse_repo_info(&remote.url)?;
        debug!(
            owner = %platform_config.owner,
            repo = %platform_config.repo,
            "detected GitHub repository"
        );
        create_platform_service(&platform_config).await
    }
}
