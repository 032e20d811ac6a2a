//! Authentication for GitHub
//!
//! Supports the `gh` CLI and environment variables.

mod github;

pub use github::{GitHubAuthConfig, get_github_auth};

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from `gh auth token`
    Cli,
    /// Token from environment variable
    EnvVar,
}
