//! Error types for ghchain

use thiserror::Error;

/// Errors produced by ghchain operations
#[derive(Debug, Error)]
pub enum Error {
    /// Base and tip have no usable relationship (no merge base, detached
    /// HEAD, or a non-linear range)
    #[error("invalid commit range: {0}")]
    InvalidRange(String),

    /// Branch name template is malformed or uses unknown keys
    #[error("invalid branch name template: {0}")]
    Template(String),

    /// A remote mutation (push, PR create/update, merge) failed
    #[error("{operation} failed: {message}")]
    RemoteOperation {
        /// Short description of the operation (e.g. "push feat-1")
        operation: String,
        /// Underlying failure message
        message: String,
    },

    /// `fixup done` without `fixup start`, or a second `fixup start`
    #[error("fixup: {0}")]
    FixupState(String),

    /// Land precondition failed; nothing was merged
    #[error("cannot land {branch}: {}", reasons.join(", "))]
    NotMergeable {
        /// Branch that was requested
        branch: String,
        /// Human-readable blockers
        reasons: Vec<String>,
    },

    /// Branch is not bound to any commit of the current stack
    #[error("branch '{0}' is not part of the current stack")]
    BranchNotInStack(String),

    /// libgit2 error
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// A `git` subprocess failed
    #[error("git {command} failed: {stderr}")]
    GitCommand {
        /// Subcommand and arguments
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// Rebase stopped (usually conflicts)
    #[error("rebase stopped: {0}")]
    Rebase(String),

    /// GitHub API error with context
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Raw octocrab error
    #[error("GitHub API error: {0}")]
    Octocrab(#[from] octocrab::Error),

    /// Configuration could not be read or is invalid
    #[error("config error: {0}")]
    Config(String),

    /// Annotation note could not be parsed or written
    #[error("annotation error: {0}")]
    Annotation(String),

    /// No token available
    #[error("authentication error: {0}")]
    Auth(String),

    /// Remote URL does not point at a supported host
    #[error("no supported remotes found (GitHub only)")]
    NoSupportedRemotes,

    /// Configured remote does not exist
    #[error("remote '{0}' not found")]
    RemoteNotFound(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a [`Error::RemoteOperation`] from any displayable cause
    pub fn remote(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::RemoteOperation {
            operation: operation.into(),
            message: cause.to_string(),
        }
    }
}

/// Result alias for ghchain
pub type Result<T> = std::result::Result<T, Error>;
