//! ghchain - stacked pull requests for git and GitHub
//!
//! One branch and one pull request per commit between a base ref and the
//! checked-out branch, each PR based on the one below it. Every run re-derives
//! the state of the stack from the repository and the remote, so runs are
//! idempotent and resumable after partial failure.
//!
//! The only durable state is a small annotation on each commit
//! ([`annotation`]), stored as a git note.

pub mod annotation;
pub mod auth;
pub mod body;
pub mod config;
pub mod error;
pub mod fixup;
pub mod issue;
pub mod land;
pub mod logging;
pub mod naming;
pub mod platform;
pub mod reconcile;
pub mod repair;
pub mod stack;
pub mod status;
pub mod types;
pub mod vcs;
pub mod workflows;

pub use error::{Error, Result};
