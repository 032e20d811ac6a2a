//! Command-line interface

mod context;
mod fixup;
mod land;
mod process;
mod repair;
mod status;
pub mod style;
mod workflows;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use context::CommandContext;
use ghchain::error::{Error, Result};
use ghchain::reconcile::ProgressCallback;
use std::path::PathBuf;
use style::{Stylize, check, cross};

/// Stacked pull requests for git and GitHub
#[derive(Debug, Parser)]
#[command(name = "ghchain", version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path inside the repository
    #[arg(long, global = true, default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    process: ProcessArgs,
}

/// Flags of the default command
#[derive(Debug, Clone, Default, Args)]
pub struct ProcessArgs {
    /// Open new PRs as drafts
    #[arg(long)]
    draft: bool,

    /// Dispatch the configured workflows on every branch
    #[arg(long)]
    with_tests: bool,

    /// Create and push branches only
    #[arg(long)]
    no_pr: bool,

    /// Show the plan and ask before changing anything
    #[arg(long)]
    confirm: bool,

    /// Show the plan without changing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create branches and PRs for every commit of the stack (default)
    Process(ProcessArgs),

    /// Amend a commit in the middle of the stack
    #[command(subcommand)]
    Fixup(FixupCommand),

    /// Rebase the stack, keeping branches and PRs attached
    Rebase {
        /// New base
        onto: String,

        /// Edit the todo list
        #[arg(short, long)]
        interactive: bool,
    },

    /// Query PR and workflow status and record it on each commit
    Refresh,

    /// Show the stack with review, merge and workflow state
    Status {
        /// Keep polling and repaint (Ctrl-C to stop)
        #[arg(long)]
        live: bool,
    },

    /// Merge the stack bottom-up through the given branch
    Land {
        /// Topmost branch to land
        branch: String,

        /// Show the plan and ask before merging
        #[arg(long)]
        confirm: bool,
    },

    /// Dispatch the configured workflows
    RunWorkflows {
        /// Branch name, `.` for the checked-out branch, or a PR number
        target: String,
    },

    /// Move stack branches back onto their rewritten commits
    FixRefs {
        /// Apply every fix without asking
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum FixupCommand {
    /// Check out the branch of a stack commit to amend it
    Start {
        /// Branch name or commit sha
        target: String,
    },
    /// Replay the rest of the stack onto the amended commit
    Done,
}

/// Parse arguments and run; `Ok(false)` means some slot failed
#[allow(clippy::future_not_send)]
pub async fn run() -> Result<bool> {
    let cli = Cli::parse();
    let ctx = CommandContext::open(&cli.path)?;
    ghchain::logging::init_logging(
        &ctx.config.log_level,
        cli.verbose,
        ctx.config.log_file.as_deref(),
    )?;

    match cli.command {
        None => process::run_process(&ctx, &cli.process).await,
        Some(Commands::Process(args)) => process::run_process(&ctx, &args).await,
        Some(Commands::Fixup(FixupCommand::Start { target })) => {
            fixup::run_fixup_start(&ctx, &target)
        }
        Some(Commands::Fixup(FixupCommand::Done)) => fixup::run_fixup_done(&ctx).await,
        Some(Commands::Rebase { onto, interactive }) => {
            fixup::run_rebase(&ctx, &onto, interactive).await
        }
        Some(Commands::Refresh) => status::run_refresh(&ctx).await,
        Some(Commands::Status { live }) => status::run_status(&ctx, live).await,
        Some(Commands::Land { branch, confirm }) => land::run_land(&ctx, &branch, confirm).await,
        Some(Commands::RunWorkflows { target }) => workflows::run_workflows(&ctx, &target).await,
        Some(Commands::FixRefs { yes }) => repair::run_fix_refs(&ctx, yes),
    }
}

/// Ask a yes/no question on the terminal
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))
}

/// Progress printer for reconcile and land
pub struct CliProgress;

impl CliProgress {
    /// One line per slot plus its steps
    pub const fn compact() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_slot_start(&self, position: usize, summary: &str) {
        anstream::println!("{} {}", format!("[{position}]").muted(), summary.emphasis());
    }

    async fn on_step_done(&self, _position: usize, description: &str) {
        anstream::println!("    {} {description}", check());
    }

    async fn on_slot_error(&self, _position: usize, error: &Error) {
        anstream::println!("    {} {}", cross(), error.to_string().failure());
    }

    async fn on_message(&self, message: &str) {
        anstream::println!("{}", message.muted());
    }
}
