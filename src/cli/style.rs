//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips the escape codes when stdout
//! is not a terminal, so styling here is unconditional.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;
use supports_hyperlinks::Stream;

/// Check mark
pub const CHECK: &str = "✓";
/// Cross mark
pub const CROSS: &str = "✗";

/// Semantic colors for CLI text
pub trait Stylize: Display {
    /// Secondary text
    fn muted(&self) -> String {
        self.to_string().dimmed().to_string()
    }

    /// Names and numbers the user cares about
    fn accent(&self) -> String {
        self.to_string().cyan().to_string()
    }

    /// Headings
    fn emphasis(&self) -> String {
        self.to_string().bold().to_string()
    }

    /// Completed work
    fn success(&self) -> String {
        self.to_string().green().to_string()
    }

    /// Problems that did not stop the command
    fn warn(&self) -> String {
        self.to_string().yellow().to_string()
    }

    /// Failures
    fn failure(&self) -> String {
        self.to_string().red().to_string()
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Red cross
pub fn cross() -> String {
    CROSS.failure()
}

/// Muted arrow for list items
pub fn arrow() -> String {
    "→".muted()
}

/// Prefix for fatal errors
pub fn error_prefix() -> String {
    "error:".red().bold().to_string()
}

/// Spinner used while waiting on git or the API
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// `text` as a clickable link where the terminal supports it
pub fn link(text: &str, url: &str) -> String {
    if supports_hyperlinks::on(Stream::Stdout) {
        terminal_link::Link::new(text, url).to_string()
    } else {
        text.to_string()
    }
}
