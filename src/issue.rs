//! Issue references in commit messages.

use crate::error::{Error, Result};
use regex::Regex;

/// A compiled issue pattern with exactly one capture group
#[derive(Debug, Clone)]
pub struct IssuePattern {
    regex: Regex,
}

impl IssuePattern {
    /// Compile `pattern`; the first capture group must match the issue number
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid issue_pattern: {e}")))?;
        // captures_len counts the implicit whole-match group
        if regex.captures_len() != 2 {
            return Err(Error::Config(format!(
                "issue_pattern must have exactly one capture group, found {}",
                regex.captures_len() - 1
            )));
        }
        Ok(Self { regex })
    }

    /// Issue number of the first match in `message`
    ///
    /// Later matches are ignored.
    pub fn extract(&self, message: &str) -> Option<u64> {
        self.regex
            .captures_iter(message)
            .find_map(|caps| caps.get(1)?.as_str().parse().ok())
    }
}
