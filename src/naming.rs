//! Branch names for stack slots.
//!
//! A name is a pure function of the template, the author identity and the
//! slot's stack id. The commit sha never enters it, so a rewritten commit
//! keeps its branch.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Author,
    Id,
}

/// A parsed branch name template such as `{git_config_author}-{pr_id}`
///
/// Keys: `git_config_author` / `author`, `pr_id` / `id`.
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTemplate {
    pieces: Vec<Piece>,
}

impl BranchTemplate {
    /// Parse a template, rejecting unknown keys
    pub fn parse(template: &str) -> Result<Self> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(k) => key.push(k),
                            None => {
                                return Err(Error::Template(format!(
                                    "unterminated `{{` in `{template}`"
                                )));
                            }
                        }
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(match key.trim() {
                        "git_config_author" | "author" => Piece::Author,
                        "pr_id" | "id" => Piece::Id,
                        other => {
                            return Err(Error::Template(format!(
                                "unknown key `{other}` in `{template}` \
                                 (known: git_config_author, author, pr_id, id)"
                            )));
                        }
                    });
                }
                '}' => {
                    return Err(Error::Template(format!(
                        "unmatched `}}` in `{template}`"
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        if !pieces.contains(&Piece::Id) {
            return Err(Error::Template(format!(
                "`{template}` has no `{{pr_id}}` key; names would collide"
            )));
        }
        Ok(Self { pieces })
    }

    /// Render a name for `author` and `id`
    pub fn render(&self, author: &str, id: u64) -> String {
        let author = normalize_author(author);
        let mut name = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => name.push_str(text),
                Piece::Author => name.push_str(&author),
                Piece::Id => {
                    let _ = write!(name, "{id}");
                }
            }
        }
        name
    }
}

/// Lowercase, spaces to underscores
pub fn normalize_author(author: &str) -> String {
    author.trim().replace(' ', "_").to_lowercase()
}

/// Allocates branch names within one run
///
/// Ids come from the remote once per run and are bumped locally; a name
/// already taken (existing branch or earlier in this run) is skipped.
#[derive(Debug)]
pub struct BranchNameResolver {
    template: BranchTemplate,
    author: String,
    next_id: u64,
    taken: HashSet<String>,
}

impl BranchNameResolver {
    /// Create a resolver starting at `first_id`
    pub fn new(
        template: BranchTemplate,
        author: impl Into<String>,
        first_id: u64,
        taken: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            template,
            author: author.into(),
            next_id: first_id,
            taken: taken.into_iter().collect(),
        }
    }

    /// Next free name and the id it was built from
    pub fn allocate(&mut self) -> (String, u64) {
        loop {
            let id = self.next_id;
            self.next_id += 1;
            let name = self.template.render(&self.author, id);
            if self.taken.insert(name.clone()) {
                return (name, id);
            }
        }
    }
}
