//! Persistence of annotations as git notes.

use super::{Annotation, parse_annotation, render_annotation};
use crate::error::{Error, Result};
use crate::vcs::VcsService;
use tracing::debug;

/// Notes ref holding ghchain annotations (kept apart from `refs/notes/commits`)
pub const NOTES_REF: &str = "refs/notes/ghchain";

/// Reads and writes annotations through the version-control capability
pub struct AnnotationStore<'a> {
    vcs: &'a dyn VcsService,
    notes_ref: &'a str,
}

impl<'a> AnnotationStore<'a> {
    /// Store using the default notes ref
    pub fn new(vcs: &'a dyn VcsService) -> Self {
        Self {
            vcs,
            notes_ref: NOTES_REF,
        }
    }

    /// Store using a custom notes ref
    pub const fn with_ref(vcs: &'a dyn VcsService, notes_ref: &'a str) -> Self {
        Self { vcs, notes_ref }
    }

    /// Load the annotation of `sha`
    ///
    /// Returns an empty annotation if the commit has no note.
    pub fn load(&self, sha: &str) -> Result<Annotation> {
        match self.vcs.read_note(self.notes_ref, sha)? {
            Some(text) => parse_annotation(&text)
                .map_err(|e| Error::Annotation(format!("note on {sha}: {e}"))),
            None => Ok(Annotation::default()),
        }
    }

    /// Save the annotation of `sha`, returning whether anything was written
    ///
    /// Skips the write when the stored note already renders identically, so
    /// repeated runs leave the notes ref untouched.
    pub fn save(&self, sha: &str, annotation: &Annotation) -> Result<bool> {
        let text = render_annotation(annotation);
        if self.vcs.read_note(self.notes_ref, sha)?.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }
        debug!(sha, "writing annotation");
        self.vcs.write_note(self.notes_ref, sha, &text)?;
        Ok(true)
    }

    /// Copy the annotation of `from` onto `to` (after a rewrite)
    ///
    /// Does nothing when `from` has no annotation or `to` already has one.
    pub fn copy_forward(&self, from: &str, to: &str) -> Result<bool> {
        if from == to {
            return Ok(false);
        }
        let source = self.load(from)?;
        if source.is_empty() || !self.load(to)?.is_empty() {
            return Ok(false);
        }
        debug!(from, to, "copying annotation forward");
        self.save(to, &source)
    }

    /// Remove the annotation of `sha`
    pub fn remove(&self, sha: &str) -> Result<()> {
        self.vcs.remove_note(self.notes_ref, sha)
    }
}
