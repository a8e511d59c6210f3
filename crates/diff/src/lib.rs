#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `diff` computes minimal line-level edit scripts between two text
//! renditions of a compared file and renders them as unified diffs. The
//! comparator runs it on thousands of mismatched pairs per run, so every
//! entry point is bounded: inputs past a line-count ceiling are rejected
//! before the algorithm starts, and the edit-graph search carries a
//! comparison budget that aborts pathological inputs cooperatively instead
//! of stalling a worker thread.
//!
//! # Design
//!
//! - [`diff_lines`] runs a Myers minimal-edit-script search and returns a
//!   [`Patch`] of change [`Delta`]s (original/revised line chunks).
//! - [`unified`] renders a patch with a fixed context window; callers cap
//!   the rendered output separately via [`truncate`].
//! - [`apply`] replays a patch onto the original lines, which is how the
//!   test suite verifies that rendering and computation agree.
//! - A budget overrun is not an error in the run's sense: callers fall back
//!   to persisting both raw texts and record the abort reason from
//!   [`DiffAborted`].
//!
//! # Invariants
//!
//! - When [`diff_lines`] returns `Ok`, applying the patch to the original
//!   lines reproduces the revised lines exactly.
//! - Deltas are ordered by original position and never overlap.
//! - An input whose original side exceeds the line ceiling never enters the
//!   edit-graph search.

mod error;
mod myers;
mod unified;

pub use error::DiffAborted;
pub use unified::{truncate, unified};

/// Cost ceilings for one diff computation.
#[derive(Clone, Copy, Debug)]
pub struct DiffBudget {
    /// Maximum original-side line count; larger inputs abort up front.
    pub max_lines: usize,
    /// Maximum number of line-equality comparisons during the search.
    pub max_comparisons: u64,
}

impl Default for DiffBudget {
    fn default() -> Self {
        Self {
            max_lines: 10_000,
            max_comparisons: 1_000_000,
        }
    }
}

/// The kind of change one delta describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeltaKind {
    /// Lines present only in the revised text.
    Insert,
    /// Lines present only in the original text.
    Delete,
    /// Lines replaced between the two texts.
    Change,
}

/// A contiguous run of lines anchored at a position in one of the texts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chunk<'a> {
    /// Zero-based line index of the first line of the chunk.
    pub position: usize,
    /// The chunk's lines.
    pub lines: Vec<&'a str>,
}

impl Chunk<'_> {
    /// Index one past the chunk's last line.
    #[must_use]
    pub fn end(&self) -> usize {
        self.position + self.lines.len()
    }
}

/// One change hunk: a chunk of original lines and its replacement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delta<'a> {
    /// What kind of edit this delta is.
    pub kind: DeltaKind,
    /// Affected original lines.
    pub original: Chunk<'a>,
    /// Replacement revised lines.
    pub revised: Chunk<'a>,
}

/// An ordered set of deltas transforming the original text into the revised
/// text.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Patch<'a> {
    /// The change hunks, ordered by original position.
    pub deltas: Vec<Delta<'a>>,
}

/// Computes the minimal edit script between two line sequences.
///
/// Returns [`DiffAborted::TooLarge`] without entering the search when the
/// original side exceeds `budget.max_lines`, and
/// [`DiffAborted::TooManyComparisons`] when the search burns through
/// `budget.max_comparisons` line-equality tests.
pub fn diff_lines<'a>(
    original: &[&'a str],
    revised: &[&'a str],
    budget: DiffBudget,
) -> Result<Patch<'a>, DiffAborted> {
    if original.len() > budget.max_lines {
        return Err(DiffAborted::TooLarge {
            lines: original.len(),
            limit: budget.max_lines,
        });
    }

    let deltas = myers::diff(original, revised, budget.max_comparisons)?;
    Ok(Patch { deltas })
}

/// Replays a patch onto the original lines, producing the revised lines.
#[must_use]
pub fn apply(original: &[&str], patch: &Patch<'_>) -> Vec<String> {
    let mut result = Vec::with_capacity(original.len());
    let mut position = 0;

    for delta in &patch.deltas {
        result.extend(original[position..delta.original.position].iter().map(|line| (*line).to_string()));
        result.extend(delta.revised.lines.iter().map(|line| (*line).to_string()));
        position = delta.original.end();
    }

    result.extend(original[position..].iter().map(|line| (*line).to_string()));
    result
}
