//! Run configuration threaded through the comparison via [`crate::DiffContext`].

use std::path::PathBuf;

/// Options for one comparison run.
///
/// Constructed by the CLI frontend; the engine never reads ambient or global
/// configuration.
#[derive(Clone, Debug)]
pub struct DiffSettings {
    /// Baseline tree root.
    pub expected: PathBuf,
    /// Candidate tree root.
    pub actual: PathBuf,
    /// Report destination; `None` lets the JSON reporter pick a temp dir.
    pub report_dir: Option<PathBuf>,
    /// Emit TeamCity service messages instead of the JSON report.
    pub team_city: bool,
    /// Compute line diffs for mismatches (status-only run when `false`).
    pub run_diff: bool,
    /// Persist raw expected/actual texts for every mismatch.
    pub save_expected_and_actual: bool,
    /// Persist contents even for matched pairs.
    pub save_matched_contents: bool,
    /// Verbose class disassembly (strips the three volatile header lines);
    /// brief mode strips only the leading source-path comment.
    pub class_verbose: bool,
    /// Show the gathering/draining progress bar.
    pub show_progress: bool,
    /// Emit explicit pass events for matched items in TeamCity mode.
    pub report_matched: bool,
}

impl DiffSettings {
    /// Defaults for a JSON-report run over the given roots.
    #[must_use]
    pub fn new(expected: impl Into<PathBuf>, actual: impl Into<PathBuf>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
            report_dir: None,
            team_city: false,
            run_diff: true,
            save_expected_and_actual: false,
            save_matched_contents: false,
            class_verbose: true,
            show_progress: true,
            report_matched: false,
        }
    }
}
