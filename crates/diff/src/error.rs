/// Reasons a diff computation was abandoned before producing a patch.
///
/// Both variants are designed fallback paths, not failures: the caller
/// persists the raw texts verbatim and records the reason.
#[derive(Debug, thiserror::Error)]
pub enum DiffAborted {
    /// The original side exceeded the line ceiling; the search never ran.
    #[error("File too large ({lines} lines > {limit})")]
    TooLarge {
        /// Line count of the original side.
        lines: usize,
        /// The configured ceiling.
        limit: usize,
    },

    /// The edit-graph search exceeded its comparison budget mid-flight.
    #[error("Building diff takes too long ({comparisons} comparisons)")]
    TooManyComparisons {
        /// Comparisons performed before bailing out.
        comparisons: u64,
    },
}
