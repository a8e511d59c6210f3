#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Concrete reporting sinks.
//!
//! Two realizations of the engine's [`engine::Reporter`] contract live here:
//! [`JsonReporter`] streams one record per item into an array-shaped
//! `data.json` and writes diff artifacts under a parallel directory tree,
//! and [`TeamCityReporter`] maps statuses onto a nested service-message
//! stream for CI consumption. Both serialize their writes through the
//! scheduler's single I/O worker.

mod json;
mod teamcity;

pub use json::JsonReporter;
pub use teamcity::TeamCityReporter;

use std::io;
use std::path::PathBuf;

/// Error raised while preparing the report destination.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report directory could not be prepared or opened.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
