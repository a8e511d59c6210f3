//! The reporting-sink contract and the explicit per-run context.

use std::sync::Arc;

use crate::item::{FileKind, FileStatus, Item};
use crate::settings::DiffSettings;
use crate::stats::RunStats;
use crate::work::WorkQueue;

/// Consumer of classification events.
///
/// Concrete sinks live outside the engine; the comparator depends only on
/// this contract. Implementations must be thread-safe: events arrive from
/// any compute worker, and implementations are expected to serialize their
/// writes through the scheduler's I/O queue.
pub trait Reporter: Send + Sync {
    /// Called once before the walk starts.
    fn begin_report(&self);

    /// Brackets one directory's reporting scope. `body` receives the context
    /// to use for everything beneath the directory; a sink that needs to
    /// observe the boundary passes a child context with a scoped work queue
    /// and joins it before signalling completion.
    fn dir(&self, ctx: &DiffContext, item: &Item, body: &mut dyn FnMut(&DiffContext));

    /// Content identical on both sides.
    fn report_match(&self, item: &Item, kind: FileKind);

    /// Differing content already reported for an identical content pair.
    fn report_copy(&self, item: &Item, kind: FileKind);

    /// Missed/unexpected/mismatched terminal decision. Mismatched text
    /// comparisons carry both rendered texts for sinks that embed failure
    /// detail.
    fn report_mismatch(
        &self,
        item: &Item,
        status: FileStatus,
        kind: FileKind,
        expected: Option<&str>,
        actual: Option<&str>,
    );

    /// Persists a diff or fallback artifact named `<relativePath>.<ext>`.
    fn write_diff(&self, item: &Item, ext: &str, content: String);

    /// Records that an item's diff was abandoned for cost reasons.
    fn write_diff_aborted(&self, item: &Item, reason: &str);

    /// Called once after the scheduler has fully drained.
    fn close(&self);
}

/// Everything one comparison step needs, threaded explicitly instead of held
/// as ambient state: settings, a work queue (possibly scoped to a directory),
/// the reporting sink, and the run statistics.
#[derive(Clone)]
pub struct DiffContext {
    /// Run configuration.
    pub settings: Arc<DiffSettings>,
    /// Submission interface for compute and I/O work.
    pub work: Arc<dyn WorkQueue>,
    /// The reporting sink.
    pub reporter: Arc<dyn Reporter>,
    /// Shared run statistics.
    pub stats: Arc<RunStats>,
}

impl DiffContext {
    /// Bundles a fresh context.
    #[must_use]
    pub fn new(
        settings: Arc<DiffSettings>,
        work: Arc<dyn WorkQueue>,
        reporter: Arc<dyn Reporter>,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            settings,
            work,
            reporter,
            stats,
        }
    }

    /// A child context whose submissions go through `work` (used by sinks to
    /// narrow the queue to one directory scope).
    #[must_use]
    pub fn with_queue(&self, work: Arc<dyn WorkQueue>) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            work,
            reporter: Arc::clone(&self.reporter),
            stats: Arc::clone(&self.stats),
        }
    }
}
