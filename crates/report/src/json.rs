//! Streaming JSON reporter for the interactive report viewer.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use engine::{DiffContext, FileInfo, FileKind, FileStatus, Item, Reporter, RunStats, WorkQueue};

use crate::ReportError;

struct JsonStream {
    out: BufWriter<File>,
    first: bool,
}

/// Appends one record per terminal item to `diff/data.json` (an array) and
/// writes diff/fallback artifacts under the parallel `diff/` tree.
///
/// All writes go through the scheduler's I/O queue, so the stream and the
/// artifact files observe a single total order without extra locking.
pub struct JsonReporter {
    work: Arc<dyn WorkQueue>,
    stats: Arc<RunStats>,
    diff_dir: PathBuf,
    stream: Arc<Mutex<JsonStream>>,
}

impl JsonReporter {
    /// Prepares the report directory (clearing any previous report) and
    /// opens the record stream.
    pub fn new(
        report_dir: &Path,
        work: Arc<dyn WorkQueue>,
        stats: Arc<RunStats>,
    ) -> Result<Self, ReportError> {
        if report_dir.exists() {
            fs::remove_dir_all(report_dir)
                .map_err(|error| ReportError::io(report_dir, error))?;
        }
        let diff_dir = report_dir.join("diff");
        fs::create_dir_all(&diff_dir).map_err(|error| ReportError::io(&diff_dir, error))?;

        let data_path = diff_dir.join("data.json");
        let out = File::create(&data_path).map_err(|error| ReportError::io(&data_path, error))?;

        Ok(Self {
            work,
            stats,
            diff_dir,
            stream: Arc::new(Mutex::new(JsonStream {
                out: BufWriter::new(out),
                first: true,
            })),
        })
    }

    /// Where diff artifacts and the record stream are written.
    #[must_use]
    pub fn diff_dir(&self) -> &Path {
        &self.diff_dir
    }

    fn write_item(&self, info: FileInfo) {
        self.stats.record(&info);

        let stream = Arc::clone(&self.stream);
        self.work.io(Box::new(move || {
            let record = match serde_json::to_string(&info) {
                Ok(record) => record,
                Err(error) => {
                    tracing::error!(path = %info.relative_path, %error, "failed to serialize record");
                    return;
                }
            };
            let mut stream = stream.lock().expect("json stream mutex poisoned");
            let separator = if stream.first { "\n  " } else { ",\n  " };
            stream.first = false;
            if let Err(error) = stream
                .out
                .write_all(separator.as_bytes())
                .and_then(|()| stream.out.write_all(record.as_bytes()))
            {
                tracing::error!(%error, "failed to append record to data.json");
            }
        }));
    }
}

impl Reporter for JsonReporter {
    fn begin_report(&self) {
        let mut stream = self.stream.lock().expect("json stream mutex poisoned");
        if let Err(error) = stream.out.write_all(b"[") {
            tracing::error!(%error, "failed to start data.json");
        }
    }

    fn dir(&self, ctx: &DiffContext, _item: &Item, body: &mut dyn FnMut(&DiffContext)) {
        // The JSON report is flat; directory scopes need no bracketing.
        body(ctx);
    }

    fn report_match(&self, item: &Item, kind: FileKind) {
        self.write_item(FileInfo::new(item, FileStatus::Matched, kind));
    }

    fn report_copy(&self, item: &Item, kind: FileKind) {
        self.write_item(FileInfo::new(item, FileStatus::Copy, kind));
    }

    fn report_mismatch(
        &self,
        item: &Item,
        status: FileStatus,
        kind: FileKind,
        _expected: Option<&str>,
        _actual: Option<&str>,
    ) {
        self.write_item(FileInfo::new(item, status, kind));
    }

    fn write_diff(&self, item: &Item, ext: &str, content: String) {
        let path = self.diff_dir.join(format!("{}.{ext}", item.relative_path));
        self.work.io(Box::new(move || {
            let result = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::write(&path, content));
            if let Err(error) = result {
                tracing::error!(path = %path.display(), %error, "failed to write diff artifact");
            }
        }));
    }

    fn write_diff_aborted(&self, item: &Item, reason: &str) {
        self.write_diff(item, "patch", format!("[DIFF-ABORTED] {reason}"));
    }

    fn close(&self) {
        // Runs after the scheduler has drained; the stream is idle.
        let mut stream = self.stream.lock().expect("json stream mutex poisoned");
        let result = stream
            .out
            .write_all(b"\n]\n")
            .and_then(|()| stream.out.flush());
        if let Err(error) = result {
            tracing::error!(%error, "failed to finalize data.json");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::WorkManager;

    fn item(id: u64, path: &str, ext: &str) -> Item {
        Item::new(id, path, ext)
    }

    #[test]
    fn records_stream_into_an_array_with_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report_dir = temp.path().join("report");
        let manager = WorkManager::new(false);
        let stats = Arc::new(RunStats::new());
        let reporter = JsonReporter::new(
            &report_dir,
            manager.clone() as Arc<dyn WorkQueue>,
            Arc::clone(&stats),
        )
        .expect("reporter");

        reporter.begin_report();
        reporter.report_match(&item(1, "a/ok.txt", "txt"), FileKind::Text);
        let mut changed = item(2, "a/changed.txt", "txt");
        changed.diffs = 1;
        changed.deltas = vec![1];
        reporter.report_mismatch(&changed, FileStatus::Mismatched, FileKind::Text, None, None);
        reporter.write_diff(&changed, "patch", "--- a\n+++ b".to_string());
        manager.wait_done();
        reporter.close();

        let data = fs::read_to_string(report_dir.join("diff/data.json")).expect("data.json");
        let records: serde_json::Value = serde_json::from_str(&data).expect("valid json");
        let records = records.as_array().expect("array");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["relativePath"], "a/ok.txt");
        assert_eq!(records[0]["status"], "MATCHED");
        assert_eq!(records[1]["status"], "MISMATCHED");
        assert_eq!(records[1]["diffs"], 1);
        assert_eq!(records[1]["deltas"][0], 1);

        let patch = fs::read_to_string(report_dir.join("diff/a/changed.txt.patch"))
            .expect("patch artifact");
        assert!(patch.starts_with("---"));
        assert_eq!(stats.total_items(), 2);
    }

    #[test]
    fn previous_report_is_cleared() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report_dir = temp.path().join("report");
        fs::create_dir_all(report_dir.join("diff")).expect("stale dirs");
        fs::write(report_dir.join("diff/stale.patch"), b"old").expect("stale file");

        let manager = WorkManager::new(false);
        let stats = Arc::new(RunStats::new());
        let reporter = JsonReporter::new(
            &report_dir,
            manager.clone() as Arc<dyn WorkQueue>,
            stats,
        )
        .expect("reporter");
        reporter.begin_report();
        manager.wait_done();
        reporter.close();

        assert!(!report_dir.join("diff/stale.patch").exists());
        assert!(report_dir.join("diff/data.json").exists());
    }
}
