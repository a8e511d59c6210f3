//! TeamCity service-message reporter for CI runs.
//!
//! Directory scopes become nested test suites; each terminal item becomes a
//! test event. Suite boundaries rely on the scheduler's scope primitive: the
//! `suiteFinished` message for a directory is only emitted after every task
//! submitted underneath it has completed, so the message stream nests
//! correctly even though leaf results arrive from worker threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use engine::work::ScopedQueue;
use engine::{
    DiffContext, FileInfo, FileKind, FileStatus, Item, Reporter, RunStats, TaskScope, WorkQueue,
};

/// Emits `##teamcity[...]` service messages on stdout.
pub struct TeamCityReporter {
    work: Arc<dyn WorkQueue>,
    stats: Arc<RunStats>,
    report_matched: bool,
    dir_unpaired: AtomicBool,
}

impl TeamCityReporter {
    /// Creates a reporter writing to the process stdout.
    #[must_use]
    pub fn new(work: Arc<dyn WorkQueue>, stats: Arc<RunStats>, report_matched: bool) -> Self {
        Self {
            work,
            stats,
            report_matched,
            dir_unpaired: AtomicBool::new(false),
        }
    }

    fn send(&self, message: String) {
        // Serialized through the I/O worker so test events never interleave.
        self.work.io(Box::new(move || println!("{message}")));
    }

    fn write_item(&self, info: &FileInfo, expected: Option<&str>, actual: Option<&str>) {
        self.stats.record(info);

        let name = last_name(&info.relative_path);
        if info.kind == FileKind::Dir {
            self.dir_unpaired.store(true, Ordering::SeqCst);
            // Directories are not tests; a synthetic entry carries the
            // missing/unexpected signal inside the suite.
            let dir_test = ".dir";
            self.send(message("testStarted", &[("name", dir_test)]));
            self.send(message(
                "testFailed",
                &[("name", dir_test), ("message", status_name(info.status))],
            ));
            return;
        }

        if !self.report_matched && info.status == FileStatus::Matched {
            return;
        }

        self.send(message("testStarted", &[("name", name)]));
        if self.dir_unpaired.load(Ordering::SeqCst) {
            self.send(message(
                "testIgnored",
                &[("name", name), ("message", status_name(info.status))],
            ));
            return;
        }

        match info.status {
            FileStatus::Matched => {
                self.send(message("testFinished", &[("name", name), ("duration", "0")]));
            }
            FileStatus::Copy => {
                self.send(message(
                    "testIgnored",
                    &[("name", name), ("message", "COPY")],
                ));
            }
            FileStatus::Missed | FileStatus::Unexpected => {
                self.send(message(
                    "testFailed",
                    &[("name", name), ("message", status_name(info.status))],
                ));
            }
            FileStatus::Mismatched => {
                self.send(message(
                    "testFailed",
                    &[
                        ("name", name),
                        ("message", "MISMATCHED"),
                        ("type", "comparisonFailure"),
                        ("expected", expected.unwrap_or("")),
                        ("actual", actual.unwrap_or("")),
                    ],
                ));
            }
        }
    }
}

impl Reporter for TeamCityReporter {
    fn begin_report(&self) {
        self.send(message("testSuiteStarted", &[("name", "root")]));
    }

    fn dir(&self, ctx: &DiffContext, item: &Item, body: &mut dyn FnMut(&DiffContext)) {
        let name = item.name().to_string();
        if !name.is_empty() {
            self.send(message("testSuiteStarted", &[("name", name.as_str())]));
        }

        // Everything submitted beneath this directory is joined before the
        // suite is closed.
        let scope = TaskScope::new();
        let scoped = ScopedQueue::new(Arc::clone(&ctx.work), Arc::clone(&scope));
        let child_ctx = ctx.with_queue(scoped);
        let saved = self.dir_unpaired.swap(false, Ordering::SeqCst);

        body(&child_ctx);
        scope.join();

        self.dir_unpaired.store(saved, Ordering::SeqCst);
        if !name.is_empty() {
            self.send(message("testSuiteFinished", &[("name", name.as_str())]));
        }
    }

    fn report_match(&self, item: &Item, kind: FileKind) {
        self.write_item(&FileInfo::new(item, FileStatus::Matched, kind), None, None);
    }

    fn report_copy(&self, item: &Item, kind: FileKind) {
        self.write_item(&FileInfo::new(item, FileStatus::Copy, kind), None, None);
    }

    fn report_mismatch(
        &self,
        item: &Item,
        status: FileStatus,
        kind: FileKind,
        expected: Option<&str>,
        actual: Option<&str>,
    ) {
        self.write_item(&FileInfo::new(item, status, kind), expected, actual);
    }

    fn write_diff(&self, _item: &Item, _ext: &str, _content: String) {
        // Diff artifacts have no CI representation.
    }

    fn write_diff_aborted(&self, _item: &Item, _reason: &str) {}

    fn close(&self) {
        // The I/O worker is already down; write the closing suite directly.
        println!("{}", message("testSuiteFinished", &[("name", "root")]));
    }
}

fn last_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

const fn status_name(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Matched => "MATCHED",
        FileStatus::Missed => "MISSED",
        FileStatus::Unexpected => "UNEXPECTED",
        FileStatus::Mismatched => "MISMATCHED",
        FileStatus::Copy => "COPY",
    }
}

fn message(kind: &str, attrs: &[(&str, &str)]) -> String {
    let mut out = format!("##teamcity[{kind}");
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("='");
        out.push_str(&escape(value));
        out.push('\'');
    }
    out.push(']');
    out
}

/// Escapes a value per the TeamCity service-message format.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '|' => out.push_str("||"),
            '\'' => out.push_str("|'"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            _ => out.push(ch),
        }
    }
    out
}
