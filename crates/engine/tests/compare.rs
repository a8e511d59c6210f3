//! End-to-end comparison scenarios driven through a recording sink.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use diff::DiffBudget;
use engine::{
    DiffContext, DiffSettings, FileKind, FileStatus, Item, ItemVisitor, Reporter, RunStats,
    WorkManager, WorkQueue,
};
use vtree::TreeNode;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Clone, Debug)]
struct Recorded {
    id: u64,
    status: FileStatus,
    kind: FileKind,
    diffs: u32,
    deltas: Vec<u32>,
}

#[derive(Default)]
struct RecordingReporter {
    items: Mutex<HashMap<String, Recorded>>,
    artifacts: Mutex<Vec<(String, String)>>,
    aborted: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    fn record(&self, item: &Item, status: FileStatus, kind: FileKind) {
        let previous = self.items.lock().expect("items mutex").insert(
            item.relative_path.clone(),
            Recorded {
                id: item.id,
                status,
                kind,
                diffs: item.diffs,
                deltas: item.deltas.clone(),
            },
        );
        assert!(
            previous.is_none(),
            "item {} classified twice",
            item.relative_path
        );
    }
}

impl Reporter for RecordingReporter {
    fn begin_report(&self) {}

    fn dir(&self, ctx: &DiffContext, _item: &Item, body: &mut dyn FnMut(&DiffContext)) {
        body(ctx);
    }

    fn report_match(&self, item: &Item, kind: FileKind) {
        self.record(item, FileStatus::Matched, kind);
    }

    fn report_copy(&self, item: &Item, kind: FileKind) {
        self.record(item, FileStatus::Copy, kind);
    }

    fn report_mismatch(
        &self,
        item: &Item,
        status: FileStatus,
        kind: FileKind,
        _expected: Option<&str>,
        _actual: Option<&str>,
    ) {
        self.record(item, status, kind);
    }

    fn write_diff(&self, item: &Item, ext: &str, content: String) {
        self.artifacts
            .lock()
            .expect("artifacts mutex")
            .push((format!("{}.{ext}", item.relative_path), content));
    }

    fn write_diff_aborted(&self, item: &Item, reason: &str) {
        self.aborted
            .lock()
            .expect("aborted mutex")
            .push((item.relative_path.clone(), reason.to_string()));
    }

    fn close(&self) {}
}

struct Run {
    reporter: Arc<RecordingReporter>,
    visitor: ItemVisitor,
}

impl Run {
    fn items(&self) -> HashMap<String, Recorded> {
        self.reporter.items.lock().expect("items mutex").clone()
    }

    fn item(&self, path: &str) -> Recorded {
        self.items()
            .get(path)
            .unwrap_or_else(|| panic!("no record for {path}"))
            .clone()
    }

    fn artifact(&self, name: &str) -> Option<String> {
        self.reporter
            .artifacts
            .lock()
            .expect("artifacts mutex")
            .iter()
            .find(|(artifact, _)| artifact == name)
            .map(|(_, content)| content.clone())
    }
}

fn compare(expected: &Path, actual: &Path) -> Run {
    compare_with_budget(expected, actual, DiffBudget::default())
}

fn compare_with_budget(expected: &Path, actual: &Path, budget: DiffBudget) -> Run {
    let manager = WorkManager::new(false);
    let stats = Arc::new(RunStats::new());
    let reporter = Arc::new(RecordingReporter::default());
    let visitor = ItemVisitor::with_budget(budget);

    let ctx = DiffContext::new(
        Arc::new(DiffSettings::new(expected, actual)),
        manager.clone() as Arc<dyn WorkQueue>,
        reporter.clone() as Arc<dyn Reporter>,
        stats,
    );

    let expected_root = TreeNode::fs(expected).expect("expected root");
    let actual_root = TreeNode::fs(actual).expect("actual root");

    ctx.reporter.begin_report();
    visitor.visit(&ctx, Item::root(), Some(expected_root), Some(actual_root));
    manager.wait_done();
    ctx.reporter.close();

    Run { reporter, visitor }
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).expect("create zip");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("start member");
        writer.write_all(bytes).expect("write member");
    }
    writer.finish().expect("finish zip");
}

fn tree(entries: &[(&str, &str)]) -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    for (path, content) in entries {
        let full = temp.path().join(path);
        fs::create_dir_all(full.parent().expect("parent")).expect("dirs");
        fs::write(&full, content).expect("write");
    }
    temp
}

#[test]
fn missing_file_is_reported_missed() {
    let expected = tree(&[("a/b.txt", "x\n")]);
    let actual = tempfile::tempdir().expect("tempdir");
    fs::create_dir(actual.path().join("a")).expect("dir");

    let run = compare(expected.path(), actual.path());
    let items = run.items();
    assert_eq!(items.len(), 1);

    let record = run.item("a/b.txt");
    assert_eq!(record.status, FileStatus::Missed);
    assert_eq!(record.kind, FileKind::Text);
}

#[test]
fn identical_files_are_matched() {
    let expected = tree(&[("a/b.txt", "x\n")]);
    let actual = tree(&[("a/b.txt", "x\n")]);

    let run = compare(expected.path(), actual.path());
    assert_eq!(run.item("a/b.txt").status, FileStatus::Matched);
}

#[test]
fn changed_file_is_mismatched_with_one_replacement_hunk() {
    let expected = tree(&[("a/b.txt", "x\ny\n")]);
    let actual = tree(&[("a/b.txt", "x\nz\n")]);

    let run = compare(expected.path(), actual.path());
    let record = run.item("a/b.txt");
    assert_eq!(record.status, FileStatus::Mismatched);
    assert_eq!(record.kind, FileKind::Text);
    assert_eq!(record.diffs, 1);
    assert_eq!(record.deltas.len(), 1);

    let patch = run.artifact("a/b.txt.patch").expect("patch artifact");
    assert!(patch.contains("@@ -1,3 +1,3 @@"));
    assert!(patch.contains("-y"));
    assert!(patch.contains("+z"));

    assert!(run.visitor.stats_line().contains("1 diffs (0 aborted)"));
}

#[test]
fn repeated_mismatch_content_collapses_to_one_report() {
    let expected = tree(&[("a/b.txt", "x\ny\n"), ("c/d.txt", "x\ny\n")]);
    let actual = tree(&[("a/b.txt", "x\nz\n"), ("c/d.txt", "x\nz\n")]);

    let run = compare(expected.path(), actual.path());
    let statuses = [run.item("a/b.txt").status, run.item("c/d.txt").status];
    let mismatched = statuses
        .iter()
        .filter(|status| **status == FileStatus::Mismatched)
        .count();
    let copies = statuses
        .iter()
        .filter(|status| **status == FileStatus::Copy)
        .count();
    assert_eq!(mismatched, 1);
    assert_eq!(copies, 1);
}

#[test]
fn identical_pairs_never_claim_copy_status() {
    let expected = tree(&[("a/b.txt", "same\n"), ("c/d.txt", "same\n")]);
    let actual = tree(&[("a/b.txt", "same\n"), ("c/d.txt", "same\n")]);

    let run = compare(expected.path(), actual.path());
    assert_eq!(run.item("a/b.txt").status, FileStatus::Matched);
    assert_eq!(run.item("c/d.txt").status, FileStatus::Matched);
}

#[test]
fn duplicate_unpaired_content_becomes_copy() {
    let expected = tree(&[("a/one.xml", "<x/>\n"), ("b/two.xml", "<x/>\n")]);
    let actual = tempfile::tempdir().expect("tempdir");
    fs::create_dir(actual.path().join("a")).expect("dir");
    fs::create_dir(actual.path().join("b")).expect("dir");

    let run = compare(expected.path(), actual.path());
    let statuses = [run.item("a/one.xml").status, run.item("b/two.xml").status];
    let missed = statuses
        .iter()
        .filter(|status| **status == FileStatus::Missed)
        .count();
    let copies = statuses
        .iter()
        .filter(|status| **status == FileStatus::Copy)
        .count();
    assert_eq!(missed, 1);
    assert_eq!(copies, 1);
}

#[test]
fn archives_are_compared_member_by_member() {
    let expected = tempfile::tempdir().expect("tempdir");
    let actual = tempfile::tempdir().expect("tempdir");
    write_zip(
        &expected.path().join("dist.jar"),
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("res/notes.txt", b"alpha\nbeta\n"),
        ],
    );
    write_zip(
        &actual.path().join("dist.jar"),
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("res/notes.txt", b"alpha\ngamma\n"),
        ],
    );

    let run = compare(expected.path(), actual.path());
    let items = run.items();

    // The archive itself is expanded, never reported as a binary blob.
    assert!(!items.contains_key("dist.jar"));
    assert_eq!(
        run.item("dist.jar/META-INF/MANIFEST.MF").status,
        FileStatus::Matched
    );
    let changed = run.item("dist.jar/res/notes.txt");
    assert_eq!(changed.status, FileStatus::Mismatched);
    assert_eq!(changed.kind, FileKind::Text);
}

#[test]
fn directory_versus_file_reports_a_dir_anomaly() {
    let expected = tree(&[("conf/app.properties", "k=v\n")]);
    let actual = tempfile::tempdir().expect("tempdir");
    fs::write(actual.path().join("conf"), "not a directory").expect("write");

    let run = compare(expected.path(), actual.path());
    let conf = run.item("conf");
    assert_eq!(conf.kind, FileKind::Dir);
    assert_eq!(conf.status, FileStatus::Missed);
    assert_eq!(run.item("conf/app.properties").status, FileStatus::Missed);
}

#[test]
fn binary_files_with_different_sizes_skip_content_reads() {
    let expected = tree(&[("lib/blob.bin", "0123456789")]);
    let actual = tree(&[("lib/blob.bin", "0123")]);

    let run = compare(expected.path(), actual.path());
    let record = run.item("lib/blob.bin");
    assert_eq!(record.status, FileStatus::Mismatched);
    assert_eq!(record.kind, FileKind::Bin);
    assert_eq!(record.diffs, 0);
    assert!(run.artifact("lib/blob.bin.patch").is_none());
}

#[test]
fn equal_binaries_match_without_diffing() {
    let expected = tree(&[("lib/blob.bin", "\u{1}\u{2}\u{3}")]);
    let actual = tree(&[("lib/blob.bin", "\u{1}\u{2}\u{3}")]);

    let run = compare(expected.path(), actual.path());
    let record = run.item("lib/blob.bin");
    assert_eq!(record.status, FileStatus::Matched);
    assert_eq!(record.kind, FileKind::Bin);
}

#[test]
fn oversized_text_mismatch_aborts_and_saves_raw_contents() {
    let big_expected: String = (0..6).map(|i| format!("line {i}\n")).collect();
    let expected = tree(&[("big.txt", big_expected.as_str())]);
    let actual = tree(&[("big.txt", "tiny\n")]);

    let budget = DiffBudget {
        max_lines: 4,
        max_comparisons: 1_000_000,
    };
    let run = compare_with_budget(expected.path(), actual.path(), budget);

    let record = run.item("big.txt");
    assert_eq!(record.status, FileStatus::Mismatched);
    assert_eq!(record.diffs, 0);

    let aborted = run.reporter.aborted.lock().expect("aborted mutex").clone();
    assert_eq!(aborted.len(), 1);
    assert!(aborted[0].1.contains("File too large"));

    assert_eq!(
        run.artifact("big.txt.a.expected.txt").expect("raw expected"),
        big_expected
    );
    assert!(run.artifact("big.txt.b.actual.txt").is_some());
    assert!(run.artifact("big.txt.patch").is_none());
    assert!(run.visitor.stats_line().contains("(1 aborted)"));
}

#[test]
fn comparison_budget_overrun_aborts_with_raw_fallback() {
    let left: String = (0..50).map(|i| format!("left {i}\n")).collect();
    let right: String = (0..50).map(|i| format!("right {i}\n")).collect();
    let expected = tree(&[("churn.txt", left.as_str())]);
    let actual = tree(&[("churn.txt", right.as_str())]);

    let budget = DiffBudget {
        max_lines: 10_000,
        max_comparisons: 20,
    };
    let run = compare_with_budget(expected.path(), actual.path(), budget);

    let aborted = run.reporter.aborted.lock().expect("aborted mutex").clone();
    assert_eq!(aborted.len(), 1);
    assert!(aborted[0].1.contains("takes too long"));
    assert!(run.artifact("churn.txt.a.expected.txt").is_some());
    assert!(run.artifact("churn.txt.b.actual.txt").is_some());
}

#[test]
fn every_leaf_receives_exactly_one_status() {
    let expected = tree(&[
        ("a/same.txt", "s\n"),
        ("a/changed.txt", "1\n2\n"),
        ("a/only-expected.txt", "gone\n"),
        ("b/data.bin", "bytes"),
    ]);
    let actual = tree(&[
        ("a/same.txt", "s\n"),
        ("a/changed.txt", "1\n3\n"),
        ("a/extra.txt", "new\n"),
        ("b/data.bin", "bytes"),
    ]);

    let run = compare(expected.path(), actual.path());
    let items = run.items();
    assert_eq!(items.len(), 5);

    // Ids are unique across all reported items.
    let mut ids: Vec<u64> = items.values().map(|record| record.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);

    assert_eq!(run.item("a/only-expected.txt").status, FileStatus::Missed);
    assert_eq!(run.item("a/extra.txt").status, FileStatus::Unexpected);
}
