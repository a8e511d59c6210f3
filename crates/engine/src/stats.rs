//! Run-wide statistics backing the end-of-run summary.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::item::{FileInfo, FileStatus};

/// Item and diff counts for one status bucket.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bucket {
    /// Items recorded under the bucket.
    pub items: u64,
    /// Sum of their diff hunk counts.
    pub diffs: u64,
}

/// Aggregated counters fed by the reporting sinks.
///
/// Buckets are keyed `<ext>.<STATUS>` (with `OTHER` for extensionless items)
/// plus a `TOTAL.<STATUS>` rollup, mirroring the grouping the interactive
/// report uses. Delta usages count how often each registered delta digest
/// recurred across the run.
#[derive(Default)]
pub struct RunStats {
    total_items: AtomicU64,
    by_status: Mutex<BTreeMap<String, Bucket>>,
    delta_usage: Mutex<HashMap<u32, u64>>,
}

impl RunStats {
    /// Creates zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one terminal item.
    pub fn record(&self, info: &FileInfo) {
        self.total_items.fetch_add(1, Ordering::SeqCst);

        let mut by_status = self.by_status.lock().expect("stats mutex poisoned");
        match info.status {
            FileStatus::Matched => {
                bump(&mut by_status, "TOTAL.MATCHED".to_string(), info);
            }
            FileStatus::Copy => {
                bump(&mut by_status, "COPY".to_string(), info);
            }
            status => {
                let ext = if info.no_extension {
                    "OTHER"
                } else {
                    info.extension.as_str()
                };
                bump(&mut by_status, format!("{ext}.{}", status_key(status)), info);
                bump(
                    &mut by_status,
                    format!("TOTAL.{}", status_key(status)),
                    info,
                );
            }
        }
        drop(by_status);

        if !info.deltas.is_empty() {
            let mut usage = self.delta_usage.lock().expect("stats mutex poisoned");
            for delta in &info.deltas {
                *usage.entry(*delta).or_insert(0) += 1;
            }
        }
    }

    /// Total terminal items recorded.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.total_items.load(Ordering::SeqCst)
    }

    /// The `n` largest status buckets, descending by item count.
    #[must_use]
    pub fn top_status_buckets(&self, n: usize) -> Vec<(String, Bucket)> {
        let by_status = self.by_status.lock().expect("stats mutex poisoned");
        let mut buckets: Vec<_> = by_status
            .iter()
            .map(|(key, bucket)| (key.clone(), *bucket))
            .collect();
        buckets.sort_by(|a, b| b.1.items.cmp(&a.1.items).then_with(|| a.0.cmp(&b.0)));
        buckets.truncate(n);
        buckets
    }

    /// Number of distinct delta digests seen.
    #[must_use]
    pub fn delta_kinds(&self) -> usize {
        self.delta_usage.lock().expect("stats mutex poisoned").len()
    }

    /// The `n` most frequently recurring delta digests, descending.
    #[must_use]
    pub fn top_deltas(&self, n: usize) -> Vec<(u32, u64)> {
        let usage = self.delta_usage.lock().expect("stats mutex poisoned");
        let mut deltas: Vec<_> = usage.iter().map(|(id, count)| (*id, *count)).collect();
        deltas.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        deltas.truncate(n);
        deltas
    }
}

fn bump(buckets: &mut BTreeMap<String, Bucket>, key: String, info: &FileInfo) {
    let bucket = buckets.entry(key).or_default();
    bucket.items += 1;
    bucket.diffs += u64::from(info.diffs);
}

const fn status_key(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Matched => "MATCHED",
        FileStatus::Missed => "MISSED",
        FileStatus::Unexpected => "UNEXPECTED",
        FileStatus::Mismatched => "MISMATCHED",
        FileStatus::Copy => "COPY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{FileKind, Item};

    fn info(path: &str, ext: &str, status: FileStatus, diffs: u32, deltas: Vec<u32>) -> FileInfo {
        let mut item = Item::new(1, path, ext);
        item.diffs = diffs;
        item.deltas = deltas;
        FileInfo::new(&item, status, FileKind::Text)
    }

    #[test]
    fn buckets_group_by_extension_and_status() {
        let stats = RunStats::new();
        stats.record(&info("a/x.txt", "txt", FileStatus::Mismatched, 2, vec![1]));
        stats.record(&info("a/y.txt", "txt", FileStatus::Mismatched, 1, vec![1]));
        stats.record(&info("a/z.xml", "xml", FileStatus::Missed, 0, vec![]));
        stats.record(&info("a/ok.txt", "txt", FileStatus::Matched, 0, vec![]));

        assert_eq!(stats.total_items(), 4);
        let buckets = stats.top_status_buckets(10);
        let txt = buckets
            .iter()
            .find(|(key, _)| key == "txt.MISMATCHED")
            .expect("txt bucket");
        assert_eq!(txt.1.items, 2);
        assert_eq!(txt.1.diffs, 3);
        assert!(buckets.iter().any(|(key, _)| key == "TOTAL.MISMATCHED"));
        assert!(buckets.iter().any(|(key, _)| key == "TOTAL.MATCHED"));
        assert!(buckets.iter().any(|(key, _)| key == "xml.MISSED"));
    }

    #[test]
    fn delta_usage_counts_recurrences() {
        let stats = RunStats::new();
        stats.record(&info("a.txt", "txt", FileStatus::Mismatched, 1, vec![7]));
        stats.record(&info("b.txt", "txt", FileStatus::Mismatched, 2, vec![7, 9]));

        assert_eq!(stats.delta_kinds(), 2);
        assert_eq!(stats.top_deltas(10), vec![(7, 2), (9, 1)]);
    }
}
