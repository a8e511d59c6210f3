//! The lockstep tree comparator.
//!
//! Structural recursion over directory/archive boundaries runs on the
//! calling thread; every leaf pair and unpaired-leaf check is fanned out to
//! the compute pool. The only state shared between leaf tasks is the dedup
//! index and the delta-digest table.
//!
//! Ordering of the terminal decision: byte-equality is checked first, so an
//! identical pair is always `Matched` and never claims a dedup slot; the
//! claim then decides `Copy` versus `Mismatched`, and the mismatch record is
//! emitted from the diff task once the delta ids are known.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use diff::{DiffAborted, DiffBudget, Patch};
use vtree::TreeNode;

use crate::digests::{DedupIndex, DeltaIndex, delta_digest, pair_digest, single_digest};
use crate::disasm;
use crate::item::{FileKind, FileStatus, Item};
use crate::reporter::DiffContext;

/// Context lines around each rendered hunk.
const DIFF_CONTEXT_LINES: usize = 5;
/// Rendered unified diffs are capped at this many lines.
const DIFF_OUTPUT_LINE_LIMIT: usize = 1000;

struct VisitorState {
    last_id: AtomicU64,
    diffs: AtomicU32,
    aborted_diffs: AtomicU32,
    dedup: DedupIndex,
    deltas: DeltaIndex,
    budget: DiffBudget,
}

/// The recursive comparator for one run. Clones share the same id counter
/// and digest registries, so leaf tasks carry their own handle.
#[derive(Clone)]
pub struct ItemVisitor {
    state: Arc<VisitorState>,
}

impl Default for ItemVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemVisitor {
    /// Creates a visitor with the default diff cost ceilings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_budget(DiffBudget::default())
    }

    /// Creates a visitor with explicit diff cost ceilings (tests lower them).
    #[must_use]
    pub fn with_budget(budget: DiffBudget) -> Self {
        Self {
            state: Arc::new(VisitorState {
                last_id: AtomicU64::new(0),
                diffs: AtomicU32::new(0),
                aborted_diffs: AtomicU32::new(0),
                dedup: DedupIndex::new(),
                deltas: DeltaIndex::new(),
                budget,
            }),
        }
    }

    /// `N files, M diffs (K aborted)` summary line.
    #[must_use]
    pub fn stats_line(&self) -> String {
        format!(
            "{} files, {} diffs ({} aborted)",
            self.state.last_id.load(Ordering::SeqCst),
            self.state.diffs.load(Ordering::SeqCst),
            self.state.aborted_diffs.load(Ordering::SeqCst)
        )
    }

    /// Compares a node pair. At least one side must be present; the walk is
    /// synchronous for containers and submits leaf work to the scheduler.
    pub fn visit(
        &self,
        ctx: &DiffContext,
        item: Item,
        expected: Option<TreeNode>,
        actual: Option<TreeNode>,
    ) {
        debug_assert!(expected.is_some() || actual.is_some());

        let structural = expected.as_ref().is_some_and(TreeNode::can_open_container)
            || actual.as_ref().is_some_and(TreeNode::can_open_container);

        if structural {
            self.visit_directory(ctx, item, expected.as_ref(), actual.as_ref());
        } else {
            self.visit_file(ctx, item, expected, actual);
        }
    }

    fn visit_directory(
        &self,
        ctx: &DiffContext,
        item: Item,
        expected: Option<&TreeNode>,
        actual: Option<&TreeNode>,
    ) {
        let mut expected_children = container_children(expected);
        let actual_children = container_children(actual);
        let expected_absent = expected_children.is_none();
        let actual_absent = actual_children.is_none();

        let mut actual_by_name: BTreeMap<String, TreeNode> = actual_children
            .unwrap_or_default()
            .into_iter()
            .map(|node| (node.name().to_string(), node))
            .collect();

        let reporter = Arc::clone(&ctx.reporter);
        reporter.dir(ctx, &item, &mut |child_ctx| {
            // A name that is a container on one side only is itself a
            // reportable anomaly, before its members are compared.
            if expected_absent {
                child_ctx.reporter.report_mismatch(
                    &item,
                    FileStatus::Unexpected,
                    FileKind::Dir,
                    None,
                    None,
                );
            } else if actual_absent {
                child_ctx.reporter.report_mismatch(
                    &item,
                    FileStatus::Missed,
                    FileKind::Dir,
                    None,
                    None,
                );
            }

            for node in expected_children.take().unwrap_or_default() {
                let counterpart = actual_by_name.remove(node.name());
                let child = self.child_item(&item, &node);
                self.visit(child_ctx, child, Some(node), counterpart);
            }

            for (_, node) in std::mem::take(&mut actual_by_name) {
                let child = self.child_item(&item, &node);
                self.visit(child_ctx, child, None, Some(node));
            }
        });
    }

    fn visit_file(
        &self,
        ctx: &DiffContext,
        item: Item,
        expected: Option<TreeNode>,
        actual: Option<TreeNode>,
    ) {
        match (expected, actual) {
            (Some(node), None) => self.visit_unpaired(ctx, item, node, FileStatus::Missed),
            (None, Some(node)) => self.visit_unpaired(ctx, item, node, FileStatus::Unexpected),
            (Some(expected), Some(actual)) => {
                let visitor = self.clone();
                let task_ctx = ctx.clone();
                let title = format!("READING {}", item.relative_path);
                ctx.work.submit(
                    title,
                    Box::new(move || match item.kind() {
                        FileKind::Class => visitor.match_class(&task_ctx, item, &expected, &actual),
                        FileKind::Text => visitor.match_text(&task_ctx, item, &expected, &actual),
                        FileKind::Bin => visitor.match_bin(&task_ctx, item, &expected, &actual),
                        FileKind::Dir => unreachable!("leaf classification never yields DIR"),
                    }),
                );
            }
            (None, None) => debug_assert!(false, "visited a pair with both sides absent"),
        }
    }

    fn visit_unpaired(&self, ctx: &DiffContext, item: Item, node: TreeNode, status: FileStatus) {
        // The copy check needs the content, so this goes through the queue
        // like any other leaf.
        let visitor = self.clone();
        let task_ctx = ctx.clone();
        let title = format!("READING UNPAIRED {}", item.relative_path);
        ctx.work.submit(
            title,
            Box::new(move || {
                let kind = item.kind();
                match node.read() {
                    Ok(bytes) => {
                        if visitor.state.dedup.claim(single_digest(&bytes), item.id) {
                            task_ctx
                                .reporter
                                .report_mismatch(&item, status, kind, None, None);
                        } else {
                            task_ctx.reporter.report_copy(&item, kind);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(path = %item.relative_path, %error, "failed to read unpaired entry");
                        task_ctx
                            .reporter
                            .report_mismatch(&item, status, kind, None, None);
                    }
                }
            }),
        );
    }

    fn match_text(&self, ctx: &DiffContext, item: Item, expected: &TreeNode, actual: &TreeNode) {
        let Some(expected_bytes) = read_or_log(expected, &item) else {
            return;
        };
        let Some(actual_bytes) = read_or_log(actual, &item) else {
            return;
        };

        if expected_bytes == actual_bytes {
            report_match(ctx, &item, FileKind::Text, &expected_bytes);
            return;
        }
        if !self
            .state
            .dedup
            .claim(pair_digest(&expected_bytes, &actual_bytes), item.id)
        {
            ctx.reporter.report_copy(&item, FileKind::Text);
            return;
        }

        let expected_txt = String::from_utf8_lossy(&expected_bytes).into_owned();
        let actual_txt = String::from_utf8_lossy(&actual_bytes).into_owned();
        self.diff_and_report(
            ctx,
            item,
            FileKind::Text,
            expected_txt,
            actual_txt,
            expected.location(),
            actual.location(),
        );
    }

    fn match_class(&self, ctx: &DiffContext, item: Item, expected: &TreeNode, actual: &TreeNode) {
        let Some(expected_bytes) = read_or_log(expected, &item) else {
            return;
        };
        let Some(actual_bytes) = read_or_log(actual, &item) else {
            return;
        };

        if expected_bytes == actual_bytes {
            report_match(ctx, &item, FileKind::Class, &expected_bytes);
            return;
        }
        // Dedup hashes the raw class bytes; the disassembly below only runs
        // for first occurrences.
        if !self
            .state
            .dedup
            .claim(pair_digest(&expected_bytes, &actual_bytes), item.id)
        {
            ctx.reporter.report_copy(&item, FileKind::Class);
            return;
        }

        let verbose = ctx.settings.class_verbose;
        let expected_txt = render_class(&expected_bytes, verbose, &item);
        let actual_txt = render_class(&actual_bytes, verbose, &item);
        self.diff_and_report(
            ctx,
            item,
            FileKind::Class,
            expected_txt,
            actual_txt,
            expected.location(),
            actual.location(),
        );
    }

    fn match_bin(&self, ctx: &DiffContext, item: Item, expected: &TreeNode, actual: &TreeNode) {
        if let (Ok(expected_size), Ok(actual_size)) = (expected.size(), actual.size()) {
            if expected_size != actual_size {
                ctx.reporter
                    .report_mismatch(&item, FileStatus::Mismatched, FileKind::Bin, None, None);
                return;
            }
        }

        let Some(expected_bytes) = read_or_log(expected, &item) else {
            return;
        };
        let Some(actual_bytes) = read_or_log(actual, &item) else {
            return;
        };

        if expected_bytes == actual_bytes {
            report_match(ctx, &item, FileKind::Bin, &expected_bytes);
        } else if self
            .state
            .dedup
            .claim(pair_digest(&expected_bytes, &actual_bytes), item.id)
        {
            ctx.reporter
                .report_mismatch(&item, FileStatus::Mismatched, FileKind::Bin, None, None);
        } else {
            ctx.reporter.report_copy(&item, FileKind::Bin);
        }
    }

    fn diff_and_report(
        &self,
        ctx: &DiffContext,
        mut item: Item,
        kind: FileKind,
        expected_txt: String,
        actual_txt: String,
        expected_loc: String,
        actual_loc: String,
    ) {
        if !ctx.settings.run_diff {
            ctx.reporter.report_mismatch(
                &item,
                FileStatus::Mismatched,
                kind,
                Some(&expected_txt),
                Some(&actual_txt),
            );
            if ctx.settings.save_expected_and_actual {
                save_raw(ctx, &item, expected_txt, actual_txt);
            }
            return;
        }

        let line_count = expected_txt.split('\n').count();
        if line_count > self.state.budget.max_lines {
            let reason = DiffAborted::TooLarge {
                lines: line_count,
                limit: self.state.budget.max_lines,
            };
            self.state.aborted_diffs.fetch_add(1, Ordering::SeqCst);
            ctx.reporter.report_mismatch(
                &item,
                FileStatus::Mismatched,
                kind,
                Some(&expected_txt),
                Some(&actual_txt),
            );
            ctx.reporter.write_diff_aborted(&item, &abort_note(&reason));
            save_raw(ctx, &item, expected_txt, actual_txt);
            return;
        }

        self.state.diffs.fetch_add(1, Ordering::SeqCst);
        let visitor = self.clone();
        let task_ctx = ctx.clone();
        let title = format!("DIFF FOR {}", item.relative_path);
        ctx.work.submit(
            title,
            Box::new(move || {
                let expected_lines: Vec<&str> = expected_txt.split('\n').collect();
                let actual_lines: Vec<&str> = actual_txt.split('\n').collect();

                match diff::diff_lines(&expected_lines, &actual_lines, visitor.state.budget) {
                    Ok(patch) => {
                        item.diffs = patch.deltas.len() as u32;
                        item.deltas = visitor.register_deltas(&patch);
                        let rendered = diff::truncate(
                            diff::unified(
                                &expected_loc,
                                &actual_loc,
                                &expected_lines,
                                &patch,
                                DIFF_CONTEXT_LINES,
                            ),
                            DIFF_OUTPUT_LINE_LIMIT,
                        );
                        task_ctx.reporter.report_mismatch(
                            &item,
                            FileStatus::Mismatched,
                            kind,
                            Some(&expected_txt),
                            Some(&actual_txt),
                        );
                        task_ctx
                            .reporter
                            .write_diff(&item, "patch", rendered.join("\n"));
                        if task_ctx.settings.save_expected_and_actual {
                            save_raw(&task_ctx, &item, expected_txt, actual_txt);
                        }
                    }
                    Err(reason) => {
                        visitor.state.aborted_diffs.fetch_add(1, Ordering::SeqCst);
                        task_ctx.reporter.report_mismatch(
                            &item,
                            FileStatus::Mismatched,
                            kind,
                            Some(&expected_txt),
                            Some(&actual_txt),
                        );
                        task_ctx
                            .reporter
                            .write_diff_aborted(&item, &abort_note(&reason));
                        save_raw(&task_ctx, &item, expected_txt, actual_txt);
                    }
                }
            }),
        );
    }

    fn register_deltas(&self, patch: &Patch<'_>) -> Vec<u32> {
        let ids: BTreeSet<u32> = patch
            .deltas
            .iter()
            .map(|delta| {
                self.state
                    .deltas
                    .assign(delta_digest(&delta.original.lines, &delta.revised.lines))
            })
            .collect();
        ids.into_iter().collect()
    }

    fn child_item(&self, parent: &Item, node: &TreeNode) -> Item {
        let id = self.state.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        parent.child(id, node.name(), node.extension())
    }
}

fn container_children(node: Option<&TreeNode>) -> Option<Vec<TreeNode>> {
    let node = node?;
    if !node.can_open_container() {
        return None;
    }
    match node.children() {
        Ok(children) => Some(children),
        Err(error) => {
            tracing::warn!(location = %node.location(), %error, "failed to enumerate container");
            Some(Vec::new())
        }
    }
}

fn read_or_log(node: &TreeNode, item: &Item) -> Option<Vec<u8>> {
    match node.read() {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            tracing::warn!(path = %item.relative_path, %error, "failed to read entry");
            None
        }
    }
}

fn render_class(bytes: &[u8], verbose: bool, item: &Item) -> String {
    match disasm::class_to_text(bytes, verbose) {
        Ok(text) => text,
        Err(error) => {
            tracing::warn!(path = %item.relative_path, %error, "class disassembly failed, comparing raw text");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn report_match(ctx: &DiffContext, item: &Item, kind: FileKind, bytes: &[u8]) {
    ctx.reporter.report_match(item, kind);
    if ctx.settings.save_matched_contents {
        ctx.reporter.write_diff(
            item,
            "contents",
            String::from_utf8_lossy(bytes).into_owned(),
        );
    }
}

fn save_raw(ctx: &DiffContext, item: &Item, expected_txt: String, actual_txt: String) {
    ctx.reporter.write_diff(item, "a.expected.txt", expected_txt);
    ctx.reporter.write_diff(item, "b.actual.txt", actual_txt);
}

fn abort_note(reason: &DiffAborted) -> String {
    format!("{reason}. See the raw contents saved as .a.expected.txt and .b.actual.txt")
}
