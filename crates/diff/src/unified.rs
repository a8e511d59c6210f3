//! Unified-diff rendering with hunk merging and output truncation.

use crate::{Delta, Patch};

/// Renders a patch as unified-diff lines with `context` lines of context
/// around each hunk. Deltas whose context windows touch are merged into one
/// hunk, matching the conventional unified format.
#[must_use]
pub fn unified(
    original_name: &str,
    revised_name: &str,
    original: &[&str],
    patch: &Patch<'_>,
    context: usize,
) -> Vec<String> {
    let mut out = vec![format!("--- {original_name}"), format!("+++ {revised_name}")];
    if patch.deltas.is_empty() {
        return out;
    }

    let mut group: Vec<&Delta<'_>> = Vec::new();
    for delta in &patch.deltas {
        if let Some(last) = group.last() {
            if delta.original.position - last.original.end() <= 2 * context {
                group.push(delta);
            } else {
                render_hunk(&mut out, original, &group, context);
                group = vec![delta];
            }
        } else {
            group.push(delta);
        }
    }
    render_hunk(&mut out, original, &group, context);

    out
}

fn render_hunk(out: &mut Vec<String>, original: &[&str], deltas: &[&Delta<'_>], context: usize) {
    let first = deltas[0];
    let last = deltas[deltas.len() - 1];

    let orig_start = first.original.position.saturating_sub(context);
    let orig_end = original.len().min(last.original.end() + context);
    let rev_start = first
        .revised
        .position
        .saturating_sub(first.original.position - orig_start);

    let mut body = Vec::new();
    let mut orig_count = 0usize;
    let mut rev_count = 0usize;
    let mut position = orig_start;

    for delta in deltas {
        for line in &original[position..delta.original.position] {
            body.push(format!(" {line}"));
            orig_count += 1;
            rev_count += 1;
        }
        for line in &delta.original.lines {
            body.push(format!("-{line}"));
            orig_count += 1;
        }
        for line in &delta.revised.lines {
            body.push(format!("+{line}"));
            rev_count += 1;
        }
        position = delta.original.end();
    }

    for line in &original[position..orig_end] {
        body.push(format!(" {line}"));
        orig_count += 1;
        rev_count += 1;
    }

    out.push(format!(
        "@@ -{},{orig_count} +{},{rev_count} @@",
        orig_start + 1,
        rev_start + 1
    ));
    out.append(&mut body);
}

/// Caps rendered output at `limit` lines, replacing the remainder with an
/// `And N more...` footer.
#[must_use]
pub fn truncate(mut lines: Vec<String>, limit: usize) -> Vec<String> {
    if lines.len() > limit {
        let more = lines.len() - limit;
        lines.truncate(limit);
        lines.push(format!("And {more} more..."));
    }
    lines
}
