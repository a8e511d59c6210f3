//! Myers O(ND) edit-graph search with a cooperative comparison budget.
//!
//! The search mirrors the classic greedy algorithm: diagonal furthest-reach
//! nodes are kept as a backward-linked path, and the revision is rebuilt by
//! walking the winning path from the end. Every line-equality test charges
//! the budget; overrunning it aborts the whole computation so a pathological
//! pair cannot pin a compute worker.

use std::rc::Rc;

use crate::error::DiffAborted;
use crate::{Chunk, Delta, DeltaKind};

struct PathNode {
    i: isize,
    j: isize,
    snake: bool,
    prev: Option<Rc<PathNode>>,
}

impl PathNode {
    fn bootstrap(&self) -> bool {
        self.i < 0 || self.j < 0
    }
}

/// Nearest ancestor of `node` that is a snake (or `node` itself).
fn previous_snake(node: &Rc<PathNode>) -> Option<Rc<PathNode>> {
    if node.bootstrap() {
        return None;
    }
    if !node.snake {
        if let Some(prev) = &node.prev {
            return previous_snake(prev);
        }
    }
    Some(Rc::clone(node))
}

fn diff_node(i: isize, j: isize, prev: Option<&Rc<PathNode>>) -> Rc<PathNode> {
    let prev = if i < 0 || j < 0 {
        None
    } else {
        prev.and_then(previous_snake)
    };
    Rc::new(PathNode {
        i,
        j,
        snake: false,
        prev,
    })
}

fn snake_node(i: isize, j: isize, prev: Option<Rc<PathNode>>) -> Rc<PathNode> {
    Rc::new(PathNode {
        i,
        j,
        snake: true,
        prev,
    })
}

pub(crate) fn diff<'a>(
    original: &[&'a str],
    revised: &[&'a str],
    max_comparisons: u64,
) -> Result<Vec<Delta<'a>>, DiffAborted> {
    let path = build_path(original, revised, max_comparisons)?;
    Ok(build_revision(&path, original, revised))
}

fn build_path(
    original: &[&str],
    revised: &[&str],
    max_comparisons: u64,
) -> Result<Rc<PathNode>, DiffAborted> {
    let n = original.len() as isize;
    let m = revised.len() as isize;
    let max = n + m + 1;
    let size = (1 + 2 * max) as usize;
    let middle = size / 2;

    let mut comparisons: u64 = 0;
    let mut diagonal: Vec<Option<Rc<PathNode>>> = vec![None; size];
    diagonal[middle + 1] = Some(snake_node(0, -1, None));

    for d in 0..max {
        let mut k = -d;
        while k <= d {
            let kmiddle = (middle as isize + k) as usize;
            let kplus = kmiddle + 1;
            let kminus = kmiddle - 1;

            let down = k == -d
                || (k != d && {
                    let minus = diagonal[kminus].as_ref().map_or(isize::MIN, |node| node.i);
                    let plus = diagonal[kplus].as_ref().map_or(isize::MIN, |node| node.i);
                    minus < plus
                });

            let (mut i, prev) = if down {
                let prev = diagonal[kplus].clone();
                (prev.as_ref().map_or(0, |node| node.i), prev)
            } else {
                let prev = diagonal[kminus].clone();
                (prev.as_ref().map_or(0, |node| node.i) + 1, prev)
            };

            diagonal[kminus] = None;

            let mut j = i - k;
            let mut node = diff_node(i, j, prev.as_ref());

            while i < n && j < m {
                comparisons += 1;
                if comparisons > max_comparisons {
                    return Err(DiffAborted::TooManyComparisons { comparisons });
                }
                if original[i as usize] != revised[j as usize] {
                    break;
                }
                i += 1;
                j += 1;
            }
            if i > node.i {
                node = snake_node(i, j, Some(node));
            }

            let done = i >= n && j >= m;
            diagonal[kmiddle] = Some(Rc::clone(&node));
            if done {
                return Ok(node);
            }

            k += 2;
        }
        diagonal[(middle as isize + d - 1) as usize] = None;
    }

    // The furthest-reaching path always crosses (n, m) within n + m + 1
    // iterations.
    unreachable!("edit-graph search did not terminate")
}

fn build_revision<'a>(
    path: &Rc<PathNode>,
    original: &[&'a str],
    revised: &[&'a str],
) -> Vec<Delta<'a>> {
    let mut deltas = Vec::new();
    let mut current = if path.snake {
        path.prev.clone()
    } else {
        Some(Rc::clone(path))
    };

    while let Some(node) = current {
        let Some(prev) = node.prev.clone() else {
            break;
        };
        if prev.j < 0 {
            break;
        }

        let i = node.i as usize;
        let j = node.j as usize;
        let ianchor = prev.i as usize;
        let janchor = prev.j as usize;

        let original_chunk = Chunk {
            position: ianchor,
            lines: original[ianchor..i].to_vec(),
        };
        let revised_chunk = Chunk {
            position: janchor,
            lines: revised[janchor..j].to_vec(),
        };

        let kind = if original_chunk.lines.is_empty() {
            DeltaKind::Insert
        } else if revised_chunk.lines.is_empty() {
            DeltaKind::Delete
        } else {
            DeltaKind::Change
        };

        deltas.push(Delta {
            kind,
            original: original_chunk,
            revised: revised_chunk,
        });

        current = if prev.snake { prev.prev.clone() } else { Some(prev) };
    }

    deltas.reverse();
    deltas
}
