#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `vtree` provides the virtual tree abstraction the distdiff comparator
//! walks. A [`TreeNode`] represents one named entry and behaves identically
//! whether it is backed by a real filesystem directory, a plain file, a
//! zip/jar archive, or an entry nested inside such an archive. Opening an
//! archive yields ordinary child nodes, so callers never special-case
//! container formats: any node for which [`TreeNode::can_open_container`]
//! holds is expanded into its members exactly like a directory.
//!
//! # Design
//!
//! - Filesystem children are enumerated with [`std::fs::read_dir`] and sorted
//!   lexicographically before being returned, keeping traversal order stable
//!   across platforms.
//! - Archives are opened lazily, only when a traversal actually reaches them.
//!   The central directory is indexed once per archive; member reads open a
//!   fresh archive handle, so concurrent leaf tasks can read members without
//!   sharing mutable state.
//! - Nested archives (a jar inside a zip) are expanded by loading the inner
//!   archive into memory and indexing it the same way.
//! - Intermediate directories that an archive never lists explicitly are
//!   synthesized from its member paths.
//!
//! # Invariants
//!
//! - [`TreeNode::children`] never yields two entries with the same name for
//!   one parent.
//! - Child enumeration is sorted by name and deterministic for a given tree.
//! - [`TreeNode::read`] only succeeds on leaf entries; containers report
//!   [`VtreeError::NotAFile`].
//!
//! # Errors
//!
//! All operations surface [`VtreeError`], which carries the offending path so
//! higher layers can log actionable diagnostics and degrade a single subtree
//! instead of aborting the run.
//!
//! # Examples
//!
//! ```
//! use vtree::TreeNode;
//! use std::fs;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = tempfile::tempdir()?;
//! fs::create_dir(temp.path().join("lib"))?;
//! fs::write(temp.path().join("lib/readme.txt"), b"hello")?;
//!
//! let root = TreeNode::fs(temp.path())?;
//! let children = root.children()?;
//! assert_eq!(children.len(), 1);
//! assert_eq!(children[0].name(), "lib");
//! assert!(children[0].is_container());
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

mod archive;
mod error;
mod node;

pub use error::VtreeError;
pub use node::TreeNode;

/// Archive extensions expanded as containers during traversal.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar"];

/// Returns `true` when a file with this extension is treated as an openable
/// archive container.
#[must_use]
pub fn is_archive_extension(ext: &str) -> bool {
    ARCHIVE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}
