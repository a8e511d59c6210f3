//! The flat item model and extension-based classification.

use serde::Serialize;

/// Textual extensions compared line-by-line rather than byte-by-byte.
pub const TEXT_FILE_TYPES: &[&str] = &[
    "txt",
    "bat",
    "mf",
    "kt",
    "java",
    "html",
    "template",
    "dtd",
    "properties",
    "xml",
];

/// How a compared entry's content is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    /// Compiled class file, compared through its disassembled rendering.
    Class,
    /// Plain text, compared line-by-line.
    Text,
    /// Opaque binary, compared by size and bytes only.
    Bin,
    /// Structural node (directory or archive boundary).
    Dir,
}

/// The terminal classification of one compared item.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    /// Content identical on both sides.
    Matched,
    /// Present in expected, absent in actual.
    Missed,
    /// Present in actual, absent in expected.
    Unexpected,
    /// Present in both with differing content, first occurrence.
    Mismatched,
    /// Differing content whose (expected, actual) pair was already reported
    /// elsewhere.
    Copy,
}

/// Heuristic for generated or obfuscated names: an extension is ambiguous
/// when it is empty or mixes upper and lower case, and the item is then
/// treated as extensionless.
#[must_use]
pub fn is_ambiguous_extension(ext: &str) -> bool {
    ext.trim().is_empty()
        || (ext.chars().any(char::is_uppercase) && ext.chars().any(char::is_lowercase))
}

/// Derives the comparison kind for a leaf from its extension.
#[must_use]
pub fn leaf_kind(extension: &str, no_extension: bool) -> FileKind {
    let lowered = extension.to_ascii_lowercase();
    if lowered == "class" {
        FileKind::Class
    } else if no_extension || TEXT_FILE_TYPES.contains(&lowered.as_str()) {
        FileKind::Text
    } else {
        FileKind::Bin
    }
}

/// One compared entity: a leaf file or a directory/archive boundary.
///
/// Items are flat values; paths are reconstructed purely from strings and no
/// parent or child references are retained.
#[derive(Clone, Debug)]
pub struct Item {
    /// Process-unique id, monotonically assigned at creation.
    pub id: u64,
    /// Slash-separated path from the comparison root.
    pub relative_path: String,
    /// Whether the extension was ambiguous and discarded.
    pub no_extension: bool,
    /// The effective extension (empty when ambiguous).
    pub extension: String,
    /// Number of diff hunks, set once a mismatch has been diffed.
    pub diffs: u32,
    /// Delta-digest ids carried by the reported diff record.
    pub deltas: Vec<u32>,
}

impl Item {
    /// Creates an item for a path and raw extension.
    #[must_use]
    pub fn new(id: u64, relative_path: impl Into<String>, ext: &str) -> Self {
        let no_extension = is_ambiguous_extension(ext);
        Self {
            id,
            relative_path: relative_path.into(),
            no_extension,
            extension: if no_extension { String::new() } else { ext.to_string() },
            diffs: 0,
            deltas: Vec::new(),
        }
    }

    /// The root item of a comparison run.
    #[must_use]
    pub fn root() -> Self {
        Self::new(0, "", "")
    }

    /// Creates a child item below this one.
    #[must_use]
    pub fn child(&self, id: u64, name: &str, ext: &str) -> Self {
        let path = if self.relative_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.relative_path)
        };
        Self::new(id, path, ext)
    }

    /// The comparison kind of this item when treated as a leaf.
    #[must_use]
    pub fn kind(&self) -> FileKind {
        leaf_kind(&self.extension, self.no_extension)
    }

    /// The item's base name (last path segment).
    #[must_use]
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// The record written to the report stream, one per terminal item.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Item id.
    pub id: u64,
    /// Slash-separated path from the comparison root.
    pub relative_path: String,
    /// Whether the extension was ambiguous.
    pub no_extension: bool,
    /// The effective extension.
    pub extension: String,
    /// Terminal status.
    pub status: FileStatus,
    /// Content kind.
    pub kind: FileKind,
    /// Reserved for report-side filtering.
    pub suppressed: bool,
    /// Diff hunk count (mismatches only).
    pub diffs: u32,
    /// Delta-digest ids (mismatches only).
    pub deltas: Vec<u32>,
}

impl FileInfo {
    /// Builds the report record for an item's terminal decision.
    #[must_use]
    pub fn new(item: &Item, status: FileStatus, kind: FileKind) -> Self {
        Self {
            id: item.id,
            relative_path: item.relative_path.clone(),
            no_extension: item.no_extension,
            extension: item.extension.clone(),
            status,
            kind,
            suppressed: false,
            diffs: item.diffs,
            deltas: item.deltas.clone(),
        }
    }
}
