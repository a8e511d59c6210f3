//! Archive indexing and member access.
//!
//! The central directory of an archive is read once into a [`ZipIndex`];
//! member reads open a fresh handle over the backing file or in-memory bytes
//! so no mutable archive state is shared between worker threads.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;

use zip::ZipArchive;

use crate::error::VtreeError;

/// Cheaply cloneable byte buffer backing an in-memory (nested) archive.
#[derive(Clone)]
struct ArcBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for ArcBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

enum ArchiveSource {
    File(PathBuf),
    Bytes(ArcBytes),
}

#[derive(Clone, Copy)]
struct FileEntry {
    index: usize,
    size: u64,
}

/// Name tree derived from an archive's central directory.
///
/// Intermediate directories are synthesized from member paths because jar
/// writers frequently omit explicit directory entries.
struct ZipIndex {
    children: HashMap<String, BTreeMap<String, bool>>,
    files: HashMap<String, FileEntry>,
}

impl ZipIndex {
    fn build<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Self, zip::result::ZipError> {
        let mut index = Self {
            children: HashMap::new(),
            files: HashMap::new(),
        };

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let is_dir = entry.is_dir();
            let size = entry.size();
            let path = entry.name().trim_matches('/').to_string();
            drop(entry);

            if path.is_empty() {
                continue;
            }

            index.register(&path, is_dir);
            if !is_dir {
                index.files.insert(path, FileEntry { index: i, size });
            }
        }

        Ok(index)
    }

    fn register(&mut self, path: &str, is_dir: bool) {
        let mut parent = String::new();
        let mut segments = path.split('/').peekable();

        while let Some(segment) = segments.next() {
            let last = segments.peek().is_none();
            let entry_is_dir = !last || is_dir;
            let names = self.children.entry(parent.clone()).or_default();
            // An explicit directory entry may arrive after a deeper member
            // already synthesized it; never downgrade a directory to a file.
            let flag = names.entry(segment.to_string()).or_insert(entry_is_dir);
            *flag = *flag || entry_is_dir;

            if !parent.is_empty() {
                parent.push('/');
            }
            parent.push_str(segment);
        }
    }
}

/// One opened archive: its backing source, display location, and name index.
pub(crate) struct ArchiveHandle {
    location: String,
    source: ArchiveSource,
    index: ZipIndex,
}

impl ArchiveHandle {
    /// Indexes an archive backed by a file on disk.
    pub(crate) fn from_file(path: PathBuf) -> Result<Arc<Self>, VtreeError> {
        let location = path.display().to_string();
        let file = File::open(&path).map_err(|error| VtreeError::io(&path, error))?;
        let mut archive =
            ZipArchive::new(file).map_err(|error| VtreeError::archive(location.as_str(), error))?;
        let index = ZipIndex::build(&mut archive)
            .map_err(|error| VtreeError::archive(location.as_str(), error))?;
        Ok(Arc::new(Self {
            location,
            source: ArchiveSource::File(path),
            index,
        }))
    }

    /// Indexes a nested archive whose bytes were extracted from an enclosing
    /// container.
    pub(crate) fn from_bytes(bytes: Vec<u8>, location: String) -> Result<Arc<Self>, VtreeError> {
        let bytes = ArcBytes(Arc::new(bytes));
        let cursor = Cursor::new(bytes.clone());
        let mut archive =
            ZipArchive::new(cursor).map_err(|error| VtreeError::archive(location.as_str(), error))?;
        let index = ZipIndex::build(&mut archive)
            .map_err(|error| VtreeError::archive(location.as_str(), error))?;
        Ok(Arc::new(Self {
            location,
            source: ArchiveSource::Bytes(bytes),
            index,
        }))
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    /// Children of a member directory; `""` addresses the archive root.
    pub(crate) fn children_of(&self, dir: &str) -> Option<&BTreeMap<String, bool>> {
        self.index.children.get(dir)
    }

    pub(crate) fn member_size(&self, member: &str) -> Option<u64> {
        self.index.files.get(member).map(|entry| entry.size)
    }

    /// Reads one member's uncompressed bytes through a fresh archive handle.
    pub(crate) fn read_member(&self, member: &str) -> Result<Vec<u8>, VtreeError> {
        let location = format!("{}!/{member}", self.location);
        let entry = self
            .index
            .files
            .get(member)
            .ok_or_else(|| VtreeError::MemberMissing {
                location: location.clone(),
            })?;

        let mut archive = self.open()?;
        let mut file = archive
            .by_index(entry.index)
            .map_err(|error| VtreeError::archive(location.as_str(), error))?;
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size).unwrap_or(0));
        file.read_to_end(&mut bytes)
            .map_err(|error| VtreeError::io(&self.location, error))?;
        Ok(bytes)
    }

    fn open(&self) -> Result<ZipArchive<Box<dyn ReadSeek>>, VtreeError> {
        let reader: Box<dyn ReadSeek> = match &self.source {
            ArchiveSource::File(path) => {
                Box::new(File::open(path).map_err(|error| VtreeError::io(path, error))?)
            }
            ArchiveSource::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
        };
        ZipArchive::new(reader).map_err(|error| VtreeError::archive(self.location.as_str(), error))
    }
}
