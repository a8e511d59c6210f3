use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::ArchiveHandle;
use crate::error::VtreeError;
use crate::is_archive_extension;

/// One entry in the virtual tree: a directory, a plain file, or an archive
/// member at any nesting depth.
///
/// Nodes are flat values carrying no parent or child references; the
/// comparator reconstructs paths purely from strings.
pub struct TreeNode {
    name: String,
    backing: Backing,
}

enum Backing {
    FsDir(PathBuf),
    FsFile(PathBuf),
    Member {
        archive: Arc<ArchiveHandle>,
        path: String,
        is_dir: bool,
    },
}

impl TreeNode {
    /// Creates a node for a filesystem path (the comparison roots use this).
    pub fn fs(path: impl Into<PathBuf>) -> Result<Self, VtreeError> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|error| VtreeError::io(&path, error))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let backing = if metadata.is_dir() {
            Backing::FsDir(path)
        } else {
            Backing::FsFile(path)
        };
        Ok(Self { name, backing })
    }

    /// The entry's base name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The text after the last `.` of the name, or `""` when there is none.
    #[must_use]
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "",
        }
    }

    /// A human-readable location for diagnostics and diff headers. Archive
    /// members render as `archive!/member/path`.
    #[must_use]
    pub fn location(&self) -> String {
        match &self.backing {
            Backing::FsDir(path) | Backing::FsFile(path) => path.display().to_string(),
            Backing::Member { archive, path, .. } => format!("{}!/{path}", archive.location()),
        }
    }

    /// `true` for directories, both on the filesystem and inside archives.
    #[must_use]
    pub fn is_container(&self) -> bool {
        match &self.backing {
            Backing::FsDir(_) => true,
            Backing::FsFile(_) => false,
            Backing::Member { is_dir, .. } => *is_dir,
        }
    }

    /// `true` when [`TreeNode::children`] can expand this node: directories
    /// and leaf files whose extension names a recognized archive format.
    #[must_use]
    pub fn can_open_container(&self) -> bool {
        self.is_container() || is_archive_extension(self.extension())
    }

    /// Enumerates the node's children, sorted by name.
    ///
    /// For archive files this lazily opens and indexes the archive; for
    /// nested archives the inner container is loaded into memory first.
    pub fn children(&self) -> Result<Vec<Self>, VtreeError> {
        match &self.backing {
            Backing::FsDir(path) => fs_children(path),
            Backing::FsFile(path) => {
                if !is_archive_extension(self.extension()) {
                    return Err(VtreeError::NotAContainer {
                        location: self.location(),
                    });
                }
                let archive = ArchiveHandle::from_file(path.clone())?;
                Ok(member_children(&archive, ""))
            }
            Backing::Member {
                archive,
                path,
                is_dir,
            } => {
                if *is_dir {
                    Ok(member_children(archive, path))
                } else if is_archive_extension(self.extension()) {
                    let bytes = archive.read_member(path)?;
                    let nested = ArchiveHandle::from_bytes(bytes, self.location())?;
                    Ok(member_children(&nested, ""))
                } else {
                    Err(VtreeError::NotAContainer {
                        location: self.location(),
                    })
                }
            }
        }
    }

    /// Reads the full content of a leaf entry.
    pub fn read(&self) -> Result<Vec<u8>, VtreeError> {
        match &self.backing {
            Backing::FsFile(path) => fs::read(path).map_err(|error| VtreeError::io(path, error)),
            Backing::Member {
                archive,
                path,
                is_dir: false,
            } => archive.read_member(path),
            _ => Err(VtreeError::NotAFile {
                location: self.location(),
            }),
        }
    }

    /// Uncompressed size of a leaf entry, without reading its content.
    pub fn size(&self) -> Result<u64, VtreeError> {
        match &self.backing {
            Backing::FsFile(path) => fs::metadata(path)
                .map(|metadata| metadata.len())
                .map_err(|error| VtreeError::io(path, error)),
            Backing::Member {
                archive,
                path,
                is_dir: false,
            } => archive
                .member_size(path)
                .ok_or_else(|| VtreeError::MemberMissing {
                    location: self.location(),
                }),
            _ => Err(VtreeError::NotAFile {
                location: self.location(),
            }),
        }
    }
}

fn fs_children(dir: &Path) -> Result<Vec<TreeNode>, VtreeError> {
    let read_dir = fs::read_dir(dir).map_err(|error| VtreeError::io(dir, error))?;
    let mut children = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(|error| VtreeError::io(dir, error))?;
        let file_type = entry
            .file_type()
            .map_err(|error| VtreeError::io(entry.path(), error))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let backing = if file_type.is_dir() {
            Backing::FsDir(entry.path())
        } else {
            Backing::FsFile(entry.path())
        };
        children.push(TreeNode { name, backing });
    }

    children.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(children)
}

fn member_children(archive: &Arc<ArchiveHandle>, dir: &str) -> Vec<TreeNode> {
    let Some(names) = archive.children_of(dir) else {
        return Vec::new();
    };

    names
        .iter()
        .map(|(name, is_dir)| {
            let path = if dir.is_empty() {
                name.clone()
            } else {
                format!("{dir}/{name}")
            };
            TreeNode {
                name: name.clone(),
                backing: Backing::Member {
                    archive: Arc::clone(archive),
                    path,
                    is_dir: *is_dir,
                },
            }
        })
        .collect()
}
