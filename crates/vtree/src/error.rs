use std::io;
use std::path::PathBuf;

/// Error raised while enumerating or reading virtual tree nodes.
#[derive(Debug, thiserror::Error)]
pub enum VtreeError {
    /// Filesystem metadata or content could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An archive could not be opened or one of its members decoded.
    #[error("archive error at {location}: {source}")]
    Archive {
        /// Display location of the archive or member.
        location: String,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// A member listed in the archive index vanished on re-open.
    #[error("archive member missing: {location}")]
    MemberMissing {
        /// Display location of the missing member.
        location: String,
    },

    /// `children` was called on a node that is not a container.
    #[error("not a container: {location}")]
    NotAContainer {
        /// Display location of the node.
        location: String,
    },

    /// `read` or `size` was called on a container node.
    #[error("not a file: {location}")]
    NotAFile {
        /// Display location of the node.
        location: String,
    },
}

impl VtreeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(location: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            location: location.into(),
            source,
        }
    }
}
