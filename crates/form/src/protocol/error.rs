use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while a form is being assembled.
///
/// These are synchronous: `add_field` / `add_file` return them directly and
/// the form stays usable afterwards, so a caller may retry with a corrected
/// path or name.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("file provided has no content: {}", path.display())]
    EmptyFile { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid part name: {reason}")]
    InvalidPartName { reason: String },

    #[error("invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl FormError {
    pub fn empty_file(path: impl Into<PathBuf>) -> Self {
        Self::EmptyFile { path: path.into() }
    }

    pub fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileUnreadable { path: path.into(), source }
    }

    pub fn invalid_part_name<S: ToString>(reason: S) -> Self {
        Self::InvalidPartName { reason: reason.to_string() }
    }

    pub fn invalid_boundary<S: ToString>(reason: S) -> Self {
        Self::InvalidBoundary { reason: reason.to_string() }
    }
}

/// Errors surfaced to the consumer of a finalized payload stream.
///
/// A file that was valid at registration time may have vanished or become
/// unreadable by the time the payload is streamed; the failing read surfaces
/// here and the stream ends.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to stream {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StreamError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read { path: path.into(), source }
    }
}
