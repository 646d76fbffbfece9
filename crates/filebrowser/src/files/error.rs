//! Error taxonomy shared by the resolver, sanitizer, lister and operations.

use std::io;

use protocol::ErrorCode;
use thiserror::Error;

/// Result type for file browser operations.
pub type Result<T> = std::result::Result<T, FilesError>;

/// Errors that can occur while browsing or mutating the media directory.
///
/// Paths carried by the variants are relative to the browser root so they
/// can be shown to users without leaking the server layout.
#[derive(Debug, Error)]
pub enum FilesError {
    /// The requested path escapes the root directory.
    #[error("path is outside the root directory: {0}")]
    OutOfBounds(String),

    /// The requested path or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The name fails sanitization.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// An entry with that name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The filesystem refused the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Upload larger than the configured limit.
    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },

    /// Extension or content is not allowed.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// Folder still has entries.
    #[error("folder is not empty: {0}")]
    NotEmpty(String),

    /// A pre-operation hook refused the operation.
    #[error("operation rejected by hook {hook}: {reason}")]
    Vetoed { hook: String, reason: String },

    /// Any other I/O failure.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FilesError {
    /// Translate an I/O error raised while touching `path`.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => FilesError::NotFound(path),
            io::ErrorKind::PermissionDenied => FilesError::PermissionDenied(path),
            io::ErrorKind::AlreadyExists => FilesError::AlreadyExists(path),
            _ => FilesError::Io { path, source: err },
        }
    }

    /// Error code reported to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            FilesError::OutOfBounds(_) => ErrorCode::OutOfBounds,
            FilesError::NotFound(_) => ErrorCode::NotFound,
            FilesError::InvalidName(_) => ErrorCode::InvalidName,
            FilesError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            FilesError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            FilesError::SizeExceeded { .. } => ErrorCode::SizeExceeded,
            FilesError::UnsupportedType(_) => ErrorCode::UnsupportedType,
            FilesError::NotEmpty(_) => ErrorCode::NotEmpty,
            FilesError::Vetoed { .. } => ErrorCode::Vetoed,
            FilesError::Io { .. } => ErrorCode::Io,
        }
    }
}
