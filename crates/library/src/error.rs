use bucket::BucketError;
use codec::CodecError;
use config::ConfigError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classes of [`LibraryError`], for callers that only need to know
/// whether to fix their input, give up on the file, or retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments: names that do not fit, duplicates, unknown playlists.
    Validation,
    /// The file's structure is inconsistent.
    Corruption,
    /// The OS refused a file or mapping operation.
    Resource,
    /// The handle is not in a state that allows the operation.
    State,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("{} is not a media library", .0.display())]
    NotALibrary(PathBuf),

    #[error("corrupt library: {0}")]
    Corrupt(String),

    #[error("invalid {field}: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("library would exceed the 4 GiB addressing limit")]
    TooLarge,

    #[error("a library named `{0}` is already open")]
    AlreadyOpen(String),

    #[error("playlist `{0}` already exists")]
    PlaylistExists(String),

    #[error("playlist `{0}` not found")]
    PlaylistNotFound(String),

    #[error("`{0}` is already in the playlist")]
    PathExists(String),

    #[error(transparent)]
    Bucket(BucketError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("library is closed")]
    Closed,

    #[error("library is not mapped; a previous resize failed")]
    Unmapped,

    #[error("library lock poisoned")]
    LockPoisoned,
}

impl LibraryError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::Io(_) | LibraryError::TooLarge => ErrorKind::Resource,
            LibraryError::NotALibrary(_) | LibraryError::Corrupt(_) => ErrorKind::Corruption,
            LibraryError::InvalidField { .. }
            | LibraryError::InvalidArgument(_)
            | LibraryError::PlaylistExists(_)
            | LibraryError::PlaylistNotFound(_)
            | LibraryError::PathExists(_)
            | LibraryError::Config(_) => ErrorKind::Validation,
            LibraryError::AlreadyOpen(_)
            | LibraryError::Closed
            | LibraryError::Unmapped
            | LibraryError::LockPoisoned => ErrorKind::State,
            LibraryError::Bucket(e) => match e {
                BucketError::Corrupt(_) => ErrorKind::Corruption,
                BucketError::Grow(_) | BucketError::Overflow => ErrorKind::Resource,
                BucketError::TooSmall { .. }
                | BucketError::Duplicate
                | BucketError::InteriorNul
                | BucketError::ZeroQuantum => ErrorKind::Validation,
            },
        }
    }
}

/// Unwraps the bucket errors that have a direct library equivalent.
impl From<BucketError> for LibraryError {
    fn from(e: BucketError) -> Self {
        match e {
            BucketError::Corrupt(msg) => LibraryError::Corrupt(msg),
            BucketError::Grow(io) => LibraryError::Io(io),
            BucketError::Overflow => LibraryError::TooLarge,
            other => LibraryError::Bucket(other),
        }
    }
}

/// Converts a library error into an [`io::Error`] for the bucket growth seam.
pub(crate) fn into_io(e: LibraryError) -> io::Error {
    match e {
        LibraryError::Io(io) => io,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
