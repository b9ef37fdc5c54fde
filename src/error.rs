//! Error types for newc archive encoding, decoding and extraction.

use std::path::PathBuf;

use thiserror::Error;

use crate::header::HeaderError;

/// Errors that can occur while reading, writing, packing or unpacking an archive.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying byte source, sink or filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header failed to decode (bad magic, non-hex digit, zero namesize).
    #[error("format error: {0}")]
    Format(#[from] HeaderError),

    /// The stream ended in the middle of a header, name or data block.
    #[error("archive truncated at position {pos}")]
    Truncated {
        /// Position in the stream where the short read began.
        pos: u64,
    },

    /// A name handed to the writer could not be normalized into a relative archive path.
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName {
        /// The name as supplied by the caller.
        name: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// An archive entry would be extracted outside the destination directory.
    #[error("entry {name:?} escapes the destination directory")]
    PathTraversal {
        /// The name as stored in the archive.
        name: String,
    },

    /// The reader already failed on an earlier entry and cannot continue.
    #[error("reader failed earlier on the entry at position {pos}")]
    ReaderFailed {
        /// Position of the header of the entry that failed.
        pos: u64,
    },

    /// An entry was added after the trailer was written.
    #[error("writer already closed")]
    WriterClosed,

    /// The packer found something that is neither a directory nor a regular file.
    #[error("unsupported file type {kind} at {}", path.display())]
    UnsupportedEntryType {
        /// Path of the offending filesystem object.
        path: PathBuf,
        /// Human readable file type.
        kind: &'static str,
    },

    /// The name field of an entry is not valid UTF-8.
    #[error("entry name at position {pos} is not valid UTF-8")]
    NonUtf8Name {
        /// Position of the name field in the stream.
        pos: u64,
    },

    /// The namesize field exceeds the configured limit.
    #[error("name size exceeds limit: {size} bytes > {limit} bytes")]
    NameTooLong {
        /// Declared namesize (including the terminating NUL).
        size: u32,
        /// Configured limit.
        limit: u32,
    },

    /// The filesize field exceeds the configured limit.
    #[error("file size exceeds limit: {size} bytes > {limit} bytes")]
    FileTooLarge {
        /// Declared filesize.
        size: u32,
        /// Configured limit.
        limit: u32,
    },
}

impl From<rustix::io::Errno> for Error {
    fn from(errno: rustix::io::Errno) -> Self {
        Error::Io(errno.into())
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
