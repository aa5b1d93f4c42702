//! Error kinds surfaced by the filesystem engine.
//!
//! Generalizes the teacher's bare `no_std` `Errno` enum (`ext/mod.rs`) into a
//! `std`-appropriate error type: this crate targets `std`, so the ambient-stack
//! rule calls for `thiserror` rather than a hand-rolled `Display` impl.

use thiserror::Error;

/// Everything a namespace or I/O operation can fail with.
#[derive(Debug, Error)]
pub enum FsError {
    /// Null, oversized, or malformed name; invalid offset; out-of-range id.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Lookup missed, chdir target doesn't exist, unlink of an absent entry.
    #[error("no such file or directory")]
    NotFound,
    /// create/link/rename/symlink where the destination already exists.
    #[error("file exists")]
    Exists,
    /// unlink of a directory that still holds entries other than "." and "..".
    #[error("directory not empty")]
    NotEmpty,
    /// Access check failed for the requested operation.
    #[error("permission denied")]
    PermissionDenied,
    /// No free block or no free inode left on the image.
    #[error("no space left on device")]
    NoSpace,
    /// e.g. write on a directory, hard-link on a directory, chdir on a file.
    #[error("wrong type of entry for this operation")]
    WrongType,
    /// A read or write against the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The image's superblock signature did not read back as "MONFSS".
    #[error("corrupt image: bad superblock signature")]
    CorruptImage,
    /// A file grew past what direct + single-indirect addressing can reach.
    #[error("file too large for this filesystem")]
    TooLarge,
}

pub type FsResult<T> = Result<T, FsError>;
