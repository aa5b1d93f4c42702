//! A small UNIX-flavored filesystem that lives entirely inside one host file.
//!
//! The image is a fixed 2560-block partition: a superblock, a packed inode
//! table, and a block bitmap at the head, followed by the data blocks
//! themselves. Files are addressed through ten direct block pointers plus
//! one single-indirect block, directories are a fixed 128-entry array
//! packed into a single block, and every operation runs against an explicit
//! [`fs::filesystem::Filesystem`] value rather than any process-wide state.
//!
//! This crate covers:
//!
//! - **initialize / load / save / backup / restore** — bringing an image up
//!   and keeping it durable on disk.
//! - **create / unlink / rename / copy / list** — the namespace.
//! - **read / write** — block-mapped file I/O, including symlink resolution.
//! - **chmod / link / symlink** — permissions and the two kinds of link.
//! - **defragment** — repacking live blocks to close the holes unlinks leave.
//!
//! The `monfs-shell` binary built alongside this library is a thin
//! interactive front end; none of its parsing or formatting lives here.

pub mod fs;

pub use fs::access::Identity;
pub use fs::error::{FsError, FsResult};
pub use fs::filesystem::Filesystem;
pub use fs::inode::{Access, Inode, InodeKind};
pub use fs::namespace::ListEntry;
