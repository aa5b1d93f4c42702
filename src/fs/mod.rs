//! The filesystem engine: on-disk layout, allocation, inodes, directories,
//! access control, file I/O, namespace operations, persistence, and
//! defragmentation.

pub mod access;
pub mod bitmap;
pub mod defrag;
pub mod directory;
pub mod error;
pub mod file_io;
pub mod filesystem;
pub mod image;
pub mod inode;
pub mod layout;
pub mod namespace;
pub mod persistence;
pub mod rawbytes;
pub mod superblock;
