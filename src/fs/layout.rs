//! On-disk layout constants for the MONFSS image format.
//!
//! Mirrors the teacher's `ext2_parser`-style fixed-parameter header, but flattened:
//! this filesystem has no block groups, so every constant below is global rather
//! than per-group.

/// Total size of the backing file, in bytes.
pub const PARTITION_SIZE: u64 = 10_485_760;
/// Size of one block, in bytes.
pub const BLOCK_SIZE: u32 = 4096;
/// Total number of blocks addressable on the image.
pub const BLOCK_COUNT: u32 = 2560;
/// Total number of inode slots.
pub const INODE_COUNT: u32 = 256;
/// Bitmap size in bytes: ceil(BLOCK_COUNT / 8).
pub const BITMAP_SIZE: usize = (BLOCK_COUNT as usize + 7) / 8;
/// Longest a name may be, in bytes, before general name validation rejects it.
pub const MAX_NAME_LEN: usize = 255;
/// Number of directory entries held in a directory's single data block.
pub const MAX_DIR_ENTRIES: usize = 128;
/// Number of direct block pointers stored inline in an inode.
pub const DIRECT_POINTERS: usize = 10;
/// Number of block ids stored in one indirect block (BLOCK_SIZE / 4).
pub const INDIRECT_POINTERS: usize = (BLOCK_SIZE / 4) as usize;
/// Inode id of the filesystem root directory.
pub const ROOT_INODE_ID: u32 = 0;
/// Sentinel meaning "no block" / "no pointer" / "hole".
pub const NO_BLOCK: u32 = 0;

/// Largest byte size a regular file may reach: ten direct blocks plus one
/// single-indirect block's worth of data.
pub const MAX_FILE_SIZE: u64 =
    (DIRECT_POINTERS as u64 + INDIRECT_POINTERS as u64) * BLOCK_SIZE as u64;

/// Characters forbidden in a path component, per the shell's name validation rule.
pub const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Bytes budgeted for one directory entry's name field on disk, NUL included.
///
/// `MAX_NAME_LEN` (255) is the ceiling general name validation enforces for every
/// namespace operation. A directory, however, is a fixed `MAX_DIR_ENTRIES`-slot
/// array packed into exactly one `BLOCK_SIZE` block (the data model is explicit
/// about both numbers), so each entry's on-disk footprint is capped at
/// `BLOCK_SIZE / MAX_DIR_ENTRIES` = 32 bytes: 28 for the name, 4 for the inode id.
/// `insert` enforces this narrower, storage-derived bound in addition to the
/// general one.
pub const DIR_ENTRY_NAME_CAP: usize = 28;

/// On-disk size of one directory entry: name field plus a u32 inode id.
pub const DIR_ENTRY_SIZE: usize = DIR_ENTRY_NAME_CAP + 4;

/// Bytes budgeted for an inode's display-only name field (`Inode::display_name`).
/// Unlike `DIR_ENTRY_NAME_CAP` this isn't constrained to fit inside one block
/// alongside 127 siblings, so it can use the full general name-length ceiling.
pub const INODE_DISPLAY_NAME_CAP: usize = MAX_NAME_LEN + 1;

const _: () = assert!(DIR_ENTRY_SIZE * MAX_DIR_ENTRIES == BLOCK_SIZE as usize);

use crate::fs::error::{FsError, FsResult};

/// General name-length validation shared by directory insertion and every
/// namespace operation that takes a name argument (§4.4, §4.7).
pub fn validate_name_len(name: &str) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument("name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::InvalidArgument("name too long"));
    }
    Ok(())
}
