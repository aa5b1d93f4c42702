//! Superblock: the filesystem-wide header record (§3).
//!
//! Grounded on the teacher's `ext/inner/header/superblock.rs` shape (a
//! `#[repr(C)]`, `Copy` record holding the signature and block/inode counts)
//! but flattened to the single global record this filesystem uses — no
//! block-group table follows it, just the inode array (§6).

use crate::fs::error::{FsError, FsResult};
use crate::fs::layout::{BLOCK_COUNT, BLOCK_SIZE, INODE_COUNT, PARTITION_SIZE};

pub const SIGNATURE: &[u8; 8] = b"MONFSS\0\0";

#[repr(C)]
#[derive(Clone, Copy)]
pub struct Superblock {
    pub signature: [u8; 8],
    pub root_inode: u32,
    pub last_modified: i64,
    pub integrity_flag: u32,
    pub partition_size: u64,
    pub block_count: u32,
    pub inode_count: u32,
    pub block_size: u32,
    pub free_blocks: u32,
    pub free_inodes: u32,
}

impl Superblock {
    pub fn fresh(now: i64) -> Self {
        Self {
            signature: *SIGNATURE,
            root_inode: 0,
            last_modified: now,
            integrity_flag: 0,
            partition_size: PARTITION_SIZE,
            block_count: BLOCK_COUNT,
            inode_count: INODE_COUNT,
            block_size: BLOCK_SIZE,
            free_blocks: 0,
            free_inodes: 0,
        }
    }

    pub fn check_signature(&self) -> FsResult<()> {
        if &self.signature != SIGNATURE {
            return Err(FsError::CorruptImage);
        }
        Ok(())
    }
}
