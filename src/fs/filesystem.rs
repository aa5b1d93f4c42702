//! Process-wide mount state (§2, §5), made an explicit value per the
//! redesign note in §9 instead of the teacher's module-level singleton.
//!
//! The teacher (`ext/mod.rs`) wraps its filesystem in `Arc<Mutex<..>>` for
//! cheap cloning across open file handles under `no_std` + `alloc`. This
//! filesystem is single-threaded end to end (§5: no concurrency, no
//! locking), so `Filesystem` is just an owned struct threaded through every
//! operation by `&mut self` — callers that want shared access can wrap it
//! themselves, but the engine doesn't impose that cost.

use std::fs::File;

use std::mem::size_of;

use crate::fs::access::Identity;
use crate::fs::bitmap::Bitmap;
use crate::fs::directory::DirBlock;
use crate::fs::error::{FsError, FsResult};
use crate::fs::image::{self, Block};
use crate::fs::inode::{Inode, InodeTable};
use crate::fs::layout::{BITMAP_SIZE, BLOCK_SIZE, INDIRECT_POINTERS, INODE_COUNT, ROOT_INODE_ID};
use crate::fs::rawbytes::{as_bytes, as_bytes_mut};
use crate::fs::superblock::Superblock;

/// Total byte length of the header region at the head of the image:
/// superblock, then the packed inode table, then the bitmap (§6).
pub fn header_byte_len() -> usize {
    size_of::<Superblock>() + INODE_COUNT as usize * size_of::<Inode>() + BITMAP_SIZE
}

/// Blocks permanently marked allocated because the header lives in them.
/// Generalizes the original's `blocs_inodes = ceil(NB_INODES * sizeof(Inode)
/// / TAILLE_BLOC)` (`file_system.c`, which reserves only the superblock and
/// inode table) to also cover the trailing bitmap bytes, so the allocator
/// can never hand out a block the header still occupies.
pub fn reserved_block_count() -> u32 {
    ((header_byte_len() + BLOCK_SIZE as usize - 1) / BLOCK_SIZE as usize) as u32
}

/// The mounted image: backing handle, cached superblock, bitmap, inode
/// table, current working directory, and the identity operations run as.
pub struct Filesystem {
    pub(crate) handle: File,
    pub(crate) superblock: Superblock,
    pub(crate) bitmap: Bitmap,
    pub(crate) inodes: InodeTable,
    pub(crate) cwd: u32,
    pub(crate) identity: Identity,
}

impl Filesystem {
    pub(crate) fn new(
        handle: File,
        superblock: Superblock,
        bitmap: Bitmap,
        inodes: InodeTable,
    ) -> Self {
        Self {
            handle,
            superblock,
            bitmap,
            inodes,
            cwd: ROOT_INODE_ID,
            identity: Identity::ROOT,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    pub fn current_dir(&self) -> u32 {
        self.cwd
    }

    pub fn free_blocks(&self) -> u32 {
        self.superblock.free_blocks
    }

    pub fn free_inodes(&self) -> u32 {
        self.superblock.free_inodes
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// First block id the allocator may hand out (§3 invariant 1a, §6).
    pub fn first_data_block(&self) -> u32 {
        reserved_block_count()
    }

    pub(crate) fn mark_reserved_blocks(&mut self) {
        for b in 0..self.first_data_block() {
            self.bitmap.set(b);
        }
    }

    pub(crate) fn read_block(&mut self, n: u32, buf: &mut Block) -> FsResult<()> {
        image::read_block(&mut self.handle, n, buf)
    }

    pub(crate) fn write_block(&mut self, n: u32, buf: &Block) -> FsResult<()> {
        image::write_block(&mut self.handle, n, buf)?;
        self.superblock.last_modified = now_unix();
        Ok(())
    }

    /// `allocate()`: first-fit scan, sets the bit, decrements the free-block
    /// counter (§4.2).
    pub(crate) fn alloc_block(&mut self) -> FsResult<u32> {
        let id = self.bitmap.first_fit().ok_or_else(|| {
            log::warn!("block allocation failed: no free blocks left");
            crate::fs::error::FsError::NoSpace
        })?;
        self.bitmap.set(id);
        self.superblock.free_blocks -= 1;
        log::debug!("allocated block {id}, {} free remaining", self.superblock.free_blocks);
        Ok(id)
    }

    /// `release(n)`: clears the bit, zero-fills the block on disk so freed
    /// blocks never leak prior contents into a later allocation (§4.2), and
    /// bumps the free-block counter back up.
    pub(crate) fn free_block(&mut self, n: u32) -> FsResult<()> {
        self.bitmap.clear(n);
        self.write_block(n, &image::zero_block())?;
        self.superblock.free_blocks += 1;
        log::debug!("released block {n}, {} free", self.superblock.free_blocks);
        Ok(())
    }

    pub(crate) fn alloc_inode(&mut self) -> FsResult<u32> {
        let id = self.inodes.allocate().map_err(|e| {
            log::warn!("inode allocation failed: no free inodes left");
            e
        })?;
        self.superblock.free_inodes -= 1;
        log::debug!("allocated inode {id}, {} free remaining", self.superblock.free_inodes);
        Ok(id)
    }

    pub(crate) fn free_inode(&mut self, id: u32) -> FsResult<()> {
        self.inodes.release(id)?;
        self.superblock.free_inodes += 1;
        log::debug!("released inode {id}, {} free", self.superblock.free_inodes);
        Ok(())
    }

    pub(crate) fn bitmap_byte_len() -> usize {
        BITMAP_SIZE
    }

    /// Reads a directory inode's single data block (§4.4).
    pub(crate) fn read_dir_block(&mut self, dir_inode: u32) -> FsResult<DirBlock> {
        let block_id = self.inodes.get(dir_inode)?.direct[0];
        let mut raw = image::zero_block();
        self.read_block(block_id, &mut raw)?;
        let mut db = DirBlock::empty();
        as_bytes_mut(&mut db).copy_from_slice(&raw);
        Ok(db)
    }

    /// Writes a directory inode's data block back and bumps its mtime.
    pub(crate) fn write_dir_block(&mut self, dir_inode: u32, db: &DirBlock) -> FsResult<()> {
        let block_id = self.inodes.get(dir_inode)?.direct[0];
        let mut raw = image::zero_block();
        raw.copy_from_slice(as_bytes(db));
        self.write_block(block_id, &raw)?;
        self.inodes.get_mut(dir_inode)?.modified_at = now_unix();
        Ok(())
    }

    pub(crate) fn lookup_in_dir(&mut self, dir_inode: u32, name: &str) -> FsResult<u32> {
        let db = self.read_dir_block(dir_inode)?;
        db.lookup(name).ok_or(FsError::NotFound)
    }

    /// Reads a single-indirect block's 1024 block-id slots (§4.6).
    pub(crate) fn read_indirect(&mut self, block_id: u32) -> FsResult<[u32; INDIRECT_POINTERS]> {
        let mut raw = image::zero_block();
        self.read_block(block_id, &mut raw)?;
        let mut slots = [0u32; INDIRECT_POINTERS];
        as_bytes_mut(&mut slots).copy_from_slice(&raw);
        Ok(slots)
    }

    pub(crate) fn write_indirect(
        &mut self,
        block_id: u32,
        slots: &[u32; INDIRECT_POINTERS],
    ) -> FsResult<()> {
        let mut raw = image::zero_block();
        raw.copy_from_slice(as_bytes(slots));
        self.write_block(block_id, &raw)
    }
}

pub fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
