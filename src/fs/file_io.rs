//! Block-mapped file I/O: direct + single-indirect addressing, allocation on
//! write, symlink-aware reads (§4.6).
//!
//! Grounded on the teacher's doubly/triply-indirect `bmap`-equivalent logic
//! spread across `ext/inner/body/inode.rs` and `ext/inner/syscall.rs`
//! (`update_size`'s block-counting arithmetic, in particular), collapsed
//! here to the single level of indirection this filesystem supports (§3).

use crate::fs::access;
use crate::fs::error::{FsError, FsResult};
use crate::fs::filesystem::{now_unix, Filesystem};
use crate::fs::image;
use crate::fs::inode::{Access, InodeKind};
use crate::fs::layout::{BLOCK_SIZE, DIRECT_POINTERS, INDIRECT_POINTERS, NO_BLOCK};

const MAX_SYMLINK_HOPS: u32 = 16;

impl Filesystem {
    /// `bmap(inode, i, allocating)`: maps logical block index `i` to a
    /// physical block id, allocating on demand when `allocating` is set.
    pub(crate) fn bmap(&mut self, inode_id: u32, i: usize, allocating: bool) -> FsResult<u32> {
        if i < DIRECT_POINTERS {
            let current = self.inodes.get(inode_id)?.direct[i];
            if current == NO_BLOCK && allocating {
                let fresh = self.alloc_block()?;
                self.inodes.get_mut(inode_id)?.direct[i] = fresh;
                return Ok(fresh);
            }
            return Ok(current);
        }
        if i < DIRECT_POINTERS + INDIRECT_POINTERS {
            let slot = i - DIRECT_POINTERS;
            let mut indirect = self.inodes.get(inode_id)?.indirect;
            if indirect == NO_BLOCK {
                if !allocating {
                    return Ok(NO_BLOCK);
                }
                let fresh = self.alloc_block()?;
                // Zero the indirect block on disk *before* recording it on the
                // inode, so a crash or a later read never observes stale slot
                // values as valid block ids (§9 design note).
                self.write_block(fresh, &image::zero_block())?;
                self.inodes.get_mut(inode_id)?.indirect = fresh;
                indirect = fresh;
            }
            let mut slots = self.read_indirect(indirect)?;
            let current = slots[slot];
            if current == NO_BLOCK && allocating {
                let fresh = self.alloc_block()?;
                slots[slot] = fresh;
                self.write_indirect(indirect, &slots)?;
                return Ok(fresh);
            }
            return Ok(current);
        }
        Err(FsError::TooLarge)
    }

    /// Frees every direct block, every non-zero indirect slot, then the
    /// indirect block itself. Leaves `size` untouched — callers (unlink,
    /// rewrite-from-offset-zero) decide what to do with it.
    pub(crate) fn free_all_blocks(&mut self, inode_id: u32) -> FsResult<()> {
        let mut inode = *self.inodes.get(inode_id)?;
        for slot in inode.direct.iter_mut() {
            if *slot != NO_BLOCK {
                self.free_block(*slot)?;
                *slot = NO_BLOCK;
            }
        }
        if inode.indirect != NO_BLOCK {
            let slots = self.read_indirect(inode.indirect)?;
            for &b in slots.iter() {
                if b != NO_BLOCK {
                    self.free_block(b)?;
                }
            }
            self.free_block(inode.indirect)?;
            inode.indirect = NO_BLOCK;
        }
        *self.inodes.get_mut(inode_id)? = inode;
        Ok(())
    }

    fn read_symlink_target(&mut self, inode_id: u32) -> FsResult<String> {
        let inode = *self.inodes.get(inode_id)?;
        let block_id = inode.direct[0];
        if block_id == NO_BLOCK {
            return Ok(String::new());
        }
        let mut block = image::zero_block();
        self.read_block(block_id, &mut block)?;
        let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
        Ok(String::from_utf8_lossy(&block[..end]).into_owned())
    }

    /// `read(inode_id, buf, n=buf.len(), offset)`. If `inode_id` names a
    /// symlink, resolves the target name *in the current directory* — this
    /// deliberately only resolves names in `cwd`, not the symlink's actual
    /// parent directory; see §9 and DESIGN.md. The resolved file is then
    /// read from offset 0 regardless of the caller's `offset`, matching the
    /// original's `lire_fichier(inode_source, buffer, taille, 0)`.
    pub fn read(&mut self, inode_id: u32, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        self.read_hops(inode_id, offset, buf, 0)
    }

    fn read_hops(
        &mut self,
        inode_id: u32,
        offset: u64,
        buf: &mut [u8],
        hops: u32,
    ) -> FsResult<usize> {
        let inode = *self.inodes.get(inode_id)?;
        if inode.kind == InodeKind::Symlink {
            if hops >= MAX_SYMLINK_HOPS {
                return Err(FsError::InvalidArgument("too many symlink hops"));
            }
            let target = self.read_symlink_target(inode_id)?;
            let resolved = self.lookup_in_dir(self.cwd, &target)?;
            // The original always re-reads the resolved file from its own
            // start, discarding the caller's offset (file_system.c:543,
            // `lire_fichier(inode_source, buffer, taille, 0)`), not just
            // the current-directory name lookup.
            return self.read_hops(resolved, 0, buf, hops + 1);
        }
        if inode.kind == InodeKind::Directory {
            return Err(FsError::WrongType);
        }
        if offset >= inode.size {
            return Err(FsError::InvalidArgument("offset is at or past end of file"));
        }
        if !access::check(&self.identity, &inode, Access::READ) {
            return Err(FsError::PermissionDenied);
        }

        let n = buf.len().min((inode.size - offset) as usize);
        let mut delivered = 0usize;
        while delivered < n {
            let abs = offset as usize + delivered;
            let block_index = abs / BLOCK_SIZE as usize;
            let in_block = abs % BLOCK_SIZE as usize;
            let chunk = (BLOCK_SIZE as usize - in_block).min(n - delivered);
            let block_id = self.bmap(inode_id, block_index, false)?;
            if block_id == NO_BLOCK {
                buf[delivered..delivered + chunk].fill(0);
            } else {
                let mut block = image::zero_block();
                self.read_block(block_id, &mut block)?;
                buf[delivered..delivered + chunk]
                    .copy_from_slice(&block[in_block..in_block + chunk]);
            }
            delivered += chunk;
        }
        self.inodes.get_mut(inode_id)?.accessed_at = now_unix();
        Ok(delivered)
    }

    /// `write(inode_id, buf, n=buf.len(), offset)`.
    pub fn write(&mut self, inode_id: u32, offset: u64, buf: &[u8]) -> FsResult<usize> {
        {
            let inode = *self.inodes.get(inode_id)?;
            if inode.kind != InodeKind::Regular {
                return Err(FsError::WrongType);
            }
            if !access::check(&self.identity, &inode, Access::WRITE) {
                return Err(FsError::PermissionDenied);
            }
            // "Open for rewrite" semantics: writing from offset zero to a
            // non-empty file discards its old contents first (§4.6).
            if inode.size > 0 && offset == 0 {
                self.free_all_blocks(inode_id)?;
                self.inodes.get_mut(inode_id)?.size = 0;
            }
        }

        let n = buf.len();
        if n > 0 {
            let last_index = ((offset + n as u64 - 1) / BLOCK_SIZE as u64) as usize;
            if last_index >= DIRECT_POINTERS + INDIRECT_POINTERS {
                return Err(FsError::TooLarge);
            }
        }

        let mut written = 0usize;
        while written < n {
            let abs = offset as usize + written;
            let block_index = abs / BLOCK_SIZE as usize;
            let in_block = abs % BLOCK_SIZE as usize;
            let chunk = (BLOCK_SIZE as usize - in_block).min(n - written);
            // A failed allocation aborts with NoSpace; bytes already written
            // in earlier iterations are not rolled back (§4.6) — the caller
            // is expected to unlink the file on failure.
            let block_id = self.bmap(inode_id, block_index, true)?;
            let mut block = image::zero_block();
            self.read_block(block_id, &mut block)?;
            block[in_block..in_block + chunk].copy_from_slice(&buf[written..written + chunk]);
            self.write_block(block_id, &block)?;
            written += chunk;
        }

        let new_end = offset + written as u64;
        let inode = self.inodes.get_mut(inode_id)?;
        if new_end > inode.size {
            inode.size = new_end;
        }
        let now = now_unix();
        inode.modified_at = now;
        inode.accessed_at = now;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::inode::InodeKind;
    use tempfile::NamedTempFile;

    use super::Filesystem;

    fn fresh() -> Filesystem {
        let path = NamedTempFile::new().unwrap().into_temp_path();
        Filesystem::initialize(&path).unwrap()
    }

    #[test]
    fn big_write_spans_three_direct_blocks() {
        let mut fs = fresh();
        let id = fs.create("big", InodeKind::Regular).unwrap();
        let payload = vec![0x41u8; 12_288];
        let written = fs.write(id, 0, &payload).unwrap();
        assert_eq!(written, 12_288);
        let inode = fs.stat(id).unwrap();
        assert_eq!(inode.size, 12_288);
        assert_ne!(inode.direct[0], 0);
        assert_ne!(inode.direct[1], 0);
        assert_ne!(inode.direct[2], 0);

        let mut readback = vec![0u8; 12_288];
        let got = fs.read(id, 0, &mut readback).unwrap();
        assert_eq!(got, 12_288);
        assert!(readback.iter().all(|&b| b == 0x41));
    }

    #[test]
    fn write_past_direct_pointers_uses_the_indirect_block() {
        let mut fs = fresh();
        let id = fs.create("spill", InodeKind::Regular).unwrap();
        let payload = vec![0x7Au8; 45_056]; // 11 blocks
        fs.write(id, 0, &payload).unwrap();
        let inode = fs.stat(id).unwrap();
        assert!(inode.direct.iter().all(|&b| b != 0));
        assert_ne!(inode.indirect, 0);
        let slots = fs.block_ids(id).unwrap();
        // 10 direct + 1 indirect-block-itself + 1 used slot = 12
        assert_eq!(slots.len(), 12);
    }

    #[test]
    fn unlink_reclaims_every_block() {
        let mut fs = fresh();
        let before = fs.free_blocks();
        let id = fs.create("c", InodeKind::Regular).unwrap();
        fs.write(id, 0, &vec![0u8; 8192]).unwrap();
        fs.unlink("c").unwrap();
        assert_eq!(fs.free_blocks(), before);
    }

    #[test]
    fn rewriting_from_offset_zero_discards_old_content() {
        let mut fs = fresh();
        let id = fs.create("f", InodeKind::Regular).unwrap();
        fs.write(id, 0, b"first content here").unwrap();
        fs.write(id, 0, b"second").unwrap();
        let inode = fs.stat(id).unwrap();
        assert_eq!(inode.size, 6);
        let mut buf = [0u8; 6];
        fs.read(id, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"second");
    }

    #[test]
    fn reading_a_symlink_at_an_offset_still_reads_the_target_from_its_start() {
        let mut fs = fresh();
        let target = fs.create("real", InodeKind::Regular).unwrap();
        fs.write(target, 0, b"0123456789").unwrap();
        let link = fs.symlink("real", "alias").unwrap();
        let mut buf = [0u8; 4];
        // The original (file_system.c:543) always re-reads the resolved
        // file from offset 0, discarding the caller's offset.
        fs.read(link, 5, &mut buf).unwrap();
        assert_eq!(&buf, b"0123");
    }
}
