//! Fixed-size block transfers against the backing file (§4.1).
//!
//! Grounded on the teacher's `Disk<T: RWS>` (`ext/inner/disk.rs`): there the
//! disk is generic over anything implementing seek/read/write so the same
//! driver can run against a raw block device or an in-memory image. This
//! filesystem only ever mounts a single host file, so the abstraction
//! collapses to plain functions over `std::fs::File` plus the raw-struct
//! helpers in `rawbytes` for the superblock/inode-table head of the image.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::fs::error::{FsError, FsResult};
use crate::fs::layout::{BLOCK_COUNT, BLOCK_SIZE};

pub type Block = [u8; BLOCK_SIZE as usize];

pub fn zero_block() -> Block {
    [0u8; BLOCK_SIZE as usize]
}

fn block_offset(n: u32) -> u64 {
    n as u64 * BLOCK_SIZE as u64
}

/// Seeks to `n * BLOCK_SIZE` and reads exactly one block. Out-of-range `n` fails.
pub fn read_block(handle: &mut File, n: u32, buf: &mut Block) -> FsResult<()> {
    if n >= BLOCK_COUNT {
        return Err(FsError::InvalidArgument("block id out of range"));
    }
    handle.seek(SeekFrom::Start(block_offset(n)))?;
    handle.read_exact(buf)?;
    Ok(())
}

/// Seeks to `n * BLOCK_SIZE` and writes exactly one block. Out-of-range `n` fails.
///
/// Does not stamp the superblock's modification time itself (that would need
/// a `&mut Superblock` the image layer has no business holding) — callers in
/// `Filesystem` do that around every write, per §4.1.
pub fn write_block(handle: &mut File, n: u32, buf: &Block) -> FsResult<()> {
    if n >= BLOCK_COUNT {
        return Err(FsError::InvalidArgument("block id out of range"));
    }
    handle.seek(SeekFrom::Start(block_offset(n)))?;
    handle.write_all(buf)?;
    Ok(())
}

pub fn read_bytes_at(handle: &mut File, offset: u64, buf: &mut [u8]) -> FsResult<()> {
    handle.seek(SeekFrom::Start(offset))?;
    handle.read_exact(buf)?;
    Ok(())
}

pub fn write_bytes_at(handle: &mut File, offset: u64, buf: &[u8]) -> FsResult<()> {
    handle.seek(SeekFrom::Start(offset))?;
    handle.write_all(buf)?;
    Ok(())
}
