//! Inode records and the in-memory inode table.
//!
//! The record layout mirrors the teacher's `ext/inner/body/inode.rs` (a
//! `#[repr(C)]`, `Copy` struct with direct/indirect pointers, timestamps and a
//! link count) but flattened to this filesystem's single-indirection scheme:
//! no block groups, no doubly/triply-indirect pointers, and a `kind` field
//! instead of a combined type-and-permission word (§3 keeps them separate).

use crate::fs::error::{FsError, FsResult};
use crate::fs::layout::{DIRECT_POINTERS, INODE_COUNT, INODE_DISPLAY_NAME_CAP, NO_BLOCK};

/// An inode's file type. Per the redesign note in §9 of the specification,
/// hard links are additional directory entries referencing an existing
/// inode, not a fourth on-disk inode kind — so there is no `HardLink`
/// variant here (see DESIGN.md).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Free = 0,
    Regular = 1,
    Directory = 2,
    Symlink = 3,
}

impl Default for InodeKind {
    fn default() -> Self {
        InodeKind::Free
    }
}

/// Read/write/execute, used both as a permission-check request and as a
/// three-bit mask extracted from an inode's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access(pub u8);

impl Access {
    pub const READ: Access = Access(0b100);
    pub const WRITE: Access = Access(0b010);
    pub const EXEC: Access = Access(0b001);
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct Inode {
    pub kind: InodeKind,
    pub owner: u16,
    pub group: u16,
    /// Low nine bits: owner/group/other rwx, UNIX-style.
    pub mode: u16,
    pub size: u64,
    pub created_at: i64,
    pub modified_at: i64,
    pub accessed_at: i64,
    pub link_count: u16,
    pub direct: [u32; DIRECT_POINTERS],
    pub indirect: u32,
    /// Display-only mirror of the name under which this inode was created.
    /// The canonical name lives in the parent directory entry (§3); this
    /// field exists purely so `ls -i` has something to print.
    pub display_name: [u8; INODE_DISPLAY_NAME_CAP],
}

impl Default for Inode {
    fn default() -> Self {
        Self {
            kind: InodeKind::Free,
            owner: 0,
            group: 0,
            mode: 0,
            size: 0,
            created_at: 0,
            modified_at: 0,
            accessed_at: 0,
            link_count: 0,
            direct: [NO_BLOCK; DIRECT_POINTERS],
            indirect: NO_BLOCK,
            display_name: [0u8; INODE_DISPLAY_NAME_CAP],
        }
    }
}

impl Inode {
    /// An inode slot is free iff both size and link-count are zero (§3 invariant 2,
    /// and the scan rule in §4.3).
    pub fn is_free(&self) -> bool {
        self.size == 0 && self.link_count == 0
    }

    pub fn set_display_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let n = bytes.len().min(INODE_DISPLAY_NAME_CAP - 1);
        self.display_name = [0u8; INODE_DISPLAY_NAME_CAP];
        self.display_name[..n].copy_from_slice(&bytes[..n]);
    }

    pub fn display_name(&self) -> String {
        let end = self
            .display_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.display_name.len());
        String::from_utf8_lossy(&self.display_name[..end]).into_owned()
    }

    /// Three-bit mask this inode grants to `class` (owner/group/other), per §4.5.
    pub fn class_mask(&self, class: PermissionClass) -> u8 {
        let shift = match class {
            PermissionClass::Owner => 6,
            PermissionClass::Group => 3,
            PermissionClass::Other => 0,
        };
        ((self.mode >> shift) & 0o7) as u8
    }

    pub fn symbolic_mode(&self) -> String {
        let mut s = String::with_capacity(9);
        for shift in [6, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            s.push(if bits & 0b100 != 0 { 'r' } else { '-' });
            s.push(if bits & 0b010 != 0 { 'w' } else { '-' });
            s.push(if bits & 0b001 != 0 { 'x' } else { '-' });
        }
        s
    }

    pub fn type_glyph(&self) -> char {
        match self.kind {
            InodeKind::Regular => 'f',
            InodeKind::Directory => 'd',
            InodeKind::Symlink => 'l',
            InodeKind::Free => '?',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionClass {
    Owner,
    Group,
    Other,
}

/// Fixed-size array of inode records, mirrored to the image at blocks `1..=K`
/// (§4.3). Held entirely in memory while the filesystem is mounted.
#[derive(Clone)]
pub struct InodeTable {
    entries: Vec<Inode>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            entries: vec![Inode::default(); INODE_COUNT as usize],
        }
    }

    pub fn from_entries(entries: Vec<Inode>) -> Self {
        assert_eq!(entries.len(), INODE_COUNT as usize);
        Self { entries }
    }

    pub fn entries(&self) -> &[Inode] {
        &self.entries
    }

    pub fn get(&self, id: u32) -> FsResult<&Inode> {
        self.entries
            .get(id as usize)
            .ok_or(FsError::InvalidArgument("inode id out of range"))
    }

    pub fn get_mut(&mut self, id: u32) -> FsResult<&mut Inode> {
        self.entries
            .get_mut(id as usize)
            .ok_or(FsError::InvalidArgument("inode id out of range"))
    }

    /// First slot with size=0 AND link-count=0 (§4.3).
    pub fn allocate(&mut self) -> FsResult<u32> {
        let id = self
            .entries
            .iter()
            .position(Inode::is_free)
            .ok_or(FsError::NoSpace)?;
        self.entries[id] = Inode {
            link_count: 0,
            ..Inode::default()
        };
        Ok(id as u32)
    }

    /// Zero the record; the caller owns returning its blocks to the bitmap first.
    pub fn release(&mut self, id: u32) -> FsResult<()> {
        *self.get_mut(id)? = Inode::default();
        Ok(())
    }

    pub fn in_use_count(&self) -> u32 {
        self.entries.iter().filter(|i| !i.is_free()).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_mode_renders_rwx_groups() {
        let mut inode = Inode::default();
        inode.mode = 0o754;
        assert_eq!(inode.symbolic_mode(), "rwxr-xr--");
    }

    #[test]
    fn class_mask_reads_the_right_three_bits() {
        let mut inode = Inode::default();
        inode.mode = 0o640;
        assert_eq!(inode.class_mask(PermissionClass::Owner), 0b110);
        assert_eq!(inode.class_mask(PermissionClass::Group), 0b100);
        assert_eq!(inode.class_mask(PermissionClass::Other), 0b000);
    }

    #[test]
    fn display_name_round_trips() {
        let mut inode = Inode::default();
        inode.set_display_name("report.txt");
        assert_eq!(inode.display_name(), "report.txt");
    }

    #[test]
    fn allocate_reuses_a_released_slot() {
        let mut table = InodeTable::new();
        let id = table.allocate().unwrap();
        table.get_mut(id).unwrap().size = 10;
        table.get_mut(id).unwrap().link_count = 1;
        table.release(id).unwrap();
        let reused = table.allocate().unwrap();
        assert_eq!(reused, id);
    }

    #[test]
    fn allocate_fails_once_every_slot_is_taken() {
        let mut table = InodeTable::new();
        for _ in 0..INODE_COUNT {
            let id = table.allocate().unwrap();
            table.get_mut(id).unwrap().link_count = 1;
        }
        assert!(matches!(table.allocate(), Err(FsError::NoSpace)));
    }
}
