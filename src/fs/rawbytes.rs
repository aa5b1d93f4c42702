//! Bit-exact struct <-> byte-buffer conversion.
//!
//! Mirrors the teacher's `Disk::read_struct`/`write_struct` (`ext/inner/disk.rs`):
//! every on-disk record here is `#[repr(C)]` and `Copy`, so it can be viewed as a
//! raw byte slice and written straight to the image instead of going through a
//! serialization crate.

use std::mem::size_of;

/// View a `Copy` struct as its raw on-disk bytes.
pub fn as_bytes<T: Copy>(value: &T) -> &[u8] {
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) }
}

/// View a `Copy` struct as a mutable raw byte buffer, for reading straight off disk.
pub fn as_bytes_mut<T: Copy>(value: &mut T) -> &mut [u8] {
    unsafe { std::slice::from_raw_parts_mut(value as *mut T as *mut u8, size_of::<T>()) }
}
