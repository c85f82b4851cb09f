//! Heap services for precompiled modules.
//!
//! Every block handed to a module comes from the C allocator so that either
//! side can release it through [`deallocate`] without knowing its size.
//! The `alignment` arguments are part of the calling convention but are not
//! honoured: blocks get whatever alignment `malloc` guarantees. Modules that
//! need stricter alignment than `malloc` provides are not supported.

use crate::diagnostics::trace;
use std::ffi::c_void;
use std::ptr;

/// Returns a block of at least `size` bytes, or null when the allocator is
/// exhausted.
pub fn allocate(size: usize, alignment: u32) -> *mut c_void {
    let block = unsafe { libc::malloc(size) };
    trace(|| format!("alloc size={size} align={alignment} -> {block:p}"));
    block
}

/// Resizes `block`. `old_size` is advisory; `realloc` tracks sizes itself.
///
/// # Safety
/// `block` must be null or a live pointer from [`allocate`]/[`reallocate`].
pub unsafe fn reallocate(
    block: *mut c_void,
    new_size: usize,
    old_size: usize,
    alignment: u32,
) -> *mut c_void {
    let resized = libc::realloc(block, new_size);
    trace(|| {
        format!(
            "realloc {block:p} old={old_size} new={new_size} align={alignment} -> {resized:p}"
        )
    });
    resized
}

/// # Safety
/// `block` must be null or a live pointer from [`allocate`]/[`reallocate`],
/// and must not be used afterwards.
pub unsafe fn deallocate(block: *mut c_void, alignment: u32) {
    trace(|| format!("dealloc {block:p} align={alignment}"));
    libc::free(block);
}

/// Writes the low byte of `value` to `count` bytes at `dest` and returns
/// `dest`.
///
/// # Safety
/// `dest` must be valid for `count` bytes of writes.
pub unsafe fn fill(dest: *mut c_void, value: i32, count: usize) -> *mut c_void {
    if count == 0 {
        return dest;
    }
    ptr::write_bytes(dest as *mut u8, value as u8, count);
    dest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::slice;

    #[test]
    fn allocate_fill_reallocate_roundtrip() {
        unsafe {
            let block = allocate(16, 8);
            assert!(!block.is_null());
            assert_eq!(fill(block, 0xAB, 16), block);
            let bytes = slice::from_raw_parts(block as *const u8, 16);
            assert!(bytes.iter().all(|b| *b == 0xAB));

            let grown = reallocate(block, 64, 16, 8);
            assert!(!grown.is_null());
            let kept = slice::from_raw_parts(grown as *const u8, 16);
            assert!(kept.iter().all(|b| *b == 0xAB));
            deallocate(grown, 8);
        }
    }

    #[test]
    fn fill_uses_low_byte_only() {
        let mut buf = [0u8; 4];
        unsafe {
            fill(buf.as_mut_ptr() as *mut c_void, 0x1_42, 3);
        }
        assert_eq!(buf, [0x42, 0x42, 0x42, 0]);
    }

    #[test]
    fn fill_with_zero_count_leaves_memory_alone() {
        let mut buf = [7u8; 2];
        let dest = buf.as_mut_ptr() as *mut c_void;
        assert_eq!(unsafe { fill(dest, 0, 0) }, dest);
        assert_eq!(buf, [7, 7]);
    }

    #[test]
    fn exhausted_allocator_returns_null() {
        // No allocator can satisfy this; the bridge must hand back null
        // instead of aborting.
        let block = allocate(usize::MAX, 8);
        assert!(block.is_null());
    }
}
