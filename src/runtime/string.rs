//! The tagged string record shared with precompiled modules.
//!
//! `PrimeStr` is three machine words: pointer, length, capacity. Strings
//! short enough to fit in the record itself are stored inline ("small"):
//! the bytes occupy the front of the record and the most significant byte of
//! `capacity` holds `len ^ 0x80`, so a small string always has a negative
//! capacity and a big one never does. On little-endian targets that tag byte
//! is the final byte of the record. On big-endian targets it is the first
//! byte of `capacity`, and inline text is limited to the two words before it.
//!
//! Ownership follows the allocator bridge: a big string's block came from
//! [`alloc::allocate`] and is released with [`alloc::deallocate`] when the
//! owning `PrimeStr` is dropped. A string received from a module belongs to
//! the host once the entry call returns.

use crate::runtime::alloc;
use crate::runtime::error::{HostError, HostResult};
use std::ffi::c_void;
use std::{fmt, mem, ptr, slice};

pub const PRIME_STR_SIZE: usize = mem::size_of::<PrimeStr>();

/// Offset of the tag byte, the most significant byte of `capacity`.
#[cfg(target_endian = "little")]
pub const TAG_BYTE: usize = PRIME_STR_SIZE - 1;
#[cfg(target_endian = "big")]
pub const TAG_BYTE: usize = PRIME_STR_SIZE - mem::size_of::<usize>();

/// Longest string stored inline. Inline text never overlaps the tag byte.
pub const SMALL_STR_MAX_LEN: usize = TAG_BYTE;

const SMALL_FLAG: u8 = 0x80;
const STR_ALIGNMENT: u32 = mem::align_of::<usize>() as u32;

#[repr(C)]
pub struct PrimeStr {
    bytes: *mut u8,
    len: usize,
    capacity: usize,
}

impl PrimeStr {
    pub const fn empty() -> Self {
        Self {
            bytes: ptr::null_mut(),
            len: 0,
            capacity: (SMALL_FLAG as usize) << (usize::BITS - 8),
        }
    }

    /// Copies `bytes` into a new string, inline when it fits and through the
    /// allocator bridge otherwise.
    pub fn from_bytes(bytes: &[u8]) -> HostResult<Self> {
        if bytes.len() <= SMALL_STR_MAX_LEN {
            let mut record = [0u8; PRIME_STR_SIZE];
            record[..bytes.len()].copy_from_slice(bytes);
            record[TAG_BYTE] = bytes.len() as u8 ^ SMALL_FLAG;
            return Ok(unsafe { Self::from_record(record) });
        }
        let block = alloc::allocate(bytes.len(), STR_ALIGNMENT) as *mut u8;
        if block.is_null() {
            return Err(HostError::OutOfMemory { size: bytes.len() });
        }
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), block, bytes.len());
        }
        Ok(Self {
            bytes: block,
            len: bytes.len(),
            capacity: bytes.len(),
        })
    }

    /// Reinterprets a raw record.
    ///
    /// # Safety
    /// A small record needs no further checks. A big record must point to a
    /// block from the allocator bridge with at least `len` initialized bytes,
    /// owned by the caller.
    pub unsafe fn from_record(record: [u8; PRIME_STR_SIZE]) -> Self {
        mem::transmute::<[u8; PRIME_STR_SIZE], Self>(record)
    }

    /// # Safety
    /// Same as [`PrimeStr::from_record`] for a big record; `capacity` must
    /// have its top bit clear.
    pub unsafe fn from_raw_parts(bytes: *mut u8, len: usize, capacity: usize) -> Self {
        Self {
            bytes,
            len,
            capacity,
        }
    }

    fn record(&self) -> &[u8; PRIME_STR_SIZE] {
        unsafe { &*(self as *const Self as *const [u8; PRIME_STR_SIZE]) }
    }

    pub fn is_small(&self) -> bool {
        (self.capacity as isize) < 0
    }

    /// Length in bytes under either encoding. Both candidates are computed
    /// up front; neither read has side effects, so the select can compile to
    /// a conditional move.
    pub fn logical_length(&self) -> usize {
        let tag = self.record()[TAG_BYTE];
        let small_len = (tag ^ SMALL_FLAG) as usize;
        let big_len = self.len;
        if self.is_small() {
            small_len
        } else {
            big_len
        }
    }

    pub fn is_empty(&self) -> bool {
        self.logical_length() == 0
    }

    /// Capacity of a big string; small strings report the inline maximum.
    pub fn capacity(&self) -> usize {
        if self.is_small() {
            SMALL_STR_MAX_LEN
        } else {
            self.capacity
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.logical_length();
        if self.is_small() {
            &self.record()[..len]
        } else if self.bytes.is_null() || len == 0 {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.bytes, len) }
        }
    }

    pub fn to_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Small records are copied bit for bit; big ones get their own block
    /// from the allocator bridge.
    pub fn try_clone(&self) -> HostResult<Self> {
        if self.is_small() {
            return Ok(unsafe { Self::from_record(*self.record()) });
        }
        Self::from_bytes(self.as_bytes())
    }
}

impl Default for PrimeStr {
    fn default() -> Self {
        Self::empty()
    }
}

impl Clone for PrimeStr {
    /// Panics if the allocator is exhausted, like `String::clone`. Use
    /// [`PrimeStr::try_clone`] to get the error instead.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(err) => panic!("{err}"),
        }
    }
}

impl Drop for PrimeStr {
    fn drop(&mut self) {
        if !self.is_small() && !self.bytes.is_null() {
            unsafe { alloc::deallocate(self.bytes as *mut c_void, STR_ALIGNMENT) };
        }
    }
}

impl PartialEq for PrimeStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PrimeStr {}

impl fmt::Debug for PrimeStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimeStr")
            .field("small", &self.is_small())
            .field("text", &self.to_str_lossy())
            .finish()
    }
}

impl fmt::Display for PrimeStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}
