#![allow(clippy::missing_safety_doc)]

// Host intrinsics a precompiled module links against. Names and signatures
// are fixed by the module calling convention; bodies delegate to the bridges
// in `runtime`.

use crate::runtime::{alloc, platform, report};
use std::ffi::{c_char, c_int, c_void};

#[unsafe(export_name = "prime_alloc")]
pub unsafe extern "C" fn prime_alloc(size: usize, alignment: u32) -> *mut c_void {
    alloc::allocate(size, alignment)
}

#[unsafe(export_name = "prime_realloc")]
pub unsafe extern "C" fn prime_realloc(
    ptr: *mut c_void,
    new_size: usize,
    old_size: usize,
    alignment: u32,
) -> *mut c_void {
    alloc::reallocate(ptr, new_size, old_size, alignment)
}

#[unsafe(export_name = "prime_dealloc")]
pub unsafe extern "C" fn prime_dealloc(ptr: *mut c_void, alignment: u32) {
    alloc::deallocate(ptr, alignment)
}

/// Never returns. `_tag` is part of the calling convention and carries no
/// information for decoding the message.
#[unsafe(export_name = "prime_panic")]
pub unsafe extern "C" fn prime_panic(msg: *mut c_void, _tag: u32) -> ! {
    let message = report::c_text(msg as *const c_char);
    report::fatal(&message)
}

#[unsafe(export_name = "prime_dbg")]
pub unsafe extern "C" fn prime_dbg(loc: *const c_char, msg: *const c_char, src: *const c_char) {
    let mut stderr = std::io::stderr().lock();
    let _ = report::write_debug(
        &mut stderr,
        &report::c_text(loc),
        &report::c_text(msg),
        &report::c_text(src),
    );
}

#[unsafe(export_name = "prime_memset")]
pub unsafe extern "C" fn prime_memset(dest: *mut c_void, c: c_int, n: usize) -> *mut c_void {
    alloc::fill(dest, c, n)
}

#[unsafe(export_name = "prime_shm_open")]
pub unsafe extern "C" fn prime_shm_open(name: *const c_char, oflag: c_int, mode: c_int) -> c_int {
    platform::primitives().shm_open(name, oflag, mode)
}

#[unsafe(export_name = "prime_mmap")]
pub unsafe extern "C" fn prime_mmap(
    addr: *mut c_void,
    length: c_int,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: c_int,
) -> *mut c_void {
    platform::primitives().mmap(addr, length, prot, flags, fd, offset)
}

#[unsafe(export_name = "prime_getppid")]
pub unsafe extern "C" fn prime_getppid() -> c_int {
    platform::primitives().getppid()
}

/// One row of the exported intrinsic table.
#[derive(Clone, Copy, Debug)]
pub struct HostExport {
    pub name: &'static str,
    pub signature: &'static str,
    pub address: *const c_void,
}

/// Every intrinsic the host provides. Taking the addresses here also keeps
/// the exports from being discarded when the binary is linked.
pub fn host_exports() -> [HostExport; 9] {
    [
        HostExport {
            name: "prime_alloc",
            signature: "(size: usize, alignment: u32) -> *mut void",
            address: prime_alloc as *const c_void,
        },
        HostExport {
            name: "prime_realloc",
            signature: "(ptr: *mut void, new_size: usize, old_size: usize, alignment: u32) -> *mut void",
            address: prime_realloc as *const c_void,
        },
        HostExport {
            name: "prime_dealloc",
            signature: "(ptr: *mut void, alignment: u32)",
            address: prime_dealloc as *const c_void,
        },
        HostExport {
            name: "prime_panic",
            signature: "(msg: *mut void, tag: u32) -> !",
            address: prime_panic as *const c_void,
        },
        HostExport {
            name: "prime_dbg",
            signature: "(loc: *const char, msg: *const char, src: *const char)",
            address: prime_dbg as *const c_void,
        },
        HostExport {
            name: "prime_memset",
            signature: "(dest: *mut void, c: int, n: usize) -> *mut void",
            address: prime_memset as *const c_void,
        },
        HostExport {
            name: "prime_shm_open",
            signature: "(name: *const char, oflag: int, mode: int) -> int",
            address: prime_shm_open as *const c_void,
        },
        HostExport {
            name: "prime_mmap",
            signature: "(addr: *mut void, length: int, prot: int, flags: int, fd: int, offset: int) -> *mut void",
            address: prime_mmap as *const c_void,
        },
        HostExport {
            name: "prime_getppid",
            signature: "() -> int",
            address: prime_getppid as *const c_void,
        },
    ]
}
