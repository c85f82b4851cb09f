//! Fatal-error and debug-print events raised inside a module.

use std::borrow::Cow;
use std::ffi::{c_char, CStr};
use std::io::{self, Write};
use std::process;

/// Exit status used when a module panics.
pub const PANIC_EXIT_CODE: i32 = 1;

pub fn crash_report(message: &str) -> String {
    format!("Application crashed with message\n\n    {message}\n\nShutting down\n")
}

pub fn debug_line(location: &str, message: &str, source: &str) -> String {
    format!("[{location}] {source} = {message}")
}

pub fn write_debug<W: Write>(
    out: &mut W,
    location: &str,
    message: &str,
    source: &str,
) -> io::Result<()> {
    writeln!(out, "{}", debug_line(location, message, source))?;
    out.flush()
}

/// Prints the crash report to stderr and terminates the process. No
/// unwinding happens: the module's frames are still on the stack.
pub fn fatal(message: &str) -> ! {
    let mut stderr = io::stderr().lock();
    let _ = stderr.write_all(crash_report(message).as_bytes());
    let _ = stderr.flush();
    process::exit(PANIC_EXIT_CODE)
}

/// Borrows a NUL-terminated module string. Invalid UTF-8 is replaced rather
/// than rejected since the text only ends up on stderr.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated byte string that outlives
/// the returned value.
pub unsafe fn c_text<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        return Cow::Borrowed("");
    }
    CStr::from_ptr(ptr).to_string_lossy()
}
