use crate::runtime::error::HostError;
use miette::Report;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

static TRACE: AtomicBool = AtomicBool::new(false);

pub fn set_trace(enabled: bool) {
    TRACE.store(enabled, Ordering::Relaxed);
}

pub fn trace_enabled() -> bool {
    TRACE.load(Ordering::Relaxed)
}

/// Writes a `[prime-host]` line to stderr when tracing is on. The message is
/// only built when it will be printed, since allocator callbacks are hot.
pub fn trace(message: impl FnOnce() -> String) {
    if !trace_enabled() {
        return;
    }
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "[prime-host] {}", message());
}

pub fn report_error(error: HostError) {
    eprintln!("{:?}", Report::new(error));
}
