//! Calling a module's exposed entry point.
//!
//! The entry takes a single out-parameter: the host reserves storage for the
//! output record and the module fully initializes it before returning. The
//! storage is never read before the call returns.

use crate::diagnostics::trace;
use crate::runtime::error::{HostError, HostResult};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};

pub type GenericEntryFn<T> = unsafe extern "C" fn(out: *mut T);
pub type SizeFn = unsafe extern "C" fn() -> usize;

/// An entry symbol resolved from a module. `'lib` ties the function pointer
/// to the library it was loaded from.
pub struct EntryPoint<'lib, T> {
    symbol: String,
    func: GenericEntryFn<T>,
    size_fn: Option<SizeFn>,
    _lib: PhantomData<&'lib ()>,
}

impl<T> EntryPoint<'static, T> {
    /// Wraps an entry linked into the host itself.
    pub fn linked(symbol: impl Into<String>, func: GenericEntryFn<T>) -> Self {
        Self::new(symbol, func, None)
    }
}

impl<'lib, T> EntryPoint<'lib, T> {
    pub(crate) fn new(
        symbol: impl Into<String>,
        func: GenericEntryFn<T>,
        size_fn: Option<SizeFn>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            func,
            size_fn,
            _lib: PhantomData,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Compares the module's declared record size with `T` when the module
    /// exports a size companion. Without one the host has to trust `T`.
    pub fn check_layout(&self) -> HostResult<()> {
        let Some(size_fn) = self.size_fn else {
            return Ok(());
        };
        let reported = unsafe { size_fn() };
        let expected = mem::size_of::<T>();
        if reported != expected {
            return Err(HostError::OutputSizeMismatch { reported, expected });
        }
        Ok(())
    }

    /// Calls the entry once and takes ownership of the record it wrote.
    ///
    /// # Safety
    /// `T` must match the module's declared output layout, and the module
    /// must initialize every field. The module may re-enter the host through
    /// the `prime_*` exports during the call.
    pub unsafe fn invoke(&self) -> T {
        let mut out = MaybeUninit::<T>::uninit();
        trace(|| format!("calling {} (out={} bytes)", self.symbol, mem::size_of::<T>()));
        (self.func)(out.as_mut_ptr());
        trace(|| format!("{} returned", self.symbol));
        out.assume_init()
    }
}

/// Output record of the reference `mainForHost` entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MainOutput {
    pub x: u8,
    pub y: u8,
}

impl MainOutput {
    pub fn sum(&self) -> u16 {
        self.x as u16 + self.y as u16
    }
}

impl fmt::Display for MainOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {} = {}", self.x, self.y, self.sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::abi::{prime_alloc, prime_dbg, prime_dealloc, prime_memset};
    use std::ffi::c_char;

    unsafe extern "C" fn two_and_three(out: *mut MainOutput) {
        // Exercise the callbacks the way a compiled module would.
        let scratch = prime_alloc(8, 1);
        prime_memset(scratch, 0, 8);
        prime_dbg(
            b"main.prime:1\0".as_ptr() as *const c_char,
            b"2\0".as_ptr() as *const c_char,
            b"x\0".as_ptr() as *const c_char,
        );
        prime_dealloc(scratch, 1);
        out.write(MainOutput { x: 2, y: 3 });
    }

    unsafe extern "C" fn max_values(out: *mut MainOutput) {
        (*out).x = u8::MAX;
        (*out).y = u8::MAX;
    }

    unsafe extern "C" fn reports_two_bytes() -> usize {
        2
    }

    unsafe extern "C" fn reports_eight_bytes() -> usize {
        8
    }

    #[test]
    fn invokes_entry_and_formats_sum() {
        let entry = EntryPoint::linked("prime__mainForHost_1_exposed_generic", two_and_three);
        let out = unsafe { entry.invoke() };
        assert_eq!(out, MainOutput { x: 2, y: 3 });
        assert_eq!(out.to_string(), "2 + 3 = 5");
    }

    #[test]
    fn sum_does_not_wrap() {
        let entry = EntryPoint::linked("max", max_values);
        let out = unsafe { entry.invoke() };
        assert_eq!(out.to_string(), "255 + 255 = 510");
    }

    #[test]
    fn layout_check_uses_size_companion() {
        let entry: EntryPoint<'_, MainOutput> =
            EntryPoint::new("ok", two_and_three, Some(reports_two_bytes));
        assert!(entry.check_layout().is_ok());

        let entry: EntryPoint<'_, MainOutput> =
            EntryPoint::new("bad", two_and_three, Some(reports_eight_bytes));
        assert!(matches!(
            entry.check_layout(),
            Err(HostError::OutputSizeMismatch { reported: 8, expected: 2 })
        ));

        assert!(EntryPoint::linked("none", two_and_three).check_layout().is_ok());
    }
}
