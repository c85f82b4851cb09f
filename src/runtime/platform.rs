use crate::config::HostConfig;
use crate::diagnostics::trace;
use crate::runtime::error::{HostError, HostResult};
use std::ffi::{c_char, c_int, c_void};
use std::str::FromStr;
use std::sync::OnceLock;

/// OS services a module may call through the host. Every implementation has
/// the same signatures; only the bodies differ per target.
///
/// Values returned by [`StubPrimitives`] mean "unsupported", not "no shared
/// memory" or "no parent": callers must not read a stub `0` as a real id.
pub trait OsPrimitives: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Safety
    /// `name` must point to a NUL-terminated string.
    unsafe fn shm_open(&self, name: *const c_char, oflag: c_int, mode: c_int) -> c_int;

    /// # Safety
    /// Same contract as `mmap(2)`.
    unsafe fn mmap(
        &self,
        addr: *mut c_void,
        length: c_int,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: c_int,
    ) -> *mut c_void;

    fn getppid(&self) -> c_int;
}

/// Forwards every call to the OS unchanged, including failures: a negative
/// descriptor or `MAP_FAILED` comes back with `errno` set by the OS.
#[cfg(unix)]
pub struct PosixPrimitives;

#[cfg(unix)]
impl OsPrimitives for PosixPrimitives {
    fn name(&self) -> &'static str {
        "posix"
    }

    unsafe fn shm_open(&self, name: *const c_char, oflag: c_int, mode: c_int) -> c_int {
        // `shm_open` is variadic on Apple targets, where `mode_t` is too
        // narrow to pass through `...`.
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        let fd = libc::shm_open(name, oflag, mode as libc::c_uint);
        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        let fd = libc::shm_open(name, oflag, mode as libc::mode_t);
        trace(|| format!("shm_open oflag={oflag:#x} mode={mode:#o} -> {fd}"));
        fd
    }

    unsafe fn mmap(
        &self,
        addr: *mut c_void,
        length: c_int,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: c_int,
    ) -> *mut c_void {
        let mapped = libc::mmap(
            addr,
            length as libc::size_t,
            prot,
            flags,
            fd,
            offset as libc::off_t,
        );
        trace(|| format!("mmap hint={addr:p} len={length} fd={fd} -> {mapped:p}"));
        mapped
    }

    fn getppid(&self) -> c_int {
        unsafe { libc::getppid() as c_int }
    }
}

/// Used where POSIX shared memory does not exist.
pub struct StubPrimitives;

impl OsPrimitives for StubPrimitives {
    fn name(&self) -> &'static str {
        "stub"
    }

    unsafe fn shm_open(&self, _name: *const c_char, _oflag: c_int, _mode: c_int) -> c_int {
        0
    }

    unsafe fn mmap(
        &self,
        addr: *mut c_void,
        _length: c_int,
        _prot: c_int,
        _flags: c_int,
        _fd: c_int,
        _offset: c_int,
    ) -> *mut c_void {
        addr
    }

    fn getppid(&self) -> c_int {
        0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitivesMode {
    /// POSIX where the target has it, stub elsewhere.
    #[default]
    Auto,
    Posix,
    Stub,
}

impl PrimitivesMode {
    pub const EXPECTED: &'static str = "auto, posix, stub";
}

impl FromStr for PrimitivesMode {
    type Err = HostError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PrimitivesMode::Auto),
            "posix" => Ok(PrimitivesMode::Posix),
            "stub" => Ok(PrimitivesMode::Stub),
            _ => Err(HostError::ConfigValue {
                setting: "os_primitives".into(),
                value: value.to_string(),
                expected: Self::EXPECTED.into(),
            }),
        }
    }
}

pub fn primitives_for(mode: PrimitivesMode) -> HostResult<Box<dyn OsPrimitives>> {
    match mode {
        PrimitivesMode::Auto => Ok(default_primitives()),
        #[cfg(unix)]
        PrimitivesMode::Posix => Ok(Box::new(PosixPrimitives)),
        #[cfg(not(unix))]
        PrimitivesMode::Posix => Err(HostError::PosixUnavailable),
        PrimitivesMode::Stub => Ok(Box::new(StubPrimitives)),
    }
}

fn default_primitives() -> Box<dyn OsPrimitives> {
    #[cfg(unix)]
    {
        Box::new(PosixPrimitives)
    }
    #[cfg(not(unix))]
    {
        Box::new(StubPrimitives)
    }
}

static PRIMITIVES: OnceLock<Box<dyn OsPrimitives>> = OnceLock::new();

/// The process-wide implementation behind the `prime_*` OS exports.
pub fn primitives() -> &'static dyn OsPrimitives {
    PRIMITIVES.get_or_init(default_primitives).as_ref()
}

/// Installs `primitives` unless an implementation is already in place.
pub fn install_primitives(
    primitives: Box<dyn OsPrimitives>,
) -> Result<(), Box<dyn OsPrimitives>> {
    PRIMITIVES.set(primitives)
}

pub fn configure_platform(config: &HostConfig) -> HostResult<()> {
    let selected = primitives_for(config.os_primitives)?;
    let name = selected.name();
    if install_primitives(selected).is_err() {
        trace(|| format!("os primitives already installed ({})", primitives().name()));
    } else {
        trace(|| format!("os primitives: {name}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn stub_reports_fixed_values_for_every_input() {
        let stub = StubPrimitives;
        let names: [&[u8]; 3] = [b"/test\0", b"/other\0", b"\0"];
        for name in names {
            for (oflag, mode) in [(0, 0), (libc::O_CREAT | libc::O_RDWR, 0o600), (-1, -1)] {
                let fd = unsafe { stub.shm_open(name.as_ptr() as *const c_char, oflag, mode) };
                assert_eq!(fd, 0);
            }
        }
        assert_eq!(stub.getppid(), 0);
    }

    #[test]
    fn stub_mmap_passes_hint_through() {
        let stub = StubPrimitives;
        let hint = 0x1000usize as *mut c_void;
        let mapped = unsafe { stub.mmap(hint, 4096, 0, 0, -1, 0) };
        assert_eq!(mapped, hint);
        assert!(unsafe { stub.mmap(ptr::null_mut(), 1, 0, 0, 3, 0) }.is_null());
    }

    #[test]
    fn parses_modes() {
        assert_eq!("auto".parse::<PrimitivesMode>().unwrap(), PrimitivesMode::Auto);
        assert_eq!(" POSIX ".parse::<PrimitivesMode>().unwrap(), PrimitivesMode::Posix);
        assert_eq!("stub".parse::<PrimitivesMode>().unwrap(), PrimitivesMode::Stub);
        assert!(matches!(
            "win32".parse::<PrimitivesMode>(),
            Err(HostError::ConfigValue { .. })
        ));
    }

    #[test]
    fn explicit_stub_mode_selects_stub() {
        let selected = primitives_for(PrimitivesMode::Stub).unwrap();
        assert_eq!(selected.name(), "stub");
    }

    #[cfg(unix)]
    mod posix {
        use super::*;
        use std::ffi::CString;

        fn errno() -> i32 {
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        }

        #[test]
        fn auto_mode_is_posix_on_unix() {
            assert_eq!(primitives_for(PrimitivesMode::Auto).unwrap().name(), "posix");
        }

        #[test]
        fn shm_open_matches_the_os_call() {
            let name = CString::new(format!("/prime-host-missing-{}", std::process::id())).unwrap();
            let bridged = unsafe { PosixPrimitives.shm_open(name.as_ptr(), libc::O_RDONLY, 0) };
            let bridged_errno = errno();
            #[cfg(any(target_os = "macos", target_os = "ios"))]
            let direct = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDONLY, 0 as libc::c_uint) };
            #[cfg(not(any(target_os = "macos", target_os = "ios")))]
            let direct = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDONLY, 0) };
            let direct_errno = errno();
            assert_eq!(bridged, direct);
            assert!(bridged < 0);
            assert_eq!(bridged_errno, direct_errno);
        }

        #[test]
        fn shm_open_forwards_create_flags() {
            let name = CString::new(format!("/prime-host-create-{}", std::process::id())).unwrap();
            let fd = unsafe {
                PosixPrimitives.shm_open(
                    name.as_ptr(),
                    libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                    0o600,
                )
            };
            if fd < 0 {
                // No shared-memory filesystem in this environment; the
                // failure itself must be the OS's.
                assert_ne!(errno(), 0);
                return;
            }
            unsafe {
                libc::close(fd);
                libc::shm_unlink(name.as_ptr());
            }
        }

        #[test]
        fn mmap_maps_anonymous_memory() {
            let len = 4096;
            let mapped = unsafe {
                PosixPrimitives.mmap(
                    ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANON,
                    -1,
                    0,
                )
            };
            assert_ne!(mapped, libc::MAP_FAILED);
            unsafe {
                *(mapped as *mut u8) = 7;
                assert_eq!(*(mapped as *const u8), 7);
                libc::munmap(mapped, len as usize);
            }
        }

        #[test]
        fn getppid_is_the_real_parent() {
            assert_eq!(PosixPrimitives.getppid() as u32, std::os::unix::process::parent_id());
        }
    }
}
