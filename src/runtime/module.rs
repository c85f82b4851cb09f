//! Loading precompiled modules as shared libraries.

use crate::diagnostics::trace;
use crate::runtime::entry::{EntryPoint, GenericEntryFn, SizeFn};
use crate::runtime::error::{HostError, HostResult};
use crate::runtime::symbol::ExposedSymbol;
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};

/// A module opened with its undefined `prime_*` imports bound to this host.
pub struct HostModule {
    lib: Library,
    path: PathBuf,
}

impl HostModule {
    pub fn open(path: &Path) -> HostResult<Self> {
        let canonical = path.canonicalize().map_err(|err| HostError::ModuleLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        // RTLD_NOW surfaces missing host intrinsics at load time instead of
        // at the first call from inside the module.
        #[cfg(unix)]
        let lib = unsafe {
            let flags = libloading::os::unix::RTLD_NOW | libloading::os::unix::RTLD_GLOBAL;
            libloading::os::unix::Library::open(Some(&canonical), flags).map(Library::from)
        };
        #[cfg(not(unix))]
        let lib = unsafe { Library::new(&canonical) };

        let lib = lib.map_err(|err| HostError::ModuleLoad {
            path: canonical.clone(),
            message: err.to_string(),
        })?;
        trace(|| format!("loaded module {}", canonical.display()));
        Ok(Self {
            lib,
            path: canonical,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `symbol` as an out-parameter entry writing a `T`. The size
    /// companion is picked up when the module exports one.
    pub fn entry<T>(&self, symbol: &ExposedSymbol) -> HostResult<EntryPoint<'_, T>> {
        symbol.require_generic()?;
        let name = symbol.to_string();
        let func: Symbol<'_, GenericEntryFn<T>> = unsafe {
            self.lib.get(name.as_bytes()).map_err(|_| HostError::MissingEntry {
                path: self.path.clone(),
                symbol: name.clone(),
            })?
        };
        let size_name = symbol.size_symbol().to_string();
        let size_fn: Option<SizeFn> = unsafe {
            self.lib
                .get::<SizeFn>(size_name.as_bytes())
                .ok()
                .map(|sym| *sym)
        };
        trace(|| {
            format!(
                "resolved {name}{}",
                if size_fn.is_some() { " with size companion" } else { "" }
            )
        });
        Ok(EntryPoint::new(name, *func, size_fn))
    }
}
