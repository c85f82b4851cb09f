use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error, Diagnostic)]
pub enum HostError {
    #[error("Failed to read config {}: {error}", .path.display())]
    #[diagnostic(code(prime_host::config::io))]
    ConfigIo {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Invalid config {}: {message}", .path.display())]
    #[diagnostic(code(prime_host::config::parse))]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid value `{value}` for {setting}")]
    #[diagnostic(code(prime_host::config::parse), help("expected one of: {expected}"))]
    ConfigValue {
        setting: String,
        value: String,
        expected: String,
    },

    #[error("No module to load")]
    #[diagnostic(
        code(prime_host::usage),
        help("pass a module path, set PRIME_HOST_MODULE, or add `[module] path` to prime-host.toml")
    )]
    MissingModule,

    #[error("`{symbol}` is not an exposed entry symbol: {message}")]
    #[diagnostic(
        code(prime_host::symbol),
        help("exposed symbols look like prime__<name>_<id>_exposed_generic")
    )]
    InvalidSymbol { symbol: String, message: String },

    #[error("Entry symbol `{symbol}` does not use the out-parameter convention")]
    #[diagnostic(
        code(prime_host::entry_convention),
        help("the host calls the `_generic` flavor: {suggestion}")
    )]
    UnsupportedEntry { symbol: String, suggestion: String },

    #[error("Failed to load module {}: {message}", .path.display())]
    #[diagnostic(code(prime_host::module::load))]
    ModuleLoad { path: PathBuf, message: String },

    #[error("Module {} does not export `{symbol}`", .path.display())]
    #[diagnostic(code(prime_host::module::missing_entry))]
    MissingEntry { path: PathBuf, symbol: String },

    #[error("Module reports a {reported}-byte output record but the host reserves {expected} bytes")]
    #[diagnostic(code(prime_host::module::layout))]
    OutputSizeMismatch { reported: usize, expected: usize },

    #[error("POSIX primitives are not available on this target")]
    #[diagnostic(
        code(prime_host::platform::posix_unavailable),
        help("use `os_primitives = \"stub\"` or `auto`")
    )]
    PosixUnavailable,

    #[error("Out of memory allocating {size} bytes")]
    #[diagnostic(code(prime_host::alloc))]
    OutOfMemory { size: usize },
}
