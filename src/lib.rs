pub mod config;
pub mod diagnostics;
pub mod runtime;
