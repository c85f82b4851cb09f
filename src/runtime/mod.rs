pub mod abi;
pub mod alloc;
pub mod entry;
pub mod error;
pub mod module;
pub mod platform;
pub mod report;
pub mod string;
pub mod symbol;

pub use entry::{EntryPoint, MainOutput};
pub use error::{HostError, HostResult};
pub use module::HostModule;
pub use string::PrimeStr;

use crate::config::HostConfig;

/// Loads the configured module, calls its entry once and returns the record
/// it wrote. A module panic never returns here: the process exits instead.
pub fn run_module(config: &HostConfig) -> HostResult<MainOutput> {
    platform::configure_platform(config)?;
    let module = HostModule::open(config.module_path()?)?;
    let entry = module.entry::<MainOutput>(&config.entry)?;
    entry.check_layout()?;
    Ok(unsafe { entry.invoke() })
}

/// Resolves the entry without calling it.
pub fn check_module(config: &HostConfig) -> HostResult<String> {
    let module = HostModule::open(config.module_path()?)?;
    let entry = module.entry::<MainOutput>(&config.entry)?;
    entry.check_layout()?;
    Ok(format!("{}: {} ok", module.path().display(), entry.symbol()))
}
