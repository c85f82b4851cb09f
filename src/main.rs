use clap::{Args, Parser, Subcommand};
use prime_host::{
    config::{HostConfig, HostFlags, ProcessEnv},
    diagnostics::{report_error, set_trace},
    runtime::{self, abi, HostResult},
};
use std::{path::PathBuf, process};

const HOST_ERROR_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "prime-host")]
#[command(about = "Loads a precompiled module and calls its exposed entry.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Call the module's entry once and print its result.
    Run(HostArgs),
    /// Resolve the entry and its layout without calling it.
    Check(HostArgs),
    /// List the intrinsics the host exports to modules.
    Symbols,
}

#[derive(Args)]
struct HostArgs {
    /// Shared library to load; falls back to PRIME_HOST_MODULE or the config file.
    module: Option<PathBuf>,

    #[arg(long, value_name = "SYMBOL")]
    entry: Option<String>,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// OS primitive set: auto, posix or stub.
    #[arg(long = "os", value_name = "MODE")]
    os_primitives: Option<String>,

    #[arg(long)]
    trace: bool,
}

impl From<HostArgs> for HostFlags {
    fn from(args: HostArgs) -> Self {
        HostFlags {
            config: args.config,
            module: args.module,
            entry: args.entry,
            os_primitives: args.os_primitives,
            trace: args.trace,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = execute(cli.command) {
        report_error(err);
        process::exit(HOST_ERROR_EXIT_CODE);
    }
}

fn execute(command: Command) -> HostResult<()> {
    match command {
        Command::Run(args) => {
            let config = HostConfig::from_sources(&args.into(), &ProcessEnv)?;
            set_trace(config.trace);
            let output = runtime::run_module(&config)?;
            println!("{output}");
        }
        Command::Check(args) => {
            let config = HostConfig::from_sources(&args.into(), &ProcessEnv)?;
            set_trace(config.trace);
            println!("{}", runtime::check_module(&config)?);
        }
        Command::Symbols => {
            for export in abi::host_exports() {
                println!("{:<16} {}", export.name, export.signature);
            }
        }
    }
    Ok(())
}
