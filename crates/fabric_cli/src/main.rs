//! Network fabric CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Event rejected
//! - 4: Configuration error
//! - 5: Execution failed

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, Outcome};
use fabric_core::CoreError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const REJECTED: u8 = 3;
    pub const CONFIG_ERROR: u8 = 4;
    pub const EXECUTION_FAILED: u8 = 5;
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "fabric=debug,security=warn,warn"
    } else {
        "fabric=info,security=warn,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(verbose).with_writer(std::io::stderr))
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Plan(args) => commands::plan::execute(args),
        Commands::CheckEvent(args) => commands::check_event::execute(args),
        Commands::Simulate(args) => commands::simulate::execute(args).await,
        Commands::Permissions(args) => commands::permissions::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map an error to its exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(outcome) = e.downcast_ref::<Outcome>() {
        return match outcome {
            Outcome::Rejected(_) => ExitCodes::REJECTED,
            Outcome::ExecutionsFailed(_) => ExitCodes::EXECUTION_FAILED,
            Outcome::InvalidArgument(_) => ExitCodes::INVALID_ARGS,
        };
    }

    match e.downcast_ref::<CoreError>() {
        Some(
            CoreError::InvalidConfig(_)
            | CoreError::InvalidPrincipal(_)
            | CoreError::UnsupportedFormat(_)
            | CoreError::Allocation(_)
            | CoreError::Yaml(_)
            | CoreError::Toml(_),
        ) => ExitCodes::CONFIG_ERROR,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
