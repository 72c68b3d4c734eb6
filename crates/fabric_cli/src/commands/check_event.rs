//! Check-event command - Run an event through the trust boundary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use fabric_core::EventGateway;

use super::{load_config, read_event, Outcome};

#[derive(Args)]
pub struct CheckEventArgs {
    /// Fabric configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "FABRIC_CONFIG")]
    config: PathBuf,

    /// Event JSON file, or `-` for stdin
    event: PathBuf,
}

pub fn execute(args: CheckEventArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let gateway = EventGateway::from_config(&config);
    let raw = read_event(&args.event)?;

    match gateway.accept_str(&raw) {
        Ok(trigger) => {
            println!("{}", serde_json::to_string_pretty(&trigger)?);
            Ok(())
        }
        Err(rejection) => {
            println!("{}", serde_json::to_string_pretty(&rejection)?);
            Err(Outcome::Rejected(rejection).into())
        }
    }
}
