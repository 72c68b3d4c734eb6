//! CLI command definitions.
//!
//! Each subcommand maps to one part of the fabric: layout planning, the event
//! gateway, or a dry run of the orchestrator against a mock network.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use thiserror::Error;

use fabric_core::{FabricConfig, Rejection};

pub mod check_event;
pub mod permissions;
pub mod plan;
pub mod simulate;

/// Shared transit network fabric
#[derive(Parser)]
#[command(name = "fabric")]
#[command(version, about = "Shared transit network fabric")]
#[command(long_about = r#"
Plans consumer VPC subnet layouts and wires transit gateway attachments
into the shared gateway's route tables.

COMMANDS:
  plan          → Print the subnet layout and export names of a VPC
  check-event   → Run an event through the trust boundary
  simulate      → Reconcile events against a mock network
  permissions   → Print the least-privilege action list

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Event rejected
  4 - Configuration error
  5 - Execution failed
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "FABRIC_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the subnet layout of a consumer VPC
    Plan(plan::PlanArgs),

    /// Run an event through the event gateway
    #[command(name = "check-event")]
    CheckEvent(check_event::CheckEventArgs),

    /// Dispatch events through the orchestrator against a mock network
    Simulate(simulate::SimulateArgs),

    /// Print the actions the orchestrator needs
    Permissions(permissions::PermissionsArgs),
}

/// Command results that carry their own exit code.
#[derive(Debug, Error)]
pub enum Outcome {
    #[error("Event rejected ({0})")]
    Rejected(Rejection),

    #[error("{0} execution(s) failed")]
    ExecutionsFailed(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<FabricConfig> {
    let config = FabricConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Read an event file, or stdin for `-`.
pub fn read_event(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("Failed to read event from stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read event {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_validates() {
        let dir = TempDir::new().unwrap();

        let valid = dir.path().join("fabric.yaml");
        std::fs::write(
            &valid,
            "topology:\n  main:\n    id: tgw-0main\ntrust:\n  principals: [o-a1b2c3d4e5]\n",
        )
        .unwrap();
        assert!(load_config(&valid).is_ok());

        let no_trust = dir.path().join("open.yaml");
        std::fs::write(&no_trust, "topology:\n  main:\n    id: tgw-0main\n").unwrap();
        let err = load_config(&no_trust).unwrap_err();
        assert!(format!("{:#}", err).contains("trusted principal"));
    }

    #[test]
    fn test_read_event_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, "{}").unwrap();

        assert_eq!(read_event(&path).unwrap(), "{}");
        assert!(read_event(&dir.path().join("missing.json")).is_err());
    }
}
