//! Permissions command - Print the least-privilege action list.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use fabric_client::NetworkOperation;

#[derive(Args)]
pub struct PermissionsArgs {
    /// Print a policy statement instead of one action per line
    #[arg(long)]
    json: bool,
}

pub fn execute(args: PermissionsArgs) -> Result<()> {
    if args.json {
        let statement = json!({
            "Effect": "Allow",
            "Action": fabric_client::required_permissions(),
            "Resource": "*",
        });
        println!("{}", serde_json::to_string_pretty(&statement)?);
        return Ok(());
    }

    for op in NetworkOperation::all() {
        let marker = if op.is_mutating() { "write" } else { "read" };
        println!("{:<48} {:<26} {}", op.required_permission(), op.as_str(), marker);
    }
    Ok(())
}
