//! Plan command - Print the subnet layout of a consumer VPC.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use fabric_core::VpcConfig;
use fabric_net::{
    AvailabilityZone, Egress, ExportName, RouteIntent, TransitGatewayId, VpcLayout,
    DEFAULT_VPC_CIDR,
};

use super::{load_config, Outcome};

#[derive(Args)]
pub struct PlanArgs {
    /// Take VPC settings and the gateway from a configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base VPC block
    #[arg(long, default_value = DEFAULT_VPC_CIDR)]
    cidr: String,

    /// Availability zones to plan for
    #[arg(long, value_delimiter = ',', default_value = "a,b,c")]
    zones: Vec<AvailabilityZone>,

    /// Route private subnets through NAT gateways
    #[arg(long)]
    nat: bool,

    /// Transit gateway the private subnets route to
    #[arg(long)]
    gateway: Option<TransitGatewayId>,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Plan {
    vpc_export: &'static str,
    #[serde(flatten)]
    layout: VpcLayout,
    routes: Vec<RouteIntent>,
}

pub fn execute(args: PlanArgs) -> Result<()> {
    let (vpc, egress) = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            let egress = config.vpc.egress(&config.topology);
            (config.vpc, egress)
        }
        None => {
            let vpc = VpcConfig {
                cidr: args.cidr.clone(),
                zones: args.zones.clone(),
                enable_nat: args.nat,
            };
            let egress = if args.nat {
                Some(Egress::Nat)
            } else {
                args.gateway.clone().map(Egress::TransitGateway)
            };
            (vpc, egress)
        }
    };

    if vpc.zones.is_empty() {
        return Err(Outcome::InvalidArgument("at least one zone is required".to_string()).into());
    }

    let layout = vpc
        .layout()
        .with_context(|| format!("Cannot plan subnets for {}", vpc.cidr))?;
    let routes = egress
        .as_ref()
        .map(|egress| layout.default_routes(egress))
        .unwrap_or_default();
    info!("Planned {} subnets in {}", layout.subnets.len(), layout.vpc);

    if args.json {
        let plan = Plan {
            vpc_export: ExportName::VPC_ID,
            layout,
            routes,
        };
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("VPC {} ({})", layout.vpc, ExportName::VPC_ID);
    println!();
    println!("{:<8} {:<5} {:<18} EXPORT", "ROLE", "ZONE", "BLOCK");
    for subnet in &layout.subnets {
        println!(
            "{:<8} {:<5} {:<18} {}",
            subnet.role.to_string(),
            subnet.zone.to_string(),
            subnet.block.to_string(),
            subnet.export_name
        );
    }

    if !routes.is_empty() {
        println!();
        println!("Default routes:");
        for route in &routes {
            let target = match &route.egress {
                Egress::TransitGateway(id) => id.to_string(),
                Egress::Nat => format!("NAT gateway in zone {}", route.zone),
            };
            println!("  {} {} -> {}", route.route_table_export, route.destination, target);
        }
    }

    Ok(())
}
