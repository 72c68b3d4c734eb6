//! Fixed subnet layout of a consumer VPC.
//!
//! Every module that carves subnets out of the base VPC block uses the
//! index constants below, so the private, public and transit modules never
//! collide even though they are deployed independently:
//!
//! ```text
//! VPC block ── split into 8 × /24
//!   [0..=2] private subnet, zone a/b/c
//!   [3..=5] public subnet, zone a/b/c
//!   [6]     transit segment ── split into 8 × /27
//!             [0..=2] transit gateway subnet, zone a/b/c
//!   [7]     unused
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cidr::{allocate_path, NetworkBlock, Split};
use crate::error::{AllocationError, AllocationResult, NetError};
use crate::ids::TransitGatewayId;

/// Number of equally sized children at each tier.
pub const TIER_SPLIT: u32 = 8;

/// Prefix of first-tier subnets (private, public, transit segment).
pub const SUBNET_PREFIX_LEN: u8 = 24;

/// First-tier index of zone a's public subnet.
pub const PUBLIC_INDEX_OFFSET: u32 = 3;

/// First-tier index reserved for transit gateway subnets.
pub const TRANSIT_SEGMENT_INDEX: u32 = 6;

/// Prefix of transit gateway subnets inside the transit segment.
pub const TRANSIT_SUBNET_PREFIX_LEN: u8 = 27;

/// Base VPC block used when none is configured.
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/20";

/// Availability zone, identified by its region suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityZone {
    A,
    B,
    C,
}

impl AvailabilityZone {
    pub fn all() -> [Self; 3] {
        [AvailabilityZone::A, AvailabilityZone::B, AvailabilityZone::C]
    }

    /// Zero-based position used as the allocation index.
    pub fn index(&self) -> u32 {
        match self {
            AvailabilityZone::A => 0,
            AvailabilityZone::B => 1,
            AvailabilityZone::C => 2,
        }
    }

    /// One-based position used in export names.
    pub fn ordinal(&self) -> u32 {
        self.index() + 1
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            AvailabilityZone::A => "a",
            AvailabilityZone::B => "b",
            AvailabilityZone::C => "c",
        }
    }

    /// Full zone name in a region, e.g. `eu-west-1a`.
    pub fn in_region(&self, region: &str) -> String {
        format!("{}{}", region, self.suffix())
    }
}

impl fmt::Display for AvailabilityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for AvailabilityZone {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" => Ok(AvailabilityZone::A),
            "b" => Ok(AvailabilityZone::B),
            "c" => Ok(AvailabilityZone::C),
            other => Err(NetError::UnknownZone(other.to_string())),
        }
    }
}

/// Semantic role of a subnet in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetRole {
    Private,
    Public,
    Transit,
}

impl SubnetRole {
    pub fn all() -> [Self; 3] {
        [SubnetRole::Private, SubnetRole::Public, SubnetRole::Transit]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetRole::Private => "private",
            SubnetRole::Public => "public",
            SubnetRole::Transit => "transit",
        }
    }

    /// Allocation steps from the VPC block to this role's subnet in `zone`.
    pub fn path(&self, zone: AvailabilityZone) -> Vec<Split> {
        match self {
            SubnetRole::Private => vec![Split::new(TIER_SPLIT, SUBNET_PREFIX_LEN, zone.index())],
            SubnetRole::Public => vec![Split::new(
                TIER_SPLIT,
                SUBNET_PREFIX_LEN,
                PUBLIC_INDEX_OFFSET + zone.index(),
            )],
            SubnetRole::Transit => vec![
                Split::new(TIER_SPLIT, SUBNET_PREFIX_LEN, TRANSIT_SEGMENT_INDEX),
                Split::new(TIER_SPLIT, TRANSIT_SUBNET_PREFIX_LEN, zone.index()),
            ],
        }
    }

    fn export_prefix(&self) -> &'static str {
        match self {
            SubnetRole::Private => "PrivateSubnet",
            SubnetRole::Public => "PublicSubnet",
            SubnetRole::Transit => "TransitGatewaySubnet",
        }
    }
}

impl fmt::Display for SubnetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block of the subnet with `role` in `zone`.
pub fn subnet_block(
    vpc: NetworkBlock,
    role: SubnetRole,
    zone: AvailabilityZone,
) -> AllocationResult<NetworkBlock> {
    allocate_path(vpc, &role.path(zone))
}

/// The first-tier block reserved for transit gateway subnets.
pub fn transit_segment(vpc: NetworkBlock) -> AllocationResult<NetworkBlock> {
    allocate_path(
        vpc,
        &[Split::new(TIER_SPLIT, SUBNET_PREFIX_LEN, TRANSIT_SEGMENT_INDEX)],
    )
}

/// Well-known cross-stack export names.
pub struct ExportName;

impl ExportName {
    pub const VPC_ID: &'static str = "BaseVPCId";

    pub fn subnet_id(role: SubnetRole, zone: AvailabilityZone) -> String {
        format!("{}{}Id", role.export_prefix(), zone.ordinal())
    }

    pub fn private_route_table_id(zone: AvailabilityZone) -> String {
        format!("PrivateSubnet{}RouteTableId", zone.ordinal())
    }
}

/// A subnet computed by the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSubnet {
    pub role: SubnetRole,
    pub zone: AvailabilityZone,
    pub block: NetworkBlock,
    pub export_name: String,
}

/// Where the default route of a private subnet points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum Egress {
    TransitGateway(TransitGatewayId),
    /// The NAT gateway in the same zone's public subnet.
    Nat,
}

/// A route the provisioning templates install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteIntent {
    /// Export name of the route table to modify.
    pub route_table_export: String,
    pub destination: NetworkBlock,
    pub egress: Egress,
    pub zone: AvailabilityZone,
}

/// All subnets of one consumer VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcLayout {
    pub vpc: NetworkBlock,
    pub zones: Vec<AvailabilityZone>,
    pub subnets: Vec<PlannedSubnet>,
}

impl VpcLayout {
    /// Compute every subnet for `zones` and check that none overlap.
    pub fn plan(vpc: NetworkBlock, zones: &[AvailabilityZone]) -> AllocationResult<Self> {
        let mut subnets = Vec::with_capacity(zones.len() * SubnetRole::all().len());
        for role in SubnetRole::all() {
            for zone in zones {
                let block = subnet_block(vpc, role, *zone)?;
                debug!("Planned {} subnet in zone {}: {}", role, zone, block);
                subnets.push(PlannedSubnet {
                    role,
                    zone: *zone,
                    block,
                    export_name: ExportName::subnet_id(role, *zone),
                });
            }
        }

        for (i, a) in subnets.iter().enumerate() {
            if let Some(b) = subnets[i + 1..].iter().find(|b| a.block.overlaps(&b.block)) {
                return Err(AllocationError::Overlap(a.block, b.block));
            }
        }

        Ok(Self {
            vpc,
            zones: zones.to_vec(),
            subnets,
        })
    }

    pub fn subnets(&self, role: SubnetRole) -> impl Iterator<Item = &PlannedSubnet> {
        self.subnets.iter().filter(move |s| s.role == role)
    }

    pub fn get(&self, role: SubnetRole, zone: AvailabilityZone) -> Option<&PlannedSubnet> {
        self.subnets.iter().find(|s| s.role == role && s.zone == zone)
    }

    /// Default routes for each private subnet's route table.
    pub fn default_routes(&self, egress: &Egress) -> Vec<RouteIntent> {
        self.zones
            .iter()
            .map(|zone| RouteIntent {
                route_table_export: ExportName::private_route_table_id(*zone),
                destination: NetworkBlock::default_route(),
                egress: egress.clone(),
                zone: *zone,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> NetworkBlock {
        NetworkBlock::parse(s).unwrap()
    }

    #[test]
    fn test_default_vpc_layout() {
        let vpc = block(DEFAULT_VPC_CIDR);
        let layout = VpcLayout::plan(vpc, &AvailabilityZone::all()).unwrap();

        assert_eq!(layout.subnets.len(), 9);
        assert_eq!(
            layout.get(SubnetRole::Private, AvailabilityZone::B).unwrap().block,
            block("10.0.1.0/24")
        );
        assert_eq!(
            layout.get(SubnetRole::Public, AvailabilityZone::A).unwrap().block,
            block("10.0.3.0/24")
        );
        assert_eq!(transit_segment(vpc).unwrap(), block("10.0.6.0/24"));

        let transit: Vec<_> = layout.subnets(SubnetRole::Transit).map(|s| s.block).collect();
        assert_eq!(
            transit,
            vec![block("10.0.6.0/27"), block("10.0.6.32/27"), block("10.0.6.64/27")]
        );
    }

    #[test]
    fn test_export_names() {
        assert_eq!(
            ExportName::subnet_id(SubnetRole::Private, AvailabilityZone::A),
            "PrivateSubnet1Id"
        );
        assert_eq!(
            ExportName::subnet_id(SubnetRole::Transit, AvailabilityZone::C),
            "TransitGatewaySubnet3Id"
        );
        assert_eq!(
            ExportName::private_route_table_id(AvailabilityZone::B),
            "PrivateSubnet2RouteTableId"
        );
    }

    #[test]
    fn test_vpc_too_small_for_layout() {
        // Eight /24s need at least a /21.
        let err = VpcLayout::plan(block("10.0.0.0/22"), &AvailabilityZone::all()).unwrap_err();
        assert!(matches!(err, AllocationError::SplitOverflow { .. }));
    }

    #[test]
    fn test_duplicate_zone_is_an_overlap() {
        let err = VpcLayout::plan(
            block(DEFAULT_VPC_CIDR),
            &[AvailabilityZone::A, AvailabilityZone::A],
        )
        .unwrap_err();
        assert!(matches!(err, AllocationError::Overlap(_, _)));
    }

    #[test]
    fn test_default_routes() {
        let layout = VpcLayout::plan(block(DEFAULT_VPC_CIDR), &AvailabilityZone::all()).unwrap();
        let routes = layout.default_routes(&Egress::Nat);

        assert_eq!(routes.len(), 3);
        assert_eq!(routes[2].route_table_export, "PrivateSubnet3RouteTableId");
        assert_eq!(routes[0].destination.to_string(), "0.0.0.0/0");
    }

    #[test]
    fn test_zone_parsing() {
        assert_eq!("B".parse::<AvailabilityZone>().unwrap(), AvailabilityZone::B);
        assert!("d".parse::<AvailabilityZone>().is_err());
        assert_eq!(AvailabilityZone::C.in_region("eu-west-1"), "eu-west-1c");
    }
}
