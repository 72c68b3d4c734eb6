//! # fabric_net
//!
//! Network primitives for the shared transit fabric.
//!
//! This crate holds everything that can be computed without talking to the
//! cloud: validated resource identifiers, the two-gateway topology, and the
//! deterministic CIDR partitioning that lets independently deployed modules
//! agree on subnet ranges.
//!
//! ## Example
//!
//! ```rust
//! use fabric_net::{AvailabilityZone, NetworkBlock, SubnetRole, VpcLayout};
//!
//! let vpc = NetworkBlock::parse("10.0.0.0/20").unwrap();
//! let layout = VpcLayout::plan(vpc, &AvailabilityZone::all()).unwrap();
//!
//! let transit = layout.get(SubnetRole::Transit, AvailabilityZone::A).unwrap();
//! assert_eq!(transit.block.to_string(), "10.0.6.0/27");
//! ```

pub mod cidr;
pub mod error;
pub mod ids;
pub mod layout;
pub mod topology;

pub use cidr::{allocate, allocate_path, split, NetworkBlock, Split};
pub use error::{AllocationError, AllocationResult, NetError, NetResult};
pub use ids::{AccountId, AttachmentId, RouteTableId, SubnetId, TransitGatewayId, VpcId};
pub use layout::{
    subnet_block, transit_segment, AvailabilityZone, Egress, ExportName, PlannedSubnet,
    RouteIntent, SubnetRole, VpcLayout, DEFAULT_VPC_CIDR, PUBLIC_INDEX_OFFSET,
    SUBNET_PREFIX_LEN, TIER_SPLIT, TRANSIT_SEGMENT_INDEX, TRANSIT_SUBNET_PREFIX_LEN,
};
pub use topology::{GatewayRole, GatewayTopology, RouteTableRole, TransitGateway};
