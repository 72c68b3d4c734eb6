//! Error types for the network module.

use thiserror::Error;

use crate::cidr::NetworkBlock;

/// Result type alias for CIDR allocation.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Result type alias for identifier and topology operations.
pub type NetResult<T> = Result<T, NetError>;

/// A malformed partition request.
///
/// These are programming or configuration errors: they surface at startup
/// and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Invalid CIDR block: {0}")]
    InvalidBlock(String),

    #[error("Prefix length /{0} is out of range for IPv4")]
    PrefixOutOfRange(u8),

    #[error("Child prefix /{child} must be longer than parent prefix /{parent}")]
    PrefixNotLonger { parent: u8, child: u8 },

    #[error("Split count must be at least 1")]
    EmptySplit,

    #[error("{split_count} children of /{child} do not fit in {parent} (capacity {capacity})")]
    SplitOverflow {
        parent: NetworkBlock,
        split_count: u32,
        child: u8,
        capacity: u64,
    },

    #[error("Index {index} is out of range for a split of {split_count}")]
    IndexOutOfRange { index: u32, split_count: u32 },

    #[error("Planned blocks overlap: {0} and {1}")]
    Overlap(NetworkBlock, NetworkBlock),
}

/// Errors raised while parsing identifiers or topology values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("Invalid {kind}: '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("Unknown availability zone: {0}")]
    UnknownZone(String),

    #[error("Unknown gateway role: {0}")]
    UnknownGatewayRole(String),

    #[error("Unknown route table role: {0}")]
    UnknownRouteTableRole(String),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),
}
