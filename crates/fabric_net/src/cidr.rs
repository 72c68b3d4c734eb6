//! Deterministic CIDR partitioning.
//!
//! Independently deployed modules agree on subnet boundaries by calling
//! [`allocate`] with the same arguments; there is no shared allocation
//! database. A parent block is cut into `split_count` consecutive, equally
//! sized children starting at the parent's network address, and the caller
//! picks one of them by index. Children may themselves be split again.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, AllocationResult};

/// An IPv4 CIDR prefix, always normalized to its network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkBlock(Ipv4Net);

impl NetworkBlock {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> AllocationResult<Self> {
        Ipv4Net::new(address, prefix_len)
            .map(|net| Self(net.trunc()))
            .map_err(|_| AllocationError::PrefixOutOfRange(prefix_len))
    }

    /// Parse `a.b.c.d/n`. Host bits are cleared.
    pub fn parse(value: &str) -> AllocationResult<Self> {
        value
            .trim()
            .parse::<Ipv4Net>()
            .map(|net| Self(net.trunc()))
            .map_err(|_| AllocationError::InvalidBlock(value.to_string()))
    }

    /// `0.0.0.0/0`.
    pub fn default_route() -> Self {
        Self(Ipv4Net::default())
    }

    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        self.0.broadcast()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len()))
    }

    pub fn contains_block(&self, other: &NetworkBlock) -> bool {
        self.0.contains(&other.0)
    }

    pub fn overlaps(&self, other: &NetworkBlock) -> bool {
        self.contains_block(other) || other.contains_block(self)
    }

    pub fn as_ipnet(&self) -> Ipv4Net {
        self.0
    }
}

impl fmt::Display for NetworkBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkBlock {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NetworkBlock {
    type Error = AllocationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NetworkBlock> for String {
    fn from(block: NetworkBlock) -> Self {
        block.to_string()
    }
}

impl From<Ipv4Net> for NetworkBlock {
    fn from(net: Ipv4Net) -> Self {
        Self(net.trunc())
    }
}

/// One level of a partition: cut into `count` children of `/prefix_len`
/// and keep child `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Split {
    pub count: u32,
    pub prefix_len: u8,
    pub index: u32,
}

impl Split {
    pub const fn new(count: u32, prefix_len: u8, index: u32) -> Self {
        Self {
            count,
            prefix_len,
            index,
        }
    }
}

/// Compute child `index` of `split_count` equally sized `/child_prefix_len`
/// children of `parent`.
///
/// The result depends only on the arguments. `split_count` may be smaller
/// than the number of children that fit, in which case the tail of the
/// parent is left unused; it may never be larger.
pub fn allocate(
    parent: NetworkBlock,
    split_count: u32,
    child_prefix_len: u8,
    index: u32,
) -> AllocationResult<NetworkBlock> {
    let parent_len = parent.prefix_len();
    if child_prefix_len > 32 {
        return Err(AllocationError::PrefixOutOfRange(child_prefix_len));
    }
    if child_prefix_len <= parent_len {
        return Err(AllocationError::PrefixNotLonger {
            parent: parent_len,
            child: child_prefix_len,
        });
    }
    if split_count == 0 {
        return Err(AllocationError::EmptySplit);
    }

    let capacity = 1u64 << u32::from(child_prefix_len - parent_len);
    if u64::from(split_count) > capacity {
        return Err(AllocationError::SplitOverflow {
            parent,
            split_count,
            child: child_prefix_len,
            capacity,
        });
    }
    if index >= split_count {
        return Err(AllocationError::IndexOutOfRange { index, split_count });
    }

    let child_size = 1u64 << (32 - u32::from(child_prefix_len));
    let start = u64::from(u32::from(parent.network())) + u64::from(index) * child_size;
    // In range: index < capacity keeps the child inside the parent.
    let start = u32::try_from(start).map_err(|_| AllocationError::SplitOverflow {
        parent,
        split_count,
        child: child_prefix_len,
        capacity,
    })?;

    NetworkBlock::new(Ipv4Addr::from(start), child_prefix_len)
}

/// All `count` children of a split, in index order.
pub fn split(parent: NetworkBlock, count: u32, prefix_len: u8) -> AllocationResult<Vec<NetworkBlock>> {
    (0..count)
        .map(|index| allocate(parent, count, prefix_len, index))
        .collect()
}

/// Apply a chain of splits, each one to the result of the previous.
pub fn allocate_path(parent: NetworkBlock, steps: &[Split]) -> AllocationResult<NetworkBlock> {
    steps.iter().try_fold(parent, |block, step| {
        allocate(block, step.count, step.prefix_len, step.index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> NetworkBlock {
        NetworkBlock::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_host_bits() {
        assert_eq!(block("10.0.3.7/20").to_string(), "10.0.0.0/20");
        assert!(NetworkBlock::parse("10.0.0.0/33").is_err());
        assert!(NetworkBlock::parse("not-a-cidr").is_err());
    }

    #[test]
    fn test_allocate_first_and_last() {
        let parent = block("10.0.0.0/20");
        assert_eq!(allocate(parent, 8, 23, 0).unwrap(), block("10.0.0.0/23"));
        assert_eq!(allocate(parent, 8, 23, 7).unwrap(), block("10.0.14.0/23"));
    }

    #[test]
    fn test_allocate_partial_split() {
        // Eight /24s only cover half of a /20; that is allowed.
        let parent = block("10.0.0.0/20");
        assert_eq!(allocate(parent, 8, 24, 6).unwrap(), block("10.0.6.0/24"));
    }

    #[test]
    fn test_allocate_rejects_bad_requests() {
        let parent = block("10.0.0.0/20");

        assert_eq!(
            allocate(parent, 8, 20, 0),
            Err(AllocationError::PrefixNotLonger {
                parent: 20,
                child: 20
            })
        );
        assert_eq!(allocate(parent, 0, 24, 0), Err(AllocationError::EmptySplit));
        assert!(matches!(
            allocate(parent, 32, 24, 0),
            Err(AllocationError::SplitOverflow { capacity: 16, .. })
        ));
        assert_eq!(
            allocate(parent, 8, 24, 8),
            Err(AllocationError::IndexOutOfRange {
                index: 8,
                split_count: 8
            })
        );
        assert_eq!(allocate(parent, 8, 33, 0), Err(AllocationError::PrefixOutOfRange(33)));
    }

    #[test]
    fn test_full_split_tiles_parent() {
        let parent = block("172.16.0.0/16");
        let children = split(parent, 16, 20).unwrap();

        assert_eq!(children.len(), 16);
        for (i, a) in children.iter().enumerate() {
            assert!(parent.contains_block(a));
            for b in &children[i + 1..] {
                assert!(!a.overlaps(b), "{a} overlaps {b}");
            }
        }
        let total: u64 = children.iter().map(NetworkBlock::size).sum();
        assert_eq!(total, parent.size());
        assert_eq!(children[0].network(), parent.network());
        assert_eq!(children[15].broadcast(), parent.broadcast());
    }

    #[test]
    fn test_allocate_is_deterministic() {
        let parent = block("10.20.0.0/16");
        for index in 0..4 {
            assert_eq!(allocate(parent, 4, 18, index), allocate(parent, 4, 18, index));
        }
    }

    #[test]
    fn test_recursive_split_matches_direct_computation() {
        let vpc = block("10.0.0.0/20");
        for index in 0..8 {
            let nested = allocate_path(vpc, &[Split::new(8, 24, 6), Split::new(8, 27, index)]).unwrap();
            // The /20 holds 128 /27s; the seventh /24 starts at /27 number 48.
            let direct = allocate(vpc, 128, 27, 6 * 8 + index).unwrap();
            assert_eq!(nested, direct);
        }
    }

    #[test]
    fn test_allocate_top_of_address_space() {
        let parent = block("255.255.255.0/24");
        assert_eq!(allocate(parent, 4, 26, 3).unwrap(), block("255.255.255.192/26"));
    }
}
