//! Integration tests for CIDR partitioning and the VPC layout.

use fabric_net::{
    allocate, allocate_path, split, AllocationError, AvailabilityZone, NetworkBlock, Split,
    SubnetRole, VpcLayout, SUBNET_PREFIX_LEN, TIER_SPLIT, TRANSIT_SEGMENT_INDEX,
    TRANSIT_SUBNET_PREFIX_LEN,
};

fn block(s: &str) -> NetworkBlock {
    NetworkBlock::parse(s).unwrap()
}

fn assert_tiles(parent: NetworkBlock, children: &[NetworkBlock]) {
    for (i, a) in children.iter().enumerate() {
        assert!(parent.contains_block(a), "{a} escapes {parent}");
        for b in &children[i + 1..] {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }
    let covered: u64 = children.iter().map(NetworkBlock::size).sum();
    assert_eq!(covered, parent.size());
}

#[test]
fn test_even_splits_tile_their_parent() {
    let cases = [
        ("10.0.0.0/20", 8, 23),
        ("10.0.0.0/16", 2, 17),
        ("192.168.4.0/24", 8, 27),
        ("100.64.0.0/10", 64, 16),
    ];

    for (parent, count, prefix_len) in cases {
        let parent = block(parent);
        let children = split(parent, count, prefix_len).unwrap();
        assert_eq!(children.len(), count as usize);
        assert_tiles(parent, &children);
    }
}

#[test]
fn test_two_level_scenario_on_a_slash_20() {
    let vpc = block("10.0.0.0/20");

    // Eight /23s tile the /20; the seventh starts at 10.0.12.0.
    let reserved = allocate(vpc, 8, 23, 6).unwrap();
    assert_eq!(reserved, block("10.0.12.0/23"));

    let grandchildren: Vec<_> = (0..3)
        .map(|i| allocate(reserved, 8, 26, i).unwrap())
        .collect();
    for (i, a) in grandchildren.iter().enumerate() {
        assert!(reserved.contains_block(a));
        for b in &grandchildren[i + 1..] {
            assert!(!a.overlaps(b));
        }
    }
}

#[test]
fn test_transit_subnets_are_thirty_two_addresses_inside_segment() {
    let vpc = block("10.0.0.0/20");
    let segment = allocate(vpc, TIER_SPLIT, SUBNET_PREFIX_LEN, TRANSIT_SEGMENT_INDEX).unwrap();
    assert_eq!(segment, block("10.0.6.0/24"));

    let transit: Vec<_> = (0..3)
        .map(|i| allocate(segment, TIER_SPLIT, TRANSIT_SUBNET_PREFIX_LEN, i).unwrap())
        .collect();
    assert_eq!(transit[0], block("10.0.6.0/27"));
    assert_eq!(transit[1], block("10.0.6.32/27"));
    assert_eq!(transit[2], block("10.0.6.64/27"));
    assert!(transit.iter().all(|b| b.size() == 32 && segment.contains_block(b)));
}

#[test]
fn test_path_composition_equals_direct_allocation() {
    let vpc = block("10.8.0.0/16");
    // /16 -> 4 x /18 -> 4 x /20  ==  /16 -> 16 x /20
    for outer in 0..4 {
        for inner in 0..4 {
            let nested =
                allocate_path(vpc, &[Split::new(4, 18, outer), Split::new(4, 20, inner)]).unwrap();
            let direct = allocate(vpc, 16, 20, outer * 4 + inner).unwrap();
            assert_eq!(nested, direct);
        }
    }
}

#[test]
fn test_independent_modules_agree() {
    // Two modules planning the same VPC on their own compute the same layout.
    let vpc = block("10.1.0.0/20");
    let first = VpcLayout::plan(vpc, &AvailabilityZone::all()).unwrap();
    let second = VpcLayout::plan(vpc, &AvailabilityZone::all()).unwrap();
    assert_eq!(first, second);

    for subnet in &first.subnets {
        assert!(vpc.contains_block(&subnet.block));
    }
    let private = first.get(SubnetRole::Private, AvailabilityZone::C).unwrap();
    assert_eq!(private.export_name, "PrivateSubnet3Id");
}

#[test]
fn test_layout_serializes_blocks_as_cidr_strings() {
    let layout = VpcLayout::plan(block("10.0.0.0/20"), &[AvailabilityZone::A]).unwrap();
    let json = serde_json::to_value(&layout).unwrap();

    assert_eq!(json["vpc"], "10.0.0.0/20");
    assert_eq!(json["subnets"][0]["block"], "10.0.0.0/24");
    assert_eq!(json["subnets"][0]["role"], "private");
}

#[test]
fn test_out_of_range_index_is_rejected() {
    let err = allocate(block("10.0.0.0/20"), 8, 24, 9).unwrap_err();
    assert_eq!(
        err,
        AllocationError::IndexOutOfRange {
            index: 9,
            split_count: 8
        }
    );
}
