//! Integration tests for the mock network and the attachment registry.
//!
//! These tests exercise the control surface the way the orchestrator does,
//! through the `NetworkClient` trait object.

use std::sync::Arc;
use std::time::Duration;

use fabric_client::{
    required_permissions, AttachmentRegistry, AttachmentSnapshot, AttachmentState, ClientError,
    MockNetwork, NetworkClient, NetworkOperation,
};
use fabric_net::{
    AttachmentId, GatewayRole, GatewayTopology, RouteTableId, RouteTableRole, TransitGatewayId,
    VpcId,
};

const FIXTURE: &str = r#"
parameters:
  WorkloadRouteTableId: tgw-rtb-0work
  SharedRouteTableId: tgw-rtb-0shared
attachments:
  - id: tgw-attach-0new
    vpc_id: vpc-0app
    transit_gateway_id: tgw-0main
    subnet_ids: [subnet-0a, subnet-0b, subnet-0c]
    state: pending
  - id: tgw-attach-0old
    vpc_id: vpc-0app
    transit_gateway_id: tgw-0migrate
    state: available
    association:
      route_table_id: tgw-rtb-0oldwork
      state: associated
    propagations: [tgw-rtb-0oldshared]
progressions:
  tgw-attach-0new: [pending, available]
"#;

fn id(s: &str) -> AttachmentId {
    AttachmentId::parse(s).unwrap()
}

fn rt(s: &str) -> RouteTableId {
    RouteTableId::parse(s).unwrap()
}

/// Test loading a fixture from disk.
#[tokio::test]
async fn test_load_fixture_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.yaml");
    std::fs::write(&path, FIXTURE).unwrap();

    let network = MockNetwork::load_fixture(&path).unwrap();

    let old = network.attachment(&id("tgw-attach-0old")).unwrap();
    assert!(old.is_associated_with(&rt("tgw-rtb-0oldwork")));
    assert!(old.propagates_to(&rt("tgw-rtb-0oldshared")));

    let new = network.describe_attachment(&id("tgw-attach-0new")).await.unwrap();
    assert_eq!(new.state, AttachmentState::Pending);
    assert_eq!(new.subnet_ids.len(), 3);
    let new = network.describe_attachment(&id("tgw-attach-0new")).await.unwrap();
    assert_eq!(new.state, AttachmentState::Available);
}

/// Test that a malformed fixture is reported rather than half-loaded.
#[test]
fn test_invalid_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "attachments:\n  - id: not-an-attachment\n").unwrap();

    assert!(MockNetwork::load_fixture(&path).is_err());
    assert!(MockNetwork::load_fixture(&dir.path().join("missing.yaml")).is_err());
}

/// Test VPC-wide describe spans both gateways.
#[tokio::test]
async fn test_describe_vpc_attachments() {
    let network = MockNetwork::new()
        .with_attachment(AttachmentSnapshot::new(
            id("tgw-attach-01"),
            VpcId::parse("vpc-0app").unwrap(),
            TransitGatewayId::parse("tgw-0main").unwrap(),
            AttachmentState::Available,
        ))
        .with_attachment(AttachmentSnapshot::new(
            id("tgw-attach-02"),
            VpcId::parse("vpc-0app").unwrap(),
            TransitGatewayId::parse("tgw-0migrate").unwrap(),
            AttachmentState::Available,
        ))
        .with_attachment(AttachmentSnapshot::new(
            id("tgw-attach-03"),
            VpcId::parse("vpc-0other").unwrap(),
            TransitGatewayId::parse("tgw-0main").unwrap(),
            AttachmentState::Available,
        ));
    let client: Arc<dyn NetworkClient> = Arc::new(network);

    let found = client
        .describe_vpc_attachments(&VpcId::parse("vpc-0app").unwrap())
        .await
        .unwrap();
    let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["tgw-attach-01", "tgw-attach-02"]);
}

/// Test that mutating calls change the mock's state.
#[tokio::test]
async fn test_route_table_mutations() {
    let network = MockNetwork::from_yaml(FIXTURE).unwrap();
    let old = id("tgw-attach-0old");

    network
        .disassociate_route_table(&rt("tgw-rtb-0oldwork"), &old)
        .await
        .unwrap();
    network
        .disable_route_propagation(&rt("tgw-rtb-0oldshared"), &old)
        .await
        .unwrap();

    let after = network.attachment(&old).unwrap();
    assert!(after.active_association().is_none());
    assert!(after.propagations.is_empty());

    let again = network
        .disassociate_route_table(&rt("tgw-rtb-0oldwork"), &old)
        .await
        .unwrap_err();
    assert!(again.is_not_found());
    assert_eq!(network.mutating_call_count(), 3);
}

/// Test failures are returned after the call is captured.
#[tokio::test]
async fn test_failures_are_captured() {
    let network = MockNetwork::from_yaml(FIXTURE).unwrap().fail_times(
        NetworkOperation::DisassociateRouteTable,
        ClientError::AccessDenied("not authorized".into()),
        2,
    );
    let old = id("tgw-attach-0old");

    for _ in 0..2 {
        let err = network
            .disassociate_route_table(&rt("tgw-rtb-0oldwork"), &old)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
    network
        .disassociate_route_table(&rt("tgw-rtb-0oldwork"), &old)
        .await
        .unwrap();

    let calls = network.get_operation_calls(NetworkOperation::DisassociateRouteTable);
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].route_table_id, Some(rt("tgw-rtb-0oldwork")));
    assert_eq!(calls[0].attachment_id, Some(old));
}

/// Test simulated latency delays the call.
#[tokio::test]
async fn test_latency() {
    let network = MockNetwork::from_yaml(FIXTURE)
        .unwrap()
        .with_latency(NetworkOperation::GetParameter, Duration::from_millis(30));

    let started = std::time::Instant::now();
    network.get_parameter("WorkloadRouteTableId").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
}

/// Test the registry over a fixture-backed network.
#[tokio::test]
async fn test_registry_over_fixture() {
    let network = MockNetwork::from_yaml(FIXTURE).unwrap();
    let registry = AttachmentRegistry::new(Arc::new(network.clone()), GatewayTopology::new());

    let workload = registry
        .lookup_route_table_id(GatewayRole::Main, RouteTableRole::Workload)
        .await
        .unwrap();
    let shared = registry
        .lookup_route_table_id(GatewayRole::Main, RouteTableRole::Shared)
        .await
        .unwrap();
    assert_eq!(workload.as_str(), "tgw-rtb-0work");
    assert_eq!(shared.as_str(), "tgw-rtb-0shared");

    let missing = registry
        .lookup_route_table_id(GatewayRole::Migrate, RouteTableRole::Workload)
        .await
        .unwrap_err();
    assert!(missing.is_not_found());

    let vpc = registry
        .lookup_vpc_attachments(&VpcId::parse("vpc-0app").unwrap())
        .await
        .unwrap();
    assert_eq!(vpc.len(), 2);
    assert_eq!(network.call_count(NetworkOperation::GetParameter), 2);
}

/// Test the permission list matches the operation catalogue.
#[test]
fn test_permissions() {
    let permissions = required_permissions();
    for op in NetworkOperation::all() {
        assert!(permissions.contains(&op.required_permission()));
    }
    assert!(permissions.iter().all(|p| p.starts_with("ec2:") || p.starts_with("ssm:")));
}
