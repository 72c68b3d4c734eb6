//! Runs the sample files under `demos/` end to end.

use std::path::PathBuf;
use std::sync::Arc;

use fabric_client::{MockNetwork, NetworkOperation};
use fabric_core::{
    EventGateway, FabricConfig, Orchestrator, RejectReason, WorkflowExecution, WorkflowState,
};
use fabric_net::{AttachmentId, GatewayRole, RouteTableId};

fn demos() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

fn read(name: &str) -> String {
    std::fs::read_to_string(demos().join(name)).unwrap()
}

#[test]
fn test_demo_config_is_valid() {
    let config = FabricConfig::load(&demos().join("fabric.yaml")).unwrap();
    config.validate().unwrap();

    assert!(config.topology.is_migrating());
    assert_eq!(config.topology.parameter_scope, GatewayRole::Migrate);
    assert_eq!(config.vpc.layout().unwrap().subnets.len(), 9);
}

#[test]
fn test_demo_untrusted_event_is_rejected() {
    let config = FabricConfig::load(&demos().join("fabric.yaml")).unwrap();
    let gateway = EventGateway::from_config(&config);

    let rejection = gateway
        .accept_str(&read("events/untrusted-account.json"))
        .unwrap_err();
    assert_eq!(rejection.reason, RejectReason::NotTrusted);
}

#[tokio::test]
async fn test_demo_migration_completes() {
    let config = FabricConfig::load(&demos().join("fabric.yaml")).unwrap();
    let network = MockNetwork::load_fixture(&demos().join("network.yaml")).unwrap();
    let gateway = EventGateway::from_config(&config);
    let orchestrator = Orchestrator::from_config(&config, Arc::new(network.clone()));

    let trigger = gateway
        .accept_str(&read("events/create-attachment.json"))
        .unwrap();
    let exec = orchestrator.run(&trigger).await;
    assert_eq!(exec.state, WorkflowState::Completed, "{:?}", exec.last_error);

    let new = network
        .attachment(&AttachmentId::parse("tgw-attach-0new").unwrap())
        .unwrap();
    assert!(new.is_associated_with(&RouteTableId::parse("tgw-rtb-0migworkload").unwrap()));

    let old = network
        .attachment(&AttachmentId::parse("tgw-attach-0old").unwrap())
        .unwrap();
    assert!(old.active_association().is_none());
    assert!(old.propagations.is_empty());
    assert!(network.was_called(NetworkOperation::DisableRoutePropagation));

    let journal = tempfile::tempdir().unwrap();
    let path = exec.save(journal.path()).unwrap();
    let loaded = WorkflowExecution::load(&path).unwrap();
    assert_eq!(loaded.visited(), exec.visited());
}
