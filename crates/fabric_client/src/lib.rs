//! # fabric_client
//!
//! Network control surface for the transit fabric.
//!
//! This crate is the only place the fabric talks to the cloud. It defines the
//! small set of calls the orchestrator is allowed to make, a read-only
//! registry on top of them, and an in-memory network for tests and dry runs.
//!
//! # Features
//!
//! - **Narrow surface**: [`NetworkClient`] exposes exactly the calls in
//!   [`NetworkOperation`], each mapped to one IAM action
//! - **Registry**: attachment lookups and cached route table resolution
//! - **Mock Network**: scripted states, failures and latency with captured calls
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fabric_client::{AttachmentRegistry, MockNetwork};
//! use fabric_net::{GatewayRole, GatewayTopology, RouteTableRole};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let network = MockNetwork::new().with_parameter("WorkloadRouteTableId", "tgw-rtb-0a1");
//! let registry = AttachmentRegistry::new(Arc::new(network), GatewayTopology::new());
//!
//! let id = registry
//!     .lookup_route_table_id(GatewayRole::Main, RouteTableRole::Workload)
//!     .await
//!     .unwrap();
//! assert_eq!(id.as_str(), "tgw-rtb-0a1");
//! # }
//! ```

pub mod client;
pub mod error;
pub mod mock;
pub mod model;
pub mod registry;

pub use client::{required_permissions, NetworkClient, NetworkOperation};
pub use error::{ClientError, ClientResult, FixtureError, RegistryError, RegistryResult};
pub use mock::{CapturedCall, MockNetwork, NetworkFixture};
pub use model::{
    AssociationState, AttachmentPhase, AttachmentSnapshot, AttachmentState, RouteTableAssociation,
};
pub use registry::AttachmentRegistry;
