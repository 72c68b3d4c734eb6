//! # fabric_core
//!
//! Event handling and attachment orchestration for the transit fabric.
//!
//! # Architecture
//!
//! - **Gateway**: filters inbound events and enforces the trust boundary
//! - **Orchestrator**: state machine that wires an attachment into its gateway
//!   and unwinds what the VPC still has on the other one
//! - **Dispatcher**: bounded trigger queue with one execution per attachment
//! - **Config**: explicit configuration loaded from YAML, TOML or JSON
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fabric_client::MockNetwork;
//! use fabric_core::{Dispatcher, EventGateway, FabricConfig, Orchestrator};
//!
//! let config = FabricConfig::load(path)?;
//! config.validate()?;
//!
//! let gateway = EventGateway::from_config(&config);
//! let orchestrator = Arc::new(Orchestrator::from_config(&config, Arc::new(MockNetwork::new())));
//! let (handle, dispatcher, mut events) =
//!     Dispatcher::new(orchestrator, config.orchestrator.queue_capacity);
//! tokio::spawn(dispatcher.run());
//!
//! if let Ok(trigger) = gateway.accept_str(&raw_event) {
//!     handle.submit(trigger).await?;
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod orchestrator;
pub mod trust;

// Re-export main types for convenience
pub use config::{EventConfig, FabricConfig, OrchestratorConfig, RetryPolicy, VpcConfig};
pub use dispatcher::{DispatchEvent, Dispatcher, DispatcherHandle, InFlight, InFlightGuard};
pub use error::{CoreError, CoreResult};
pub use execution::{FailureReason, TransitionRecord, WorkflowExecution, WorkflowState};
pub use gateway::{EventGateway, NormalizedTrigger, RejectReason, Rejection};
pub use orchestrator::Orchestrator;
pub use trust::{AccountMembership, TrustPolicy, TrustedPrincipal};
