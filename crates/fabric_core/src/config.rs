//! Fabric configuration.
//!
//! Configuration is a plain value loaded once and passed explicitly to the
//! gateway, orchestrator and dispatcher. YAML, TOML and JSON files are
//! accepted, chosen by file extension.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use fabric_net::{
    AvailabilityZone, Egress, GatewayTopology, NetworkBlock, RouteTableRole,
    VpcLayout, DEFAULT_VPC_CIDR,
};

use crate::error::{CoreError, CoreResult};
use crate::trust::TrustPolicy;

/// Consumer VPC settings used for layout planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    #[serde(default = "default_cidr")]
    pub cidr: String,
    #[serde(default = "default_zones")]
    pub zones: Vec<AvailabilityZone>,
    /// Route private subnets through per-zone NAT gateways instead of the
    /// transit gateway.
    #[serde(default)]
    pub enable_nat: bool,
}

fn default_cidr() -> String {
    DEFAULT_VPC_CIDR.to_string()
}

fn default_zones() -> Vec<AvailabilityZone> {
    AvailabilityZone::all().to_vec()
}

impl Default for VpcConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            zones: default_zones(),
            enable_nat: false,
        }
    }
}

impl VpcConfig {
    pub fn block(&self) -> CoreResult<NetworkBlock> {
        Ok(NetworkBlock::parse(&self.cidr)?)
    }

    pub fn layout(&self) -> CoreResult<VpcLayout> {
        Ok(VpcLayout::plan(self.block()?, &self.zones)?)
    }

    /// Default route target for private subnets, if one can be determined.
    pub fn egress(&self, topology: &GatewayTopology) -> Option<Egress> {
        if self.enable_nat {
            return Some(Egress::Nat);
        }
        topology
            .gateway(topology.parameter_scope)
            .map(|gw| Egress::TransitGateway(gw.id.clone()))
    }
}

/// Which inbound events are relevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_detail_type")]
    pub detail_type: String,
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

fn default_source() -> String {
    "aws.ec2".to_string()
}

fn default_detail_type() -> String {
    "AWS API Call via CloudTrail".to_string()
}

fn default_event_name() -> String {
    "CreateTransitGatewayVpcAttachment".to_string()
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            detail_type: default_detail_type(),
            event_name: default_event_name(),
        }
    }
}

/// Polling and retry timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// First delay between attachment polls
    pub poll_interval_ms: u64,
    /// Give up waiting for an attachment after this long
    pub await_timeout_ms: u64,
    /// Attempts per mutating call, including the first
    pub max_attempts: u32,
    /// Base backoff duration in milliseconds (will be exponentially increased)
    pub backoff_ms: u64,
    /// Factor by which the backoff is increased with each retry
    pub backoff_factor: u64,
    /// Maximum backoff (and poll interval) in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            await_timeout_ms: 900_000,
            max_attempts: 5,
            backoff_ms: 1_000,
            backoff_factor: 2,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .backoff_ms
            .saturating_mul(self.backoff_factor.saturating_pow(attempt));
        Duration::from_millis(exponential.min(self.max_backoff_ms))
    }

    /// Delay before poll number `poll` (zero-based).
    pub fn poll_delay(&self, poll: u32) -> Duration {
        let exponential = self
            .poll_interval_ms
            .saturating_mul(self.backoff_factor.saturating_pow(poll));
        let cap = self.max_backoff_ms.max(self.poll_interval_ms);
        Duration::from_millis(exponential.min(cap))
    }

    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Accept attachments that arrive in `pendingAcceptance`.
    pub auto_accept: bool,
    /// Capacity of the trigger queue.
    pub queue_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_accept: true,
            queue_capacity: 64,
        }
    }
}

/// Complete fabric configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default)]
    pub topology: GatewayTopology,
    #[serde(default)]
    pub vpc: VpcConfig,
    #[serde(default)]
    pub trust: TrustPolicy,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl FabricConfig {
    pub fn new(topology: GatewayTopology, trust: TrustPolicy) -> Self {
        Self {
            topology,
            trust,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_vpc(mut self, vpc: VpcConfig) -> Self {
        self.vpc = vpc;
        self
    }

    pub fn with_auto_accept(mut self, auto_accept: bool) -> Self {
        self.orchestrator.auto_accept = auto_accept;
        self
    }

    /// Load configuration from a file, picking the format by extension.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        debug!("Loading configuration from {:?}", path);

        let config = match ext {
            "yaml" | "yml" => Self::from_yaml(&content)?,
            "toml" => Self::from_toml(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(CoreError::UnsupportedFormat(other.to_string())),
        };
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check the configuration before anything starts.
    ///
    /// Allocation errors are fatal here: a layout that does not plan cleanly
    /// would hand out overlapping subnets.
    pub fn validate(&self) -> CoreResult<()> {
        if self.trust.principals.is_empty() {
            return Err(CoreError::InvalidConfig(
                "at least one trusted principal is required".to_string(),
            ));
        }

        let scope = self.topology.parameter_scope;
        if self.topology.gateway(scope).is_none() {
            return Err(CoreError::InvalidConfig(format!(
                "parameter store is scoped to the {} gateway, which is not configured",
                scope
            )));
        }
        if let Some(other) = self.topology.gateway(scope.other()) {
            for role in RouteTableRole::all() {
                if other.route_table(role).is_none() {
                    return Err(CoreError::InvalidConfig(format!(
                        "{} gateway {} needs a static {} route table",
                        scope.other(),
                        other.id,
                        role
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        if self.vpc.zones.is_empty() || !self.vpc.zones.iter().all(|z| seen.insert(*z)) {
            return Err(CoreError::InvalidConfig(
                "zones must be a non-empty list without duplicates".to_string(),
            ));
        }
        self.vpc.layout()?;

        if self.retry.max_attempts == 0 {
            return Err(CoreError::InvalidConfig("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.backoff_factor == 0 {
            return Err(CoreError::InvalidConfig(
                "retry.backoff_factor must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.queue_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "orchestrator.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
