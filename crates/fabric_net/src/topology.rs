//! Transit gateway topology definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::ids::{RouteTableId, TransitGatewayId};

/// Which of the two concurrently provisioned gateways a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayRole {
    Main,
    Migrate,
}

impl Default for GatewayRole {
    fn default() -> Self {
        Self::Main
    }
}

impl GatewayRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayRole::Main => "main",
            GatewayRole::Migrate => "migrate",
        }
    }

    pub fn all() -> [Self; 2] {
        [GatewayRole::Main, GatewayRole::Migrate]
    }

    /// The gateway on the other side of a migration.
    pub fn other(&self) -> Self {
        match self {
            GatewayRole::Main => GatewayRole::Migrate,
            GatewayRole::Migrate => GatewayRole::Main,
        }
    }
}

impl fmt::Display for GatewayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GatewayRole {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" => Ok(GatewayRole::Main),
            "migrate" => Ok(GatewayRole::Migrate),
            other => Err(NetError::UnknownGatewayRole(other.to_string())),
        }
    }
}

/// Role of a route table within a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTableRole {
    /// Attachments associate here; it carries workload traffic.
    Workload,
    /// Attachments propagate their routes here.
    Shared,
}

impl RouteTableRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTableRole::Workload => "workload",
            RouteTableRole::Shared => "shared",
        }
    }

    pub fn all() -> [Self; 2] {
        [RouteTableRole::Workload, RouteTableRole::Shared]
    }

    /// Name of the shared parameter holding this route table's id.
    pub fn parameter_name(&self) -> &'static str {
        match self {
            RouteTableRole::Workload => "WorkloadRouteTableId",
            RouteTableRole::Shared => "SharedRouteTableId",
        }
    }
}

impl fmt::Display for RouteTableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RouteTableRole {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workload" => Ok(RouteTableRole::Workload),
            "shared" => Ok(RouteTableRole::Shared),
            other => Err(NetError::UnknownRouteTableRole(other.to_string())),
        }
    }
}

/// A transit gateway and its two route tables.
///
/// Route table ids are optional because the active gateway's tables are
/// normally resolved from the shared parameter store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitGateway {
    pub id: TransitGatewayId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_route_table: Option<RouteTableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_route_table: Option<RouteTableId>,
}

impl TransitGateway {
    pub fn new(id: TransitGatewayId) -> Self {
        Self {
            id,
            workload_route_table: None,
            shared_route_table: None,
        }
    }

    pub fn with_route_tables(mut self, workload: RouteTableId, shared: RouteTableId) -> Self {
        self.workload_route_table = Some(workload);
        self.shared_route_table = Some(shared);
        self
    }

    pub fn route_table(&self, role: RouteTableRole) -> Option<&RouteTableId> {
        match role {
            RouteTableRole::Workload => self.workload_route_table.as_ref(),
            RouteTableRole::Shared => self.shared_route_table.as_ref(),
        }
    }
}

/// The gateways of one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTopology {
    #[serde(default)]
    pub main: Option<TransitGateway>,
    #[serde(default)]
    pub migrate: Option<TransitGateway>,
    /// The gateway whose route tables the parameter store describes.
    #[serde(default)]
    pub parameter_scope: GatewayRole,
}

impl GatewayTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main(mut self, gateway: TransitGateway) -> Self {
        self.main = Some(gateway);
        self
    }

    pub fn with_migrate(mut self, gateway: TransitGateway) -> Self {
        self.migrate = Some(gateway);
        self
    }

    pub fn with_parameter_scope(mut self, role: GatewayRole) -> Self {
        self.parameter_scope = role;
        self
    }

    pub fn gateway(&self, role: GatewayRole) -> Option<&TransitGateway> {
        match role {
            GatewayRole::Main => self.main.as_ref(),
            GatewayRole::Migrate => self.migrate.as_ref(),
        }
    }

    /// Map a gateway id back to its role.
    pub fn role_of(&self, id: &TransitGatewayId) -> Option<GatewayRole> {
        GatewayRole::all()
            .into_iter()
            .find(|role| self.gateway(*role).is_some_and(|gw| &gw.id == id))
    }

    /// Both gateways are provisioned, so attachments may move between them.
    pub fn is_migrating(&self) -> bool {
        self.main.is_some() && self.migrate.is_some()
    }
}
