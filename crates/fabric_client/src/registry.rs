//! Read-only view of attachments and gateway route tables.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use fabric_net::{AttachmentId, GatewayRole, GatewayTopology, RouteTableId, RouteTableRole, VpcId};

use crate::client::NetworkClient;
use crate::error::{ClientError, RegistryError, RegistryResult};
use crate::model::AttachmentSnapshot;

/// Facade over attachment lookups and the shared parameter store.
///
/// The registry never retries. A `NotFound` right after an attachment is
/// created is normal and the caller decides what it means.
pub struct AttachmentRegistry {
    client: Arc<dyn NetworkClient>,
    topology: GatewayTopology,
    route_tables: RwLock<HashMap<(GatewayRole, RouteTableRole), RouteTableId>>,
}

impl AttachmentRegistry {
    pub fn new(client: Arc<dyn NetworkClient>, topology: GatewayTopology) -> Self {
        Self {
            client,
            topology,
            route_tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn topology(&self) -> &GatewayTopology {
        &self.topology
    }

    /// The control surface the registry reads through.
    pub fn client(&self) -> &Arc<dyn NetworkClient> {
        &self.client
    }

    pub async fn lookup_attachment(&self, id: &AttachmentId) -> RegistryResult<AttachmentSnapshot> {
        self.client
            .describe_attachment(id)
            .await
            .map_err(not_found_as_registry)
    }

    /// Every attachment of a VPC, across both gateways.
    pub async fn lookup_vpc_attachments(
        &self,
        vpc_id: &VpcId,
    ) -> RegistryResult<Vec<AttachmentSnapshot>> {
        Ok(self.client.describe_vpc_attachments(vpc_id).await?)
    }

    /// Resolve a gateway's route table.
    ///
    /// The gateway the parameter store is scoped to is read from the store;
    /// the other one comes from the static topology. Ids never change once
    /// provisioned, so successful reads are cached.
    pub async fn lookup_route_table_id(
        &self,
        gateway: GatewayRole,
        role: RouteTableRole,
    ) -> RegistryResult<RouteTableId> {
        let cached = self.route_tables.read().get(&(gateway, role)).cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        let id = if gateway == self.topology.parameter_scope {
            self.read_parameter(role).await?
        } else {
            self.topology
                .gateway(gateway)
                .and_then(|gw| gw.route_table(role))
                .cloned()
                .ok_or_else(|| RegistryError::NotFound {
                    kind: "route table",
                    id: format!("{}/{}", gateway, role),
                })?
        };

        debug!("Resolved {} {} route table: {}", gateway, role, id);
        self.route_tables.write().insert((gateway, role), id.clone());
        Ok(id)
    }

    async fn read_parameter(&self, role: RouteTableRole) -> RegistryResult<RouteTableId> {
        let name = role.parameter_name();
        let value = self
            .client
            .get_parameter(name)
            .await
            .map_err(not_found_as_registry)?;

        RouteTableId::parse(value.trim()).map_err(|source| RegistryError::InvalidParameter {
            name: name.to_string(),
            source,
        })
    }
}

fn not_found_as_registry(err: ClientError) -> RegistryError {
    match err {
        ClientError::NotFound { kind, id } => RegistryError::NotFound { kind, id },
        other => RegistryError::Client(other),
    }
}
