//! Network control surface trait and operation catalogue.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fabric_net::{AttachmentId, RouteTableId, VpcId};

use crate::error::ClientResult;
use crate::model::AttachmentSnapshot;

/// Every call the fabric issues against the cloud.
///
/// Nothing outside this set is ever called, which keeps the execution role's
/// policy down to one action per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkOperation {
    DescribeAttachment,
    AcceptAttachment,
    AssociateRouteTable,
    DisassociateRouteTable,
    EnableRoutePropagation,
    DisableRoutePropagation,
    GetParameter,
}

impl NetworkOperation {
    pub fn all() -> [Self; 7] {
        [
            NetworkOperation::DescribeAttachment,
            NetworkOperation::AcceptAttachment,
            NetworkOperation::AssociateRouteTable,
            NetworkOperation::DisassociateRouteTable,
            NetworkOperation::EnableRoutePropagation,
            NetworkOperation::DisableRoutePropagation,
            NetworkOperation::GetParameter,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkOperation::DescribeAttachment => "describe-attachment",
            NetworkOperation::AcceptAttachment => "accept-attachment",
            NetworkOperation::AssociateRouteTable => "associate-route-table",
            NetworkOperation::DisassociateRouteTable => "disassociate-route-table",
            NetworkOperation::EnableRoutePropagation => "enable-route-propagation",
            NetworkOperation::DisableRoutePropagation => "disable-route-propagation",
            NetworkOperation::GetParameter => "get-parameter",
        }
    }

    /// The single IAM action this call needs.
    pub fn required_permission(&self) -> &'static str {
        match self {
            NetworkOperation::DescribeAttachment => "ec2:DescribeTransitGatewayVpcAttachments",
            NetworkOperation::AcceptAttachment => "ec2:AcceptTransitGatewayVpcAttachment",
            NetworkOperation::AssociateRouteTable => "ec2:AssociateTransitGatewayRouteTable",
            NetworkOperation::DisassociateRouteTable => "ec2:DisassociateTransitGatewayRouteTable",
            NetworkOperation::EnableRoutePropagation => {
                "ec2:EnableTransitGatewayRouteTablePropagation"
            }
            NetworkOperation::DisableRoutePropagation => {
                "ec2:DisableTransitGatewayRouteTablePropagation"
            }
            NetworkOperation::GetParameter => "ssm:GetParameter",
        }
    }

    /// Changes cloud state (and therefore needs the idempotence check).
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            NetworkOperation::DescribeAttachment | NetworkOperation::GetParameter
        )
    }
}

impl fmt::Display for NetworkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Least-privilege action list for the orchestrator's execution role.
pub fn required_permissions() -> Vec<&'static str> {
    NetworkOperation::all()
        .iter()
        .map(NetworkOperation::required_permission)
        .collect()
}

/// The cloud network control surface.
///
/// Implementations are expected to be thin adapters over the provider SDK.
/// They must not retry: retry policy belongs to the orchestrator.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Describe one attachment.
    async fn describe_attachment(&self, id: &AttachmentId) -> ClientResult<AttachmentSnapshot>;

    /// Describe every attachment of a VPC, across gateways.
    async fn describe_vpc_attachments(&self, vpc_id: &VpcId)
        -> ClientResult<Vec<AttachmentSnapshot>>;

    /// Accept an attachment shared in from another account.
    async fn accept_attachment(&self, id: &AttachmentId) -> ClientResult<()>;

    async fn associate_route_table(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()>;

    async fn disassociate_route_table(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()>;

    async fn enable_route_propagation(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()>;

    async fn disable_route_propagation(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()>;

    /// Read a value from the shared parameter store.
    async fn get_parameter(&self, name: &str) -> ClientResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_permission_per_operation() {
        let permissions = required_permissions();
        assert_eq!(permissions.len(), NetworkOperation::all().len());

        let mut unique = permissions.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), permissions.len());
        assert!(permissions.contains(&"ssm:GetParameter"));
    }

    #[test]
    fn test_mutating_operations() {
        assert!(NetworkOperation::AssociateRouteTable.is_mutating());
        assert!(NetworkOperation::AcceptAttachment.is_mutating());
        assert!(!NetworkOperation::DescribeAttachment.is_mutating());
        assert!(!NetworkOperation::GetParameter.is_mutating());
    }
}
