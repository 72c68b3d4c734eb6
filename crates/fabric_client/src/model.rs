//! Attachment snapshots as reported by the network control surface.

use std::fmt;

use serde::{Deserialize, Serialize};

use fabric_net::{AccountId, AttachmentId, RouteTableId, SubnetId, TransitGatewayId, VpcId};

/// Lifecycle state of a transit gateway VPC attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentState {
    Initiating,
    PendingAcceptance,
    Pending,
    Available,
    Modifying,
    Associating,
    Associated,
    Deleting,
    Deleted,
    Rejected,
    Failed,
}

/// Coarse grouping of [`AttachmentState`] used to drive the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentPhase {
    /// Usable: route tables can be associated.
    Ready,
    /// Shared into the gateway account and waiting for acceptance.
    AwaitingAcceptance,
    /// Still settling; poll again later.
    Transitional,
    /// Will never become usable.
    Gone,
}

impl AttachmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentState::Initiating => "initiating",
            AttachmentState::PendingAcceptance => "pendingAcceptance",
            AttachmentState::Pending => "pending",
            AttachmentState::Available => "available",
            AttachmentState::Modifying => "modifying",
            AttachmentState::Associating => "associating",
            AttachmentState::Associated => "associated",
            AttachmentState::Deleting => "deleting",
            AttachmentState::Deleted => "deleted",
            AttachmentState::Rejected => "rejected",
            AttachmentState::Failed => "failed",
        }
    }

    pub fn phase(&self) -> AttachmentPhase {
        match self {
            AttachmentState::Available | AttachmentState::Associated => AttachmentPhase::Ready,
            AttachmentState::PendingAcceptance => AttachmentPhase::AwaitingAcceptance,
            AttachmentState::Initiating
            | AttachmentState::Pending
            | AttachmentState::Modifying
            | AttachmentState::Associating => AttachmentPhase::Transitional,
            AttachmentState::Deleting
            | AttachmentState::Deleted
            | AttachmentState::Rejected
            | AttachmentState::Failed => AttachmentPhase::Gone,
        }
    }

    pub fn is_gone(&self) -> bool {
        self.phase() == AttachmentPhase::Gone
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of an attachment's route table association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociationState {
    Associating,
    Associated,
    Disassociating,
    Disassociated,
}

impl AssociationState {
    /// The association exists or is being created.
    pub fn is_active(&self) -> bool {
        matches!(self, AssociationState::Associating | AssociationState::Associated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    pub route_table_id: RouteTableId,
    pub state: AssociationState,
}

/// Point-in-time view of one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    pub id: AttachmentId,
    pub vpc_id: VpcId,
    pub transit_gateway_id: TransitGatewayId,
    #[serde(default)]
    pub subnet_ids: Vec<SubnetId>,
    pub state: AttachmentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<RouteTableAssociation>,
    /// Route tables this attachment propagates its routes to.
    #[serde(default)]
    pub propagations: Vec<RouteTableId>,
}

impl AttachmentSnapshot {
    pub fn new(
        id: AttachmentId,
        vpc_id: VpcId,
        transit_gateway_id: TransitGatewayId,
        state: AttachmentState,
    ) -> Self {
        Self {
            id,
            vpc_id,
            transit_gateway_id,
            subnet_ids: Vec::new(),
            state,
            owner: None,
            association: None,
            propagations: Vec::new(),
        }
    }

    pub fn with_association(mut self, route_table_id: RouteTableId) -> Self {
        self.association = Some(RouteTableAssociation {
            route_table_id,
            state: AssociationState::Associated,
        });
        self
    }

    pub fn with_propagation(mut self, route_table_id: RouteTableId) -> Self {
        self.propagations.push(route_table_id);
        self
    }

    pub fn with_subnets(mut self, subnet_ids: Vec<SubnetId>) -> Self {
        self.subnet_ids = subnet_ids;
        self
    }

    /// The route table this attachment is actively associated with, if any.
    pub fn active_association(&self) -> Option<&RouteTableId> {
        self.association
            .as_ref()
            .filter(|a| a.state.is_active())
            .map(|a| &a.route_table_id)
    }

    pub fn is_associated_with(&self, route_table: &RouteTableId) -> bool {
        self.active_association() == Some(route_table)
    }

    pub fn propagates_to(&self, route_table: &RouteTableId) -> bool {
        self.propagations.contains(route_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: AttachmentState) -> AttachmentSnapshot {
        AttachmentSnapshot::new(
            AttachmentId::parse("tgw-attach-01").unwrap(),
            VpcId::parse("vpc-01").unwrap(),
            TransitGatewayId::parse("tgw-01").unwrap(),
            state,
        )
    }

    #[test]
    fn test_state_phases() {
        assert_eq!(AttachmentState::Available.phase(), AttachmentPhase::Ready);
        assert_eq!(AttachmentState::Pending.phase(), AttachmentPhase::Transitional);
        assert_eq!(
            AttachmentState::PendingAcceptance.phase(),
            AttachmentPhase::AwaitingAcceptance
        );
        assert!(AttachmentState::Deleted.is_gone());
        assert!(AttachmentState::Rejected.is_gone());
    }

    #[test]
    fn test_state_wire_names() {
        let state: AttachmentState = serde_yaml::from_str("pendingAcceptance").unwrap();
        assert_eq!(state, AttachmentState::PendingAcceptance);
        assert_eq!(AttachmentState::PendingAcceptance.to_string(), "pendingAcceptance");
    }

    #[test]
    fn test_association_checks() {
        let rt = RouteTableId::parse("tgw-rtb-01").unwrap();
        let other = RouteTableId::parse("tgw-rtb-02").unwrap();
        let snap = snapshot(AttachmentState::Available).with_association(rt.clone());

        assert!(snap.is_associated_with(&rt));
        assert!(!snap.is_associated_with(&other));

        let mut disassociating = snap.clone();
        if let Some(a) = disassociating.association.as_mut() {
            a.state = AssociationState::Disassociating;
        }
        assert!(disassociating.active_association().is_none());
    }
}
