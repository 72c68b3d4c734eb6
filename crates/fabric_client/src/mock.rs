//! Mock network control surface for testing and rehearsal.
//!
//! Provides an in-memory implementation of the [`NetworkClient`] trait. It
//! applies mutating calls to its own state, can replay scripted state
//! progressions and failures, and captures every call so tests can verify
//! exactly what the orchestrator issued.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fabric_net::{AttachmentId, RouteTableId, VpcId};

use crate::client::{NetworkClient, NetworkOperation};
use crate::error::{ClientError, ClientResult, FixtureError};
use crate::model::{AssociationState, AttachmentSnapshot, AttachmentState, RouteTableAssociation};

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub operation: NetworkOperation,
    pub attachment_id: Option<AttachmentId>,
    pub route_table_id: Option<RouteTableId>,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl CapturedCall {
    fn new(operation: NetworkOperation) -> Self {
        Self {
            operation,
            attachment_id: None,
            route_table_id: None,
            detail: None,
            at: Utc::now(),
        }
    }

    fn attachment(mut self, id: &AttachmentId) -> Self {
        self.attachment_id = Some(id.clone());
        self
    }

    fn route_table(mut self, id: &RouteTableId) -> Self {
        self.route_table_id = Some(id.clone());
        self
    }

    fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Serializable starting state for a [`MockNetwork`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFixture {
    #[serde(default)]
    pub attachments: Vec<AttachmentSnapshot>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// States an attachment moves through, one per describe call.
    #[serde(default)]
    pub progressions: HashMap<AttachmentId, Vec<AttachmentState>>,
}

/// Mock network control surface.
#[derive(Clone)]
pub struct MockNetwork {
    /// Known attachments.
    attachments: Arc<RwLock<BTreeMap<AttachmentId, AttachmentSnapshot>>>,
    /// Pending state changes, applied one per describe call.
    progressions: Arc<RwLock<HashMap<AttachmentId, VecDeque<AttachmentState>>>>,
    /// Parameter store contents.
    parameters: Arc<RwLock<HashMap<String, String>>>,
    /// Scripted failures, consumed front to back per operation.
    failures: Arc<RwLock<HashMap<NetworkOperation, VecDeque<ClientError>>>>,
    /// Simulated call latency per operation.
    latency: Arc<RwLock<HashMap<NetworkOperation, Duration>>>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    /// Create an empty mock network.
    pub fn new() -> Self {
        Self {
            attachments: Arc::new(RwLock::new(BTreeMap::new())),
            progressions: Arc::new(RwLock::new(HashMap::new())),
            parameters: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            latency: Arc::new(RwLock::new(HashMap::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a mock network from a fixture.
    pub fn from_fixture(fixture: NetworkFixture) -> Self {
        let network = Self::new();
        for attachment in fixture.attachments {
            network.insert_attachment(attachment);
        }
        *network.parameters.write() = fixture.parameters;
        for (id, states) in fixture.progressions {
            network.progressions.write().insert(id, states.into());
        }
        network
    }

    /// Build a mock network from YAML fixture text.
    pub fn from_yaml(content: &str) -> Result<Self, FixtureError> {
        let fixture: NetworkFixture = serde_yaml::from_str(content)?;
        Ok(Self::from_fixture(fixture))
    }

    /// Load a YAML fixture from disk.
    pub fn load_fixture(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Add an attachment.
    pub fn with_attachment(self, attachment: AttachmentSnapshot) -> Self {
        self.insert_attachment(attachment);
        self
    }

    /// Add a parameter store entry.
    pub fn with_parameter(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.write().insert(name.into(), value.into());
        self
    }

    /// Script the states an attachment reports on successive describes.
    pub fn with_progression(self, id: &AttachmentId, states: Vec<AttachmentState>) -> Self {
        self.progressions.write().insert(id.clone(), states.into());
        self
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(self, operation: NetworkOperation, error: ClientError) -> Self {
        self.fail_times(operation, error, 1)
    }

    /// Fail the next `times` calls of `operation` with `error`.
    pub fn fail_times(self, operation: NetworkOperation, error: ClientError, times: usize) -> Self {
        self.failures
            .write()
            .entry(operation)
            .or_default()
            .extend(std::iter::repeat(error).take(times));
        self
    }

    /// Delay every call of `operation`.
    pub fn with_latency(self, operation: NetworkOperation, latency: Duration) -> Self {
        self.latency.write().insert(operation, latency);
        self
    }

    pub fn insert_attachment(&self, attachment: AttachmentSnapshot) {
        self.attachments.write().insert(attachment.id.clone(), attachment);
    }

    pub fn remove_attachment(&self, id: &AttachmentId) -> Option<AttachmentSnapshot> {
        self.attachments.write().remove(id)
    }

    /// Force an attachment into `state`, dropping any scripted progression.
    pub fn set_state(&self, id: &AttachmentId, state: AttachmentState) {
        self.progressions.write().remove(id);
        if let Some(attachment) = self.attachments.write().get_mut(id) {
            attachment.state = state;
        }
    }

    /// Current view of an attachment, without recording a call.
    pub fn attachment(&self, id: &AttachmentId) -> Option<AttachmentSnapshot> {
        self.attachments.read().get(id).cloned()
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls of one operation.
    pub fn call_count(&self, operation: NetworkOperation) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Check if an operation was called.
    pub fn was_called(&self, operation: NetworkOperation) -> bool {
        self.call_count(operation) > 0
    }

    /// Number of calls that change state.
    pub fn mutating_call_count(&self) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.operation.is_mutating())
            .count()
    }

    /// Get calls of a specific operation.
    pub fn get_operation_calls(&self, operation: NetworkOperation) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Record a call, wait out its latency, and return any scripted failure.
    async fn begin(&self, call: CapturedCall) -> ClientResult<()> {
        let operation = call.operation;
        debug!("Mock network call: {} {:?}", operation, call.attachment_id);
        self.captured_calls.write().push(call);

        let latency = self.latency.read().get(&operation).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self
            .failures
            .write()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn with_existing<T>(
        &self,
        id: &AttachmentId,
        f: impl FnOnce(&mut AttachmentSnapshot) -> ClientResult<T>,
    ) -> ClientResult<T> {
        let mut attachments = self.attachments.write();
        match attachments.get_mut(id) {
            Some(attachment) => f(attachment),
            None => Err(ClientError::not_found("attachment", id.as_str())),
        }
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn describe_attachment(&self, id: &AttachmentId) -> ClientResult<AttachmentSnapshot> {
        self.begin(CapturedCall::new(NetworkOperation::DescribeAttachment).attachment(id))
            .await?;

        let next = self
            .progressions
            .write()
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        self.with_existing(id, |attachment| {
            if let Some(state) = next {
                attachment.state = state;
            }
            Ok(attachment.clone())
        })
    }

    async fn describe_vpc_attachments(
        &self,
        vpc_id: &VpcId,
    ) -> ClientResult<Vec<AttachmentSnapshot>> {
        self.begin(CapturedCall::new(NetworkOperation::DescribeAttachment).detail(vpc_id.as_str()))
            .await?;

        Ok(self
            .attachments
            .read()
            .values()
            .filter(|a| &a.vpc_id == vpc_id)
            .cloned()
            .collect())
    }

    async fn accept_attachment(&self, id: &AttachmentId) -> ClientResult<()> {
        self.begin(CapturedCall::new(NetworkOperation::AcceptAttachment).attachment(id))
            .await?;

        self.with_existing(id, |attachment| {
            if attachment.state != AttachmentState::PendingAcceptance {
                return Err(ClientError::IncorrectState(format!(
                    "{} is {}, not pendingAcceptance",
                    id, attachment.state
                )));
            }
            attachment.state = AttachmentState::Pending;
            Ok(())
        })?;
        self.progressions
            .write()
            .entry(id.clone())
            .or_default()
            .push_back(AttachmentState::Available);
        Ok(())
    }

    async fn associate_route_table(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()> {
        self.begin(
            CapturedCall::new(NetworkOperation::AssociateRouteTable)
                .attachment(attachment)
                .route_table(route_table),
        )
        .await?;

        self.with_existing(attachment, |a| {
            if let Some(current) = a.active_association() {
                return Err(ClientError::InvalidRequest(format!(
                    "{} is already associated with {}",
                    attachment, current
                )));
            }
            a.association = Some(RouteTableAssociation {
                route_table_id: route_table.clone(),
                state: AssociationState::Associated,
            });
            Ok(())
        })
    }

    async fn disassociate_route_table(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()> {
        self.begin(
            CapturedCall::new(NetworkOperation::DisassociateRouteTable)
                .attachment(attachment)
                .route_table(route_table),
        )
        .await?;

        self.with_existing(attachment, |a| {
            if !a.is_associated_with(route_table) {
                return Err(ClientError::not_found(
                    "association",
                    format!("{}/{}", route_table, attachment),
                ));
            }
            a.association = None;
            Ok(())
        })
    }

    async fn enable_route_propagation(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()> {
        self.begin(
            CapturedCall::new(NetworkOperation::EnableRoutePropagation)
                .attachment(attachment)
                .route_table(route_table),
        )
        .await?;

        self.with_existing(attachment, |a| {
            if a.propagates_to(route_table) {
                return Err(ClientError::InvalidRequest(format!(
                    "{} already propagates to {}",
                    attachment, route_table
                )));
            }
            a.propagations.push(route_table.clone());
            Ok(())
        })
    }

    async fn disable_route_propagation(
        &self,
        route_table: &RouteTableId,
        attachment: &AttachmentId,
    ) -> ClientResult<()> {
        self.begin(
            CapturedCall::new(NetworkOperation::DisableRoutePropagation)
                .attachment(attachment)
                .route_table(route_table),
        )
        .await?;

        self.with_existing(attachment, |a| {
            if !a.propagates_to(route_table) {
                return Err(ClientError::not_found(
                    "propagation",
                    format!("{}/{}", route_table, attachment),
                ));
            }
            a.propagations.retain(|rt| rt != route_table);
            Ok(())
        })
    }

    async fn get_parameter(&self, name: &str) -> ClientResult<String> {
        self.begin(CapturedCall::new(NetworkOperation::GetParameter).detail(name))
            .await?;

        self.parameters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::not_found("parameter", name))
    }
}
