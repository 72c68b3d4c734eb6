//! Attachment orchestrator.
//!
//! Drives one attachment through its workflow:
//!
//! ```text
//! Start -> AwaitAvailable -> Associating -> EnablingPropagation -> MigrationCheck
//!   MigrationCheck -> Completed                       (nothing left on the other gateway)
//!   MigrationCheck -> Disassociating -> DisablingOldPropagation -> Completed
//!   any step -> Failed
//! ```
//!
//! Every step reads the attachment again before acting and skips calls whose
//! effect is already in place, so a replayed trigger converges instead of
//! erroring. A read that finds the attachment deleting or failed ends the
//! workflow with no further calls. Mutating calls are retried with exponential backoff on transient
//! errors only.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use fabric_client::{
    AttachmentPhase, AttachmentRegistry, AttachmentSnapshot, AttachmentState, ClientError,
    NetworkClient, NetworkOperation, RegistryError,
};
use fabric_net::{AttachmentId, GatewayRole, RouteTableId, RouteTableRole};

use crate::config::{FabricConfig, RetryPolicy};
use crate::execution::{FailureReason, WorkflowExecution, WorkflowState};
use crate::gateway::NormalizedTrigger;

#[derive(Debug)]
struct StepFailure {
    reason: FailureReason,
    message: String,
}

impl StepFailure {
    fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

type StepResult<T> = Result<T, StepFailure>;

/// Outcome of a call that did not succeed.
enum RetryError<E> {
    /// Still failing transiently after the last attempt.
    Exhausted(E),
    /// Failed with an error that retrying cannot fix.
    Permanent(E),
}

impl<E: fmt::Display> RetryError<E> {
    fn into_failure(self, operation: NetworkOperation) -> StepFailure {
        match self {
            RetryError::Exhausted(e) => StepFailure::new(
                FailureReason::RetriesExhausted,
                format!("{} kept failing: {}", operation, e),
            ),
            RetryError::Permanent(e) => StepFailure::new(
                FailureReason::NonRetryable,
                format!("{} failed: {}", operation, e),
            ),
        }
    }
}

/// Error from a mutating call on the workflow's own attachment.
#[derive(Debug)]
enum GuardedError {
    /// The pre-call read found the attachment deleted or failed.
    Gone(String),
    Call(ClientError),
}

impl GuardedError {
    fn is_transient(&self) -> bool {
        matches!(self, GuardedError::Call(e) if e.is_transient())
    }
}

impl From<ClientError> for GuardedError {
    fn from(e: ClientError) -> Self {
        GuardedError::Call(e)
    }
}

impl fmt::Display for GuardedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardedError::Gone(detail) => f.write_str(detail),
            GuardedError::Call(e) => write!(f, "{}", e),
        }
    }
}

impl RetryError<GuardedError> {
    fn into_guarded_failure(self, operation: NetworkOperation) -> StepFailure {
        match self {
            RetryError::Permanent(GuardedError::Gone(detail)) => {
                StepFailure::new(FailureReason::AttachmentGone, detail)
            }
            other => other.into_failure(operation),
        }
    }
}

/// Read the attachment before a mutating call on it.
///
/// A deleted or failed attachment aborts the call. Other read errors leave the
/// decision to the call itself.
async fn guard(
    registry: &AttachmentRegistry,
    id: &AttachmentId,
) -> Result<Option<AttachmentSnapshot>, GuardedError> {
    match registry.lookup_attachment(id).await {
        Ok(s) if s.state.is_gone() => Err(GuardedError::Gone(format!("{} is {}", id, s.state))),
        Ok(s) => Ok(Some(s)),
        Err(e) if e.is_not_found() => Err(GuardedError::Gone(format!("{} disappeared", id))),
        Err(_) => Ok(None),
    }
}

/// Runs attachment workflows against the network control surface.
pub struct Orchestrator {
    registry: Arc<AttachmentRegistry>,
    retry: RetryPolicy,
    auto_accept: bool,
}

impl Orchestrator {
    pub fn new(registry: Arc<AttachmentRegistry>, retry: RetryPolicy, auto_accept: bool) -> Self {
        Self {
            registry,
            retry,
            auto_accept,
        }
    }

    pub fn from_config(config: &FabricConfig, client: Arc<dyn NetworkClient>) -> Self {
        let registry = AttachmentRegistry::new(client, config.topology.clone());
        Self::new(
            Arc::new(registry),
            config.retry.clone(),
            config.orchestrator.auto_accept,
        )
    }

    pub fn registry(&self) -> &Arc<AttachmentRegistry> {
        &self.registry
    }

    /// Run the workflow for one trigger to a terminal state.
    pub async fn run(&self, trigger: &NormalizedTrigger) -> WorkflowExecution {
        let mut exec = WorkflowExecution::from_trigger(trigger);
        info!(
            "Starting execution {} for attachment {} on {} gateway",
            exec.id, exec.attachment_id, exec.target
        );

        match self.drive(&mut exec).await {
            Ok(()) => {
                self.enter(&mut exec, WorkflowState::Completed);
                info!("Attachment {} wired into {} gateway", exec.attachment_id, exec.target);
            }
            Err(failure) => {
                let failed_in = exec.state;
                exec.fail(failure.reason, failure.message);
                error!(
                    "Execution {} for attachment {} failed in {}: {} ({})",
                    exec.id,
                    exec.attachment_id,
                    failed_in,
                    failure.reason,
                    exec.last_error.as_deref().unwrap_or("")
                );
            }
        }
        exec
    }

    fn enter(&self, exec: &mut WorkflowExecution, state: WorkflowState) {
        info!("Attachment {}: {} -> {}", exec.attachment_id, exec.state, state);
        exec.transition(state);
    }

    async fn drive(&self, exec: &mut WorkflowExecution) -> StepResult<()> {
        let id = exec.attachment_id.clone();
        let vpc_id = exec.vpc_id.clone();
        let target = exec.target;
        let registry = self.registry.as_ref();

        self.enter(exec, WorkflowState::AwaitAvailable);
        self.await_available(exec, &id).await?;

        self.enter(exec, WorkflowState::Associating);
        let workload = self.route_table(exec, target, RouteTableRole::Workload).await?;
        let shared = self.route_table(exec, target, RouteTableRole::Shared).await?;
        let current = self.current(exec, &id).await?;
        match current.active_association() {
            Some(rt) if *rt == workload => {
                debug!("Attachment {} already associated with {}", id, workload);
            }
            Some(rt) => {
                return Err(StepFailure::new(
                    FailureReason::UnexpectedAssociation,
                    format!("{} is associated with {}, expected {}", id, rt, workload),
                ));
            }
            None => {
                let (att, rt) = (&id, &workload);
                self.with_retry(
                    exec,
                    NetworkOperation::AssociateRouteTable,
                    GuardedError::is_transient,
                    move || async move {
                        if let Some(s) = guard(registry, att).await? {
                            if s.is_associated_with(rt) {
                                return Ok(());
                            }
                        }
                        registry
                            .client()
                            .associate_route_table(rt, att)
                            .await
                            .map_err(GuardedError::from)
                    },
                )
                .await
                .map_err(|e| e.into_guarded_failure(NetworkOperation::AssociateRouteTable))?;
            }
        }

        self.enter(exec, WorkflowState::EnablingPropagation);
        let current = self.current(exec, &id).await?;
        if current.propagates_to(&shared) {
            debug!("Attachment {} already propagates to {}", id, shared);
        } else {
            let (att, rt) = (&id, &shared);
            self.with_retry(
                exec,
                NetworkOperation::EnableRoutePropagation,
                GuardedError::is_transient,
                move || async move {
                    if let Some(s) = guard(registry, att).await? {
                        if s.propagates_to(rt) {
                            return Ok(());
                        }
                    }
                    registry
                        .client()
                        .enable_route_propagation(rt, att)
                        .await
                        .map_err(GuardedError::from)
                },
            )
            .await
            .map_err(|e| e.into_guarded_failure(NetworkOperation::EnableRoutePropagation))?;
        }

        self.enter(exec, WorkflowState::MigrationCheck);
        let other = target.other();
        let Some(old_gateway) = registry.topology().gateway(other).map(|gw| gw.id.clone()) else {
            debug!("No {} gateway configured, nothing to migrate", other);
            return Ok(());
        };
        let old_workload = self.route_table(exec, other, RouteTableRole::Workload).await?;
        let old_shared = self.route_table(exec, other, RouteTableRole::Shared).await?;

        let vpc = &vpc_id;
        let siblings = self
            .with_retry(
                exec,
                NetworkOperation::DescribeAttachment,
                RegistryError::is_transient,
                move || registry.lookup_vpc_attachments(vpc),
            )
            .await
            .map_err(|e| e.into_failure(NetworkOperation::DescribeAttachment))?;
        let on_old: Vec<&AttachmentSnapshot> = siblings
            .iter()
            .filter(|a| a.transit_gateway_id == old_gateway && a.id != id)
            .collect();
        let stale_associations: Vec<AttachmentId> = on_old
            .iter()
            .filter(|a| a.is_associated_with(&old_workload))
            .map(|a| a.id.clone())
            .collect();
        let stale_propagations: Vec<AttachmentId> = on_old
            .iter()
            .filter(|a| a.propagates_to(&old_shared))
            .map(|a| a.id.clone())
            .collect();

        if stale_associations.is_empty() && stale_propagations.is_empty() {
            debug!("VPC {} has nothing left on the {} gateway", vpc_id, other);
            return Ok(());
        }
        info!(
            "VPC {} still uses the {} gateway: {} association(s), {} propagation(s)",
            vpc_id,
            other,
            stale_associations.len(),
            stale_propagations.len()
        );

        self.enter(exec, WorkflowState::Disassociating);
        for old in &stale_associations {
            let rt = &old_workload;
            self.with_retry(
                exec,
                NetworkOperation::DisassociateRouteTable,
                ClientError::is_transient,
                move || async move {
                    match registry.lookup_attachment(old).await {
                        Ok(s) if s.state.is_gone() || !s.is_associated_with(rt) => return Ok(()),
                        Err(e) if e.is_not_found() => return Ok(()),
                        _ => {}
                    }
                    match registry.client().disassociate_route_table(rt, old).await {
                        Err(e) if e.is_not_found() => Ok(()),
                        other => other,
                    }
                },
            )
            .await
            .map_err(|e| e.into_failure(NetworkOperation::DisassociateRouteTable))?;
            info!("Disassociated {} from {}", old, rt);
        }

        self.enter(exec, WorkflowState::DisablingOldPropagation);
        for old in &stale_propagations {
            let rt = &old_shared;
            self.with_retry(
                exec,
                NetworkOperation::DisableRoutePropagation,
                ClientError::is_transient,
                move || async move {
                    match registry.lookup_attachment(old).await {
                        Ok(s) if s.state.is_gone() || !s.propagates_to(rt) => return Ok(()),
                        Err(e) if e.is_not_found() => return Ok(()),
                        _ => {}
                    }
                    match registry.client().disable_route_propagation(rt, old).await {
                        Err(e) if e.is_not_found() => Ok(()),
                        other => other,
                    }
                },
            )
            .await
            .map_err(|e| e.into_failure(NetworkOperation::DisableRoutePropagation))?;
            info!("Disabled propagation of {} to {}", old, rt);
        }

        Ok(())
    }

    /// Poll until the attachment is usable.
    ///
    /// `NotFound` before the attachment was ever seen is propagation delay;
    /// after it was seen it means the attachment was deleted.
    async fn await_available(&self, exec: &mut WorkflowExecution, id: &AttachmentId) -> StepResult<()> {
        let deadline = Instant::now() + self.retry.await_timeout();
        let registry = self.registry.as_ref();
        let mut seen = false;
        let mut polls = 0;

        loop {
            match registry.lookup_attachment(id).await {
                Ok(snapshot) => {
                    seen = true;
                    match snapshot.state.phase() {
                        AttachmentPhase::Ready => return Ok(()),
                        AttachmentPhase::Gone => {
                            return Err(StepFailure::new(
                                FailureReason::AttachmentGone,
                                format!("{} is {}", id, snapshot.state),
                            ));
                        }
                        AttachmentPhase::AwaitingAcceptance if self.auto_accept => {
                            info!("Accepting attachment {}", id);
                            self.with_retry(
                                exec,
                                NetworkOperation::AcceptAttachment,
                                GuardedError::is_transient,
                                move || async move {
                                    if let Some(s) = guard(registry, id).await? {
                                        if s.state != AttachmentState::PendingAcceptance {
                                            return Ok(());
                                        }
                                    }
                                    registry
                                        .client()
                                        .accept_attachment(id)
                                        .await
                                        .map_err(GuardedError::from)
                                },
                            )
                            .await
                            .map_err(|e| {
                                e.into_guarded_failure(NetworkOperation::AcceptAttachment)
                            })?;
                        }
                        AttachmentPhase::AwaitingAcceptance | AttachmentPhase::Transitional => {
                            debug!("Attachment {} is {}, waiting", id, snapshot.state);
                        }
                    }
                }
                Err(e) if e.is_not_found() => {
                    if seen {
                        return Err(StepFailure::new(
                            FailureReason::AttachmentGone,
                            format!("{} disappeared", id),
                        ));
                    }
                    debug!("Attachment {} not visible yet", id);
                }
                Err(e) if e.is_transient() => {
                    warn!("Transient error describing {}: {}", id, e);
                }
                Err(e) => {
                    return Err(StepFailure::new(
                        FailureReason::NonRetryable,
                        format!("describe {} failed: {}", id, e),
                    ));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StepFailure::new(
                    FailureReason::TimedOutWaitingForAttachment,
                    format!(
                        "{} not available after {:?}",
                        id,
                        self.retry.await_timeout()
                    ),
                ));
            }
            let delay = self.retry.poll_delay(polls).min(deadline - now);
            polls += 1;
            tokio::time::sleep(delay).await;
        }
    }

    /// Fresh view of the attachment, failing if it is gone.
    async fn current(
        &self,
        exec: &mut WorkflowExecution,
        id: &AttachmentId,
    ) -> StepResult<AttachmentSnapshot> {
        let registry = self.registry.as_ref();
        let snapshot = self
            .with_retry(
                exec,
                NetworkOperation::DescribeAttachment,
                RegistryError::is_transient,
                move || registry.lookup_attachment(id),
            )
            .await
            .map_err(|e| match e {
                RetryError::Permanent(err) if err.is_not_found() => StepFailure::new(
                    FailureReason::AttachmentGone,
                    format!("{} disappeared", id),
                ),
                other => other.into_failure(NetworkOperation::DescribeAttachment),
            })?;

        if snapshot.state.is_gone() {
            return Err(StepFailure::new(
                FailureReason::AttachmentGone,
                format!("{} is {}", id, snapshot.state),
            ));
        }
        Ok(snapshot)
    }

    async fn route_table(
        &self,
        exec: &mut WorkflowExecution,
        gateway: GatewayRole,
        role: RouteTableRole,
    ) -> StepResult<RouteTableId> {
        let registry = self.registry.as_ref();
        self.with_retry(
            exec,
            NetworkOperation::GetParameter,
            RegistryError::is_transient,
            move || registry.lookup_route_table_id(gateway, role),
        )
        .await
        .map_err(|e| match e {
            RetryError::Permanent(err) => StepFailure::new(
                FailureReason::RouteTableUnavailable,
                format!("{} {} route table: {}", gateway, role, err),
            ),
            exhausted => exhausted.into_failure(NetworkOperation::GetParameter),
        })
    }

    /// Call until success, a permanent error, or the attempt budget runs out.
    async fn with_retry<T, E, F, Fut>(
        &self,
        exec: &mut WorkflowExecution,
        operation: NetworkOperation,
        is_transient: fn(&E) -> bool,
        mut call: F,
    ) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !is_transient(&e) => return Err(RetryError::Permanent(e)),
                Err(e) => e,
            };
            if attempt >= self.retry.max_attempts {
                return Err(RetryError::Exhausted(err));
            }

            let delay = self.retry.backoff(attempt - 1);
            warn!(
                "{} for {} failed (attempt {}/{}), retrying in {:?}: {}",
                operation, exec.attachment_id, attempt, self.retry.max_attempts, delay, err
            );
            exec.attempts += 1;
            attempt += 1;
            tokio::time::sleep(delay).await;
        }
    }
}
