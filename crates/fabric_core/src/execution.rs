//! Execution records for attachment workflows.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use fabric_net::{AttachmentId, GatewayRole, VpcId};

use crate::error::CoreResult;
use crate::gateway::NormalizedTrigger;

/// Workflow state of one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    /// Polling until the attachment is usable
    AwaitAvailable,
    /// Associating the workload route table
    Associating,
    /// Propagating routes to the shared route table
    EnablingPropagation,
    /// Looking for leftovers on the other gateway
    MigrationCheck,
    Disassociating,
    DisablingOldPropagation,
    Completed,
    Failed,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::Start
    }
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Start => "start",
            WorkflowState::AwaitAvailable => "await_available",
            WorkflowState::Associating => "associating",
            WorkflowState::EnablingPropagation => "enabling_propagation",
            WorkflowState::MigrationCheck => "migration_check",
            WorkflowState::Disassociating => "disassociating",
            WorkflowState::DisablingOldPropagation => "disabling_old_propagation",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an execution ended in [`WorkflowState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The attachment was deleted, rejected or failed.
    AttachmentGone,
    TimedOutWaitingForAttachment,
    /// A call failed with an error that retrying cannot fix.
    NonRetryable,
    RetriesExhausted,
    RouteTableUnavailable,
    /// Associated with a route table nobody expected; needs a human.
    UnexpectedAssociation,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::AttachmentGone => "attachment_gone",
            FailureReason::TimedOutWaitingForAttachment => "timed_out_waiting_for_attachment",
            FailureReason::NonRetryable => "non_retryable",
            FailureReason::RetriesExhausted => "retries_exhausted",
            FailureReason::RouteTableUnavailable => "route_table_unavailable",
            FailureReason::UnexpectedAssociation => "unexpected_association",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: DateTime<Utc>,
}

/// One run of the attachment workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub attachment_id: AttachmentId,
    pub vpc_id: VpcId,
    pub target: GatewayRole,
    pub state: WorkflowState,
    /// Retries made across all calls
    pub attempts: u32,
    pub last_error: Option<String>,
    pub failure: Option<FailureReason>,
    /// State the execution was in when it failed
    pub failed_in: Option<WorkflowState>,
    pub history: Vec<TransitionRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(attachment_id: AttachmentId, vpc_id: VpcId, target: GatewayRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            attachment_id,
            vpc_id,
            target,
            state: WorkflowState::Start,
            attempts: 0,
            last_error: None,
            failure: None,
            failed_in: None,
            history: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn from_trigger(trigger: &NormalizedTrigger) -> Self {
        Self::new(
            trigger.attachment_id.clone(),
            trigger.vpc_id.clone(),
            trigger.target,
        )
    }

    /// Move to `to`, recording the transition.
    pub fn transition(&mut self, to: WorkflowState) {
        if self.state == to {
            return;
        }
        self.history.push(TransitionRecord {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn fail(&mut self, reason: FailureReason, error: impl Into<String>) {
        self.failed_in = Some(self.state);
        self.failure = Some(reason);
        self.last_error = Some(error.into());
        self.transition(WorkflowState::Failed);
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// States visited, in order, starting with the initial one.
    pub fn visited(&self) -> Vec<WorkflowState> {
        let mut states = vec![self
            .history
            .first()
            .map(|t| t.from)
            .unwrap_or(self.state)];
        states.extend(self.history.iter().map(|t| t.to));
        states
    }

    pub fn log_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-{}.json", self.attachment_id, self.id))
    }

    /// Save the record as JSON under `dir`.
    pub fn save(&self, dir: &Path) -> CoreResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = self.log_path(dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        debug!("Saved execution record to {:?}", path);
        Ok(path)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
