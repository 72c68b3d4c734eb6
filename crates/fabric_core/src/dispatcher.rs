//! Trigger queue and dispatch loop.
//!
//! Triggers enter a bounded queue. A single loop takes them off, runs at most
//! one execution per attachment at a time, and coalesces duplicates that
//! arrive while an execution for the same attachment is still active.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use fabric_net::AttachmentId;

use crate::error::{CoreError, CoreResult};
use crate::execution::WorkflowExecution;
use crate::gateway::NormalizedTrigger;
use crate::orchestrator::Orchestrator;

/// Something the dispatcher reports back.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// Dropped because an execution for the attachment was already active.
    Coalesced(NormalizedTrigger),
    Finished(WorkflowExecution),
}

/// Attachments with an active execution.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<AttachmentId>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if an execution already holds it.
    pub fn try_claim(&self, id: &AttachmentId) -> Option<InFlightGuard> {
        if self.active.lock().insert(id.clone()) {
            Some(InFlightGuard {
                id: id.clone(),
                active: Arc::clone(&self.active),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, id: &AttachmentId) -> bool {
        self.active.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Releases the claim on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    id: AttachmentId,
    active: Arc<Mutex<HashSet<AttachmentId>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}

/// Sending side of the trigger queue.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<NormalizedTrigger>,
}

impl DispatcherHandle {
    /// Queue a trigger, waiting while the queue is full.
    pub async fn submit(&self, trigger: NormalizedTrigger) -> CoreResult<()> {
        self.tx.send(trigger).await.map_err(|_| CoreError::QueueClosed)
    }
}

pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    rx: mpsc::Receiver<NormalizedTrigger>,
    reports: mpsc::UnboundedSender<DispatchEvent>,
    in_flight: InFlight,
}

impl Dispatcher {
    /// Create a dispatcher with a queue of `capacity` triggers.
    ///
    /// Returns the submit handle, the dispatcher to run, and the receiver
    /// for [`DispatchEvent`]s.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        capacity: usize,
    ) -> (
        DispatcherHandle,
        Self,
        mpsc::UnboundedReceiver<DispatchEvent>,
    ) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (reports, events) = mpsc::unbounded_channel();
        let dispatcher = Self {
            orchestrator,
            rx,
            reports,
            in_flight: InFlight::new(),
        };
        (DispatcherHandle { tx }, dispatcher, events)
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    /// Run until every handle is dropped and all executions have finished.
    pub async fn run(mut self) {
        let mut tasks = JoinSet::new();
        info!("Dispatcher started");

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(trigger) => self.dispatch(trigger, &mut tasks),
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.report_joined(joined);
                }
            }
        }

        debug!("Trigger queue closed, waiting for {} execution(s)", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            self.report_joined(joined);
        }
        info!("Dispatcher stopped");
    }

    fn dispatch(&self, trigger: NormalizedTrigger, tasks: &mut JoinSet<WorkflowExecution>) {
        let Some(guard) = self.in_flight.try_claim(&trigger.attachment_id) else {
            info!(
                "Coalesced trigger for {}: execution already active",
                trigger.attachment_id
            );
            self.report(DispatchEvent::Coalesced(trigger));
            return;
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        tasks.spawn(async move {
            let _guard = guard;
            orchestrator.run(&trigger).await
        });
    }

    fn report_joined(&self, joined: Result<WorkflowExecution, tokio::task::JoinError>) {
        match joined {
            Ok(execution) => self.report(DispatchEvent::Finished(execution)),
            Err(e) => error!("Execution task aborted: {}", e),
        }
    }

    fn report(&self, event: DispatchEvent) {
        if self.reports.send(event).is_err() {
            debug!("Dispatch event dropped: no receiver");
        }
    }
}
