//! Simulate command - Reconcile events against a mock network.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use fabric_client::MockNetwork;
use fabric_core::{DispatchEvent, Dispatcher, EventGateway, Orchestrator, WorkflowExecution};

use super::{load_config, read_event, Outcome};

#[derive(Args)]
pub struct SimulateArgs {
    /// Fabric configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "FABRIC_CONFIG")]
    config: PathBuf,

    /// Mock network fixture (YAML)
    #[arg(short, long)]
    network: PathBuf,

    /// Event JSON files, dispatched in order
    #[arg(required = true)]
    events: Vec<PathBuf>,

    /// Write execution records to this directory
    #[arg(long)]
    journal: Option<PathBuf>,
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let network = MockNetwork::load_fixture(&args.network)
        .with_context(|| format!("Failed to load network fixture {}", args.network.display()))?;

    let gateway = EventGateway::from_config(&config);
    let orchestrator = Arc::new(Orchestrator::from_config(&config, Arc::new(network.clone())));
    let (handle, dispatcher, mut events) =
        Dispatcher::new(orchestrator, config.orchestrator.queue_capacity);
    let runner = tokio::spawn(dispatcher.run());

    let mut rejected = 0;
    for path in &args.events {
        let raw = read_event(path)?;
        match gateway.accept_str(&raw) {
            Ok(trigger) => handle.submit(trigger).await?,
            Err(rejection) => {
                rejected += 1;
                println!("{}: rejected ({})", path.display(), rejection);
            }
        }
    }
    drop(handle);
    runner.await.context("Dispatcher task failed")?;

    let mut failed = 0;
    while let Some(event) = events.recv().await {
        match event {
            DispatchEvent::Coalesced(trigger) => {
                println!("{}: coalesced into running execution", trigger.attachment_id);
            }
            DispatchEvent::Finished(execution) => {
                print_execution(&execution);
                if execution.failure.is_some() {
                    failed += 1;
                }
                if let Some(dir) = &args.journal {
                    let path = execution.save(dir)?;
                    info!("Wrote {}", path.display());
                }
            }
        }
    }

    println!(
        "{} mutating call(s) issued, {} event(s) rejected",
        network.mutating_call_count(),
        rejected
    );
    if failed > 0 {
        warn!("{} execution(s) failed", failed);
        return Err(Outcome::ExecutionsFailed(failed).into());
    }
    Ok(())
}

fn print_execution(execution: &WorkflowExecution) {
    let path: Vec<&str> = execution.visited().iter().map(|s| s.as_str()).collect();
    match execution.failure {
        Some(reason) => println!(
            "{}: {} in {} ({})",
            execution.attachment_id,
            reason,
            execution.failed_in.map(|s| s.as_str()).unwrap_or("unknown"),
            execution.last_error.as_deref().unwrap_or("")
        ),
        None => println!("{}: {}", execution.attachment_id, execution.state),
    }
    println!("  {}", path.join(" -> "));
}
