//! Standalone scheduler process — spec.md §4.3.4.
//!
//! Runs the in-process timer service on its own, independent of whether
//! `aios-agent`/`aios-cli` are also running against the same workflow
//! registry. Not durable: task `next_run` times are recomputed from the
//! configured schedule grammar at startup, per spec.md's "not durable
//! across process restarts" note. Grounded on `layer3_orchestration/
//! scheduler.py`'s standalone loop and the teacher's per-concern `bin/*.rs`
//! entrypoint convention.

use std::sync::Arc;

use aios_common::tier::Tier;
use aios_core::envelope::{Envelope, Identity, RequestKind};
use aios_core::platform::{Platform, PlatformConfig, PlatformContext};
use aios_layer3::{parse_schedule, ScheduledTask, WorkflowInvoker};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about = "AI-OS scheduler", long_about = None)]
struct Args {
    /// Platform configuration file path
    #[arg(short, long)]
    config: Option<String>,
}

/// Invokes a workflow by routing a synthetic request back through the
/// full pipeline with `target_workflow` set, rather than calling the
/// orchestration tier's engine directly — this way a scheduled run gets
/// the same audit trail, rate limiting and layer trace as any other
/// request.
struct PipelineInvoker {
    context: PlatformContext,
}

#[async_trait::async_trait]
impl WorkflowInvoker for PipelineInvoker {
    async fn invoke(&self, workflow_id: &str) {
        let envelope = Envelope::new(Identity::Source("scheduler".to_string()), format!("run {workflow_id}"))
            .with_request_type(RequestKind::Workflow)
            .with_source("scheduler")
            .with_context_value("target_workflow", serde_json::json!(workflow_id));

        match self.context.interface().process(envelope).await {
            Ok(outcome) if outcome.success => {
                info!(workflow_id, "scheduled workflow run succeeded");
            }
            Ok(outcome) => {
                warn!(workflow_id, error = ?outcome.error, "scheduled workflow run failed");
            }
            Err(err) => {
                error!(workflow_id, %err, "scheduled workflow run errored");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();

    let config = PlatformConfig::load_from_path(args.config.as_ref())?;
    tracing_subscriber::fmt()
        .with_env_filter(config.observability.log_level.clone())
        .init();

    let schedules = config.orchestration.schedules.clone();

    let platform = Platform::new(config);
    let runtime = platform.start().await?;
    let context = runtime.context();

    let orchestration = context.interface().intelligence().orchestration().clone();

    let mut registered = 0;
    for entry in &schedules {
        if !entry.enabled {
            continue;
        }
        match parse_schedule(&entry.schedule) {
            Ok(schedule) => {
                orchestration
                    .scheduler
                    .add_task(ScheduledTask::new(entry.id.clone(), schedule, entry.workflow_id.clone()));
                registered += 1;
            }
            Err(err) => {
                error!(task_id = %entry.id, %err, "skipping scheduled task with malformed schedule");
            }
        }
    }
    info!(registered, "aios-scheduler started");

    let invoker: Arc<dyn WorkflowInvoker> = Arc::new(PipelineInvoker { context: context.clone() });

    tokio::select! {
        _ = orchestration.scheduler.run(invoker) => {}
        _ = tokio::signal::ctrl_c() => {
            orchestration.scheduler.stop();
        }
    }

    runtime.shutdown().await?;
    Ok(())
}
