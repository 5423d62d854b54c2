//! HTTP reference transport for the pipeline — spec.md §6's HTTP surface.
//!
//! Thin wrapper: every route below calls `Tier::process` on the wired L1
//! and serializes whatever `Outcome` comes back. No business logic lives
//! here. Grounded on the teacher's `bin/agent.rs` (clap args, dotenvy,
//! single `axum::Router` bound to one port, JSON in/out).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use aios_common::tier::Tier;
use aios_core::envelope::{Envelope, Identity, Outcome, Priority, RequestKind};
use aios_core::platform::{Platform, PlatformConfig, PlatformContext};
use aios_layer1::{envelope_from_payload, verify_signature, WebhookProvider};
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use dotenvy::dotenv;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "AI-OS pipeline, exposed over HTTP", long_about = None)]
struct Args {
    /// Platform configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Port to bind to
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

/// In-memory job store backing `POST /process/async` + `GET /jobs/:id`.
/// Process-wide and unbounded, matching spec.md §9's "no retention policy
/// specified" framing for on-disk checkpoints — jobs live for the process
/// lifetime, an operator restarts to clear them.
#[derive(Clone, Default)]
struct JobStore(Arc<Mutex<HashMap<Uuid, JobState>>>);

#[derive(Clone)]
enum JobState {
    Queued,
    Done(Outcome),
}

#[derive(Clone)]
struct AppState {
    context: PlatformContext,
    jobs: JobStore,
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    content: String,
    #[serde(default)]
    request_type: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<Uuid>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    target_agent: Option<String>,
    #[serde(default)]
    target_workflow: Option<String>,
}

fn envelope_from_request(body: ProcessRequest, source: &str) -> Envelope {
    let identity = match body.user_id {
        Some(user_id) => Identity::User(user_id),
        None => Identity::Source(source.to_string()),
    };

    let mut envelope = Envelope::new(identity, body.content).with_source(source);
    if let Some(kind) = body.request_type.as_deref().and_then(parse_request_kind) {
        envelope = envelope.with_request_type(kind);
    }
    if let Some(session_id) = body.session_id {
        envelope = envelope.with_session(session_id);
    }
    if let Some(priority) = body.priority.as_deref().and_then(parse_priority) {
        envelope = envelope.with_priority(priority);
    }
    if let Some(timeout) = body.timeout {
        envelope = envelope.with_timeout_secs(timeout);
    }
    if let Some(max_retries) = body.max_retries {
        envelope = envelope.with_max_retries(max_retries);
    }
    for (key, value) in body.context {
        envelope = envelope.with_context_value(key, value);
    }
    if let Some(agent) = body.target_agent {
        envelope = envelope.with_context_value("target_agent", json!(agent));
    }
    if let Some(workflow) = body.target_workflow {
        envelope = envelope.with_context_value("target_workflow", json!(workflow));
    }
    envelope
}

fn parse_request_kind(s: &str) -> Option<RequestKind> {
    match s.to_lowercase().as_str() {
        "general" => Some(RequestKind::General),
        "query" => Some(RequestKind::Query),
        "command" => Some(RequestKind::Command),
        "workflow" => Some(RequestKind::Workflow),
        "webhook" => Some(RequestKind::Webhook),
        _ => None,
    }
}

fn parse_priority(s: &str) -> Option<Priority> {
    match s.to_lowercase().as_str() {
        "critical" => Some(Priority::Critical),
        "high" => Some(Priority::High),
        "normal" => Some(Priority::Normal),
        "low" => Some(Priority::Low),
        "background" => Some(Priority::Background),
        _ => None,
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

    let platform = Platform::new(config);
    let runtime = platform.start().await?;
    let context = runtime.context();

    let state = AppState {
        context,
        jobs: JobStore::default(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/agents", get(agents))
        .route("/workflows", get(workflows))
        .route("/process", post(process))
        .route("/process/async", post(process_async))
        .route("/jobs/:id", get(job_status))
        .route("/ws", get(ws_upgrade))
        .route("/webhooks/:provider", post(webhook))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "aios-agent listening");

    axum::serve(listener, app).await?;

    runtime.shutdown().await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.context.interface().health_check();
    Json(json!({ "tier": health.tier, "status": format!("{:?}", health.status) }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.context.interface().health_check();
    Json(json!({
        "tier": health.tier,
        "status": format!("{:?}", health.status),
        "issues": health.issues,
        "uptime_secs": aios_core::utils::timestamp_now(),
    }))
}

async fn agents(State(state): State<AppState>) -> impl IntoResponse {
    let descriptors = state
        .context
        .interface()
        .intelligence()
        .orchestration()
        .agents()
        .registry()
        .descriptors();
    Json(json!({ "agents": descriptors }))
}

async fn workflows(State(state): State<AppState>) -> impl IntoResponse {
    let ids = state.context.interface().intelligence().orchestration().workflow_ids();
    Json(json!({ "workflows": ids }))
}

async fn process(State(state): State<AppState>, Json(body): Json<ProcessRequest>) -> impl IntoResponse {

    let envelope = envelope_from_request(body, "api");
    match state.context.interface().process(envelope).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => {
            error!(%err, "unrecoverable pipeline error");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn process_async(State(state): State<AppState>, Json(body): Json<ProcessRequest>) -> impl IntoResponse {

    let envelope = envelope_from_request(body, "api");
    let job_id = envelope.request_id;
    state.jobs.0.lock().unwrap().insert(job_id, JobState::Queued);

    let context = state.context.clone();
    let jobs = state.jobs.clone();
    tokio::spawn(async move {
        let outcome = context.interface().process(envelope).await;
        if let Ok(outcome) = outcome {
            jobs.0.lock().unwrap().insert(job_id, JobState::Done(outcome));
        }
    });

    Json(json!({ "job_id": job_id }))
}

async fn job_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.jobs.0.lock().unwrap().get(&id) {
        Some(JobState::Done(outcome)) => Json(json!({ "status": "done", "outcome": outcome })).into_response(),
        Some(JobState::Queued) => Json(json!({ "status": "queued" })).into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, Json(json!({ "error": "unknown job id" }))).into_response(),
    }
}

/// Verifies the provider's signature over the raw body, then forwards the
/// decoded payload into L1 as a `webhook` envelope — spec.md §6's webhook
/// surface. The shared secret and the dotted content/context field paths
/// are reference defaults; a real deployment configures these per-provider
/// rather than hardcoding them here.
async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let (webhook_provider, signature_header_name) = match provider.as_str() {
        "github" => (WebhookProvider::GitHub, "x-hub-signature-256"),
        "slack" => (WebhookProvider::Slack, "x-slack-signature"),
        _ => (WebhookProvider::Generic, "x-signature"),
    };

    let secret = std::env::var("AIOS_WEBHOOK_SECRET").unwrap_or_default();
    let signature = headers
        .get(signature_header_name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if secret.is_empty() || !verify_signature(webhook_provider, secret.as_bytes(), &body, signature) {
        return (axum::http::StatusCode::UNAUTHORIZED, Json(json!({ "error": "signature verification failed" })))
            .into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("malformed payload: {err}") })),
            )
                .into_response()
        }
    };

    let envelope = envelope_from_payload(&provider, &payload, "content", &[]);
    match state.context.interface().process(envelope).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Streams one `Outcome` per inbound `ProcessRequest`. The socket stays open
/// across many requests, unlike the one-shot `/process` endpoint — a front
/// end driving a long conversation only needs one connection.
async fn handle_ws(mut socket: WebSocket, state: AppState) {

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ProcessRequest>(&text) {
            Ok(body) => {
                let envelope = envelope_from_request(body, "ws");
                match state.context.interface().process(envelope).await {
                    Ok(outcome) => serde_json::to_string(&outcome).unwrap_or_default(),
                    Err(err) => json!({ "error": err.to_string() }).to_string(),
                }
            }
            Err(err) => json!({ "error": format!("malformed request: {err}") }).to_string(),
        };

        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }
}
