//! Stdin REPL front-end — spec.md §6's CLI surface.
//!
//! Prefix dispatch at envelope-construction time, per spec.md §4.1: `/`
//! command, `?` query, `!` workflow, plain text general. Calls
//! `InterfaceTier::process` directly — no HTTP round-trip. Kept to direct
//! `tokio::io` usage rather than a line-editing crate, matching the
//! teacher's own bins' minimal-dependency style.

use aios_common::tier::Tier;
use aios_core::envelope::{Envelope, Identity, RequestKind};
use aios_core::platform::{Platform, PlatformConfig};
use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "AI-OS pipeline REPL", long_about = None)]
struct Args {
    /// Platform configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Identity to attach to every request this session sends
    #[arg(short, long, default_value = "cli-user")]
    user: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();

    let config = PlatformConfig::load_from_path(args.config.as_ref())?;
    tracing_subscriber::fmt()
        .with_env_filter(config.observability.log_level.clone())
        .with_writer(std::io::stderr)
        .init();

    let prompt = config.interface.cli_prompt.clone();
    let platform = Platform::new(config);
    let runtime = platform.start().await?;
    let context = runtime.context();

    let identity = Identity::User(args.user);
    let session_id = Uuid::new_v4();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            stdout.write_all(prompt.as_bytes()).await?;
            stdout.flush().await?;
            continue;
        }

        match line {
            "exit" | "quit" => break,
            "clear" => {
                stdout.write_all(b"\x1b[2J\x1b[H").await?;
                stdout.write_all(prompt.as_bytes()).await?;
                stdout.flush().await?;
                continue;
            }
            _ => {}
        }

        let (kind, text) = dispatch_prefix(line);
        let envelope = Envelope::new(identity.clone(), text)
            .with_session(session_id)
            .with_request_type(kind)
            .with_source("cli");

        let output = match context.interface().process(envelope).await {
            Ok(outcome) => render(&outcome),
            Err(err) => format!("error: {err}"),
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
    }

    runtime.shutdown().await?;
    Ok(())
}

/// `/` → command, `?` → query, `!` → workflow, anything else → general.
/// This is the CLI's own contract (spec.md §4.1 notes L1 itself doesn't
/// interpret these prefixes — the surface in front of it does).
fn dispatch_prefix(line: &str) -> (RequestKind, &str) {
    if let Some(rest) = line.strip_prefix('/') {
        (RequestKind::Command, rest.trim())
    } else if let Some(rest) = line.strip_prefix('?') {
        (RequestKind::Query, rest.trim())
    } else if let Some(rest) = line.strip_prefix('!') {
        (RequestKind::Workflow, rest.trim())
    } else {
        (RequestKind::General, line)
    }
}

fn render(outcome: &aios_core::envelope::Outcome) -> String {
    let body = match &outcome.result {
        Some(value) => match value.as_str() {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(value).unwrap_or_default(),
        },
        None => outcome
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "(no output)".to_string()),
    };
    let executed_by = outcome.executed_by.as_deref().unwrap_or("none");
    format!("{body}\n[{executed_by}] {}ms", outcome.duration_ms)
}
