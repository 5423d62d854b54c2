//! Interface tier (L1): envelope validation, sliding-window rate limiting,
//! request-history ring and built-in command dispatch, fronted by a `Tier`
//! implementation. Grounded on `layer1_interface/interface.py`.

pub mod types;
pub mod webhook;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use aios_common::envelope::{Envelope, ErrorInfo, Identity, Outcome, RequestKind, Status};
use aios_common::error::{AiError, CoreError, InterfaceError};
use aios_common::rate_limiting::RateLimiter;
use aios_common::tier::{Tier, TierHealth};
use aios_layer2::IntelligenceTier;

pub use types::{HistoryEntry, InterfaceConfig, RequestHistory};
pub use webhook::{envelope_from_payload, verify_signature, Provider as WebhookProvider};

const HELP_TEXT: &str = "\
AI Operating System - Help

Commands:
  status    - Show system status
  help      - Show this help message
  history   - Show recent requests

Request Types:
  general   - General AI requests
  query     - Query knowledge base
  command   - Execute system command
  workflow  - Run a workflow pipeline

For more information, see the documentation.";

pub struct InterfaceTier {
    config: InterfaceConfig,
    rate_limiter: RateLimiter,
    history: RequestHistory,
    downstream: Arc<IntelligenceTier>,
}

impl InterfaceTier {
    pub fn new(config: InterfaceConfig, downstream: IntelligenceTier) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        let history = RequestHistory::new(config.max_history);
        Self {
            config,
            rate_limiter,
            history,
            downstream: Arc::new(downstream),
        }
    }

    fn validate(&self, request: &Envelope) -> Result<(), InterfaceError> {
        if request.text.trim().is_empty() && request.context.is_empty() {
            return Err(InterfaceError::Validation {
                field: "content".to_string(),
                message: "request must have content or context".to_string(),
            });
        }
        Ok(())
    }

    fn record_history(&self, request: &Envelope) {
        self.history.record(HistoryEntry {
            request_id: request.request_id,
            timestamp: request.created_at,
            request_type: kind_str(request.request_type).to_string(),
            source: request.source.clone(),
            user_id: match &request.identity {
                Identity::User(id) => Some(id.clone()),
                Identity::Source(_) => None,
            },
        });
    }

    /// Built-in commands dispatched entirely within L1, matching
    /// `_handle_command`'s `status`/`help`/`history` branches. Returns
    /// `None` when the command isn't a built-in and should forward to L2.
    fn dispatch_builtin(&self, request: &Envelope) -> Option<Outcome> {
        if request.request_type != RequestKind::Command {
            return None;
        }
        match request.text.trim().to_lowercase().as_str() {
            "status" => Some(self.status_outcome(request)),
            "help" => Some(
                Outcome::success(request.request_id, json!(HELP_TEXT), vec![], 0)
                    .with_executed_by("L1:Interface"),
            ),
            "history" => Some(self.history_outcome(request)),
            _ => None,
        }
    }

    fn status_outcome(&self, request: &Envelope) -> Outcome {
        let health = self.health_check();
        let payload = json!({
            "tier": health.tier,
            "status": format!("{:?}", health.status),
            "issues": health.issues,
        });
        Outcome::success(request.request_id, payload.clone(), vec![], 0)
            .with_executed_by("L1:Interface")
            .with_artifact("health", payload)
    }

    fn history_outcome(&self, request: &Envelope) -> Outcome {
        let recent = self.history.recent(10);
        let payload = json!({ "recent_requests": recent.len() });
        Outcome::success(request.request_id, payload, vec![], 0)
            .with_executed_by("L1:Interface")
            .with_artifact("history", serde_json::to_value(&recent).unwrap_or(json!([])))
    }

    pub fn history(&self) -> &RequestHistory {
        &self.history
    }

    /// Exposes the downstream intelligence tier for surfaces that need to
    /// reach the agent pool or workflow registry directly (`GET /agents`,
    /// `GET /workflows`).
    pub fn intelligence(&self) -> &Arc<IntelligenceTier> {
        &self.downstream
    }
}

fn kind_str(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::General => "general",
        RequestKind::Query => "query",
        RequestKind::Command => "command",
        RequestKind::Workflow => "workflow",
        RequestKind::Webhook => "webhook",
    }
}

#[async_trait]
impl Tier for InterfaceTier {
    async fn process(&self, request: Envelope) -> Result<Outcome, CoreError> {
        let started = Instant::now();
        let request_id = request.request_id;

        if let Err(e) = self.validate(&request) {
            return Ok(terminal_error(request_id, e, started));
        }
        if let Err(e) = self
            .rate_limiter
            .check_rate_limit(&request.identity, "/process")
        {
            return Ok(terminal_error(request_id, e, started));
        }

        self.record_history(&request);

        let mut outcome = if let Some(builtin) = self.dispatch_builtin(&request) {
            builtin
        } else {
            self.downstream.process(request).await?
        };

        outcome.layer_trace.insert(0, "L1:Interface".to_string());
        outcome.duration_ms = started.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    fn health_check(&self) -> TierHealth {
        if self.config.enabled {
            TierHealth::healthy("L1:Interface")
        } else {
            TierHealth::degraded("L1:Interface", vec!["interface disabled by config".to_string()])
        }
    }
}

fn terminal_error(request_id: uuid::Uuid, e: InterfaceError, started: Instant) -> Outcome {
    let status = Status::Failed;
    let mut details = std::collections::HashMap::new();
    if let InterfaceError::RateLimit { retry_after_secs } = &e {
        details.insert("retry_after".to_string(), json!(retry_after_secs));
    }
    let error = ErrorInfo {
        code: e.code().to_string(),
        message: e.to_string(),
        recoverable: e.recoverable(),
        details,
    };
    Outcome::error(
        request_id,
        status,
        error,
        vec!["L1:Interface".to_string()],
        started.elapsed().as_millis() as u64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_common::envelope::Identity;
    use aios_layer2::{IntelligenceConfig, IntelligenceTier};
    use aios_layer3::{OrchestrationConfig, OrchestrationTier};
    use aios_layer4::{AgentRegistry, AgentsTier};

    fn build_tier(config: InterfaceConfig) -> InterfaceTier {
        let agents = AgentsTier::new(AgentRegistry::new());
        let orchestration = OrchestrationTier::new(agents, OrchestrationConfig::default());
        let intelligence = IntelligenceTier::new(orchestration, IntelligenceConfig::default());
        InterfaceTier::new(config, intelligence)
    }

    #[tokio::test]
    async fn empty_request_fails_validation() {
        let tier = build_tier(InterfaceConfig::default());
        let request = Envelope::new(Identity::User("alice".into()), "");
        let outcome = tier.process(request).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "INTERFACE_VALIDATION");
    }

    #[tokio::test]
    async fn help_command_is_handled_entirely_within_l1() {
        let tier = build_tier(InterfaceConfig::default());
        let request = Envelope::new(Identity::User("alice".into()), "help")
            .with_request_type(RequestKind::Command);
        let outcome = tier.process(request).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.layer_trace, vec!["L1:Interface".to_string()]);
    }

    #[tokio::test]
    async fn the_101st_request_in_a_window_is_rate_limited() {
        let mut config = InterfaceConfig::default();
        config.rate_limit.default.requests = 100;
        config.rate_limit.default.window_secs = 60;
        let tier = build_tier(config);

        for _ in 0..100 {
            let request = Envelope::new(Identity::User("bob".into()), "status")
                .with_request_type(RequestKind::Command);
            let outcome = tier.process(request).await.unwrap();
            assert!(outcome.success);
        }
        let request = Envelope::new(Identity::User("bob".into()), "status")
            .with_request_type(RequestKind::Command);
        let outcome = tier.process(request).await.unwrap();
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert_eq!(error.code, "INTERFACE_RATE_LIMIT");
        assert_eq!(error.details["retry_after"], json!(60));
    }
}
