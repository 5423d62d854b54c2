//! Intelligence tier (L2): intent parsing, category classification, MoE
//! routing and session-context enrichment, fronted by a `Tier`
//! implementation. Grounded on `layer2_intelligence/intelligence.py`.

pub mod classifier;
pub mod context;
pub mod intent;
pub mod router;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use aios_common::envelope::{Envelope, Outcome};
use aios_common::error::CoreError;
use aios_common::tier::{Tier, TierHealth};
use aios_layer3::OrchestrationTier;

pub use classifier::{SemanticScorer, TaskClassifier};
pub use context::ContextManager;
pub use types::{Action, Classification, Complexity, Domain, Intent, IntelligenceConfig, RoutingDecision};

pub struct IntelligenceTier {
    config: IntelligenceConfig,
    classifier: TaskClassifier,
    context: ContextManager,
    downstream: Arc<OrchestrationTier>,
}

impl IntelligenceTier {
    pub fn new(downstream: OrchestrationTier, config: IntelligenceConfig) -> Self {
        let context = ContextManager::new(
            config.history_depth,
            config.session_ttl_secs,
            config.classification_cache_ttl_secs,
        );
        Self {
            config,
            classifier: TaskClassifier::new(),
            context,
            downstream: Arc::new(downstream),
        }
    }

    /// Looks up the classification cache before running the classifier,
    /// keyed by the intent's domain hint — `intelligence.py::_classify_task`.
    fn classify_with_cache(&self, text: &str, intent: &Intent) -> Classification {
        if let Some(cached) = self.context.cached_classification(text, intent.domain) {
            if let Ok(classification) = serde_json::from_value(cached) {
                return classification;
            }
        }
        let classification = self.classifier.classify(text, intent.action);
        if let Ok(value) = serde_json::to_value(&classification) {
            self.context.cache_classification(text, intent.domain, value);
        }
        classification
    }

    /// Falls back to `{domain=general, suggested=[default expert],
    /// confidence=0.7}` when the registry has nothing to route against —
    /// spec.md §4.2's "Failure semantics".
    fn route_or_fallback(&self, classification: &Classification) -> RoutingDecision {
        let experts = self.downstream.agents().registry().descriptors();
        router::route(&experts, classification).unwrap_or_else(|| RoutingDecision {
            primary: self.config.default_expert.clone(),
            secondaries: Vec::new(),
            reason: "no experts registered; falling back to the configured default".to_string(),
            scores: Default::default(),
        })
    }

    pub fn context_manager(&self) -> &ContextManager {
        &self.context
    }

    /// Exposes the downstream orchestration tier for surfaces that need to
    /// read the expert pool or registered workflows directly (`GET /agents`,
    /// `GET /workflows`) without a full pipeline round-trip.
    pub fn orchestration(&self) -> &Arc<OrchestrationTier> {
        &self.downstream
    }
}

#[async_trait]
impl Tier for IntelligenceTier {
    async fn process(&self, request: Envelope) -> Result<Outcome, CoreError> {
        let started = Instant::now();
        let session_id = request.session_id;
        let original_text = request.text.clone();

        let intent = intent::parse_intent(&request.text);
        let classification = self.classify_with_cache(&request.text, &intent);
        let routing = self.route_or_fallback(&classification);

        let session_context = self.context.get_relevant_context(session_id);

        let enriched = request
            .with_context_value("target_agent", json!(routing.primary))
            .with_context_value("secondary_experts", json!(routing.secondaries))
            .with_context_value("classification", serde_json::to_value(&classification).unwrap_or(json!({})))
            .with_context_value("complexity", json!(complexity_str(classification.complexity)))
            .with_context_value("requires_multi_agent", json!(classification.requires_multi_agent))
            .with_context_value("routing_reason", json!(routing.reason))
            .with_context_value("session_context", session_context);

        let mut outcome = self.downstream.process(enriched).await?;

        let response_text = outcome
            .result
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        self.context.add_interaction(session_id, &original_text, &response_text);

        outcome.layer_trace.insert(0, "L2:Intelligence".to_string());
        outcome.duration_ms = started.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    fn health_check(&self) -> TierHealth {
        if self.config.enabled {
            TierHealth::healthy("L2:Intelligence")
        } else {
            TierHealth::degraded("L2:Intelligence", vec!["intelligence disabled by config".to_string()])
        }
    }
}

fn complexity_str(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Simple => "simple",
        Complexity::Moderate => "moderate",
        Complexity::Complex => "complex",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_common::envelope::Identity;
    use aios_layer3::OrchestrationConfig;
    use aios_layer4::{AgentRegistry, AgentsTier, ExpertArchetype, ExpertDescriptor};
    use async_trait::async_trait as at;
    use serde_json::Value;

    struct Echo;
    #[at]
    impl aios_layer4::ExpertAdapter for Echo {
        async fn execute(&self, prompt: &str, _context: &Value) -> Result<Value, aios_common::error::AgentError> {
            Ok(json!({ "echo": prompt }))
        }
    }

    async fn build_tier() -> IntelligenceTier {
        let registry = AgentRegistry::new();
        registry
            .register(
                ExpertDescriptor::new("code-expert", ExpertArchetype::TextGeneration).with_strengths(["code"]),
                Box::new(Echo),
            )
            .await;
        registry.set_default("code-expert");
        let agents = AgentsTier::new(registry);
        let dir = tempfile::tempdir().unwrap();
        let orchestration =
            OrchestrationTier::new(agents, OrchestrationConfig { checkpoint_dir: dir.path().to_path_buf() });
        IntelligenceTier::new(orchestration, IntelligenceConfig::default())
    }

    #[tokio::test]
    async fn code_request_routes_to_the_code_expert() {
        let tier = build_tier().await;
        let request = Envelope::new(Identity::User("alice".into()), "write a python function to reverse a list");
        let outcome = tier.process(request).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.layer_trace.contains(&"L2:Intelligence".to_string()));
        assert!(outcome.layer_trace.contains(&"code-expert".to_string()));
    }

    #[tokio::test]
    async fn interaction_is_recorded_in_session_context() {
        let tier = build_tier().await;
        let request = Envelope::new(Identity::User("alice".into()), "write a python function");
        let session_id = request.session_id;
        tier.process(request).await.unwrap();

        let context = tier.context_manager().get_relevant_context(session_id);
        let recent = context["recent_interactions"].as_array().unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn empty_registry_falls_back_to_configured_default() {
        let agents = AgentsTier::new(AgentRegistry::new());
        let dir = tempfile::tempdir().unwrap();
        let orchestration =
            OrchestrationTier::new(agents, OrchestrationConfig { checkpoint_dir: dir.path().to_path_buf() });
        let mut config = IntelligenceConfig::default();
        config.default_expert = "claude-default".to_string();
        let tier = IntelligenceTier::new(orchestration, config);

        let request = Envelope::new(Identity::User("alice".into()), "write some code");
        let outcome = tier.process(request).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "AGENT_UNAVAILABLE");
    }
}
