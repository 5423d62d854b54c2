//! The expert pool and dispatch contract.
//!
//! Ported from `layer4_agents/agents.py`: resolve the named expert, fall
//! back to a configured default if it's absent or unhealthy, wrap the call
//! in the request's own timeout, update rolling stats on completion, and
//! prepend the expert's label to the response trace.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

use aios_common::error::AgentError;

use crate::adapter::ExpertAdapter;
use crate::types::{ExpertDescriptor, ExpertHealthState};

struct RegisteredExpert {
    descriptor: ExpertDescriptor,
    adapter: Arc<dyn ExpertAdapter>,
}

pub struct AgentRegistry {
    experts: RwLock<HashMap<String, RegisteredExpert>>,
    default_expert: RwLock<Option<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            experts: RwLock::new(HashMap::new()),
            default_expert: RwLock::new(None),
        }
    }

    /// Registers an expert. Initialization failures mark the expert
    /// unavailable rather than aborting registration, per spec.md §4.4's
    /// "an expert that fails initialization is marked unavailable but does
    /// not abort L4 startup."
    pub async fn register(&self, descriptor: ExpertDescriptor, mut adapter: Box<dyn ExpertAdapter>) {
        let id = descriptor.id.clone();
        if let Err(e) = adapter.initialize().await {
            tracing::warn!(expert = %id, error = %e, "expert failed to initialize, marking unavailable");
        }
        self.experts.write().insert(
            id,
            RegisteredExpert {
                descriptor,
                adapter: Arc::from(adapter),
            },
        );
    }

    pub fn set_default(&self, expert_id: impl Into<String>) {
        *self.default_expert.write() = Some(expert_id.into());
    }

    /// Sorted by id: callers (notably the router's ranking) need a stable
    /// input order since the underlying map does not provide one.
    pub fn descriptors(&self) -> Vec<ExpertDescriptor> {
        let mut descriptors: Vec<ExpertDescriptor> = self.experts.read().values().map(|e| e.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    pub fn descriptor(&self, expert_id: &str) -> Option<ExpertDescriptor> {
        self.experts.read().get(expert_id).map(|e| e.descriptor.clone())
    }

    fn is_healthy(&self, expert_id: &str) -> bool {
        self.experts
            .read()
            .get(expert_id)
            .map(|e| e.adapter.health() != ExpertHealthState::Unavailable)
            .unwrap_or(false)
    }

    /// Resolves `target_agent`, falling back to the configured default.
    /// Returns `None` if neither is available.
    fn resolve(&self, target_agent: &str) -> Option<String> {
        if self.is_healthy(target_agent) {
            return Some(target_agent.to_string());
        }
        let default = self.default_expert.read().clone()?;
        if self.is_healthy(&default) {
            Some(default)
        } else {
            None
        }
    }

    /// Dispatches `prompt`/`context` to `target_agent` (or its fallback),
    /// under `timeout`. Returns the expert's reply and the label that was
    /// prepended to the layer trace.
    pub async fn dispatch(
        &self,
        target_agent: &str,
        prompt: &str,
        context: &Value,
        timeout: Duration,
    ) -> Result<(Value, String), AgentError> {
        let resolved = self
            .resolve(target_agent)
            .ok_or_else(|| AgentError::Unavailable(target_agent.to_string()))?;

        let adapter = {
            let experts = self.experts.read();
            experts
                .get(&resolved)
                .map(|e| e.adapter.clone())
                .ok_or_else(|| AgentError::Unavailable(resolved.clone()))?
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, adapter.execute(prompt, context)).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(value)) => {
                self.record(&resolved, latency_ms, true);
                Ok((value, resolved.clone()))
            }
            Ok(Err(e)) => {
                self.record(&resolved, latency_ms, false);
                Err(e)
            }
            Err(_) => {
                self.record(&resolved, latency_ms, false);
                Err(AgentError::Timeout(resolved.clone(), timeout.as_secs()))
            }
        };

        result
    }

    fn record(&self, expert_id: &str, latency_ms: u64, success: bool) {
        if let Some(expert) = self.experts.write().get_mut(expert_id) {
            expert.descriptor.performance.record(latency_ms, success);
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExpertArchetype;
    use async_trait::async_trait;
    use serde_json::json;

    struct AlwaysOk;
    #[async_trait]
    impl ExpertAdapter for AlwaysOk {
        async fn execute(&self, _prompt: &str, _context: &Value) -> Result<Value, AgentError> {
            Ok(json!({ "ok": true }))
        }
    }

    struct NeverHealthy;
    #[async_trait]
    impl ExpertAdapter for NeverHealthy {
        async fn execute(&self, _prompt: &str, _context: &Value) -> Result<Value, AgentError> {
            Ok(json!({}))
        }
        fn health(&self) -> ExpertHealthState {
            ExpertHealthState::Unavailable
        }
    }

    struct NeverReturns;
    #[async_trait]
    impl ExpertAdapter for NeverReturns {
        async fn execute(&self, _prompt: &str, _context: &Value) -> Result<Value, AgentError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn dispatch_falls_back_to_default_when_target_is_unhealthy() {
        let registry = AgentRegistry::new();
        registry
            .register(ExpertDescriptor::new("broken", ExpertArchetype::TextGeneration), Box::new(NeverHealthy))
            .await;
        registry
            .register(ExpertDescriptor::new("fallback", ExpertArchetype::TextGeneration), Box::new(AlwaysOk))
            .await;
        registry.set_default("fallback");

        let (result, label) = registry
            .dispatch("broken", "hi", &json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(label, "fallback");
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn dispatch_fails_when_no_default_is_available() {
        let registry = AgentRegistry::new();
        registry
            .register(ExpertDescriptor::new("broken", ExpertArchetype::TextGeneration), Box::new(NeverHealthy))
            .await;

        let err = registry
            .dispatch("broken", "hi", &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Unavailable(_)));
    }

    #[tokio::test]
    async fn dispatch_times_out_on_a_slow_expert() {
        let registry = AgentRegistry::new();
        registry
            .register(ExpertDescriptor::new("slow", ExpertArchetype::TextGeneration), Box::new(NeverReturns))
            .await;

        let err = registry
            .dispatch("slow", "hi", &json!({}), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(..)));
    }

    #[tokio::test]
    async fn successful_dispatch_updates_rolling_stats() {
        let registry = AgentRegistry::new();
        registry
            .register(ExpertDescriptor::new("ok", ExpertArchetype::TextGeneration), Box::new(AlwaysOk))
            .await;

        registry.dispatch("ok", "hi", &json!({}), Duration::from_secs(5)).await.unwrap();
        let descriptor = registry.descriptor("ok").unwrap();
        assert_eq!(descriptor.performance.attempts, 1);
        assert_eq!(descriptor.performance.successes, 1);
    }
}
