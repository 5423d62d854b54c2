//! Expert descriptors and rolling performance stats.
//!
//! `ExpertPerformance`'s rolling-average math mirrors `TierStats::record` in
//! `aios-common` (same incremental-mean shape), applied at the
//! per-expert granularity spec.md §4.4 describes rather than per-tier.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpertArchetype {
    TextGeneration,
    Knowledge,
    Analytics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpertPerformance {
    pub attempts: u64,
    pub successes: u64,
    pub avg_latency_ms: f64,
}

impl ExpertPerformance {
    pub fn record(&mut self, latency_ms: u64, success: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        }
        let n = self.attempts as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            1.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Static description of a registered expert, separate from its adapter
/// implementation so the router (L2) can reason about capabilities without
/// holding a reference to the live adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertDescriptor {
    pub id: String,
    pub name: String,
    pub archetype: ExpertArchetype,
    pub capabilities: HashSet<String>,
    pub strengths: Vec<String>,
    pub static_priority: i32,
    pub performance: ExpertPerformance,
}

impl ExpertDescriptor {
    pub fn new(id: impl Into<String>, archetype: ExpertArchetype) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            archetype,
            capabilities: HashSet::new(),
            strengths: Vec::new(),
            static_priority: 0,
            performance: ExpertPerformance::default(),
        }
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = &'static str>) -> Self {
        self.capabilities = caps.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_strengths(mut self, strengths: impl IntoIterator<Item = &'static str>) -> Self {
        self.strengths = strengths.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.static_priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpertHealthState {
    Available,
    Degraded,
    Unavailable,
}
