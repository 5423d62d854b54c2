//! Intent, classification and routing value types, grounded on
//! `layer2_intelligence/intelligence.py` and `classifier.py`'s dataclasses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Analyze,
    Configure,
    Search,
    Troubleshoot,
    Automate,
    Query,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Analyze => "analyze",
            Action::Configure => "configure",
            Action::Search => "search",
            Action::Troubleshoot => "troubleshoot",
            Action::Automate => "automate",
            Action::Query => "query",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Code,
    Network,
    Cloud,
    Document,
    Web,
    Knowledge,
    Business,
    General,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Code => "code",
            Domain::Network => "network",
            Domain::Cloud => "cloud",
            Domain::Document => "document",
            Domain::Web => "web",
            Domain::Knowledge => "knowledge",
            Domain::Business => "business",
            Domain::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Output of the fast lexical pass, before the heavier category classifier
/// runs. Mirrors `intelligence.py::_parse_intent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub action: Action,
    pub domain: Domain,
    pub complexity: Complexity,
    pub requires_context: bool,
    pub is_question: bool,
}

/// Output of `TaskClassifier::classify`, ported from `classifier.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub primary_category: Domain,
    pub sub_category: Action,
    pub complexity: Complexity,
    pub confidence: f64,
    pub category_scores: HashMap<String, f64>,
    pub suggested_agents: Vec<String>,
    pub requires_multi_agent: bool,
}

/// Output of the MoE router: a primary expert, up to two secondaries, and a
/// human-readable justification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub primary: String,
    pub secondaries: Vec<String>,
    pub reason: String,
    pub scores: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligenceConfig {
    pub enabled: bool,
    /// TTL for the classification cache, spec.md §4.2.
    pub classification_cache_ttl_secs: u64,
    /// TTL for idle session context, spec.md §4.2.
    pub session_ttl_secs: u64,
    /// Bounded interaction history retained per session.
    pub history_depth: usize,
    /// Fallback expert used when classification/routing degrades, spec.md
    /// §4.2's "Failure semantics".
    pub default_expert: String,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            classification_cache_ttl_secs: 300,
            session_ttl_secs: 3600,
            history_depth: 20,
            default_expert: "claude-default".to_string(),
        }
    }
}
