//! Multi-category rule-based classifier, ported from
//! `layer2_intelligence/classifier.py::TaskClassifier`.
//!
//! The original additionally blends in a semantic-embedding score when a
//! model is loaded. Nothing in this workspace's dependency stack supplies an
//! embedding model, so [`SemanticScorer`] exists as the seam spec.md §4.2
//! describes but is never populated — the classifier runs rule-only, which
//! is exactly the graceful-degradation path the original falls back to when
//! its model is unavailable.

use std::collections::HashMap;

use crate::types::{Action, Classification, Complexity, Domain};

/// Implemented by a future embedding back-end; `classify` blends its score
/// in when present. See the module doc for why none is wired up here.
pub trait SemanticScorer: Send + Sync {
    fn score(&self, text: &str, domain: Domain) -> f64;
}

struct CategorySpec {
    domain: Domain,
    keywords: &'static [&'static str],
    complexity_boost: f64,
    primary_agents: &'static [&'static str],
}

const CATEGORIES: &[CategorySpec] = &[
    CategorySpec {
        domain: Domain::Code,
        keywords: &[
            "code", "function", "python", "rust", "script", "bug", "debug", "class",
            "variable", "compile", "refactor", "unit test", "pull request",
        ],
        complexity_boost: 0.2,
        primary_agents: &["code-expert", "claude-default"],
    },
    CategorySpec {
        domain: Domain::Network,
        keywords: &[
            "network", "firewall", "router", "dns", "vpn", "subnet", "latency",
            "packet loss", "bandwidth",
        ],
        complexity_boost: 0.1,
        primary_agents: &["network-expert", "claude-default"],
    },
    CategorySpec {
        domain: Domain::Cloud,
        keywords: &[
            "cloud", "aws", "azure", "gcp", "kubernetes", "container", "terraform",
            "auto scaling", "load balancer",
        ],
        complexity_boost: 0.15,
        primary_agents: &["cloud-expert", "claude-default"],
    },
    CategorySpec {
        domain: Domain::Document,
        keywords: &["document", "report", "memo", "summary", "write-up", "draft a"],
        complexity_boost: 0.0,
        primary_agents: &["writer-expert", "claude-default"],
    },
    CategorySpec {
        domain: Domain::Web,
        keywords: &["website", "webpage", "html", "browser", "web app", "frontend"],
        complexity_boost: 0.05,
        primary_agents: &["web-expert", "claude-default"],
    },
    CategorySpec {
        domain: Domain::Knowledge,
        keywords: &["explain", "what is", "knowledge", "concept", "define", "summarize"],
        complexity_boost: -0.1,
        primary_agents: &["knowledge-expert", "claude-default"],
    },
    CategorySpec {
        domain: Domain::Business,
        keywords: &["budget", "revenue", "strategy", "market", "business plan", "roi"],
        complexity_boost: 0.1,
        primary_agents: &["business-expert", "claude-default"],
    },
];

const ACTION_AGENTS: &[(Action, &[&str])] = &[
    (Action::Create, &["writer-expert"]),
    (Action::Analyze, &["analytics-expert"]),
    (Action::Configure, &["cloud-expert"]),
    (Action::Search, &["web-expert"]),
    (Action::Troubleshoot, &["network-expert"]),
    (Action::Automate, &["code-expert"]),
    (Action::Query, &["knowledge-expert"]),
];

/// Counts keyword hits in `text`, double-weighting multi-word phrases, and
/// normalizes to `[0, 1]` — `classifier.py::_calculate_category_score`.
fn category_score(text: &str, keywords: &[&str]) -> f64 {
    let mut matches = 0.0_f64;
    for keyword in keywords {
        if text.contains(keyword) {
            matches += if keyword.contains(' ') { 2.0 } else { 1.0 };
        }
    }
    let denom = keywords.len() as f64 * 0.5;
    if denom <= 0.0 {
        0.0
    } else {
        (matches / denom).min(1.0)
    }
}

/// Base score from word count, plus the winning category's boost, plus
/// explicit cue-word adjustments — `classifier.py::_calculate_complexity`.
fn complexity_score(text: &str, word_count: usize, boost: f64) -> f64 {
    let base = if word_count < 10 {
        0.2
    } else if word_count < 30 {
        0.4
    } else if word_count < 60 {
        0.6
    } else {
        0.8
    };
    let mut score = base + boost;
    if text.contains("simple") || text.contains("quick") || text.contains("just") {
        score -= 0.15;
    }
    if text.contains("comprehensive") || text.contains("multiple") || text.contains("complex") {
        score += 0.15;
    }
    score.clamp(0.0, 1.0)
}

fn complexity_tier(score: f64) -> Complexity {
    if score < 0.35 {
        Complexity::Simple
    } else if score < 0.65 {
        Complexity::Moderate
    } else {
        Complexity::Complex
    }
}

/// Category primary agents plus action-specific additions, deduped and
/// capped at three — `classifier.py::_get_suggested_agents`.
fn suggested_agents(domain: Domain, action: Action) -> Vec<String> {
    let mut agents = Vec::new();
    if let Some(spec) = CATEGORIES.iter().find(|c| c.domain == domain) {
        agents.extend(spec.primary_agents.iter().map(|s| s.to_string()));
    }
    if let Some((_, extra)) = ACTION_AGENTS.iter().find(|(a, _)| *a == action) {
        for agent in *extra {
            if !agents.iter().any(|a| a == agent) {
                agents.push(agent.to_string());
            }
        }
    }
    agents.truncate(3);
    agents
}

pub struct TaskClassifier {
    semantic: Option<Box<dyn SemanticScorer>>,
}

impl TaskClassifier {
    pub fn new() -> Self {
        Self { semantic: None }
    }

    pub fn with_semantic_scorer(semantic: Box<dyn SemanticScorer>) -> Self {
        Self { semantic: Some(semantic) }
    }

    pub fn classify(&self, text: &str, action: Action) -> Classification {
        let lowered = text.to_lowercase();
        let word_count = lowered.split_whitespace().count();

        let mut category_scores: HashMap<String, f64> = HashMap::new();
        let mut winner: Option<(&CategorySpec, f64)> = None;
        for spec in CATEGORIES {
            let rule = category_score(&lowered, spec.keywords);
            category_scores.insert(spec.domain.as_str().to_string(), rule);
            if winner.map(|(_, best)| rule > best).unwrap_or(true) {
                winner = Some((spec, rule));
            }
        }

        let (domain, rule_score, boost) = match winner {
            Some((spec, score)) if score > 0.0 => (spec.domain, score, spec.complexity_boost),
            _ => (Domain::General, 0.0, 0.0),
        };

        let confidence = match &self.semantic {
            Some(scorer) => {
                let semantic_score = scorer.score(&lowered, domain);
                let semantic_winner_agrees = semantic_score >= rule_score;
                if semantic_winner_agrees {
                    0.7 * semantic_score + 0.3 * rule_score
                } else {
                    0.85 * semantic_score
                }
            }
            None => rule_score.min(1.0),
        };

        let complexity = complexity_tier(complexity_score(&lowered, word_count, boost));
        let suggested_agents = suggested_agents(domain, action);
        let requires_multi_agent = complexity == Complexity::Complex || suggested_agents.len() > 1;

        Classification {
            primary_category: domain,
            sub_category: action,
            complexity,
            confidence,
            category_scores,
            suggested_agents,
            requires_multi_agent,
        }
    }
}

impl Default for TaskClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_keywords_win_the_code_category() {
        let classifier = TaskClassifier::new();
        let classification =
            classifier.classify("write a python function to reverse a list", Action::Create);
        assert_eq!(classification.primary_category, Domain::Code);
        assert!(classification.suggested_agents.contains(&"code-expert".to_string()));
    }

    #[test]
    fn no_keyword_hits_fall_back_to_general() {
        let classifier = TaskClassifier::new();
        let classification = classifier.classify("good morning", Action::Query);
        assert_eq!(classification.primary_category, Domain::General);
        assert_eq!(classification.confidence, 0.0);
    }

    #[test]
    fn long_multi_category_text_requires_multiple_agents() {
        let classifier = TaskClassifier::new();
        let long_text = format!(
            "please write a comprehensive python script and also configure {}",
            "a ".repeat(55)
        );
        let classification = classifier.classify(&long_text, Action::Create);
        assert!(classification.requires_multi_agent);
    }
}
