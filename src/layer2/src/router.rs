//! Mixture-of-Experts router: scores each registered expert against a
//! classification and picks a primary plus up to two secondaries. Ported
//! from `layer2_intelligence/router.py::TaskRouter::_calculate_agent_score`.

use std::collections::HashMap;

use aios_layer4::{ExpertDescriptor, ExpertArchetype};

use crate::types::{Action, Classification, Complexity, Domain, RoutingDecision};

fn domain_capability_tags(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Code => &["code_generation", "debugging", "refactoring"],
        Domain::Network => &["network_config", "troubleshooting"],
        Domain::Cloud => &["cloud_ops", "infrastructure"],
        Domain::Document => &["writing", "summarization"],
        Domain::Web => &["web_search", "research"],
        Domain::Knowledge => &["qa", "retrieval"],
        Domain::Business => &["analytics", "reporting"],
        Domain::General => &["general"],
    }
}

/// Fraction of the category's capability tags the expert holds, nudged up
/// when it also declares the sub-category action as a capability directly.
fn capability_match(descriptor: &ExpertDescriptor, domain: Domain, action: Action) -> f64 {
    let tags = domain_capability_tags(domain);
    let hits = tags.iter().filter(|t| descriptor.capabilities.contains(**t)).count();
    let mut score = if tags.is_empty() { 0.0 } else { hits as f64 / tags.len() as f64 };
    if descriptor.capabilities.contains(action.as_str()) {
        score = (score + 0.25).min(1.0);
    }
    score
}

/// Whether the expert's declared strengths name this category.
fn strength_match(descriptor: &ExpertDescriptor, domain: Domain) -> f64 {
    if descriptor.strengths.iter().any(|s| s.eq_ignore_ascii_case(domain.as_str())) {
        1.0
    } else {
        0.0
    }
}

/// Complexity-handling affinity derived from the expert's static priority:
/// no per-agent complexity rating table exists in this registry, so
/// priority stands in as the declared "how much can this expert take on"
/// signal (documented as an Open Question decision).
fn complexity_tier_score(descriptor: &ExpertDescriptor, complexity: Complexity) -> f64 {
    let base = (descriptor.static_priority.max(0) as f64 / 10.0).min(1.0);
    match complexity {
        Complexity::Complex => base,
        Complexity::Moderate => (base + 0.5) / 2.0,
        Complexity::Simple => 1.0 - base * 0.3,
    }
}

fn agent_score(descriptor: &ExpertDescriptor, classification: &Classification) -> f64 {
    let suggested = &classification.suggested_agents;
    let in_suggested = suggested.iter().any(|s| s == &descriptor.id);
    let is_first_suggested = suggested.first().map(|s| s == &descriptor.id).unwrap_or(false);

    let suggestion_term = if in_suggested { 0.4 } else { 0.0 } + if is_first_suggested { 0.1 } else { 0.0 };
    let capability_term = 0.3 * capability_match(descriptor, classification.primary_category, classification.sub_category);
    let strength_term = 0.2 * strength_match(descriptor, classification.primary_category);
    let complexity_term = 0.1 * complexity_tier_score(descriptor, classification.complexity);

    let raw = suggestion_term + capability_term + strength_term + complexity_term;
    let damped = raw * (0.5 + 0.5 * descriptor.performance.success_rate());
    damped.clamp(0.0, 1.0)
}

fn archetype_label(archetype: ExpertArchetype) -> &'static str {
    match archetype {
        ExpertArchetype::TextGeneration => "text generation",
        ExpertArchetype::Knowledge => "knowledge retrieval",
        ExpertArchetype::Analytics => "analytics",
    }
}

fn top_strength(descriptor: &ExpertDescriptor) -> &str {
    descriptor
        .strengths
        .first()
        .map(String::as_str)
        .unwrap_or_else(|| archetype_label(descriptor.archetype))
}

/// Picks a primary and up to two secondaries from `experts`, in the shape
/// spec.md §4.2's router section describes. Returns `None` when there are
/// no registered experts to score (the caller falls back to the configured
/// default expert).
pub fn route(experts: &[ExpertDescriptor], classification: &Classification) -> Option<RoutingDecision> {
    if experts.is_empty() {
        return None;
    }

    let suggested_rank = |id: &str| -> usize {
        classification
            .suggested_agents
            .iter()
            .position(|s| s == id)
            .unwrap_or(usize::MAX)
    };
    let static_priority = |id: &str| -> i32 { experts.iter().find(|d| d.id == id).map(|d| d.static_priority).unwrap_or(0) };

    let mut scores: Vec<(String, f64)> = experts
        .iter()
        .map(|d| (d.id.clone(), agent_score(d, classification)))
        .collect();
    // Ties broken deterministically: earlier position in `suggested_agents`
    // wins, then higher `static_priority`, regardless of the input's order.
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| suggested_rank(&a.0).cmp(&suggested_rank(&b.0)))
            .then_with(|| static_priority(&b.0).cmp(&static_priority(&a.0)))
    });

    let (primary_id, primary_score) = scores[0].clone();
    let threshold = 0.5 * primary_score;
    let secondaries: Vec<String> = scores[1..]
        .iter()
        .filter(|(_, score)| *score > threshold)
        .take(2)
        .map(|(id, _)| id.clone())
        .collect();

    let primary_descriptor = experts.iter().find(|d| d.id == primary_id);
    let reason = format!(
        "category={}, sub_category={}, expert={} (top strength: {}), confidence={:.2}",
        classification.primary_category.as_str(),
        classification.sub_category.as_str(),
        primary_id,
        primary_descriptor.map(top_strength).unwrap_or("general"),
        classification.confidence,
    );

    Some(RoutingDecision {
        primary: primary_id,
        secondaries,
        reason,
        scores: scores.into_iter().collect::<HashMap<_, _>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn classification(primary: Domain, suggested: Vec<&str>) -> Classification {
        Classification {
            primary_category: primary,
            sub_category: Action::Create,
            complexity: Complexity::Simple,
            confidence: 0.8,
            category_scores: StdHashMap::new(),
            suggested_agents: suggested.into_iter().map(String::from).collect(),
            requires_multi_agent: false,
        }
    }

    #[test]
    fn suggested_first_expert_wins_as_primary() {
        let experts = vec![
            ExpertDescriptor::new("code-expert", ExpertArchetype::TextGeneration).with_strengths(["code"]),
            ExpertDescriptor::new("writer-expert", ExpertArchetype::TextGeneration),
        ];
        let classification = classification(Domain::Code, vec!["code-expert", "writer-expert"]);
        let decision = route(&experts, &classification).unwrap();
        assert_eq!(decision.primary, "code-expert");
    }

    #[test]
    fn no_experts_returns_none() {
        assert!(route(&[], &classification(Domain::Code, vec![])).is_none());
    }

    #[test]
    fn equal_score_ties_break_on_suggested_order_then_static_priority() {
        let a = ExpertDescriptor::new("a", ExpertArchetype::TextGeneration);
        let b = ExpertDescriptor::new("b", ExpertArchetype::TextGeneration);
        let classification = classification(Domain::General, vec!["b", "a"]);

        // Neither expert matches any scoring term, so both score 0.0 and the
        // tie-break alone decides: "b" is listed first in suggested_agents.
        let decision = route(&[a.clone(), b.clone()], &classification).unwrap();
        assert_eq!(decision.primary, "b");

        // Same experts, input order reversed: result must not depend on it.
        let decision_reversed = route(&[b, a], &classification).unwrap();
        assert_eq!(decision_reversed.primary, "b");
    }

    #[test]
    fn equal_score_and_no_suggestion_falls_back_to_static_priority() {
        let low = ExpertDescriptor::new("low", ExpertArchetype::TextGeneration).with_priority(1);
        let high = ExpertDescriptor::new("high", ExpertArchetype::TextGeneration).with_priority(5);
        let classification = classification(Domain::General, vec![]);

        let decision = route(&[low, high], &classification).unwrap();
        assert_eq!(decision.primary, "high");
    }
}
