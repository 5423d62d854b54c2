//! Fast, deterministic lexical pass over request content. Ported from
//! `intelligence.py::_parse_intent` — a cheaper, looser sibling of the
//! heavier category scoring in [`crate::classifier`].

use crate::types::{Action, Complexity, Domain, Intent};

const ACTION_KEYWORDS: &[(Action, &[&str])] = &[
    (Action::Create, &["create", "write", "generate", "build", "draft", "make"]),
    (Action::Analyze, &["analyze", "review", "evaluate", "assess", "examine"]),
    (Action::Configure, &["configure", "setup", "set up", "install", "deploy"]),
    (Action::Search, &["search", "find", "look up", "lookup", "locate"]),
    (Action::Troubleshoot, &["troubleshoot", "debug", "fix", "diagnose", "error"]),
    (Action::Automate, &["automate", "schedule", "script", "workflow"]),
];

const DOMAIN_KEYWORDS: &[(Domain, &[&str])] = &[
    (Domain::Code, &["code", "function", "python", "script", "bug", "class", "variable", "program"]),
    (Domain::Network, &["network", "firewall", "router", "dns", "vpn", "subnet"]),
    (Domain::Cloud, &["cloud", "aws", "azure", "gcp", "kubernetes", "container"]),
    (Domain::Document, &["document", "report", "memo", "summary", "write-up"]),
    (Domain::Web, &["website", "webpage", "html", "browser", "web"]),
    (Domain::Knowledge, &["explain", "what is", "knowledge", "concept", "define"]),
    (Domain::Business, &["budget", "revenue", "strategy", "market", "business"]),
];

const COMPLEXITY_CUE_WORDS: &[&str] =
    &["multiple", "comprehensive", "complex", "advanced", "end-to-end", "across"];

const CONTEXT_CUE_WORDS: &[&str] =
    &["previous", "earlier", "that", "it", "continue", "again", "last time"];

const QUESTION_STARTERS: &[&str] =
    &["who", "what", "when", "where", "why", "how", "is", "can", "does", "do", "will"];

pub fn parse_intent(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let word_count = words.len();

    let action = ACTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(action, _)| *action)
        .unwrap_or(Action::Query);

    let domain = DOMAIN_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(domain, _)| *domain)
        .unwrap_or(Domain::General);

    let has_cue = COMPLEXITY_CUE_WORDS.iter().any(|w| lowered.contains(w));
    let complexity = if word_count > 50 || has_cue {
        Complexity::Complex
    } else if word_count >= 20 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    let requires_context = CONTEXT_CUE_WORDS.iter().any(|w| lowered.contains(w));
    let trimmed = lowered.trim();
    let is_question = trimmed.ends_with('?')
        || words
            .first()
            .map(|w| QUESTION_STARTERS.contains(w))
            .unwrap_or(false);

    Intent {
        action,
        domain,
        complexity,
        requires_context,
        is_question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_statement_is_simple_and_not_a_question() {
        let intent = parse_intent("fix this bug");
        assert_eq!(intent.complexity, Complexity::Simple);
        assert!(!intent.is_question);
        assert_eq!(intent.action, Action::Troubleshoot);
    }

    #[test]
    fn question_starter_is_detected() {
        let intent = parse_intent("how do I configure a vpn");
        assert!(intent.is_question);
        assert_eq!(intent.domain, Domain::Network);
    }

    #[test]
    fn long_text_or_cue_words_escalate_complexity() {
        let long_text = "word ".repeat(51);
        assert_eq!(parse_intent(&long_text).complexity, Complexity::Complex);
        assert_eq!(
            parse_intent("run a comprehensive analysis across our systems").complexity,
            Complexity::Complex
        );
    }

    #[test]
    fn context_cue_words_set_requires_context() {
        let intent = parse_intent("continue from where we left off earlier");
        assert!(intent.requires_context);
    }
}
