//! Per-session interaction history and variable extraction, plus the
//! classification cache. Ported from `layer2_intelligence/context.py`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::types::Domain;

const MAX_USER_TEXT: usize = 1000;
const MAX_RESPONSE_TEXT: usize = 2000;

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/\\][\w./\\-]+").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        text.chars().take(max_len).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Interaction {
    pub user_text: String,
    pub response_text: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

struct SessionState {
    created: Instant,
    last_activity: Instant,
    history: VecDeque<Interaction>,
    variables: HashMap<String, String>,
}

/// Extracts quoted strings, filesystem paths and URLs into a deterministic
/// key space (`quoted_N`, `path_N`, `url_N`) — `context.py::_extract_variables`.
fn extract_variables(text: &str) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    for (i, cap) in QUOTED_RE.captures_iter(text).enumerate() {
        variables.insert(format!("quoted_{i}"), cap[1].to_string());
    }
    for (i, mat) in PATH_RE.find_iter(text).enumerate() {
        variables.insert(format!("path_{i}"), mat.as_str().to_string());
    }
    for (i, mat) in URL_RE.find_iter(text).enumerate() {
        variables.insert(format!("url_{i}"), mat.as_str().to_string());
    }
    variables
}

pub struct ContextManager {
    history_depth: usize,
    session_ttl: Duration,
    cache_ttl: Duration,
    sessions: Mutex<HashMap<Uuid, SessionState>>,
    classification_cache: Mutex<HashMap<String, (Value, Instant)>>,
}

impl ContextManager {
    pub fn new(history_depth: usize, session_ttl_secs: u64, cache_ttl_secs: u64) -> Self {
        Self {
            history_depth,
            session_ttl: Duration::from_secs(session_ttl_secs),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            sessions: Mutex::new(HashMap::new()),
            classification_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Session variables plus the most recent interactions, merged as a JSON
    /// object ready to fold into the envelope's `context` map —
    /// `context.py::get_relevant_context`.
    pub fn get_relevant_context(&self, session_id: Uuid) -> Value {
        let mut sessions = self.sessions.lock();
        let state = sessions.entry(session_id).or_insert_with(|| SessionState {
            created: Instant::now(),
            last_activity: Instant::now(),
            history: VecDeque::new(),
            variables: HashMap::new(),
        });
        state.last_activity = Instant::now();

        let recent: Vec<Value> = state
            .history
            .iter()
            .rev()
            .take(3)
            .map(|i| json!({ "user": i.user_text, "response": i.response_text }))
            .collect();

        json!({
            "variables": state.variables,
            "recent_interactions": recent,
        })
    }

    /// Records one turn, truncating both sides and evicting the oldest
    /// entry once `history_depth` is exceeded — `context.py::add_interaction`.
    pub fn add_interaction(&self, session_id: Uuid, user_text: &str, response_text: &str) {
        let mut variables = extract_variables(user_text);
        variables.extend(extract_variables(response_text));

        let mut sessions = self.sessions.lock();
        let state = sessions.entry(session_id).or_insert_with(|| SessionState {
            created: Instant::now(),
            last_activity: Instant::now(),
            history: VecDeque::new(),
            variables: HashMap::new(),
        });

        state.history.push_back(Interaction {
            user_text: truncate(user_text, MAX_USER_TEXT),
            response_text: truncate(response_text, MAX_RESPONSE_TEXT),
            at: chrono::Utc::now(),
        });
        while state.history.len() > self.history_depth {
            state.history.pop_front();
        }
        state.variables.extend(variables);
        state.last_activity = Instant::now();
    }

    /// Drops sessions idle longer than the configured TTL. Returns how many
    /// were evicted.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let ttl = self.session_ttl;
        let before = sessions.len();
        sessions.retain(|_, state| state.last_activity.elapsed() < ttl);
        before - sessions.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn session_age(&self, session_id: Uuid) -> Option<Duration> {
        self.sessions.lock().get(&session_id).map(|s| s.created.elapsed())
    }

    /// Looks up a cached classification keyed by `(first-100-chars, domain)`
    /// — `intelligence.py::_classify_task`'s cache key.
    pub fn cached_classification(&self, text: &str, domain_hint: Domain) -> Option<Value> {
        let key = cache_key(text, domain_hint);
        let mut cache = self.classification_cache.lock();
        match cache.get(&key) {
            Some((value, stored_at)) if stored_at.elapsed() < self.cache_ttl => Some(value.clone()),
            Some(_) => {
                cache.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn cache_classification(&self, text: &str, domain_hint: Domain, classification: Value) {
        let key = cache_key(text, domain_hint);
        self.classification_cache.lock().insert(key, (classification, Instant::now()));
    }
}

fn cache_key(text: &str, domain_hint: Domain) -> String {
    let prefix: String = text.chars().take(100).collect();
    format!("{prefix}_{}", domain_hint.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactions_beyond_depth_are_evicted_oldest_first() {
        let manager = ContextManager::new(2, 3600, 300);
        let session = Uuid::new_v4();
        manager.add_interaction(session, "first", "r1");
        manager.add_interaction(session, "second", "r2");
        manager.add_interaction(session, "third", "r3");

        let context = manager.get_relevant_context(session);
        let recent = context["recent_interactions"].as_array().unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn quoted_path_and_url_are_extracted_with_stable_keys() {
        let manager = ContextManager::new(20, 3600, 300);
        let session = Uuid::new_v4();
        manager.add_interaction(
            session,
            r#"open "config.yaml" at /etc/app/config.yaml and see https://example.com/docs"#,
            "done",
        );
        let context = manager.get_relevant_context(session);
        let variables = &context["variables"];
        assert_eq!(variables["quoted_0"], "config.yaml");
        assert_eq!(variables["path_0"], "/etc/app/config.yaml");
        assert_eq!(variables["url_0"], "https://example.com/docs");
    }

    #[test]
    fn classification_cache_round_trips_within_ttl() {
        let manager = ContextManager::new(20, 3600, 300);
        manager.cache_classification("hello world", Domain::General, json!({"ok": true}));
        assert_eq!(
            manager.cached_classification("hello world", Domain::General),
            Some(json!({"ok": true}))
        );
    }
}
