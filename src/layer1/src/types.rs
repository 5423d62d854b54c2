//! Configuration and request-history types for the interface tier, grounded
//! on `layer1_interface/interface.py`'s `__init__` defaults.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aios_common::rate_limiting::RateLimitConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub enabled: bool,
    pub rate_limit: RateLimitConfig,
    /// Process-wide bound on the request-history ring, spec.md §4.1.
    pub max_history: usize,
    pub cli_prompt: String,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit: RateLimitConfig::default(),
            max_history: 1000,
            cli_prompt: "ai-os> ".to_string(),
        }
    }
}

/// One entry in the request-history ring backing the `history` built-in
/// command. Content is not retained here, only the tracing tuple spec.md
/// §4.1 names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub request_type: String,
    pub source: String,
    pub user_id: Option<String>,
}

/// Bounded FIFO of recent requests, shared process-wide (spec.md §3
/// "Ownership").
pub struct RequestHistory {
    max_len: usize,
    entries: parking_lot::Mutex<VecDeque<HistoryEntry>>,
}

impl RequestHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            entries: parking_lot::Mutex::new(VecDeque::with_capacity(max_len.min(1024))),
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.max_len {
            entries.pop_front();
        }
    }

    /// The most recent `n` entries, newest last — matching
    /// `_get_history_response`'s `self._request_history[-10:]` slice.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock();
        let len = entries.len();
        let start = len.saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u32) -> HistoryEntry {
        HistoryEntry {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            request_type: "general".into(),
            source: "cli".into(),
            user_id: Some(n.to_string()),
        }
    }

    #[test]
    fn ring_evicts_oldest_once_full() {
        let history = RequestHistory::new(3);
        for n in 0..5 {
            history.record(entry(n));
        }
        let kept: Vec<_> = history.recent(10).into_iter().map(|e| e.user_id.unwrap()).collect();
        assert_eq!(kept, vec!["2", "3", "4"]);
    }

    #[test]
    fn recent_returns_at_most_n_newest_entries() {
        let history = RequestHistory::new(1000);
        for n in 0..20 {
            history.record(entry(n));
        }
        let kept: Vec<_> = history.recent(10).into_iter().map(|e| e.user_id.unwrap()).collect();
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[0], "10");
        assert_eq!(kept[9], "19");
    }
}
