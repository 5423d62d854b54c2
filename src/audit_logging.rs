//! Append-only JSONL audit sink.
//!
//! Ported from the teacher's `src/audit_logging.rs` near-verbatim, minus the
//! `lazy_static!` global singleton: the logger is owned by
//! [`crate::platform::context::PlatformContext`] and threaded to callers
//! explicitly, per spec.md §9's "explicit context object, not module-level
//! globals" design note.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: u64,
    pub event_type: String,
    pub identity: Option<String>,
    pub resource: String,
    pub action: String,
    pub result: String,
    pub metadata: HashMap<String, String>,
    pub severity: AuditSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

pub struct AuditLogger {
    log_file: Mutex<BufWriter<File>>,
    _retention_days: u32,
}

impl AuditLogger {
    pub fn new(log_path: &str, retention_days: u32) -> Result<Self, std::io::Error> {
        if let Some(parent) = Path::new(log_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(log_path)?;

        Ok(Self {
            log_file: Mutex::new(BufWriter::new(file)),
            _retention_days: retention_days,
        })
    }

    pub fn log_event(&self, mut event: AuditEvent) -> Result<(), std::io::Error> {
        if event.timestamp == 0 {
            event.timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
        }
        if event.id.is_empty() {
            event.id = Uuid::new_v4().to_string();
        }

        let line = serde_json::to_string(&event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
            + "\n";

        let mut writer = self.log_file.lock().expect("audit log mutex poisoned");
        writer.write_all(line.as_bytes())?;
        writer.flush()?;

        if matches!(event.severity, AuditSeverity::Critical | AuditSeverity::High) {
            tracing::warn!(event_type = %event.event_type, action = %event.action, "audit event");
        }

        Ok(())
    }

    pub fn log_authentication(&self, identity: &str, success: bool) -> Result<(), std::io::Error> {
        self.log_event(AuditEvent {
            id: String::new(),
            timestamp: 0,
            event_type: "authentication".to_string(),
            identity: Some(identity.to_string()),
            resource: "session".to_string(),
            action: if success { "login" } else { "login_failed" }.to_string(),
            result: if success { "success" } else { "failure" }.to_string(),
            metadata: HashMap::new(),
            severity: if success {
                AuditSeverity::Low
            } else {
                AuditSeverity::Medium
            },
        })
    }

    pub fn log_api_access(
        &self,
        identity: Option<String>,
        endpoint: &str,
        method: &str,
        status_code: u16,
    ) -> Result<(), std::io::Error> {
        self.log_event(AuditEvent {
            id: String::new(),
            timestamp: 0,
            event_type: "api_access".to_string(),
            identity,
            resource: endpoint.to_string(),
            action: method.to_string(),
            result: status_code.to_string(),
            metadata: {
                let mut map = HashMap::new();
                map.insert("status_code".to_string(), status_code.to_string());
                map
            },
            severity: match status_code {
                200..=299 => AuditSeverity::Low,
                400..=499 => AuditSeverity::Medium,
                _ => AuditSeverity::High,
            },
        })
    }

    pub fn log_agent_dispatch(
        &self,
        identity: Option<String>,
        agent: &str,
        action: &str,
    ) -> Result<(), std::io::Error> {
        self.log_event(AuditEvent {
            id: String::new(),
            timestamp: 0,
            event_type: "agent_dispatch".to_string(),
            identity,
            resource: agent.to_string(),
            action: action.to_string(),
            result: "success".to_string(),
            metadata: HashMap::new(),
            severity: AuditSeverity::Medium,
        })
    }

    pub fn log_admin_action(
        &self,
        identity: &str,
        action: &str,
        target: &str,
    ) -> Result<(), std::io::Error> {
        self.log_event(AuditEvent {
            id: String::new(),
            timestamp: 0,
            event_type: "admin_action".to_string(),
            identity: Some(identity.to_string()),
            resource: target.to_string(),
            action: action.to_string(),
            result: "success".to_string(),
            metadata: HashMap::new(),
            severity: AuditSeverity::High,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_one_json_line_per_event() {
        let temp_file = NamedTempFile::new().unwrap();
        let logger = AuditLogger::new(temp_file.path().to_str().unwrap(), 7).unwrap();

        let event = AuditEvent {
            id: "test-id".to_string(),
            timestamp: 1234567890,
            event_type: "test_event".to_string(),
            identity: Some("test_user".to_string()),
            resource: "test_resource".to_string(),
            action: "test_action".to_string(),
            result: "success".to_string(),
            metadata: HashMap::new(),
            severity: AuditSeverity::Low,
        };

        assert!(logger.log_event(event).is_ok());
        let contents = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn fills_in_missing_id_and_timestamp() {
        let temp_file = NamedTempFile::new().unwrap();
        let logger = AuditLogger::new(temp_file.path().to_str().unwrap(), 7).unwrap();

        logger
            .log_api_access(Some("alice".into()), "/process", "POST", 200)
            .unwrap();

        let contents = std::fs::read_to_string(temp_file.path()).unwrap();
        let parsed: AuditEvent = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert!(!parsed.id.is_empty());
        assert!(parsed.timestamp > 0);
    }
}
