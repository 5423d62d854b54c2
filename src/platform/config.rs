//! Process-wide configuration, loaded once at startup and threaded through
//! [`super::context::PlatformContext`] to every tier.
//!
//! Grounded on the teacher's `src/platform/config.rs`: the same
//! `config`-crate builder (TOML file, optional override file, environment
//! overlay) and the same per-section settings-struct shape, retargeted at
//! the five tiers this platform actually assembles.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "configs/platform.toml";
const ENV_PREFIX: &str = "AIOS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub metadata: MetadataSettings,
    pub observability: ObservabilitySettings,
    pub audit: AuditSettings,
    pub interface: InterfaceSettings,
    pub intelligence: IntelligenceSettings,
    pub orchestration: OrchestrationSettings,
    pub agents: HashMap<String, AgentSettings>,
    pub resources: ResourcesSettings,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            metadata: MetadataSettings::default(),
            observability: ObservabilitySettings::default(),
            audit: AuditSettings::default(),
            interface: InterfaceSettings::default(),
            intelligence: IntelligenceSettings::default(),
            orchestration: OrchestrationSettings::default(),
            agents: default_agent_catalog(),
            resources: ResourcesSettings::default(),
        }
    }
}

impl PlatformConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None::<PathBuf>)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            File::from(PathBuf::from(DEFAULT_CONFIG_PATH))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.as_ref())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config = builder.build()?;
        config
            .try_deserialize()
            .context("invalid platform configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub name: String,
    pub environment: String,
    pub cluster: String,
    pub node: String,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            name: "ai-os".to_string(),
            environment: "development".to_string(),
            cluster: "local".to_string(),
            node: "node-0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub metrics_port: u16,
    pub enable_metrics: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: 9090,
            enable_metrics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub log_path: String,
    pub retention_days: u32,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_path: "logs/audit.log".to_string(),
            retention_days: 90,
        }
    }
}

/// L1 settings — spec.md §6's `interface` config subsection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceSettings {
    pub enabled: bool,
    pub max_history: usize,
    pub cli_prompt: String,
    pub rate_limit: RateLimitingSettings,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history: 1000,
            cli_prompt: "ai-os> ".to_string(),
            rate_limit: RateLimitingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingSettings {
    pub default: RateLimitRule,
    pub endpoints: HashMap<String, RateLimitRule>,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        Self {
            default: RateLimitRule::default(),
            endpoints: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitRule {
    pub requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            requests: 100,
            window_seconds: 60,
        }
    }
}

/// L2 settings — spec.md §6's `intelligence` config subsection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligenceSettings {
    pub enabled: bool,
    pub default_expert: String,
    pub classification_cache_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub history_depth: usize,
}

impl Default for IntelligenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_expert: "claude-default".to_string(),
            classification_cache_ttl_secs: 300,
            session_ttl_secs: 3600,
            history_depth: 20,
        }
    }
}

/// L3 settings — spec.md §6's `orchestration` config subsection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationSettings {
    pub max_parallel_pipelines: usize,
    pub checkpoint_dir: String,
    pub checkpoint_enabled: bool,
    pub retry_policy: RetryPolicySettings,
    pub schedules: Vec<ScheduleSettings>,
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            max_parallel_pipelines: 5,
            checkpoint_dir: "./data/checkpoints".to_string(),
            checkpoint_enabled: true,
            retry_policy: RetryPolicySettings::default(),
            schedules: Vec::new(),
        }
    }
}

/// One entry in `bin/aios-scheduler.rs`'s task table — spec.md §4.3.4's
/// `schedule(name, workflow_id, spec)` call, made configuration-driven so
/// the standalone scheduler process doesn't need code changes per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub id: String,
    pub workflow_id: String,
    pub schedule: String,
    pub enabled: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            workflow_id: String::new(),
            schedule: "interval:1h".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// One entry in the L4 expert catalog. The settings describe *what* to
/// construct (archetype, backing endpoint/MCP server, declared
/// capabilities) — the adapter construction itself stays code-driven in
/// `platform::runtime`, per spec.md §4.4's framing of the adapter's
/// internal logic as an implementation concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub enabled: bool,
    pub archetype: String,
    pub is_default: bool,
    pub endpoint: Option<String>,
    pub mcp_server: Option<String>,
    pub capabilities: Vec<String>,
    pub strengths: Vec<String>,
    pub static_priority: i32,
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            archetype: "text_generation".to_string(),
            is_default: false,
            endpoint: None,
            mcp_server: None,
            capabilities: Vec::new(),
            strengths: Vec::new(),
            static_priority: 0,
            timeout_secs: 30,
        }
    }
}

fn default_agent_catalog() -> HashMap<String, AgentSettings> {
    let mut agents = HashMap::new();
    agents.insert(
        "claude-default".to_string(),
        AgentSettings {
            archetype: "text_generation".to_string(),
            is_default: true,
            endpoint: Some("http://localhost:8090/generate".to_string()),
            capabilities: vec!["code_generation".to_string(), "writing".to_string()],
            strengths: vec!["code".to_string(), "general".to_string()],
            static_priority: 5,
            ..AgentSettings::default()
        },
    );
    agents.insert(
        "knowledge-expert".to_string(),
        AgentSettings {
            archetype: "knowledge".to_string(),
            mcp_server: Some("obsidian".to_string()),
            capabilities: vec!["qa".to_string(), "retrieval".to_string()],
            strengths: vec!["knowledge".to_string()],
            static_priority: 3,
            ..AgentSettings::default()
        },
    );
    agents.insert(
        "analytics-expert".to_string(),
        AgentSettings {
            archetype: "analytics".to_string(),
            mcp_server: Some("notebooklm".to_string()),
            capabilities: vec!["analytics".to_string(), "reporting".to_string()],
            strengths: vec!["business".to_string()],
            static_priority: 3,
            ..AgentSettings::default()
        },
    );
    agents
}

/// L5 settings — spec.md §6's `resources` config subsection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesSettings {
    pub data_path: String,
    pub vector_store_enabled: bool,
    pub mcp_servers: HashMap<String, McpServerSettings>,
}

impl Default for ResourcesSettings {
    fn default() -> Self {
        let mut mcp_servers = HashMap::new();
        mcp_servers.insert(
            "obsidian".to_string(),
            McpServerSettings {
                enabled: true,
                base_url: "http://localhost:8091".to_string(),
            },
        );
        mcp_servers.insert(
            "notebooklm".to_string(),
            McpServerSettings {
                enabled: true,
                base_url: "http://localhost:8092".to_string(),
            },
        );
        Self {
            data_path: "./data".to_string(),
            vector_store_enabled: false,
            mcp_servers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerSettings {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for McpServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8091".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_carries_one_default_expert() {
        let config = PlatformConfig::default();
        let defaults: Vec<_> = config.agents.values().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
    }
}
