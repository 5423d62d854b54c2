use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use aios_common::error::MCPServerError;
use aios_layer1::{InterfaceConfig, InterfaceTier};
use aios_layer2::{IntelligenceConfig, IntelligenceTier};
use aios_layer3::{OrchestrationConfig, OrchestrationTier};
use aios_layer4::{
    AgentRegistry, AgentsTier, AnalyticsAdapter, ExpertAdapter, ExpertArchetype, ExpertDescriptor,
    KnowledgeAdapter, TextGenerationAdapter,
};
use aios_layer5::{default_server_specs, McpManager, ResourcesConfig, ResourcesTier, ToolHandler};

use crate::audit_logging::AuditLogger;
use crate::platform::config::{AgentSettings, AuditSettings, PlatformConfig};
use crate::platform::context::PlatformContext;
use crate::platform::service::ServiceRegistration;
use crate::platform::telemetry::telemetry_service;
use crate::rate_limiting::RateLimiter;

/// Builds and owns the service roster; `start()` assembles the five-tier
/// pipeline bottom-up (spec.md §2's dependency order: L5 first, no
/// downstream; L4 next with L5 reachable for tool-backed experts; L3 gets
/// L4; L2 gets L3; L1 gets L2) and spawns every registered service against
/// it. Grounded on the teacher's `src/platform/runtime.rs`.
pub struct Platform {
    config: PlatformConfig,
    services: Vec<ServiceRegistration>,
}

impl Platform {
    pub fn new(config: PlatformConfig) -> Self {
        let mut services = Vec::new();
        services.push(telemetry_service(config.observability.clone()));

        Self { config, services }
    }

    pub fn register_service(&mut self, service: ServiceRegistration) {
        self.services.push(service);
    }

    pub async fn start(self) -> Result<PlatformRuntime> {
        initialize_logging(&self.config);

        let audit_logger = Arc::new(init_audit_logger(&self.config.audit)?);
        let rate_limiter = Arc::new(build_rate_limiter(&self.config));

        let resources = build_resources(&self.config).await?;
        let agents = build_agents(&self.config).await;
        let orchestration = OrchestrationTier::new(
            agents,
            OrchestrationConfig {
                checkpoint_dir: self.config.orchestration.checkpoint_dir.clone().into(),
            },
        );
        let intelligence = IntelligenceTier::new(orchestration, build_intelligence_config(&self.config));
        let interface = Arc::new(InterfaceTier::new(build_interface_config(&self.config), intelligence));

        let root_token = CancellationToken::new();
        let context = PlatformContext::new(
            self.config.clone(),
            audit_logger,
            rate_limiter,
            interface,
            Arc::new(resources),
            root_token.child_token(),
        );

        let mut tasks = Vec::new();
        for service in self.services {
            let handle = service.spawn(context.clone(), root_token.child_token());
            tasks.push((service.name().to_string(), handle));
        }

        info!("platform boot completed");

        Ok(PlatformRuntime {
            context,
            cancel_token: root_token,
            tasks,
        })
    }
}

/// L5 construction: the resource tier has no downstream of its own, so it
/// only needs its on-disk data path plus an `McpManager` populated with the
/// configured servers' tool rosters and an HTTP-backed handler each, so that
/// `resource_op=mcp_call` requests routed straight at L5 work the same way
/// a tool-backed expert's call does.
async fn build_resources(config: &PlatformConfig) -> Result<ResourcesTier> {
    let resources = ResourcesTier::new(ResourcesConfig {
        data_path: config.resources.data_path.clone().into(),
        vector_store_enabled: config.resources.vector_store_enabled,
    })
    .await?;

    register_mcp_servers(resources.mcp(), config);

    Ok(resources)
}

fn register_mcp_servers(manager: &McpManager, config: &PlatformConfig) {
    let specs = default_server_specs();
    for (name, settings) in &config.resources.mcp_servers {
        if !settings.enabled {
            continue;
        }
        if let Some(spec) = specs.iter().find(|s| &s.name == name) {
            manager.register(spec.clone(), Arc::new(HttpToolHandler::new(settings.base_url.clone())));
        }
    }
}

/// Dispatches a tool call over HTTP to an externally-run MCP server
/// process. The manager already validated the tool against the server's
/// declared roster, so this only needs to forward the call — mirrors
/// `layer4::adapter::TextGenerationAdapter`'s single-POST-per-call shape.
struct HttpToolHandler {
    base_url: String,
    client: reqwest::Client,
}

impl HttpToolHandler {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ToolHandler for HttpToolHandler {
    async fn call(&self, tool: &str, args: Value) -> Result<Value, MCPServerError> {
        let url = format!("{}/tools/{tool}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&args)
            .send()
            .await
            .map_err(|e| MCPServerError::InvocationFailed(e.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| MCPServerError::InvocationFailed(e.to_string()))
    }
}

/// L4 construction: one adapter per enabled entry in the expert catalog,
/// keyed off its declared archetype. `ResourcesTier` builds and owns its
/// own `McpManager` internally with no accessor that hands out ownership of
/// it, so tool-backed experts get their own manager here, populated with
/// the same server roster rather than sharing L5's instance (documented as
/// an Open Question decision).
async fn build_agents(config: &PlatformConfig) -> AgentsTier {
    let mcp = Arc::new(McpManager::new());
    register_mcp_servers(&mcp, config);
    let registry = AgentRegistry::new();

    for (id, settings) in &config.agents {
        if !settings.enabled {
            continue;
        }
        let descriptor = descriptor_from_settings(id, settings);
        let adapter: Box<dyn ExpertAdapter> = match settings.archetype.as_str() {
            "knowledge" => Box::new(KnowledgeAdapter::new(
                settings.mcp_server.clone().unwrap_or_default(),
                mcp.clone(),
            )),
            "analytics" => Box::new(AnalyticsAdapter::new(
                settings.mcp_server.clone().unwrap_or_default(),
                mcp.clone(),
            )),
            _ => Box::new(TextGenerationAdapter::new(
                settings.endpoint.clone().unwrap_or_default(),
            )),
        };
        registry.register(descriptor, adapter).await;
        if settings.is_default {
            registry.set_default(id.clone());
        }
    }

    AgentsTier::new(registry)
}

fn descriptor_from_settings(id: &str, settings: &AgentSettings) -> ExpertDescriptor {
    let archetype = match settings.archetype.as_str() {
        "knowledge" => ExpertArchetype::Knowledge,
        "analytics" => ExpertArchetype::Analytics,
        _ => ExpertArchetype::TextGeneration,
    };
    let mut descriptor = ExpertDescriptor::new(id, archetype);
    descriptor.capabilities = settings.capabilities.iter().cloned().collect();
    descriptor.strengths = settings.strengths.clone();
    descriptor.static_priority = settings.static_priority;
    descriptor
}

fn build_interface_config(config: &PlatformConfig) -> InterfaceConfig {
    let mut rate_limit = aios_common::rate_limiting::RateLimitConfig {
        default: aios_common::rate_limiting::RateLimit {
            requests: config.interface.rate_limit.default.requests,
            window_secs: config.interface.rate_limit.default.window_seconds,
        },
        endpoints: Default::default(),
    };
    for (endpoint, rule) in &config.interface.rate_limit.endpoints {
        rate_limit.endpoints.insert(
            endpoint.clone(),
            aios_common::rate_limiting::RateLimit {
                requests: rule.requests,
                window_secs: rule.window_seconds,
            },
        );
    }
    InterfaceConfig {
        enabled: config.interface.enabled,
        rate_limit,
        max_history: config.interface.max_history,
        cli_prompt: config.interface.cli_prompt.clone(),
    }
}

fn build_intelligence_config(config: &PlatformConfig) -> IntelligenceConfig {
    IntelligenceConfig {
        enabled: config.intelligence.enabled,
        classification_cache_ttl_secs: config.intelligence.classification_cache_ttl_secs,
        session_ttl_secs: config.intelligence.session_ttl_secs,
        history_depth: config.intelligence.history_depth,
        default_expert: config.intelligence.default_expert.clone(),
    }
}

pub struct PlatformRuntime {
    context: PlatformContext,
    cancel_token: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
}

impl PlatformRuntime {
    pub fn context(&self) -> PlatformContext {
        self.context.clone()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancel_token.cancel();

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(Ok(())) => info!(service = %name, "service shutdown cleanly"),
                Ok(Err(err)) => {
                    return Err(err);
                }
                Err(err) => {
                    return Err(err.into());
                }
            }
        }

        Ok(())
    }
}

fn initialize_logging(config: &PlatformConfig) {
    let filter = &config.observability.log_level;
    let _ = tracing_subscriber::fmt().with_env_filter(filter.as_str()).try_init();
}

fn init_audit_logger(settings: &AuditSettings) -> Result<AuditLogger> {
    AuditLogger::new(&settings.log_path, settings.retention_days).map_err(|err| anyhow::anyhow!(err.to_string()))
}

/// Builds the platform-wide rate limiter from L1's settings — the surfaces
/// in front of the pipeline (webhook listener, HTTP `/process`) share the
/// same limits L1 itself enforces, so there is one source of truth for them
/// rather than a duplicated config block.
fn build_rate_limiter(config: &PlatformConfig) -> RateLimiter {
    use crate::rate_limiting::{RateLimit, RateLimitConfig};

    let default = RateLimit {
        requests: config.interface.rate_limit.default.requests,
        window_secs: config.interface.rate_limit.default.window_seconds,
    };

    let endpoints = config
        .interface
        .rate_limit
        .endpoints
        .iter()
        .map(|(endpoint, rule)| {
            (
                endpoint.clone(),
                RateLimit {
                    requests: rule.requests,
                    window_secs: rule.window_seconds,
                },
            )
        })
        .collect();

    RateLimiter::new(RateLimitConfig { default, endpoints })
}
