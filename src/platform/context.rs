use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use aios_layer1::InterfaceTier;
use aios_layer5::ResourcesTier;

use crate::audit_logging::AuditLogger;
use crate::platform::config::PlatformConfig;
use crate::rate_limiting::RateLimiter;

/// Shared, cloneable handle every spawned service receives. Holds the
/// fully-assembled pipeline's single entry point (L1) plus the ambient
/// infrastructure (config, audit log, a platform-wide rate limiter for
/// surfaces that sit in front of L1, such as the webhook listener) —
/// grounded on the teacher's `src/platform/context.rs`. Also keeps L5
/// alive and reachable directly, since it sits outside the L1→L4
/// `Tier::process` chain and is otherwise only reachable through the
/// tool-backed experts' own MCP handles.
#[derive(Clone)]
pub struct PlatformContext {
    shared: Arc<SharedState>,
    shutdown: CancellationToken,
}

struct SharedState {
    config: PlatformConfig,
    audit_logger: Arc<AuditLogger>,
    rate_limiter: Arc<RateLimiter>,
    interface: Arc<InterfaceTier>,
    resources: Arc<ResourcesTier>,
}

impl PlatformContext {
    pub(crate) fn new(
        config: PlatformConfig,
        audit_logger: Arc<AuditLogger>,
        rate_limiter: Arc<RateLimiter>,
        interface: Arc<InterfaceTier>,
        resources: Arc<ResourcesTier>,
        shutdown: CancellationToken,
    ) -> Self {
        let shared = SharedState {
            config,
            audit_logger,
            rate_limiter,
            interface,
            resources,
        };

        Self {
            shared: Arc::new(shared),
            shutdown,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.shared.config
    }

    pub fn audit_logger(&self) -> Arc<AuditLogger> {
        Arc::clone(&self.shared.audit_logger)
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.shared.rate_limiter)
    }

    /// The pipeline's single entry point — every external surface (HTTP,
    /// CLI, webhook) calls `interface().process(envelope)` rather than
    /// reaching into any individual tier.
    pub fn interface(&self) -> Arc<InterfaceTier> {
        Arc::clone(&self.shared.interface)
    }

    /// Direct access to the resource tier for surfaces that need raw
    /// KV/vector/file/MCP access rather than a pipeline round-trip.
    pub fn resources(&self) -> Arc<ResourcesTier> {
        Arc::clone(&self.shared.resources)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
