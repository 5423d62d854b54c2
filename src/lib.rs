//! AI-OS core — a five-tier autonomous AI operating system: L1 Interface,
//! L2 Intelligence, L3 Orchestration, L4 Agents, L5 Resources.
//!
//! This crate is the platform facade: it owns process-wide configuration,
//! audit logging, rate limiting and the checkpoint store, and assembles the
//! five tier crates (`aios-layer1`..`aios-layer5`) into a running
//! [`platform::Platform`].

pub mod audit_logging;
pub mod envelope;
pub mod error;
pub mod platform;
pub mod rate_limiting;
pub mod state_store;
pub mod tier;
pub mod utils;

pub use platform::{Platform, PlatformConfig, PlatformContext, PlatformRuntime};
