//! The capability interface every pipeline tier implements.
//!
//! Replaces the Python `LayerInterface` ABC (`core/base.py`) with an
//! `async_trait` object, matching the teacher's convention of defining one
//! capability trait per cross-cutting concern rather than concrete coupling
//! between tiers.

use async_trait::async_trait;

use crate::envelope::{Envelope, Outcome};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct TierHealth {
    pub tier: &'static str,
    pub status: TierStatus,
    pub issues: Vec<String>,
}

impl TierHealth {
    pub fn healthy(tier: &'static str) -> Self {
        Self {
            tier,
            status: TierStatus::Healthy,
            issues: Vec::new(),
        }
    }

    pub fn degraded(tier: &'static str, issues: Vec<String>) -> Self {
        Self {
            tier,
            status: TierStatus::Degraded,
            issues,
        }
    }
}

#[async_trait]
pub trait Tier: Send + Sync {
    async fn process(&self, request: Envelope) -> Result<Outcome, CoreError>;

    async fn initialize(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn health_check(&self) -> TierHealth;
}

/// Rolling-average bookkeeping shared by every tier's stats, ported from
/// `core/base.py::LayerInterface._update_stats`.
#[derive(Debug, Clone, Default)]
pub struct TierStats {
    pub requests_processed: u64,
    pub requests_failed: u64,
    pub avg_duration_ms: f64,
}

impl TierStats {
    pub fn record(&mut self, duration_ms: u64, success: bool) {
        self.requests_processed += 1;
        if !success {
            self.requests_failed += 1;
        }
        let n = self.requests_processed as f64;
        self.avg_duration_ms += (duration_ms as f64 - self.avg_duration_ms) / n;
    }
}
