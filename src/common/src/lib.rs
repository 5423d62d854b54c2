//! Vocabulary shared by every tier crate: the request/response envelope, the
//! `Tier` capability trait, and the error taxonomy. Factored out of the root
//! `aios-core` crate so `layer1`..`layer5` can depend on it without a cycle
//! through the facade that wires them together.

pub mod envelope;
pub mod error;
pub mod rate_limiting;
pub mod tier;
