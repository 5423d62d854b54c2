//! Re-export of the shared rate limiter. See `aios-common::rate_limiting`;
//! `aios-layer1` uses the same type directly to avoid a dependency cycle
//! back through this facade crate.

pub use aios_common::rate_limiting::*;
