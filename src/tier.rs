//! Re-export of the shared `Tier` capability trait. See `aios-common`.

pub use aios_common::tier::*;
