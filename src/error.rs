//! Re-export of the shared error taxonomy.
//!
//! The taxonomy itself lives in `aios-common` so every tier crate can use it
//! without depending back on this facade crate; this module just gives root
//! code the familiar `crate::error::...` path.

pub use aios_common::error::*;
