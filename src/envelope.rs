//! Re-export of the shared request/response envelope. See `aios-common`.

pub use aios_common::envelope::*;
