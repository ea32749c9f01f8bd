//! Run configuration (§6.1)
//!
//! Argv parsing is out of scope; a host populates this struct however it
//! likes (literal argv decoding, environment variables, a config file via
//! `serde`) and hands it to [`crate::engine::Engine::new`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_PRECISION;

/// Every flag from the CLI options table, with its documented default.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Shadow AP precision in bits.
    pub precision: u32,
    /// Record mean/max error per IP.
    pub mean_error: bool,
    /// Skip instrumentation for IPs whose shared-object name contains `.so`.
    pub ignore_libraries: bool,
    /// Suppress reports for zero-error entries.
    pub ignore_accurate: bool,
    /// Shrink shadow precision to match original IEEE width.
    pub sim_original: bool,
    /// Enable handlers; when `false`, instrumentation is inserted but handlers no-op.
    pub analyze_all: bool,
    /// Ignore the `END` client request.
    pub ignore_end: bool,
    /// Emit large-error localization records.
    pub error_localization: bool,
    /// Log every op's error.
    pub print_every_error: bool,
    /// Run the PSO detector.
    pub detect_pso: bool,
    /// Override F64 compare outcomes with the shadow's.
    pub goto_shadow_branch: bool,
    /// Propagate shadow across F64->int conversions.
    pub track_int: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            mean_error: true,
            ignore_libraries: false,
            ignore_accurate: true,
            sim_original: false,
            analyze_all: true,
            ignore_end: false,
            error_localization: false,
            print_every_error: false,
            detect_pso: false,
            goto_shadow_branch: false,
            track_int: false,
        }
    }
}
