//! Engine-wide size limits and thresholds
//!
//! Mirrors the bounded-array philosophy of a register/memory VM: every
//! store has a documented capacity rather than growing without limit.

/// Maximum number of IR temps tracked per superblock.
pub const MAX_TEMPS: usize = 1000;

/// Maximum guest-register byte offset the translator is expected to emit.
pub const MAX_REGISTERS: usize = 1000;

/// Number of staged native temp slots available to a single handler call.
pub const TMP_COUNT: usize = 4;

/// Number of staged native constant slots available to a single handler call.
pub const CONST_COUNT: usize = 4;

/// Maximum number of concurrently tracked stages.
pub const MAX_STAGES: usize = 100;

/// Report files are rotated after this many entries to keep files small.
pub const MAX_ENTRIES_PER_REPORT_FILE: usize = 10_000;

/// Maximum depth walked when dumping a provenance graph.
pub const MAX_LEVEL_OF_GRAPH: usize = 10;

/// Maximum number of provenance graphs dumped in a single run.
pub const MAX_DUMPED_GRAPHS: usize = 10;

/// Buffered-writer capacity used by the default report sink.
pub const FWRITE_BUFSIZE: usize = 32 * 1024;

/// Default shadow precision in bits, matching `--precision=120`.
pub const DEFAULT_PRECISION: u32 = 120;

/// IEEE single precision, in significand bits (including the implicit bit).
pub const FLOAT_IEEE_PRECISION: u32 = 24;

/// IEEE double precision, in significand bits (including the implicit bit).
pub const DOUBLE_IEEE_PRECISION: u32 = 53;

/// Error inflation ratio above which an operation is considered precision-specific.
pub const PSO_INFLATION_THRESHOLD: f64 = 1.0e6;

/// Original-magnitude threshold for the PSO near-zero band.
pub const PSO_OV_ZERO_BOUND: f64 = 1e-9;

/// Shadow-magnitude threshold for the PSO near-zero band.
pub const PSO_SV_ZERO_BOUND: f64 = 1e-15;

/// Fraction of total executions that must inflate before an IP is a confirmed PSO.
pub const PSO_PERCENTAGE_THRESHOLD: f64 = 0.7;

/// Fraction of near-zero-band inflations above which a confirmed PSO is a false positive.
pub const PSO_FALSEPOSITIVE_PERCENTAGE: f64 = 0.1;
