//! FpDebug shadow-execution engine
//!
//! An arbitrary-precision shadow computation that mirrors a translated IR's
//! floating-point operations, surfacing the accuracy loss between the
//! native result and its high-precision twin. See `SPEC_FULL.md` for the
//! full requirements this crate implements.

pub mod analysis;
pub mod ap;
pub mod client_request;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ir;
pub mod liveness;
pub mod opcodes;
pub mod reports;
pub mod shadow_value;
pub mod staging;
pub mod stores;
pub mod text;

pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
