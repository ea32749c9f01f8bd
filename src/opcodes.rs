//! Opcode handlers (§4.E)
//!
//! One module per handler family, matching the teacher's
//! `interpreter/executors/instruction.rs` dispatch shape: a `match` on the
//! opcode calling a small, focused method per arm. Each handler reads
//! argument shadows via the stores (substituting the liveness plan's
//! `tmp_instead`), reads native arguments via the staging structures, and
//! writes back through [`crate::engine::Engine::write_dest_shadow`].

pub mod binop;
pub mod cmp;
pub mod cvt;
pub mod memop;
pub mod mux;
pub mod sb;
pub mod triop;
pub mod unop;

use crate::ir::{NativeValue, Operand};
use crate::staging::TmpConstStaging;

/// Resolve an operand's native value: the constant itself, or the staged
/// native temp value at `slot` (§4.C's fixed slot convention).
pub(crate) fn resolve_native(op: Operand, natives: &TmpConstStaging, slot: usize) -> NativeValue {
    match op {
        Operand::Const(v) => v,
        Operand::Tmp(_) => natives.read_tmp(slot).expect("caller must stage every Tmp operand's native value"),
    }
}
