//! IR staging buffers (§4.C)
//!
//! The original tool writes these fields from generated IR immediately
//! before calling into the shadow engine, so the callback can see both the
//! shadow operand (from the stores) and the native operand (from the
//! guest's own IR temp) without threading machine-specific marshalling
//! through the callback ABI. In this crate a handler's caller builds one of
//! these plain structs and passes it in — the *shape* matches the original
//! exactly; there is no raw-address trick to preserve because this crate
//! does not itself emit machine code.

use crate::consts::{CONST_COUNT, TMP_COUNT};
use crate::ir::{BinArithOp, CvtOp, NativeValue, Operand, Temp, TriArithOp, UnArithOp};

/// Staged operands for a unary op (sqrt/neg/abs).
#[derive(Debug, Clone, Copy)]
pub struct UnOpStage {
    pub op: UnArithOp,
    pub dest: Temp,
    pub arg: Operand,
    pub native_result: NativeValue,
}

/// The family of ops that share the binary staging slot set (§4.C: "also
/// used by comparisons and conversions").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinSlotOp {
    Arith(BinArithOp),
    Cmp,
    Cvt(CvtOp),
}

/// Staged operands for binary arithmetic, F64 comparison, or an F64->int conversion.
#[derive(Debug, Clone, Copy)]
pub struct BinOpStage {
    pub op: BinSlotOp,
    pub dest: Temp,
    pub arg1: Operand,
    pub arg2: Operand,
    /// Native result, as read back from the IR temp holding it; unused for `Cmp`.
    pub native_result: NativeValue,
}

/// Staged operands for a ternary op; argument 1 (rounding mode) is not modeled.
#[derive(Debug, Clone, Copy)]
pub struct TriOpStage {
    pub op: TriArithOp,
    pub dest: Temp,
    pub arg2: Operand,
    pub arg3: Operand,
    pub native_result: NativeValue,
}

/// Staged operands for a conditional select.
#[derive(Debug, Clone, Copy)]
pub struct MuxStage {
    pub dest: Temp,
    /// Runtime value of the condition temp, read back by the instrumentation.
    pub cond: bool,
    pub arg0: Operand,
    pub arg_x: Operand,
}

/// Staged operands for a store.
#[derive(Debug, Clone, Copy)]
pub struct StoreStage {
    pub addr: crate::ir::Addr,
    pub src: Temp,
    pub native_value: NativeValue,
}

/// Parallel structure holding staged native temp/const values (`readSTemp`/`readSConst`).
///
/// Every opcode handler reads its operands' native (non-shadow) values from
/// here by a fixed slot convention: slot 0 is argument 1 (or the sole
/// argument of a unary/conversion op), slot 1 is argument 2, slot 2/3 are a
/// ternary op's second and third arguments. Slot 0/1 doubles as what the
/// original calls `cancelTemp` for the binary-op handler's exact-bits
/// estimate (§4.E.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct TmpConstStaging {
    tmps: [Option<NativeValue>; TMP_COUNT],
    consts: [Option<NativeValue>; CONST_COUNT],
}

impl TmpConstStaging {
    pub fn write_tmp(&mut self, slot: usize, value: NativeValue) {
        self.tmps[slot] = Some(value);
    }

    pub fn read_tmp(&self, slot: usize) -> Option<NativeValue> {
        self.tmps[slot]
    }

    pub fn write_const(&mut self, slot: usize, value: NativeValue) {
        self.consts[slot] = Some(value);
    }

    pub fn read_const(&self, slot: usize) -> Option<NativeValue> {
        self.consts[slot]
    }
}
