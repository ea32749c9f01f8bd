//! Superblock entry and dispatch (§4.E.9, §2 "data flow per guest superblock")
//!
//! Ties the liveness pre-pass (§4.D) to the per-opcode handlers (§4.E):
//! increments the `sbExecuted` epoch once, runs `liveness::analyze` over the
//! whole block, then walks its statements in program order, dispatching
//! each to its handler with a per-statement native-value staging built from
//! the operand's currently recorded `org` (the "co-located native readback"
//! the real instrumentation gets from the generated IR, §4.C).

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{NativeValue, Operand, Stmt, ThreadId};
use crate::liveness::{self, LivenessPlan};
use crate::staging::{BinOpStage, BinSlotOp, MuxStage, TmpConstStaging, TriOpStage, UnOpStage};

impl Engine {
    /// Execute one instrumented superblock in program order.
    pub fn execute_superblock(&mut self, thread: ThreadId, stmts: &[Stmt]) -> EngineResult<()> {
        self.enter_superblock();
        let plan = liveness::analyze(stmts);
        for (idx, stmt) in stmts.iter().enumerate() {
            self.execute_stmt(thread, &plan, stmt, idx)?;
        }
        Ok(())
    }

    /// The native value standing behind `op`: the constant itself, or the
    /// `org` last recorded on the (alias-resolved) temp's shadow.
    fn native_of(&self, plan: &LivenessPlan, op: Operand) -> NativeValue {
        match op {
            Operand::Const(v) => v,
            Operand::Tmp(t) => {
                let resolved = plan.resolve(t);
                self.temps.get(resolved).and_then(|sv| sv.org()).unwrap_or(NativeValue::F64(0.0))
            }
        }
    }

    fn stage_one(&self, plan: &LivenessPlan, op: Operand) -> TmpConstStaging {
        let mut staging = TmpConstStaging::default();
        if matches!(op, Operand::Tmp(_)) {
            staging.write_tmp(0, self.native_of(plan, op));
        }
        staging
    }

    fn stage_two(&self, plan: &LivenessPlan, a: Operand, b: Operand) -> TmpConstStaging {
        let mut staging = TmpConstStaging::default();
        if matches!(a, Operand::Tmp(_)) {
            staging.write_tmp(0, self.native_of(plan, a));
        }
        if matches!(b, Operand::Tmp(_)) {
            staging.write_tmp(1, self.native_of(plan, b));
        }
        staging
    }

    fn stage_tri(&self, plan: &LivenessPlan, a: Operand, b: Operand) -> TmpConstStaging {
        let mut staging = TmpConstStaging::default();
        if matches!(a, Operand::Tmp(_)) {
            staging.write_tmp(2, self.native_of(plan, a));
        }
        if matches!(b, Operand::Tmp(_)) {
            staging.write_tmp(3, self.native_of(plan, b));
        }
        staging
    }

    fn execute_stmt(&mut self, thread: ThreadId, plan: &LivenessPlan, stmt: &Stmt, stmt_index: usize) -> EngineResult<()> {
        match stmt {
            Stmt::SbEntry => Ok(()),

            Stmt::UnOp { ip, dest, op, arg, native_result } => {
                let natives = self.stage_one(plan, *arg);
                let stage = UnOpStage { op: *op, dest: *dest, arg: *arg, native_result: *native_result };
                self.handle_un_op(*ip, plan, &stage, &natives)
            }

            Stmt::BinOp { ip, dest, op, arg1, arg2, native_result } => {
                let natives = self.stage_two(plan, *arg1, *arg2);
                let stage = BinOpStage {
                    op: BinSlotOp::Arith(*op),
                    dest: *dest,
                    arg1: *arg1,
                    arg2: *arg2,
                    native_result: *native_result,
                };
                self.handle_bin_op(*ip, plan, &stage, &natives)
            }

            Stmt::TriOp { ip, dest, op, arg2, arg3, native_result } => {
                let natives = self.stage_tri(plan, *arg2, *arg3);
                let stage = TriOpStage { op: *op, dest: *dest, arg2: *arg2, arg3: *arg3, native_result: *native_result };
                self.handle_tri_op(*ip, plan, &stage, &natives)
            }

            Stmt::CmpF64 { ip, dest: _, arg1, arg2, native_cond } => {
                let natives = self.stage_two(plan, *arg1, *arg2);
                self.handle_cmp(*ip, plan, *arg1, *arg2, *native_cond, &natives).map(|_| ())
            }

            Stmt::CvtToInt { ip, dest: _, op, arg } => {
                let natives = self.stage_one(plan, *arg);
                self.handle_cvt(*ip, plan, *op, *arg, &natives).map(|_| ())
            }

            Stmt::Mux { ip, dest, cond, arg0, arg_x } => {
                let stage = MuxStage { dest: *dest, cond: *cond, arg0: *arg0, arg_x: *arg_x };
                self.handle_mux(*ip, plan, &stage)
            }

            Stmt::Load { ip, dest, addr, native_result } => self.handle_load(*ip, plan, *dest, *addr, *native_result),

            Stmt::Store { ip, addr, src, native_value } => self.handle_store(*ip, plan, *addr, *src, *native_value),

            Stmt::Put { ip, offset, src } => {
                let natives = self.stage_one(plan, *src);
                self.handle_put(*ip, plan, thread, *offset, *src, &natives, stmt_index)
            }

            Stmt::Get { ip, dest, offset, native_result } => self.handle_get(*ip, plan, thread, *dest, *offset, *native_result),

            Stmt::PutI { ip, base, n_elems, bias, ix, src } => {
                let natives = self.stage_one(plan, *src);
                self.handle_put_i(*ip, plan, thread, *base, *n_elems, *bias, *ix, *src, &natives, stmt_index)
            }

            Stmt::GetI { ip, dest, base, n_elems, bias, ix, native_result } => {
                self.handle_get_i(*ip, plan, thread, *dest, *base, *n_elems, *bias, *ix, *native_result)
            }

            Stmt::Structural { .. } => Ok(()), // consumed entirely by the liveness pre-pass

            Stmt::Unsupported { opcode_name } => {
                self.record_unsupported(opcode_name);
                Ok(())
            }
        }
    }
}
