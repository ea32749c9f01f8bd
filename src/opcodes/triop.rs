//! Ternary arithmetic handlers (§4.E.3)
//!
//! Argument 1 (rounding mode) is accepted by the staging struct but always
//! ignored — all shadow arithmetic rounds to nearest regardless of what the
//! guest's FPU control word says. Otherwise identical to binary arithmetic
//! over arguments 2 and 3.

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::Addr;
use crate::liveness::LivenessPlan;
use crate::staging::{TmpConstStaging, TriOpStage};

use super::binop::compute_arith;
use super::resolve_native;

impl Engine {
    pub fn handle_tri_op(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        stage: &TriOpStage,
        natives: &TmpConstStaging,
    ) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }

        let arg2_native = resolve_native(stage.arg2, natives, 2);
        let arg3_native = resolve_native(stage.arg3, natives, 3);
        let arg2_sv = self.resolve_operand_shadow(plan, stage.arg2, arg2_native, ip);
        let arg3_sv = self.resolve_operand_shadow(plan, stage.arg3, arg3_native, ip);
        let dest_org_type = stage.native_result.org_type();

        let result = compute_arith(
            stage.op.into(),
            &arg2_sv,
            arg2_native,
            &arg3_sv,
            arg3_native,
            dest_org_type,
            ip,
            stage.native_result,
        );
        let mut dest = result.dest;

        self.record_analyses(ip, &arg2_sv, &arg3_sv, &mut dest, result.badness);
        self.write_dest_shadow(plan, stage.dest, dest);
        Ok(())
    }
}
