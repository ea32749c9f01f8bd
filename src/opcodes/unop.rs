//! Unary arithmetic handlers: `sqrt`, `neg`, `abs` at F32/F64 (§4.E.1)

use rug::Float;

use crate::ap;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{Addr, UnArithOp};
use crate::liveness::LivenessPlan;
use crate::staging::{TmpConstStaging, UnOpStage};

use super::resolve_native;

impl Engine {
    /// No cancellation is possible for a unary op: `canceled`/`cancel_origin`
    /// are inherited verbatim from the argument (§4.E.1).
    pub fn handle_un_op(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        stage: &UnOpStage,
        natives: &TmpConstStaging,
    ) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }

        let arg_native = resolve_native(stage.arg, natives, 0);
        let arg_sv = self.resolve_operand_shadow(plan, stage.arg, arg_native, ip);
        let dest_org_type = stage.native_result.org_type();

        let apply = |f: Float| -> Float {
            match stage.op {
                UnArithOp::Sqrt => f.sqrt(),
                UnArithOp::Neg => -f,
                UnArithOp::Abs => f.abs(),
            }
        };

        let mut dest_sv = arg_sv.clone();
        *dest_sv.value_mut() = apply(arg_sv.value().clone());
        *dest_sv.mid_value_mut() = apply(arg_sv.mid_value().clone());
        let ori_raw = apply(arg_sv.ori_value().clone());
        *dest_sv.ori_value_mut() = ap::emulate_ieee(&ori_raw, dest_org_type);

        dest_sv.set_op_count(arg_sv.op_count() + 1);
        dest_sv.set_origin(ip);
        dest_sv.set_org(stage.native_result);

        self.write_dest_shadow(plan, stage.dest, dest_sv);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{NativeValue, Operand, Temp};

    #[test]
    fn sqrt_of_introduced_const_matches_native() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let mut natives = TmpConstStaging::default();
        natives.write_tmp(0, NativeValue::F64(4.0));

        let stage = UnOpStage {
            op: UnArithOp::Sqrt,
            dest: Temp(0),
            arg: Operand::Const(NativeValue::F64(4.0)),
            native_result: NativeValue::F64(2.0),
        };
        engine.handle_un_op(0x400, &plan, &stage, &natives).unwrap();
        let sv = engine.temps.get(Temp(0)).expect("dest shadow written");
        assert!((sv.value().to_f64() - 2.0).abs() < 1e-9);
        assert_eq!(sv.op_count(), 1);
    }
}
