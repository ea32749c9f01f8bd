//! Binary arithmetic handlers: `add`/`sub`/`mul`/`div`/`min`/`max` at F32/F64
//! lane 0 (§4.E.2), shared with the ternary handler (§4.E.3) via
//! [`compute_arith`].

use rug::Assign;
use rug::Float;

use crate::ap;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::ir::{Addr, BinArithOp, NativeValue, OrgType};
use crate::liveness::LivenessPlan;
use crate::shadow_value::ShadowValue;
use crate::staging::{BinOpStage, BinSlotOp, TmpConstStaging};

use super::resolve_native;

fn max_exact_bits(org_type: OrgType) -> i64 {
    match org_type {
        OrgType::Float => 23,
        OrgType::Double | OrgType::Invalid => 52,
    }
}

/// `max(0, max(exp(arg1), exp(arg2)) - exp(result))`, zero unless all three
/// operands are regular (finite, non-zero).
fn canceled_bits(arg1: &Float, arg2: &Float, result: &Float) -> i64 {
    if !(ap::is_regular(arg1) && ap::is_regular(arg2) && ap::is_regular(result)) {
        return 0;
    }
    let e1 = arg1.get_exp().unwrap_or(0) as i64;
    let e2 = arg2.get_exp().unwrap_or(0) as i64;
    let er = result.get_exp().unwrap_or(0) as i64;
    (e1.max(e2) - er).max(0)
}

/// How many leading bits of `arg` are already known-exact relative to the
/// native value the guest actually computed (§4.E.2's `cancelTemp` estimate).
fn exact_bits(arg: &Float, native: NativeValue) -> i64 {
    let native_ap = Float::with_val(arg.prec(), native.as_f64());
    let (Some(exp_arg), Some(exp_native)) = (arg.get_exp(), native_ap.get_exp()) else {
        return 0;
    };
    if exp_arg != exp_native {
        return 0;
    }
    let diff = Float::with_val(arg.prec(), arg - &native_ap);
    let max_bits = max_exact_bits(native.org_type());
    let Some(exp_diff) = diff.get_exp() else {
        // arg matches native exactly: nothing left to disagree on.
        return max_bits;
    };
    ((exp_arg as i64 - exp_diff as i64).abs() - 2).clamp(0, max_bits)
}

/// Computed dest shadow plus the cancellation-badness signal, before mean-value
/// accumulation / PSO observation / the destination write (shared by binop and triop).
pub(crate) struct ArithResult {
    pub dest: ShadowValue,
    pub canceled_here: i64,
    pub badness: i64,
}

pub(crate) fn compute_arith(
    op: BinArithOp,
    arg1_sv: &ShadowValue,
    arg1_native: NativeValue,
    arg2_sv: &ShadowValue,
    arg2_native: NativeValue,
    dest_org_type: OrgType,
    ip: Addr,
    native_result: NativeValue,
) -> ArithResult {
    let apply = |a: Float, b: Float| -> Float {
        match op {
            BinArithOp::Add => a + b,
            BinArithOp::Sub => a - b,
            BinArithOp::Mul => a * b,
            BinArithOp::Div => a / b,
            BinArithOp::Min => if a <= b { a } else { b },
            BinArithOp::Max => if a >= b { a } else { b },
        }
    };

    let value = apply(arg1_sv.value().clone(), arg2_sv.value().clone());
    let mid_value = apply(arg1_sv.mid_value().clone(), arg2_sv.mid_value().clone());
    let ori_raw = apply(arg1_sv.ori_value().clone(), arg2_sv.ori_value().clone());
    let ori_value = ap::emulate_ieee(&ori_raw, dest_org_type);

    let canceled_here = if op.is_additive() {
        canceled_bits(arg1_sv.value(), arg2_sv.value(), &value)
    } else {
        0
    };
    let badness = if op.is_additive() {
        let exact1 = exact_bits(arg1_sv.value(), arg1_native);
        let exact2 = exact_bits(arg2_sv.value(), arg2_native);
        (canceled_here - exact1.min(exact2)).max(0)
    } else {
        0
    };

    let canceled = canceled_here.max(arg1_sv.canceled()).max(arg2_sv.canceled());
    let cancel_origin = if canceled_here >= arg1_sv.canceled() && canceled_here >= arg2_sv.canceled() {
        ip
    } else if arg1_sv.canceled() >= arg2_sv.canceled() {
        arg1_sv.cancel_origin()
    } else {
        arg2_sv.cancel_origin()
    };
    let op_count = 1 + arg1_sv.op_count().max(arg2_sv.op_count());

    let mut dest = arg1_sv.clone();
    *dest.value_mut() = value;
    *dest.mid_value_mut() = mid_value;
    *dest.ori_value_mut() = ori_value;
    dest.set_op_count(op_count);
    dest.set_origin(ip);
    dest.set_canceled(canceled);
    dest.set_cancel_origin(cancel_origin);
    dest.set_org(native_result);

    ArithResult { dest, canceled_here, badness }
}

impl Engine {
    pub fn handle_bin_op(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        stage: &BinOpStage,
        natives: &TmpConstStaging,
    ) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }
        let BinSlotOp::Arith(op) = stage.op else {
            return Err(EngineError::UnreachableInvariant(
                "handle_bin_op called with a non-arithmetic BinSlotOp".to_string(),
            ));
        };

        let arg1_native = resolve_native(stage.arg1, natives, 0);
        let arg2_native = resolve_native(stage.arg2, natives, 1);
        let arg1_sv = self.resolve_operand_shadow(plan, stage.arg1, arg1_native, ip);
        let arg2_sv = self.resolve_operand_shadow(plan, stage.arg2, arg2_native, ip);
        let dest_org_type = stage.native_result.org_type();

        let ArithResult { mut dest, badness, .. } = compute_arith(
            op, &arg1_sv, arg1_native, &arg2_sv, arg2_native, dest_org_type, ip, stage.native_result,
        );

        self.record_analyses(ip, &arg1_sv, &arg2_sv, &mut dest, badness);
        self.write_dest_shadow(plan, stage.dest, dest);
        Ok(())
    }

    /// Mean-value accumulation, PSO observe/fix — shared by binop and triop.
    pub(crate) fn record_analyses(
        &mut self,
        ip: Addr,
        arg1_sv: &ShadowValue,
        arg2_sv: &ShadowValue,
        dest: &mut ShadowValue,
        badness: i64,
    ) {
        if self.config.mean_error {
            let rel_err = dest.relative_error().to_f64();
            self.mean_values.update(ip, rel_err, dest.canceled(), badness, (arg1_sv.origin(), arg2_sv.origin()));
        }

        if self.config.detect_pso {
            let irel = arg1_sv.relative_error().to_f64().max(arg2_sv.relative_error().to_f64());
            let orel = dest.relative_error().to_f64();
            let orig_mag = dest.org().map(|n| n.as_f64()).unwrap_or(0.0);
            let shadow_mag = dest.value().to_f64();
            self.pso.observe(ip, irel, orel, orig_mag, shadow_mag);
        }

        if self.pso.is_detected(ip) {
            let mid = dest.mid_value().clone();
            dest.value_mut().assign(&mid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{Operand, Temp};

    #[test]
    fn kahan_cancellation_reports_large_canceled_bits() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();

        // x = 1e20 + 1.0
        let mut natives = TmpConstStaging::default();
        let add_stage = BinOpStage {
            op: BinSlotOp::Arith(BinArithOp::Add),
            dest: Temp(0),
            arg1: Operand::Const(NativeValue::F64(1e20)),
            arg2: Operand::Const(NativeValue::F64(1.0)),
            native_result: NativeValue::F64(1e20),
        };
        engine.handle_bin_op(0x1000, &plan, &add_stage, &natives).unwrap();

        // x - 1e20
        natives.write_tmp(0, NativeValue::F64(1e20));
        let sub_stage = BinOpStage {
            op: BinSlotOp::Arith(BinArithOp::Sub),
            dest: Temp(1),
            arg1: Operand::Tmp(Temp(0)),
            arg2: Operand::Const(NativeValue::F64(1e20)),
            native_result: NativeValue::F64(0.0),
        };
        engine.handle_bin_op(0x1008, &plan, &sub_stage, &natives).unwrap();

        let result = engine.temps.get(Temp(1)).unwrap();
        assert!((result.value().to_f64() - 1.0).abs() < 1e-6, "shadow recovers the lost 1.0");
        assert!(result.canceled() > 50, "expected heavy cancellation, got {}", result.canceled());
    }

    #[test]
    fn non_additive_ops_never_report_cancellation() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let natives = TmpConstStaging::default();
        let stage = BinOpStage {
            op: BinSlotOp::Arith(BinArithOp::Mul),
            dest: Temp(0),
            arg1: Operand::Const(NativeValue::F64(1e20)),
            arg2: Operand::Const(NativeValue::F64(1e-20)),
            native_result: NativeValue::F64(1.0),
        };
        engine.handle_bin_op(0x2000, &plan, &stage, &natives).unwrap();
        let result = engine.temps.get(Temp(0)).unwrap();
        assert_eq!(result.canceled(), 0);
    }
}
