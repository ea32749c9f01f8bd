//! F64 -> integer conversion handlers (§4.E.5)
//!
//! When `--track-int` is off, instrumentation is skipped entirely and the
//! native conversion result is used untouched — this handler is simply not
//! called in that case by the caller, but also short-circuits defensively.

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{Addr, CvtOp, Operand};
use crate::liveness::LivenessPlan;
use crate::staging::TmpConstStaging;

use super::resolve_native;

impl Engine {
    /// Returns `Some(value)` to bind into the destination IR temp when
    /// `--track-int` is enabled; `None` means "use the native conversion".
    pub fn handle_cvt(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        op: CvtOp,
        arg: Operand,
        natives: &TmpConstStaging,
    ) -> EngineResult<Option<i64>> {
        if !self.config.track_int || !self.is_analyzing() {
            return Ok(None);
        }

        let arg_native = resolve_native(arg, natives, 0);
        let arg_sv = self.resolve_operand_shadow(plan, arg, arg_native, ip);
        let shadow_f64 = arg_sv.value().to_f64();

        let converted = match op {
            CvtOp::F64toI16S => (shadow_f64 as i64).clamp(i16::MIN as i64, i16::MAX as i64),
            CvtOp::F64toI32S => (shadow_f64 as i64).clamp(i32::MIN as i64, i32::MAX as i64),
            CvtOp::F64toI64S => shadow_f64 as i64,
            CvtOp::F64toI32U => (shadow_f64 as i64).clamp(0, u32::MAX as i64),
            CvtOp::F64toI64U => (shadow_f64 as i64).max(0),
        };
        Ok(Some(converted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::NativeValue;

    #[test]
    fn track_int_off_skips_conversion() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let natives = TmpConstStaging::default();
        let result = engine
            .handle_cvt(0x5000, &plan, CvtOp::F64toI32S, Operand::Const(NativeValue::F64(3.7)), &natives)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn track_int_on_converts_shadow_value() {
        let mut engine = Engine::new(Config::default());
        engine.config.track_int = true;
        let plan = LivenessPlan::default();
        let natives = TmpConstStaging::default();
        let result = engine
            .handle_cvt(0x5000, &plan, CvtOp::F64toI32S, Operand::Const(NativeValue::F64(3.7)), &natives)
            .unwrap();
        assert_eq!(result, Some(3));
    }
}
