//! Conditional-select handler (§4.E.6)

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{Addr, Operand};
use crate::liveness::LivenessPlan;
use crate::shadow_value::ShadowKey;
use crate::staging::MuxStage;

impl Engine {
    /// Copies the chosen argument's shadow into the destination via
    /// `ShadowValue::copy_from`. If the chosen argument has no live shadow,
    /// the destination is left without one too — the only way an FP-typed
    /// mux may produce an unshadowed temp.
    pub fn handle_mux(&mut self, ip: Addr, plan: &LivenessPlan, stage: &MuxStage) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }

        let chosen = if stage.cond { stage.arg_x } else { stage.arg0 };
        match chosen {
            Operand::Const(v) => {
                let sv = crate::shadow_value::ShadowValue::introduce(
                    ShadowKey::Temp(plan.resolve(stage.dest)),
                    self.config.precision,
                    v,
                    ip,
                );
                self.write_dest_shadow(plan, stage.dest, sv);
            }
            Operand::Tmp(t) => {
                let resolved = plan.resolve(t);
                match self.temps.get(resolved).cloned() {
                    Some(sv) => self.write_dest_shadow(plan, stage.dest, sv),
                    None => {
                        let resolved_dest = plan.resolve(stage.dest);
                        self.temps.set(resolved_dest, self.config.precision).set_active(false);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{NativeValue, Temp};

    #[test]
    fn chosen_branch_without_shadow_leaves_dest_unshadowed() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let stage = MuxStage {
            dest: Temp(2),
            cond: true,
            arg0: Operand::Const(NativeValue::F64(1.0)),
            arg_x: Operand::Tmp(Temp(9)), // never written, so it has no shadow
        };
        engine.handle_mux(0x6000, &plan, &stage).unwrap();
        assert!(engine.temps.get(Temp(2)).is_none());
    }

    #[test]
    fn chosen_const_branch_introduces_a_shadow() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let stage = MuxStage {
            dest: Temp(2),
            cond: false,
            arg0: Operand::Const(NativeValue::F64(7.0)),
            arg_x: Operand::Tmp(Temp(9)),
        };
        engine.handle_mux(0x6000, &plan, &stage).unwrap();
        assert_eq!(engine.temps.get(Temp(2)).unwrap().value().to_f64(), 7.0);
    }
}
