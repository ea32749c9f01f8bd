//! Load / Store / Put / Get / PutI / GetI handlers (§4.E.7, §4.E.8)
//!
//! Load and Get mirror each other across the memory map and register file;
//! so do Store and Put. `PutI`/`GetI` additionally resolve a circular
//! register offset (`Stmt::circular_offset`) before delegating to the plain
//! Put/Get path.

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{Addr, NativeValue, Operand, RegOffset, Temp, ThreadId};
use crate::liveness::LivenessPlan;
use crate::shadow_value::ShadowValue;
use crate::staging::TmpConstStaging;

use super::resolve_native;

impl Engine {
    /// `Load(addr -> dest)`: if `memory[addr]` is live, copy its shadow into
    /// `dest`; otherwise introduce a fresh shadow from `native` (§8 scenario 6).
    pub fn handle_load(&mut self, ip: Addr, plan: &LivenessPlan, dest: Temp, addr: Addr, native: NativeValue) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }
        let dest_sv = match self.memory.get(addr).cloned() {
            Some(mut sv) => {
                sv.set_org(native);
                sv
            }
            None => {
                let mut sv = ShadowValue::introduce(
                    crate::shadow_value::ShadowKey::Temp(plan.resolve(dest)),
                    self.config.precision,
                    native,
                    ip,
                );
                // §8 scenario 6: a load that introduces a shadow (no prior
                // memory record) counts as the producing op itself, op_count 1.
                sv.set_op_count(1);
                sv
            }
        };
        self.write_dest_shadow(plan, dest, dest_sv);
        Ok(())
    }

    /// `Store(addr <- src)`: if `src` is live, upsert `memory[addr]` and copy
    /// its shadow in, writing `native_value` as the record's `org`; notify
    /// every active stage tracker. Otherwise deactivate any existing
    /// `memory[addr]` record — the address has been overwritten by something
    /// unshadowed.
    pub fn handle_store(&mut self, ip: Addr, plan: &LivenessPlan, addr: Addr, src: Temp, native_value: NativeValue) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }
        let resolved = plan.resolve(src);
        match self.temps.get(resolved).cloned() {
            Some(mut sv) => {
                sv.set_org(native_value);
                let rel_err = sv.relative_error().to_f64();
                let slot = self.memory.upsert(addr, sv.value().prec());
                slot.copy_from(&sv, self.config.sim_original);
                slot.set_org(native_value);

                let active_ids: Vec<u32> = self.stages.active_ids().collect();
                for id in active_ids {
                    let _ = self.stages.observe(id, addr, rel_err, ip);
                }
            }
            None => self.memory.invalidate(addr),
        }
        Ok(())
    }

    /// `Put(offset <- src)`: symmetric to `Store`, keyed by `(thread, offset)`.
    /// `stmt_index` is this statement's position in the superblock, used to
    /// consult the liveness pre-pass's `put_is_skippable` verdict: a `Put` no
    /// later `Get` reads before the next overwrite of `offset` has its
    /// shadow update elided entirely (§4.D).
    pub fn handle_put(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        thread: ThreadId,
        offset: RegOffset,
        src: Operand,
        natives: &TmpConstStaging,
        stmt_index: usize,
    ) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }
        if plan.put_is_skippable(stmt_index) {
            return Ok(());
        }
        let native = resolve_native(src, natives, 0);
        match src {
            Operand::Tmp(t) => {
                let resolved = plan.resolve(t);
                match self.temps.get(resolved).cloned() {
                    Some(mut sv) => {
                        sv.set_org(native);
                        let slot = self.registers.set(thread, offset, sv.value().prec());
                        slot.copy_from(&sv, self.config.sim_original);
                        slot.set_org(native);
                    }
                    None => self.registers.invalidate(thread, offset),
                }
            }
            Operand::Const(v) => {
                let sv = ShadowValue::introduce(
                    crate::shadow_value::ShadowKey::Register(thread, offset),
                    self.config.precision,
                    v,
                    ip,
                );
                let slot = self.registers.set(thread, offset, sv.value().prec());
                slot.copy_from(&sv, self.config.sim_original);
                slot.set_org(v);
            }
        }
        Ok(())
    }

    /// `Get(offset -> dest)`: symmetric to `Load`.
    pub fn handle_get(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        thread: ThreadId,
        dest: Temp,
        offset: RegOffset,
        native: NativeValue,
    ) -> EngineResult<()> {
        if !self.is_analyzing() {
            return Ok(());
        }
        let dest_sv = match self.registers.get(thread, offset).cloned() {
            Some(mut sv) => {
                sv.set_org(native);
                sv
            }
            None => {
                let mut sv = ShadowValue::introduce(
                    crate::shadow_value::ShadowKey::Temp(plan.resolve(dest)),
                    self.config.precision,
                    native,
                    ip,
                );
                sv.set_op_count(1);
                sv
            }
        };
        self.write_dest_shadow(plan, dest, dest_sv);
        Ok(())
    }

    /// `PutI`: resolve the circular offset, then delegate to [`Engine::handle_put`].
    pub fn handle_put_i(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        thread: ThreadId,
        base: RegOffset,
        n_elems: u16,
        bias: i16,
        ix: u16,
        src: Operand,
        natives: &TmpConstStaging,
        stmt_index: usize,
    ) -> EngineResult<()> {
        let offset = crate::ir::Stmt::circular_offset(base, n_elems, bias, ix);
        self.handle_put(ip, plan, thread, offset, src, natives, stmt_index)
    }

    /// `GetI`: resolve the circular offset, then delegate to [`Engine::handle_get`].
    pub fn handle_get_i(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        thread: ThreadId,
        dest: Temp,
        base: RegOffset,
        n_elems: u16,
        bias: i16,
        ix: u16,
        native: NativeValue,
    ) -> EngineResult<()> {
        let offset = crate::ir::Stmt::circular_offset(base, n_elems, bias, ix);
        self.handle_get(ip, plan, thread, dest, offset, native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::RegOffset;

    #[test]
    fn load_introduces_fresh_shadow_after_nonfp_overwrite() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();

        // store an FP value at `a`
        engine.temps.set(Temp(0), 120).set_org(NativeValue::F64(1.0));
        *engine.temps.set(Temp(0), 120).value_mut() = rug::Float::with_val(120, 1.0);
        engine.handle_store(0x100, &plan, 0xA, Temp(0), NativeValue::F64(1.0)).unwrap();
        assert!(engine.memory.get(0xA).is_some());

        // an integer store (unshadowed) overwrites `a`
        engine.memory.invalidate(0xA);
        assert!(engine.memory.get(0xA).is_none());

        // loading `a` back into an FP temp introduces a fresh shadow, opCount = 1
        engine.handle_load(0x108, &plan, Temp(1), 0xA, NativeValue::F64(1.0)).unwrap();
        let sv = engine.temps.get(Temp(1)).unwrap();
        assert_eq!(sv.op_count(), 1, "introducing load counts as the producing op (§8 scenario 6)");
    }

    #[test]
    fn put_then_get_round_trips_shadow() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let natives = TmpConstStaging::default();

        engine
            .handle_put(0x200, &plan, 1, RegOffset(16), Operand::Const(NativeValue::F64(3.5)), &natives, 0)
            .unwrap();
        engine.handle_get(0x204, &plan, 1, Temp(0), RegOffset(16), NativeValue::F64(3.5)).unwrap();
        let sv = engine.temps.get(Temp(0)).unwrap();
        assert_eq!(sv.value().to_f64(), 3.5);
    }

    #[test]
    fn put_with_no_live_temp_invalidates_existing_register() {
        let mut engine = Engine::new(Config::default());
        let plan = LivenessPlan::default();
        let natives = TmpConstStaging::default();
        engine
            .handle_put(0x300, &plan, 1, RegOffset(8), Operand::Const(NativeValue::F64(1.0)), &natives, 0)
            .unwrap();
        assert!(engine.registers.get(1, RegOffset(8)).is_some());

        // Put from a never-written temp: the register gets invalidated, not introduced.
        engine
            .handle_put(0x304, &plan, 1, RegOffset(8), Operand::Tmp(Temp(99)), &natives, 1)
            .unwrap();
        assert!(engine.registers.get(1, RegOffset(8)).is_none());
    }
}
