//! Temp array, thread register file, and global memory map (§3, §4.B)

use std::collections::HashMap;

use crate::ir::{Addr, RegOffset, Temp, ThreadId};
use crate::shadow_value::{ShadowKey, ShadowValue};

/// Per-superblock dense temp array, reused across superblocks via `version` (§4.B).
#[derive(Debug, Default)]
pub struct TempStore {
    slots: Vec<Option<ShadowValue>>,
    /// Epoch counter incremented on every superblock entry (`sbExecuted`).
    current_epoch: u64,
}

impl TempStore {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            current_epoch: 0,
        }
    }

    pub const fn epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Called once at the top of every instrumented superblock (§4.E.9).
    pub fn enter_superblock(&mut self) {
        self.current_epoch += 1;
    }

    /// `getTemp`: returns the record iff it's current for this epoch and active.
    pub fn get(&self, tmp: Temp) -> Option<&ShadowValue> {
        self.slots.get(tmp.0 as usize)?.as_ref().filter(|sv| {
            sv.version() == self.current_epoch && sv.active()
        })
    }

    /// `setTemp`: ensures a record exists, marks it current and active, and returns it.
    pub fn set(&mut self, tmp: Temp, precision: u32) -> &mut ShadowValue {
        let epoch = self.current_epoch;
        let idx = tmp.0 as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        let slot = &mut self.slots[idx];
        match slot {
            Some(sv) => {
                sv.set_active(true);
            }
            None => {
                *slot = Some(ShadowValue::new(ShadowKey::Temp(tmp), precision));
            }
        }
        let sv = slot.as_mut().expect("just inserted");
        sv.set_version(epoch);
        sv
    }
}

/// Per-thread, per-offset register file, bounded and dense (§4.B, §4.E.8).
#[derive(Debug, Default)]
pub struct RegisterFile {
    threads: HashMap<ThreadId, HashMap<RegOffset, ShadowValue>>,
}

impl RegisterFile {
    pub fn get(&self, thread: ThreadId, offset: RegOffset) -> Option<&ShadowValue> {
        self.threads.get(&thread)?.get(&offset).filter(|sv| sv.active())
    }

    /// Created on first `Put`; reused thereafter.
    pub fn set(&mut self, thread: ThreadId, offset: RegOffset, precision: u32) -> &mut ShadowValue {
        self.threads
            .entry(thread)
            .or_default()
            .entry(offset)
            .or_insert_with(|| ShadowValue::new(ShadowKey::Register(thread, offset), precision))
    }

    /// A non-shadowed `Put` to an existing record invalidates it (retains AP storage).
    pub fn invalidate(&mut self, thread: ThreadId, offset: RegOffset) {
        if let Some(sv) = self.threads.get_mut(&thread).and_then(|t| t.get_mut(&offset)) {
            sv.set_active(false);
        }
    }

    pub fn reset_all(&mut self) {
        for regs in self.threads.values_mut() {
            for sv in regs.values_mut() {
                sv.set_active(false);
            }
        }
    }
}

/// Global, address-keyed memory map, created lazily on first FP store (§4.B).
#[derive(Debug, Default)]
pub struct MemoryMap {
    entries: HashMap<Addr, ShadowValue>,
}

impl MemoryMap {
    pub fn get(&self, addr: Addr) -> Option<&ShadowValue> {
        self.entries.get(&addr).filter(|sv| sv.active())
    }

    /// Looks up the raw node regardless of `active`, used by the stage
    /// tracker's `updateStages` to recover an origin even for inactive entries.
    pub fn get_raw(&self, addr: Addr) -> Option<&ShadowValue> {
        self.entries.get(&addr)
    }

    pub fn upsert(&mut self, addr: Addr, precision: u32) -> &mut ShadowValue {
        let sv = self
            .entries
            .entry(addr)
            .or_insert_with(|| ShadowValue::new(ShadowKey::Memory(addr), precision));
        sv.set_active(true);
        sv
    }

    /// A non-FP store with no live temp shadow deactivates the existing node, if any.
    pub fn invalidate(&mut self, addr: Addr) {
        if let Some(sv) = self.entries.get_mut(&addr) {
            sv.set_active(false);
        }
    }

    pub fn reset_all(&mut self) {
        for sv in self.entries.values_mut() {
            sv.set_active(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_becomes_stale_across_superblocks() {
        let mut temps = TempStore::new(8);
        temps.enter_superblock();
        temps.set(Temp(0), 120);
        assert!(temps.get(Temp(0)).is_some());

        temps.enter_superblock();
        assert!(temps.get(Temp(0)).is_none(), "version mismatch must hide stale temps");
    }

    #[test]
    fn memory_store_then_non_fp_overwrite_deactivates() {
        let mut mem = MemoryMap::default();
        mem.upsert(0x1000, 120);
        assert!(mem.get(0x1000).is_some());
        mem.invalidate(0x1000);
        assert!(mem.get(0x1000).is_none());
        // storage retained, not freed: a later FP store reuses the same node
        assert!(mem.get_raw(0x1000).is_some());
    }
}
