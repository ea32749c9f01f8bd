//! Stage tracker (§4.F, `stageStart`/`stageEnd`/`stageClear` in `fd_main.c`)
//!
//! A stage is an iterative region the guest delimits via `BEGIN_STAGE(id)` /
//! `END_STAGE(id)`; per-address relative error is diffed against the
//! previous iteration's snapshot, flagged once the delta exceeds that
//! address's adaptive limit.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::ir::Addr;

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    rel_err: f64,
    origin: Addr,
}

/// A flagged non-monotonic growth in relative error at one address.
#[derive(Debug, Clone, Copy)]
pub struct StageReport {
    pub stage: u32,
    pub addr: Addr,
    pub count: u32,
    pub iter_min: u32,
    pub iter_max: u32,
    pub origin: Addr,
}

#[derive(Debug, Default)]
struct StageState {
    iteration: u32,
    previous: HashMap<Addr, Snapshot>,
    current: HashMap<Addr, Snapshot>,
    limits: HashMap<Addr, f64>,
    reports: HashMap<Addr, StageReport>,
}

/// All stages currently tracked, keyed by the guest-chosen stage id.
#[derive(Debug, Default)]
pub struct StageTracker {
    stages: HashMap<u32, StageState>,
}

impl StageTracker {
    pub fn begin(&mut self, id: u32) -> EngineResult<()> {
        if self.stages.contains_key(&id) {
            return Err(EngineError::StageAlreadyActive(id));
        }
        self.stages.insert(id, StageState::default());
        Ok(())
    }

    /// Record address `addr`'s relative error this iteration. Called from the
    /// Store handler (§4.E.7) whenever any stage is active.
    pub fn observe(&mut self, id: u32, addr: Addr, rel_err: f64, origin: Addr) -> EngineResult<()> {
        let stage = self.stages.get_mut(&id).ok_or(EngineError::StageNotActive(id))?;
        stage.current.insert(addr, Snapshot { rel_err, origin });
        Ok(())
    }

    /// Diff `current` against `previous`, emit reports for addresses whose
    /// delta exceeds their adaptive limit, then roll the snapshot forward.
    pub fn end(&mut self, id: u32) -> EngineResult<Vec<StageReport>> {
        let stage = self.stages.get_mut(&id).ok_or(EngineError::StageNotActive(id))?;
        stage.iteration += 1;
        let iteration = stage.iteration;
        let mut emitted = Vec::new();

        for (&addr, current) in &stage.current {
            let Some(prev) = stage.previous.get(&addr) else { continue };
            let delta = (current.rel_err - prev.rel_err).abs();
            let limit = stage.limits.entry(addr).or_insert(0.0);
            if delta > *limit {
                let report = stage.reports.entry(addr).or_insert(StageReport {
                    stage: id,
                    addr,
                    count: 0,
                    iter_min: iteration,
                    iter_max: iteration,
                    origin: current.origin,
                });
                report.count += 1;
                report.iter_max = iteration;
                report.origin = current.origin;
                emitted.push(*report);
            }
            *limit = limit.max(delta);
        }

        stage.previous = std::mem::take(&mut stage.current);
        Ok(emitted)
    }

    pub fn clear(&mut self, id: u32) -> EngineResult<()> {
        self.stages.remove(&id).ok_or(EngineError::StageNotActive(id))?;
        Ok(())
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.stages.contains_key(&id)
    }

    /// All currently-active stage ids, notified by a Store while live (§4.E.7).
    pub fn active_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.stages.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growing_delta_keeps_reporting_every_iteration() {
        let mut tracker = StageTracker::default();
        tracker.begin(1).unwrap();
        let mut rel = 0.0001;
        let mut last_count = 0;
        for iter in 1..=10 {
            tracker.observe(1, 0xA, rel, 0x500).unwrap();
            let reports = tracker.end(1).unwrap();
            if iter > 1 {
                assert_eq!(reports.len(), 1, "iteration {iter} should report growth");
                last_count = reports[0].count;
            }
            rel *= 1.5;
        }
        assert!(last_count >= 1);
    }

    #[test]
    fn end_on_unknown_stage_errors() {
        let mut tracker = StageTracker::default();
        assert!(tracker.end(99).is_err());
    }
}
