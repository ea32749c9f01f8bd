//! The shadow-execution engine (§9 Design Notes: "Global mutable singletons
//! collapse into a single `Engine` context passed explicitly")
//!
//! Every table the original keeps as a module-scope global — temps,
//! registers, memory map, stage/PSO/mean-value tables, the unsupported-op
//! set, option flags — lives here instead, owned by one `Engine` value a
//! host constructs once and threads through every call site.

use std::collections::HashSet;

use itertools::Itertools;

use crate::analysis::{MeanValueTable, PsoDetector, StageTracker};
use crate::config::Config;
use crate::error::EngineResult;
use crate::ir::{Addr, NativeValue, Operand, ThreadId};
use crate::liveness::LivenessPlan;
use crate::reports::ReportSink;
use crate::shadow_value::{ShadowKey, ShadowValue};
use crate::stores::{MemoryMap, RegisterFile, TempStore};

/// Owns every shadow store and online analysis; the single point through
/// which a host drives the engine.
pub struct Engine {
    pub(crate) config: Config,
    pub(crate) temps: TempStore,
    pub(crate) registers: RegisterFile,
    pub(crate) memory: MemoryMap,
    pub(crate) mean_values: MeanValueTable,
    pub(crate) stages: StageTracker,
    pub(crate) pso: PsoDetector,
    pub(crate) unsupported_ops: HashSet<&'static str>,
    /// The `BEGIN`/`END` client-request flag; handlers short-circuit while `false`
    /// unless `ignore_end` is set (§4.G).
    pub(crate) analyzing: bool,
    pub(crate) sink: Option<Box<dyn ReportSink>>,
    /// Running count of `PRINT_ERROR`/`COND_PRINT_ERROR` requests serviced,
    /// used as the `N:` prefix on `shadow_values_*` report entries (§6.3).
    pub(crate) print_error_count: u64,
    /// Number of `DUMP_ERROR_GRAPH` requests serviced this run, capped at
    /// `MAX_DUMPED_GRAPHS` (§4.G).
    pub(crate) graphs_dumped: u32,
    /// Origins a `careVisited` graph dump has already walked, so a later
    /// bulk dump over the whole memory map can skip what an earlier
    /// individual dump already covered (`fd_main.c`'s `MeanValue.visited`).
    pub(crate) graph_visited: HashSet<Addr>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let temp_capacity = crate::consts::MAX_TEMPS;
        Self {
            config,
            temps: TempStore::new(temp_capacity),
            registers: RegisterFile::default(),
            memory: MemoryMap::default(),
            mean_values: MeanValueTable::default(),
            stages: StageTracker::default(),
            pso: PsoDetector::default(),
            unsupported_ops: HashSet::new(),
            analyzing: true,
            sink: None,
            print_error_count: 0,
            graphs_dumped: 0,
            graph_visited: HashSet::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn set_report_sink(&mut self, sink: Box<dyn ReportSink>) {
        self.sink = Some(sink);
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing || self.config.ignore_end
    }

    pub fn set_analyzing(&mut self, analyzing: bool) {
        self.analyzing = analyzing;
    }

    /// Call at the top of every instrumented superblock (§4.E.9).
    pub fn enter_superblock(&mut self) {
        self.temps.enter_superblock();
    }

    /// Record an IR opcode the engine has no shadow semantics for (§7).
    pub fn record_unsupported(&mut self, opcode_name: &'static str) {
        self.unsupported_ops.insert(opcode_name);
    }

    pub fn unsupported_ops(&self) -> impl Iterator<Item = &&'static str> {
        self.unsupported_ops.iter()
    }

    /// `RESET`: mark every temp/register/memory record inactive. Version
    /// counters are left untouched per spec.
    pub fn reset(&mut self) {
        self.registers.reset_all();
        self.memory.reset_all();
        // Temps are never explicitly zeroed; advancing the epoch makes every
        // existing temp record stale, which is observably equivalent to
        // deactivating them (§4.B "staleness is detected by the version mismatch").
        self.temps.enter_superblock();
    }

    pub(crate) fn thread_key(&self, thread: ThreadId) -> ThreadId {
        thread
    }

    /// Read an operand's shadow, substituting `plan`'s alias resolution for a
    /// `Tmp` operand, introducing a fresh shadow when none is live, and
    /// re-running divergence recovery against the freshly-read native value
    /// (§7 "missing shadow on read" / "divergence... checkAndRecover").
    pub(crate) fn resolve_operand_shadow(
        &mut self,
        plan: &LivenessPlan,
        op: Operand,
        native: NativeValue,
        ip: Addr,
    ) -> ShadowValue {
        match op {
            Operand::Const(v) => ShadowValue::introduce(ShadowKey::Temp(crate::ir::Temp(u32::MAX)), self.config.precision, v, ip),
            Operand::Tmp(t) => {
                let resolved = plan.resolve(t);
                match self.temps.get(resolved).cloned() {
                    Some(mut sv) => {
                        sv.set_org(native);
                        sv.check_and_recover();
                        sv
                    }
                    None => {
                        let introduced = ShadowValue::introduce(
                            ShadowKey::Temp(resolved),
                            self.config.precision,
                            native,
                            ip,
                        );
                        *self.temps.set(resolved, self.config.precision) = introduced.clone();
                        introduced
                    }
                }
            }
        }
    }

    /// Write the destination temp's shadow, applying the liveness plan's alias
    /// resolution exactly as operand reads do.
    pub(crate) fn write_dest_shadow(&mut self, plan: &LivenessPlan, dest: crate::ir::Temp, sv: ShadowValue) {
        let resolved = plan.resolve(dest);
        let slot = self.temps.set(resolved, sv.value().prec());
        slot.copy_from(&sv, self.config.sim_original);
    }

    pub fn flush_reports(&mut self) -> EngineResult<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Dump the three `mean_errors_*` report files (by address, by max
    /// canceled bits, by introduced error) and flush every sink, mirroring
    /// the original's shutdown-time report pass (§6.3, §6 "introduced
    /// error"). A host calls this once, after the guest program under
    /// analysis has finished running.
    pub fn finish(&mut self) -> EngineResult<()> {
        if self.config.mean_error {
            let by_addr: Vec<Addr> = self.mean_values.iter().map(|(&ip, _)| ip).sorted_unstable().collect();

            let by_canceled: Vec<Addr> = by_addr
                .iter()
                .copied()
                .sorted_by_key(|ip| std::cmp::Reverse(self.mean_values.get(*ip).map(|e| e.canceled_max).unwrap_or(0)))
                .collect();

            let by_intro: Vec<Addr> = by_addr
                .iter()
                .copied()
                .sorted_by(|a, b| {
                    let ia = self.mean_values.introduced_error(*a).unwrap_or(0.0);
                    let ib = self.mean_values.introduced_error(*b).unwrap_or(0.0);
                    ib.partial_cmp(&ia).unwrap_or(std::cmp::Ordering::Equal)
                })
                .collect();

            if let Some(sink) = self.sink.as_mut() {
                for ip in &by_addr {
                    let entry = self.mean_values.get(*ip).expect("just listed");
                    sink.write_block(crate::reports::ReportKind::MeanErrorsAddr, &crate::reports::format_mean_value_entry(*ip, entry))?;
                }
                for ip in &by_canceled {
                    let entry = self.mean_values.get(*ip).expect("just listed");
                    sink.write_block(crate::reports::ReportKind::MeanErrorsCanceled, &crate::reports::format_mean_value_entry(*ip, entry))?;
                }
                for ip in &by_intro {
                    let entry = self.mean_values.get(*ip).expect("just listed");
                    sink.write_block(crate::reports::ReportKind::MeanErrorsIntro, &crate::reports::format_mean_value_entry(*ip, entry))?;
                }
            }
        }
        self.flush_reports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_engine_is_analyzing_by_default() {
        let engine = Engine::new(Config::default());
        assert!(engine.is_analyzing());
    }

    #[test]
    fn reset_deactivates_registers_and_memory() {
        let mut engine = Engine::new(Config::default());
        engine.memory.upsert(0x1000, 120);
        engine.reset();
        assert!(engine.memory.get(0x1000).is_none());
    }

    #[derive(Clone, Default)]
    struct CountingSink {
        blocks: std::rc::Rc<std::cell::RefCell<Vec<crate::reports::ReportKind>>>,
    }

    impl ReportSink for CountingSink {
        fn write_block(&mut self, kind: crate::reports::ReportKind, _content: &str) -> std::io::Result<()> {
            self.blocks.borrow_mut().push(kind);
            Ok(())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn finish_writes_all_three_mean_error_sortings() {
        let mut engine = Engine::new(Config::default());
        let sink = CountingSink::default();
        engine.set_report_sink(Box::new(sink.clone()));

        engine.mean_values.update(0x10, 0.1, 2, 0, (0, 0));
        engine.mean_values.update(0x20, 0.2, 9, 0, (0x10, 0));

        engine.finish().unwrap();
        let kinds = sink.blocks.borrow();
        assert_eq!(kinds.iter().filter(|k| **k == crate::reports::ReportKind::MeanErrorsAddr).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == crate::reports::ReportKind::MeanErrorsCanceled).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == crate::reports::ReportKind::MeanErrorsIntro).count(), 2);
    }
}
