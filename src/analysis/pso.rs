//! Precision-specific-operation detector (§4.F, `analyzePSO`/`beginOneRun`/
//! `endOneRun`/`beginOneInstance` in `fd_main.c`)
//!
//! Two-phase observe/fix: during *observe* runs, every binary/ternary op
//! reports its input/output relative-error inflation; at end of run, IPs
//! whose inflation rate crosses [`PSO_PERCENTAGE_THRESHOLD`] join
//! `detected_pso` (unless they look like a false positive near zero). Once
//! an IP is in `detected_pso`, the *fix* phase substitutes `midValue` there.

use std::collections::{HashMap, HashSet};

use crate::consts::{
    PSO_FALSEPOSITIVE_PERCENTAGE, PSO_INFLATION_THRESHOLD, PSO_OV_ZERO_BOUND,
    PSO_PERCENTAGE_THRESHOLD, PSO_SV_ZERO_BOUND,
};
use crate::ir::Addr;

#[derive(Debug, Clone, Copy, Default)]
struct PsoCounters {
    total_cnt: u64,
    err_cnt: u64,
    ov_cnt: u64,
}

/// Process-wide PSO detector state (persists across runs, per spec 3: "IPs
/// confirmed as PSO across runs").
#[derive(Debug, Default)]
pub struct PsoDetector {
    error_map: HashMap<Addr, PsoCounters>,
    detected_pso: HashSet<Addr>,
    /// Whether any op already latched this instance (§4.F: "only the first
    /// inflating op seen within a given instance is recorded").
    instance_recorded: bool,
    /// `true` once a completed run added no new IPs to `detected_pso`.
    converged: bool,
}

impl PsoDetector {
    pub fn begin_instance(&mut self) {
        self.instance_recorded = false;
    }

    /// Begin a fresh observe/fix run: `error_map` counters are scoped to one
    /// run and must not accumulate across the engine's lifetime.
    pub fn begin_run(&mut self) {
        self.instance_recorded = false;
        self.error_map.clear();
    }

    /// Record one binary/ternary op execution's input/output relative error.
    ///
    /// `orig_mag`/`shadow_mag` are the magnitudes of the original IEEE result
    /// and the shadow result, used for the near-zero false-positive band.
    pub fn observe(&mut self, ip: Addr, irel: f64, orel: f64, orig_mag: f64, shadow_mag: f64) {
        if self.detected_pso.contains(&ip) {
            return;
        }

        let counters = self.error_map.entry(ip).or_default();
        counters.total_cnt += 1;

        if self.instance_recorded {
            return;
        }

        let irel_floor = irel.max(0.0);
        let inflation = if irel_floor == 0.0 {
            if orel == 0.0 { 0.0 } else { f64::INFINITY }
        } else {
            orel / irel_floor
        };

        if inflation >= PSO_INFLATION_THRESHOLD {
            counters.err_cnt += 1;
            self.instance_recorded = true;
            if orig_mag.abs() < PSO_OV_ZERO_BOUND && shadow_mag.abs() < PSO_SV_ZERO_BOUND {
                counters.ov_cnt += 1;
            }
        }
    }

    /// Finalize this run's candidates into `detected_pso`, filtering false positives.
    pub fn end_run(&mut self) {
        let mut candidates = HashSet::new();
        for (&ip, counters) in &self.error_map {
            if counters.total_cnt == 0 {
                continue;
            }
            let total = counters.total_cnt as f64;
            if counters.err_cnt as f64 > PSO_PERCENTAGE_THRESHOLD * total {
                if counters.ov_cnt as f64 > PSO_FALSEPOSITIVE_PERCENTAGE * total {
                    continue;
                }
                candidates.insert(ip);
            }
        }
        let newly_added: Vec<Addr> = candidates.difference(&self.detected_pso).copied().collect();
        self.converged = newly_added.is_empty();
        self.detected_pso.extend(candidates);
    }

    pub fn is_finished(&self) -> bool {
        self.converged
    }

    pub fn is_detected(&self, ip: Addr) -> bool {
        self.detected_pso.contains(&ip)
    }

    pub fn detected_ips(&self) -> impl Iterator<Item = &Addr> {
        self.detected_pso.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_count_never_flags() {
        let detector = PsoDetector::default();
        assert!(!detector.is_detected(0x1000));
    }

    #[test]
    fn only_first_inflation_per_instance_is_counted() {
        let mut detector = PsoDetector::default();
        detector.begin_instance();
        detector.observe(0xA, 1e-16, 1.0, 0.0, 0.0);
        detector.observe(0xA, 1e-16, 1.0, 0.0, 0.0);
        detector.end_run();
        let counters = detector.error_map.get(&0xA).unwrap();
        assert_eq!(counters.err_cnt, 1);
        assert_eq!(counters.total_cnt, 2);
    }

    #[test]
    fn high_inflation_rate_is_detected_unless_near_zero_false_positive() {
        let mut detector = PsoDetector::default();
        for _ in 0..10 {
            detector.begin_instance();
            detector.observe(0xB, 1e-16, 1.0, 5.0, 5.0);
        }
        detector.end_run();
        assert!(detector.is_detected(0xB));
    }

    #[test]
    fn near_zero_band_with_high_ov_ratio_is_filtered_as_false_positive() {
        let mut detector = PsoDetector::default();
        for _ in 0..10 {
            detector.begin_instance();
            detector.observe(0xC, 1e-16, 1.0, 1e-10, 1e-16);
        }
        detector.end_run();
        assert!(!detector.is_detected(0xC));
    }

    #[test]
    fn begin_run_clears_counters_from_the_previous_run() {
        let mut detector = PsoDetector::default();
        detector.begin_run();
        detector.begin_instance();
        detector.observe(0xD, 1e-16, 1.0, 0.0, 0.0);
        detector.end_run();
        assert_eq!(detector.error_map.get(&0xD).unwrap().total_cnt, 1);

        detector.begin_run();
        assert!(detector.error_map.is_empty(), "begin_run must start a fresh error_map, not accumulate across runs");
    }

    #[test]
    fn observe_stops_counting_once_an_ip_is_confirmed_pso() {
        let mut detector = PsoDetector::default();
        for _ in 0..10 {
            detector.begin_instance();
            detector.observe(0xE, 1e-16, 1.0, 5.0, 5.0);
        }
        detector.end_run();
        assert!(detector.is_detected(0xE));

        detector.begin_run();
        detector.begin_instance();
        detector.observe(0xE, 1e-16, 1.0, 5.0, 5.0);
        assert!(
            detector.error_map.get(&0xE).is_none(),
            "a confirmed PSO ip must be skipped entirely by observe, not keep accumulating"
        );
    }
}
