//! Mean-value tracking (§4.F, `updateMeanValue` in `fd_main.c`)

use std::collections::HashMap;

use crate::ir::Addr;

/// Accumulated statistics for all executions of the op at one producing IP.
#[derive(Debug, Clone, Default)]
pub struct MeanValueEntry {
    pub count: u64,
    sum_rel_err: f64,
    pub max_rel_err: f64,
    canceled_sum: u64,
    /// `true` once `canceled_sum` has wrapped; the report then prints "overflow".
    pub canceled_overflow: bool,
    pub canceled_max: i64,
    badness_sum: u64,
    pub badness_max: i64,
    /// Guest IPs of the two arguments that produced the current `max_rel_err`.
    pub max_err_arg_origins: (Addr, Addr),
}

impl MeanValueEntry {
    pub fn mean_rel_err(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.sum_rel_err / self.count as f64 }
    }

    pub fn mean_canceled(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.canceled_sum as f64 / self.count as f64 }
    }

    pub fn mean_badness(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.badness_sum as f64 / self.count as f64 }
    }
}

/// Per-IP mean/max error table.
#[derive(Debug, Default)]
pub struct MeanValueTable {
    entries: HashMap<Addr, MeanValueEntry>,
}

impl MeanValueTable {
    pub fn update(
        &mut self,
        ip: Addr,
        rel_err: f64,
        canceled: i64,
        badness: i64,
        arg_origins: (Addr, Addr),
    ) {
        let entry = self.entries.entry(ip).or_default();
        entry.count += 1;
        entry.sum_rel_err += rel_err;
        if rel_err > entry.max_rel_err {
            entry.max_rel_err = rel_err;
            entry.max_err_arg_origins = arg_origins;
        }
        entry.canceled_max = entry.canceled_max.max(canceled);
        entry.badness_max = entry.badness_max.max(badness);
        match entry.canceled_sum.checked_add(canceled.max(0) as u64) {
            Some(sum) => entry.canceled_sum = sum,
            None => entry.canceled_overflow = true,
        }
        entry.badness_sum = entry.badness_sum.saturating_add(badness.max(0) as u64);
    }

    pub fn get(&self, ip: Addr) -> Option<&MeanValueEntry> {
        self.entries.get(&ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Addr, &MeanValueEntry)> {
        self.entries.iter()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// How much worse `ip`'s max relative error is than the larger of its two
    /// max-error arguments' own max relative errors, floored at zero (§6.3
    /// "introduced error").
    pub fn introduced_error(&self, ip: Addr) -> Option<f64> {
        let entry = self.entries.get(&ip)?;
        let (a1, a2) = entry.max_err_arg_origins;
        let arg_max = self
            .entries
            .get(&a1)
            .map(|e| e.max_rel_err)
            .unwrap_or(0.0)
            .max(self.entries.get(&a2).map(|e| e.max_rel_err).unwrap_or(0.0));
        Some((entry.max_rel_err - arg_max).max(0.0))
    }
}
