//! F64 comparison handler (§4.E.4)

use std::cmp::Ordering;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{Addr, Operand};
use crate::liveness::LivenessPlan;
use crate::staging::TmpConstStaging;

use super::resolve_native;

/// Shadow comparison outcome, including the `Unordered` case the IR's native
/// `Ordering` can't express (either shadow operand is NaN).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowOrdering {
    Lt,
    Eq,
    Gt,
    Unordered,
}

impl From<Ordering> for ShadowOrdering {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Less => ShadowOrdering::Lt,
            Ordering::Equal => ShadowOrdering::Eq,
            Ordering::Greater => ShadowOrdering::Gt,
        }
    }
}

/// Result of comparing the shadow operands against the native comparison.
#[derive(Debug, Clone, Copy)]
pub struct CmpOutcome {
    pub shadow_cond: ShadowOrdering,
    /// `true` iff the shadow and emulated-IEEE (`ori`) comparisons disagreed
    /// with the native outcome.
    pub diverged: bool,
}

impl Engine {
    /// Computes both the shadow and the emulated-IEEE comparison. If they
    /// disagree with the guest's own native outcome, logs a branch-divergence
    /// event at `ip`. The caller decides whether to honor `shadow_cond`
    /// (`--goto-shadow-branch`) or keep using the native result.
    pub fn handle_cmp(
        &mut self,
        ip: Addr,
        plan: &LivenessPlan,
        arg1: Operand,
        arg2: Operand,
        native_cond: Ordering,
        natives: &TmpConstStaging,
    ) -> EngineResult<CmpOutcome> {
        if !self.is_analyzing() {
            // §9 open questions: a short-circuited handler returns a sentinel
            // matching the host IR's expected type; `Unordered` for compare.
            return Ok(CmpOutcome { shadow_cond: ShadowOrdering::Unordered, diverged: false });
        }

        let arg1_native = resolve_native(arg1, natives, 0);
        let arg2_native = resolve_native(arg2, natives, 1);
        let arg1_sv = self.resolve_operand_shadow(plan, arg1, arg1_native, ip);
        let arg2_sv = self.resolve_operand_shadow(plan, arg2, arg2_native, ip);

        let shadow_cond = arg1_sv
            .value()
            .partial_cmp(arg2_sv.value())
            .map(ShadowOrdering::from)
            .unwrap_or(ShadowOrdering::Unordered);
        let ori_cond = arg1_sv
            .ori_value()
            .partial_cmp(arg2_sv.ori_value())
            .map(ShadowOrdering::from)
            .unwrap_or(ShadowOrdering::Unordered);
        let native_as_shadow = ShadowOrdering::from(native_cond);

        let diverged = shadow_cond != native_as_shadow || ori_cond != native_as_shadow;
        if diverged {
            tracing::warn!(
                addr = ip,
                ?shadow_cond,
                ?ori_cond,
                native = ?native_cond,
                "branch divergence between native and shadow comparison"
            );
        }

        Ok(CmpOutcome { shadow_cond, diverged })
    }
}
