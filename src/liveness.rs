//! Liveness / alias pre-pass (§4.D)
//!
//! Two walks over one superblock's statements: a backward walk that elides
//! dead register instrumentation, and a forward walk that builds
//! `tmp_instead`, a pure rename table recovering the original shadowed lane
//! across structural ops (vector packing, reinterpret casts, register
//! round-trips) that would otherwise break a naive 1:1 temp mapping.

use std::collections::{HashMap, HashSet};

use crate::ir::{Operand, RegOffset, Stmt, StructuralOp, Temp};

/// Result of running the pre-pass over one superblock.
#[derive(Debug, Default, Clone)]
pub struct LivenessPlan {
    tmp_instead: HashMap<Temp, Temp>,
    important: HashSet<Temp>,
    /// `Put`s to these (offset, statement-index) pairs may skip their shadow callback.
    skippable_puts: HashSet<usize>,
}

impl LivenessPlan {
    /// Resolve `t` through the `tmp_instead` chain to the temp that actually carries
    /// the shadowed lane.
    pub fn resolve(&self, t: Temp) -> Temp {
        let mut cur = t;
        // tmp_instead is built forward with each entry already pointing at a
        // fully-resolved target, so one lookup suffices; guard against
        // accidental cycles defensively.
        let mut guard = 0;
        while let Some(&next) = self.tmp_instead.get(&cur) {
            if next == cur || guard > 64 {
                break;
            }
            cur = next;
            guard += 1;
        }
        cur
    }

    pub fn resolve_operand(&self, op: Operand) -> Operand {
        match op {
            Operand::Tmp(t) => Operand::Tmp(self.resolve(t)),
            c @ Operand::Const(_) => c,
        }
    }

    pub fn is_important(&self, t: Temp) -> bool {
        self.important.contains(&t)
    }

    pub fn put_is_skippable(&self, stmt_index: usize) -> bool {
        self.skippable_puts.contains(&stmt_index)
    }
}

/// Run the backward + forward walk over `stmts`, producing a [`LivenessPlan`].
pub fn analyze(stmts: &[Stmt]) -> LivenessPlan {
    let mut plan = LivenessPlan::default();
    backward_walk(stmts, &mut plan);
    forward_walk(stmts, &mut plan);
    mark_important(stmts, &mut plan);
    plan
}

/// For each register offset, a subsequent `Get` before the next `Put` keeps
/// that `Put`'s shadow callback; otherwise the `Put` is skippable.
fn backward_walk(stmts: &[Stmt], plan: &mut LivenessPlan) {
    let mut live: HashSet<RegOffset> = HashSet::new();
    for (idx, stmt) in stmts.iter().enumerate().rev() {
        match stmt {
            Stmt::Get { offset, .. } => {
                live.insert(*offset);
            }
            Stmt::Put { offset, .. } => {
                if !live.contains(offset) {
                    plan.skippable_puts.insert(idx);
                }
                live.remove(offset);
            }
            Stmt::PutI { base, n_elems, bias, ix, .. } => {
                let offset = Stmt::circular_offset(*base, *n_elems, *bias, *ix);
                if !live.contains(&offset) {
                    plan.skippable_puts.insert(idx);
                }
                live.remove(&offset);
            }
            Stmt::GetI { base, n_elems, bias, ix, .. } => {
                let offset = Stmt::circular_offset(*base, *n_elems, *bias, *ix);
                live.insert(offset);
            }
            _ => {}
        }
    }
}

/// Build `tmpInstead[i] = j`: `i` is a pure rename of `j` through a chain of
/// structural ops, or a `Get` whose last write to that register was a tmp.
fn forward_walk(stmts: &[Stmt], plan: &mut LivenessPlan) {
    let mut last_tmp_written_to_reg: HashMap<RegOffset, Temp> = HashMap::new();

    for stmt in stmts {
        match stmt {
            Stmt::Structural { dest, src, .. } => {
                let resolved = plan.tmp_instead.get(src).copied().unwrap_or(*src);
                plan.tmp_instead.insert(*dest, resolved);
            }
            Stmt::Put { offset, src: Operand::Tmp(t), .. } => {
                last_tmp_written_to_reg.insert(*offset, *t);
            }
            Stmt::Put { offset, .. } => {
                last_tmp_written_to_reg.remove(offset);
            }
            Stmt::Get { dest, offset, .. } => {
                if let Some(&src_tmp) = last_tmp_written_to_reg.get(offset) {
                    let resolved = plan.tmp_instead.get(&src_tmp).copied().unwrap_or(src_tmp);
                    plan.tmp_instead.insert(*dest, resolved);
                }
            }
            _ => {}
        }
    }
}

/// A temp is important if any non-structural op reads it, or it's stored/put;
/// "structural" consumers (reinterprets etc.) alone don't keep a temp important.
fn mark_important(stmts: &[Stmt], plan: &mut LivenessPlan) {
    let mark = |plan: &mut LivenessPlan, op: Operand| {
        if let Operand::Tmp(t) = op {
            plan.important.insert(plan.tmp_instead.get(&t).copied().unwrap_or(t));
        }
    };
    for stmt in stmts {
        match stmt {
            Stmt::UnOp { arg, .. } => mark(plan, *arg),
            Stmt::BinOp { arg1, arg2, .. } => {
                mark(plan, *arg1);
                mark(plan, *arg2);
            }
            Stmt::TriOp { arg2, arg3, .. } => {
                mark(plan, *arg2);
                mark(plan, *arg3);
            }
            Stmt::CmpF64 { arg1, arg2, .. } => {
                mark(plan, *arg1);
                mark(plan, *arg2);
            }
            Stmt::CvtToInt { arg, .. } => mark(plan, *arg),
            Stmt::Mux { arg0, arg_x, .. } => {
                mark(plan, *arg0);
                mark(plan, *arg_x);
            }
            Stmt::Store { src, .. } => plan.important.insert(*src).then_some(()).unwrap_or(()),
            Stmt::Put { src, .. } => mark(plan, *src),
            Stmt::PutI { src, .. } => mark(plan, *src),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{NativeValue, Operand};

    #[test]
    fn reinterpret_chain_resolves_to_original_temp() {
        let stmts = vec![
            Stmt::Structural {
                dest: Temp(1),
                src: Temp(0),
                op: StructuralOp::ReinterpretWidth,
            },
            Stmt::Structural {
                dest: Temp(2),
                src: Temp(1),
                op: StructuralOp::Pack,
            },
            Stmt::UnOp {
                ip: 0x1000,
                dest: Temp(3),
                op: crate::ir::UnArithOp::Abs,
                arg: Operand::Tmp(Temp(2)),
                native_result: NativeValue::F64(1.0),
            },
        ];
        let plan = analyze(&stmts);
        assert_eq!(plan.resolve(Temp(2)), Temp(0));
        assert!(plan.is_important(Temp(0)));
    }

    #[test]
    fn put_with_no_later_get_is_skippable() {
        let stmts = vec![
            Stmt::Put {
                ip: 0x2000,
                offset: RegOffset(8),
                src: Operand::Const(NativeValue::F64(1.0)),
            },
            Stmt::Put {
                ip: 0x2004,
                offset: RegOffset(8),
                src: Operand::Const(NativeValue::F64(2.0)),
            },
        ];
        let plan = analyze(&stmts);
        // first Put is overwritten before any Get reads it back
        assert!(plan.put_is_skippable(0));
    }

    #[test]
    fn put_read_before_overwrite_is_not_skippable() {
        let stmts = vec![
            Stmt::Put {
                ip: 0x3000,
                offset: RegOffset(8),
                src: Operand::Const(NativeValue::F64(1.0)),
            },
            Stmt::Get {
                ip: 0x3004,
                dest: Temp(0),
                offset: RegOffset(8),
                native_result: NativeValue::F64(1.0),
            },
            Stmt::Put {
                ip: 0x3008,
                offset: RegOffset(8),
                src: Operand::Const(NativeValue::F64(2.0)),
            },
        ];
        let plan = analyze(&stmts);
        assert!(!plan.put_is_skippable(0));
    }
}
