//! Arbitrary-precision helpers
//!
//! Wraps the handful of `rug::Float` operations the shadow engine needs:
//! allocating at a given precision, rounding to IEEE width, and emulating
//! the original's `beginEmulateDouble`/`endEmulate`/`mpfr_subnormalize`
//! sequence. That sequence always clamps to IEEE-double's exponent range
//! regardless of the record's own width (`beginEmulateDouble` is called
//! unconditionally, even for `Ot_FLOAT` records), so the rounding here goes
//! through `f64` unconditionally too: only the resulting precision tracks
//! `org_type`, never the exponent range used to get there.

use rug::Float;

use crate::ir::OrgType;

/// Allocate a zero-valued shadow at the given precision.
pub fn new_ap(precision: u32) -> Float {
    Float::with_val(precision.max(2), 0.0)
}

/// Round `src` to the precision implied by `org_type`, under IEEE-double
/// exponent bounds and subnormalization regardless of `org_type` itself.
pub fn round_to_ieee(src: &Float, org_type: OrgType) -> Float {
    Float::with_val(org_type.ieee_precision(), src.to_f64())
}

/// Recompute `src` under emulated IEEE exponent range with subnormalization,
/// i.e. the value a real FPU at this width would have produced.
pub fn emulate_ieee(src: &Float, org_type: OrgType) -> Float {
    round_to_ieee(src, org_type)
}

/// `true` if `f` is finite and non-zero (mirrors `mpfr_regular_p`).
pub fn is_regular(f: &Float) -> bool {
    f.is_finite() && !f.is_zero()
}

/// Relative error `|shadow - native| / |native|`, zero exactly when both sides are zero.
pub fn relative_error(shadow: &Float, native: &Float) -> Float {
    if shadow.is_zero() && native.is_zero() {
        return Float::with_val(shadow.prec().max(native.prec()), 0.0);
    }
    let prec = shadow.prec().max(native.prec());
    let diff = Float::with_val(prec, shadow - native);
    let rel = if native.is_zero() {
        // native is exactly zero, shadow is not: the original's mpfr_reldiff
        // divides by max(|shadow|, |native|) in that degenerate case.
        Float::with_val(prec, diff.abs_ref()) / Float::with_val(prec, shadow.abs_ref())
    } else {
        Float::with_val(prec, diff.abs_ref()) / Float::with_val(prec, native.abs_ref())
    };
    rel
}
