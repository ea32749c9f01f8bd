//! The `ShadowValue` record (§3, §4.A)

use rug::Float;

use crate::ap;
use crate::ir::{Addr, NativeValue, OrgType};

/// Identity of the slot a [`ShadowValue`] belongs to, for diagnostics only —
/// the store that owns the record is responsible for keying lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKey {
    Temp(crate::ir::Temp),
    Register(crate::ir::ThreadId, crate::ir::RegOffset),
    Memory(Addr),
}

/// The atomic shadow record mirroring one native floating-point value (§3).
#[derive(Debug, Clone)]
pub struct ShadowValue {
    key: ShadowKey,
    active: bool,
    version: u64,
    value: Float,
    mid_value: Float,
    ori_value: Float,
    op_count: u64,
    origin: Addr,
    canceled: i64,
    cancel_origin: Addr,
    org_type: OrgType,
    org: Option<NativeValue>,
}

impl ShadowValue {
    /// Create a fresh, reserved-but-uninitialized record (invariant 1: `org_type = Invalid`).
    pub fn new(key: ShadowKey, precision: u32) -> Self {
        Self {
            key,
            active: true,
            version: 0,
            value: ap::new_ap(precision),
            mid_value: ap::new_ap(OrgType::Double.ieee_precision()),
            ori_value: ap::new_ap(OrgType::Double.ieee_precision()),
            op_count: 0,
            origin: 0,
            canceled: 0,
            cancel_origin: 0,
            org_type: OrgType::Invalid,
            org: None,
        }
    }

    /// Introduce a shadow from a native value the engine has never seen before
    /// (§7, "missing shadow on read").
    pub fn introduce(key: ShadowKey, precision: u32, native: NativeValue, origin: Addr) -> Self {
        let org_type = native.org_type();
        let mut sv = Self::new(key, precision);
        sv.value = Float::with_val(precision, native.as_f64());
        sv.mid_value = ap::round_to_ieee(&sv.value, org_type);
        sv.ori_value = ap::emulate_ieee(&sv.value, org_type);
        sv.op_count = 0;
        sv.origin = origin;
        sv.org_type = org_type;
        sv.org = Some(native);
        sv
    }

    pub const fn key(&self) -> ShadowKey {
        self.key
    }

    pub const fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub const fn value(&self) -> &Float {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Float {
        &mut self.value
    }

    pub const fn mid_value(&self) -> &Float {
        &self.mid_value
    }

    pub fn mid_value_mut(&mut self) -> &mut Float {
        &mut self.mid_value
    }

    pub const fn ori_value(&self) -> &Float {
        &self.ori_value
    }

    pub fn ori_value_mut(&mut self) -> &mut Float {
        &mut self.ori_value
    }

    pub const fn op_count(&self) -> u64 {
        self.op_count
    }

    pub fn set_op_count(&mut self, op_count: u64) {
        self.op_count = op_count;
    }

    pub const fn origin(&self) -> Addr {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Addr) {
        self.origin = origin;
    }

    pub const fn canceled(&self) -> i64 {
        self.canceled
    }

    pub fn set_canceled(&mut self, canceled: i64) {
        self.canceled = canceled;
    }

    pub const fn cancel_origin(&self) -> Addr {
        self.cancel_origin
    }

    pub fn set_cancel_origin(&mut self, cancel_origin: Addr) {
        self.cancel_origin = cancel_origin;
    }

    pub const fn org_type(&self) -> OrgType {
        self.org_type
    }

    pub const fn org(&self) -> Option<NativeValue> {
        self.org
    }

    /// Set the native original value and its width, per a Load/Store/Put/Get handler.
    pub fn set_org(&mut self, native: NativeValue) {
        self.org_type = native.org_type();
        self.org = Some(native);
    }

    /// Copy every field from `src` except `active`/`version` (§4.A). The only
    /// way provenance metadata propagates through non-arithmetic movement.
    ///
    /// When `sim_original` is set, the three AP fields are first reset to
    /// `src`'s precisions (shrinking shadow precision to match the original
    /// IEEE width, per `--sim-original`).
    pub fn copy_from(&mut self, src: &ShadowValue, sim_original: bool) {
        if sim_original {
            self.value.set_prec(src.value.prec());
            self.mid_value.set_prec(src.mid_value.prec());
            self.ori_value.set_prec(src.ori_value.prec());
        }
        self.value.assign(&src.value);
        self.mid_value.assign(&src.mid_value);
        self.ori_value.assign(&src.ori_value);
        self.op_count = src.op_count;
        self.origin = src.origin;
        self.canceled = src.canceled;
        self.cancel_origin = src.cancel_origin;
        self.org_type = src.org_type;
        self.org = src.org;
    }

    /// Divergence check against the recorded native value (§7 "checkAndRecover").
    ///
    /// If the emulated-IEEE shadow has drifted from the native value the
    /// guest actually holds (e.g. an un-instrumented library call ran in
    /// between), all three AP fields are overwritten with the native value
    /// and `true` is returned so the caller can log a warning.
    pub fn check_and_recover(&mut self) -> bool {
        let Some(org) = self.org else { return false };
        let org_ap = Float::with_val(self.ori_value.prec(), org.as_f64());
        if org_ap != self.ori_value {
            tracing::warn!(
                key = ?self.key,
                origin = self.origin,
                "shadow drifted from native value, recovering from untracked operation"
            );
            self.value.assign(&org_ap);
            self.mid_value.assign(&org_ap);
            self.ori_value.assign(&org_ap);
            true
        } else {
            false
        }
    }

    /// Relative error of `value` against the recorded native `org`, the zero
    /// rule from §8's boundary behaviors applied.
    pub fn relative_error(&self) -> Float {
        match self.org {
            Some(native) => {
                let org_ap = Float::with_val(self.value.prec(), native.as_f64());
                ap::relative_error(&self.value, &org_ap)
            }
            None => ap::new_ap(self.value.prec().max(2)),
        }
    }
}

use rug::Assign;
