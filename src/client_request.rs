//! Client-request dispatcher (§4.G)
//!
//! The guest program's synchronous request channel, modeled as a strongly
//! typed `ClientRequest` enum dispatched by `Engine::handle_request` —
//! grounded in the teacher's `interpreter/debug.rs` pattern of small
//! dispatch methods hanging off `Interpreter<S>`. A thin host-side shim
//! (declared external, §6.2) is expected to decode the real four-word
//! protocol into this enum before calling in.
//!
//! Guest-memory access for the `*_SHADOW`/`*_ORIGINAL` requests is itself an
//! external collaborator (this crate only owns the *shadow* memory map, not
//! the guest's address space) — a host provides it via [`GuestMemory`].

use rug::Assign;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::ir::{Addr, NativeValue, OrgType};
use crate::reports::{format_shadow_entry, ReportKind};

/// Host-provided access to the guest's address space, used only by the
/// requests that move data between guest memory and the shadow/original
/// value (`ORIGINAL_TO_SHADOW`, `SHADOW_TO_ORIGINAL`, `SET_ORIGINAL`).
pub trait GuestMemory {
    fn read_value(&self, addr: Addr, org_type: OrgType) -> NativeValue;
    fn write_value(&mut self, addr: Addr, value: NativeValue);
}

/// One request from the guest's synchronous client-request channel (§4.G).
#[derive(Debug, Clone)]
pub enum ClientRequest {
    PrintError { name: String, addr: Addr },
    CondPrintError { name: String, addr: Addr },
    DumpErrorGraph { addr: Addr, cond: bool, care_visited: bool },
    BeginStage { id: u32 },
    EndStage { id: u32 },
    ClearStage { id: u32 },
    ErrorGreater { addr: Addr, bound: f64 },
    Reset,
    InsertShadow { addr: Addr },
    SetShadow { addr: Addr },
    OriginalToShadow { addr: Addr },
    ShadowToOriginal { addr: Addr },
    SetOriginal { addr: Addr, src_addr: Addr },
    SetShadowBy { dst: Addr, src: Addr },
    GetRelativeError { addr: Addr },
    GetShadow { addr: Addr },
    PrintValues { name: String, org_type: OrgType, addr: Addr },
    PsoBeginRun,
    PsoEndRun,
    PsoBeginInstance,
    IsPsoFinished,
    Begin,
    End,
}

/// Result of servicing a [`ClientRequest`]; most requests return `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientResponse {
    None,
    Bool(bool),
    Text(String),
}

impl Engine {
    pub fn handle_request(&mut self, req: ClientRequest, guest: &mut dyn GuestMemory) -> EngineResult<ClientResponse> {
        match req {
            ClientRequest::PrintError { name, addr } => {
                self.print_error(&name, addr, false)?;
                Ok(ClientResponse::None)
            }
            ClientRequest::CondPrintError { name, addr } => {
                self.print_error(&name, addr, true)?;
                Ok(ClientResponse::None)
            }
            ClientRequest::DumpErrorGraph { addr, cond, care_visited } => {
                self.dump_error_graph(addr, cond, care_visited)?;
                Ok(ClientResponse::None)
            }
            ClientRequest::BeginStage { id } => {
                self.stages.begin(id)?;
                Ok(ClientResponse::None)
            }
            ClientRequest::EndStage { id } => {
                let reports = self.stages.end(id)?;
                if let Some(sink) = self.sink.as_mut() {
                    for report in &reports {
                        sink.write_block(ReportKind::StageReports, &crate::reports::format_stage_report(report))?;
                    }
                }
                Ok(ClientResponse::None)
            }
            ClientRequest::ClearStage { id } => {
                self.stages.clear(id)?;
                Ok(ClientResponse::None)
            }
            ClientRequest::ErrorGreater { addr, bound } => {
                let rel_err = self.memory.get(addr).map(|sv| sv.relative_error().to_f64()).unwrap_or(0.0);
                Ok(ClientResponse::Bool(rel_err >= bound))
            }
            ClientRequest::Reset => {
                self.reset();
                Ok(ClientResponse::None)
            }
            ClientRequest::InsertShadow { addr } => {
                if let Some(sv) = self.memory_get_mut(addr) {
                    let rounded = crate::ap::round_to_ieee(sv.value(), sv.org_type());
                    sv.mid_value_mut().assign(&rounded);
                }
                Ok(ClientResponse::None)
            }
            ClientRequest::SetShadow { addr } => {
                if let Some(sv) = self.memory_get_mut(addr) {
                    let mid = sv.mid_value().clone();
                    sv.value_mut().assign(&mid);
                }
                Ok(ClientResponse::None)
            }
            ClientRequest::OriginalToShadow { addr } => {
                let org_type = self.memory.get(addr).map(|sv| sv.org_type()).unwrap_or(OrgType::Double);
                let native = guest.read_value(addr, org_type);
                let precision = self.config.precision;
                let slot = self.memory.upsert(addr, precision);
                slot.value_mut().assign(rug::Float::with_val(precision, native.as_f64()));
                let mid = crate::ap::round_to_ieee(slot.value(), native.org_type());
                slot.mid_value_mut().assign(&mid);
                slot.set_org(native);
                Ok(ClientResponse::None)
            }
            ClientRequest::ShadowToOriginal { addr } => {
                if let Some(sv) = self.memory.get(addr) {
                    let native = to_native(sv.value(), sv.org_type());
                    guest.write_value(addr, native);
                }
                Ok(ClientResponse::None)
            }
            ClientRequest::SetOriginal { addr, src_addr } => {
                let org_type = self.memory.get(addr).map(|sv| sv.org_type()).unwrap_or(OrgType::Double);
                let native = guest.read_value(src_addr, org_type);
                guest.write_value(addr, native);
                if let Some(sv) = self.memory_get_mut(addr) {
                    let mid = crate::ap::round_to_ieee(&rug::Float::with_val(sv.mid_value().prec(), native.as_f64()), native.org_type());
                    sv.mid_value_mut().assign(&mid);
                }
                Ok(ClientResponse::None)
            }
            ClientRequest::SetShadowBy { dst, src } => {
                if let Some(src_sv) = self.memory.get(src).cloned() {
                    let precision = src_sv.value().prec();
                    let slot = self.memory.upsert(dst, precision);
                    slot.copy_from(&src_sv, self.config.sim_original);
                }
                Ok(ClientResponse::None)
            }
            ClientRequest::GetRelativeError { addr } => {
                let rel_err = self.memory.get(addr).map(|sv| sv.relative_error()).unwrap_or_else(|| crate::ap::new_ap(53));
                Ok(ClientResponse::Text(crate::text::format_short(&rel_err)))
            }
            ClientRequest::GetShadow { addr } => match self.memory.get(addr) {
                Some(sv) => Ok(ClientResponse::Text(crate::text::format_full(sv.value()))),
                None => Ok(ClientResponse::Text("noshadow".to_string())),
            },
            ClientRequest::PrintValues { name, org_type, addr } => {
                self.print_values(&name, org_type, addr);
                Ok(ClientResponse::None)
            }
            ClientRequest::PsoBeginRun => {
                self.pso.begin_run();
                Ok(ClientResponse::None)
            }
            ClientRequest::PsoEndRun => {
                self.pso.end_run();
                Ok(ClientResponse::None)
            }
            ClientRequest::PsoBeginInstance => {
                self.pso.begin_instance();
                Ok(ClientResponse::None)
            }
            ClientRequest::IsPsoFinished => Ok(ClientResponse::Bool(self.pso.is_finished())),
            ClientRequest::Begin => {
                self.set_analyzing(true);
                Ok(ClientResponse::None)
            }
            ClientRequest::End => {
                if !self.config.ignore_end {
                    self.set_analyzing(false);
                }
                Ok(ClientResponse::None)
            }
        }
    }

    fn memory_get_mut(&mut self, addr: Addr) -> Option<&mut crate::shadow_value::ShadowValue> {
        self.memory.get(addr)?;
        let precision = self.memory.get(addr).map(|sv| sv.value().prec())?;
        Some(self.memory.upsert(addr, precision))
    }

    fn print_error(&mut self, name: &str, addr: Addr, only_if_erroneous: bool) -> EngineResult<()> {
        let Some(sv) = self.memory.get(addr) else {
            tracing::warn!(name, addr, "PRINT_ERROR: no shadow at address");
            return Ok(());
        };
        if only_if_erroneous && sv.relative_error().to_f64() == 0.0 {
            return Ok(());
        }
        self.print_error_count += 1;
        let block = format_shadow_entry(self.print_error_count, addr, sv);
        tracing::info!(name, addr, "{}", block);
        if let Some(sink) = self.sink.as_mut() {
            let kind = if sv.org().map(|n| !n.as_f64().is_finite()).unwrap_or(false) {
                ReportKind::ShadowValuesSpecial
            } else if sv.canceled() > 0 {
                ReportKind::ShadowValuesCanceled
            } else {
                ReportKind::ShadowValuesRelativeError
            };
            sink.write_block(kind, &block)?;
        }
        Ok(())
    }

    fn print_values(&self, name: &str, org_type: OrgType, addr: Addr) {
        match self.memory.get(addr) {
            Some(sv) => {
                let org_text = sv.org().map(|v| v.to_string()).unwrap_or_else(|| "<none>".to_string());
                let shadow_text = crate::text::format_full(sv.value());
                tracing::info!(name, ?org_type, addr, original = org_text, shadow = shadow_text, "PRINT_VALUES");
            }
            None => tracing::info!(name, ?org_type, addr, "PRINT_VALUES: no shadow"),
        }
    }

    /// `cond` restricts the dump to addresses that actually carry an error
    /// (skips a clean run, `fd_main.c`'s `dumpGraph` conditional branch);
    /// `care_visited` skips (and then marks) origins an earlier `careVisited`
    /// dump already walked, so a later bulk dump doesn't repeat them.
    fn dump_error_graph(&mut self, addr: Addr, cond: bool, care_visited: bool) -> EngineResult<()> {
        if care_visited && self.graph_visited.contains(&addr) {
            return Ok(());
        }
        if cond && self.memory.get(addr).map(|sv| sv.relative_error().to_f64()).unwrap_or(0.0) == 0.0 {
            return Ok(());
        }
        if self.graphs_dumped >= crate::consts::MAX_DUMPED_GRAPHS as u32 {
            tracing::warn!(addr, "DUMP_ERROR_GRAPH: max graphs per run reached, skipping");
            return Ok(());
        }
        self.graphs_dumped += 1;
        let (vcg, visited) = crate::graph::dump_vcg(&self.mean_values, addr, self.graphs_dumped);
        if care_visited {
            self.graph_visited.extend(visited);
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.write_block(ReportKind::ShadowValuesRelativeError, &vcg)?;
        }
        Ok(())
    }
}

fn to_native(value: &rug::Float, org_type: OrgType) -> NativeValue {
    match org_type {
        OrgType::Float => NativeValue::F32(value.to_f32()),
        OrgType::Double | OrgType::Invalid => NativeValue::F64(value.to_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeGuestMemory {
        cells: HashMap<Addr, NativeValue>,
    }

    impl GuestMemory for FakeGuestMemory {
        fn read_value(&self, addr: Addr, org_type: OrgType) -> NativeValue {
            self.cells.get(&addr).copied().unwrap_or(match org_type {
                OrgType::Float => NativeValue::F32(0.0),
                OrgType::Double | OrgType::Invalid => NativeValue::F64(0.0),
            })
        }

        fn write_value(&mut self, addr: Addr, value: NativeValue) {
            self.cells.insert(addr, value);
        }
    }

    #[test]
    fn reset_deactivates_everything_via_request() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        engine.memory.upsert(0x1000, 120);
        engine.handle_request(ClientRequest::Reset, &mut guest).unwrap();
        assert!(engine.memory.get(0x1000).is_none());
    }

    #[test]
    fn original_to_shadow_then_shadow_to_original_round_trips() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        guest.write_value(0x2000, NativeValue::F64(3.25));

        engine.handle_request(ClientRequest::OriginalToShadow { addr: 0x2000 }, &mut guest).unwrap();
        assert_eq!(engine.memory.get(0x2000).unwrap().value().to_f64(), 3.25);

        guest.cells.remove(&0x2000);
        engine.handle_request(ClientRequest::ShadowToOriginal { addr: 0x2000 }, &mut guest).unwrap();
        assert_eq!(guest.read_value(0x2000, OrgType::Double).as_f64(), 3.25);
    }

    #[test]
    fn get_shadow_reports_noshadow_for_unknown_address() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        let resp = engine.handle_request(ClientRequest::GetShadow { addr: 0x3000 }, &mut guest).unwrap();
        assert_eq!(resp, ClientResponse::Text("noshadow".to_string()));
    }

    #[test]
    fn error_greater_compares_against_bound() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        let sv = engine.memory.upsert(0x4000, 120);
        *sv.value_mut() = rug::Float::with_val(120, 2.0);
        sv.set_org(NativeValue::F64(1.0));

        let resp = engine
            .handle_request(ClientRequest::ErrorGreater { addr: 0x4000, bound: 0.5 }, &mut guest)
            .unwrap();
        assert_eq!(resp, ClientResponse::Bool(true));
    }

    #[test]
    fn set_shadow_by_copies_record_between_addresses() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        let sv = engine.memory.upsert(0x5000, 120);
        *sv.value_mut() = rug::Float::with_val(120, 9.0);
        sv.set_org(NativeValue::F64(9.0));

        engine
            .handle_request(ClientRequest::SetShadowBy { dst: 0x5008, src: 0x5000 }, &mut guest)
            .unwrap();
        assert_eq!(engine.memory.get(0x5008).unwrap().value().to_f64(), 9.0);
    }

    #[test]
    fn dump_error_graph_with_cond_skips_an_address_with_no_error() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        let sv = engine.memory.upsert(0x6000, 120);
        *sv.value_mut() = rug::Float::with_val(120, 1.0);
        sv.set_org(NativeValue::F64(1.0));

        engine
            .handle_request(ClientRequest::DumpErrorGraph { addr: 0x6000, cond: true, care_visited: false }, &mut guest)
            .unwrap();
        assert_eq!(engine.graphs_dumped, 0, "a conditional dump at a clean address must not count against the cap");
    }

    #[test]
    fn dump_error_graph_with_care_visited_does_not_repeat_an_address() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        let sv = engine.memory.upsert(0x7000, 120);
        *sv.value_mut() = rug::Float::with_val(120, 2.0);
        sv.set_org(NativeValue::F64(1.0));

        engine
            .handle_request(ClientRequest::DumpErrorGraph { addr: 0x7000, cond: false, care_visited: true }, &mut guest)
            .unwrap();
        assert_eq!(engine.graphs_dumped, 1);

        engine
            .handle_request(ClientRequest::DumpErrorGraph { addr: 0x7000, cond: false, care_visited: true }, &mut guest)
            .unwrap();
        assert_eq!(engine.graphs_dumped, 1, "a second careVisited dump of an already-walked address must be skipped");
    }

    #[test]
    fn is_pso_finished_reflects_detector_state() {
        let mut engine = Engine::new(Config::default());
        let mut guest = FakeGuestMemory::default();
        let resp = engine.handle_request(ClientRequest::IsPsoFinished, &mut guest).unwrap();
        assert_eq!(resp, ClientResponse::Bool(false));
    }
}
