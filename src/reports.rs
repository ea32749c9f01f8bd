//! Report sink abstraction (§6.3)
//!
//! Grounded in `src/profiler.rs`'s `ProfileReceiver` trait: a small,
//! cloneable callback object the engine hands report content to, keeping
//! the actual file-creation/naming-collision path ("filesystem I/O for
//! reports") pluggable and out of the engine's own dependency surface.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::rc::Rc;

use dyn_clone::DynClone;

/// The report kinds named in §6.3's file-naming table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    ShadowValuesRelativeError,
    ShadowValuesCanceled,
    ShadowValuesSpecial,
    MeanErrorsAddr,
    MeanErrorsCanceled,
    MeanErrorsIntro,
    StageReports,
    PsoLog,
}

impl ReportKind {
    pub const fn file_stem(self) -> &'static str {
        match self {
            ReportKind::ShadowValuesRelativeError => "shadow_values_relative_error",
            ReportKind::ShadowValuesCanceled => "shadow_values_canceled",
            ReportKind::ShadowValuesSpecial => "shadow_values_special",
            ReportKind::MeanErrorsAddr => "mean_errors_addr",
            ReportKind::MeanErrorsCanceled => "mean_errors_canceled",
            ReportKind::MeanErrorsIntro => "mean_errors_intro",
            ReportKind::StageReports => "stage_reports",
            ReportKind::PsoLog => "pso",
        }
    }
}

/// Receives formatted report blocks. Implementations decide where the bytes
/// land; [`FileReportSink`] is the default, filesystem-backed implementation.
pub trait ReportSink: DynClone {
    fn write_block(&mut self, kind: ReportKind, content: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

dyn_clone::clone_trait_object!(ReportSink);

struct FileReportSinkInner {
    exe_name: String,
    writers: HashMap<ReportKind, BufWriter<File>>,
}

impl FileReportSinkInner {
    fn writer_for(&mut self, kind: ReportKind) -> io::Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(&kind) {
            let file = create_numbered_file(&self.exe_name, kind.file_stem())?;
            self.writers.insert(kind, BufWriter::with_capacity(crate::consts::FWRITE_BUFSIZE, file));
        }
        Ok(self.writers.get_mut(&kind).expect("just inserted"))
    }
}

/// Finds the smallest `n >= 1` making `<exe>_<kind>_<n>` not already exist,
/// and creates it.
fn create_numbered_file(exe_name: &str, kind_stem: &str) -> io::Result<File> {
    let mut n = 1u64;
    loop {
        let path = format!("{exe_name}_{kind_stem}_{n}");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Default [`ReportSink`]: one buffered file per report kind, named per
/// §6.3's `<exe>_<kind>_<n>` scheme, flushed explicitly (Design Notes:
/// "manual fwrite batching... replaced by the standard buffered-writer").
#[derive(Clone)]
pub struct FileReportSink {
    inner: Rc<RefCell<FileReportSinkInner>>,
}

impl FileReportSink {
    pub fn new(exe_name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FileReportSinkInner {
                exe_name: exe_name.into(),
                writers: HashMap::new(),
            })),
        }
    }
}

impl ReportSink for FileReportSink {
    fn write_block(&mut self, kind: ReportKind, content: &str) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        let writer = inner.writer_for(kind)?;
        writer.write_all(content.as_bytes())?;
        writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        for writer in inner.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Formats one `N: 0xADDR of type {float|double}` block plus its indented
/// detail lines, matching the `shadow_values_*` report kinds (§6.3).
pub fn format_shadow_entry(n: u64, addr: crate::ir::Addr, sv: &crate::shadow_value::ShadowValue) -> String {
    use crate::ir::OrgType;

    let type_name = match sv.org_type() {
        OrgType::Float => "float",
        OrgType::Double | OrgType::Invalid => "double",
    };
    let org_text = sv.org().map(|v| v.to_string()).unwrap_or_else(|| "<none>".to_string());
    let shadow_text = crate::text::format_full(sv.value());
    let rel_err = sv.relative_error();
    let abs_err = {
        let org_ap = sv.org().map(|v| rug::Float::with_val(sv.value().prec(), v.as_f64()));
        match org_ap {
            Some(o) => crate::text::format_short(&rug::Float::with_val(sv.value().prec(), sv.value() - &o).abs()),
            None => "<none>".to_string(),
        }
    };

    let mut out = format!("{n}: {addr:#x} of type {type_name}\n");
    out += &format!("    original: {org_text}\n");
    out += &format!("    shadow: {shadow_text}\n");
    out += &format!("    absolute error: {abs_err}\n");
    out += &format!("    relative error: {}\n", crate::text::format_short(&rel_err));
    out += &format!("    max canceled bits: {}\n", sv.canceled());
    if sv.canceled() > 0 {
        out += &format!("    origin of max cancellation: {:#x}\n", sv.cancel_origin());
    }
    out += &format!("    last operation: {:#x}\n", sv.origin());
    out += &format!("    operation count: {}", sv.op_count());
    out
}

/// Formats one `DESCR OP (COUNT)` mean-value block, matching the
/// `mean_errors_*` report kinds (§6.3).
pub fn format_mean_value_entry(ip: crate::ir::Addr, entry: &crate::analysis::MeanValueEntry) -> String {
    let mut out = format!("0x{ip:x} ({})\n", entry.count);
    out += &format!("    avg relative error: {:e}\n", entry.mean_rel_err());
    out += &format!("    max relative error: {:e}\n", entry.max_rel_err);
    out += &format!("    max canceled bits: {}\n", entry.canceled_max);
    if entry.canceled_overflow {
        out += "    avg canceled bits: overflow\n";
    } else {
        out += &format!("    avg canceled bits: {:.3}\n", entry.mean_canceled());
    }
    out += &format!("    max cancellation badness: {}\n", entry.badness_max);
    let badness_pct = if entry.count == 0 || entry.badness_max == 0 {
        0.0
    } else {
        100.0 * entry.mean_badness() / (entry.count as f64 * entry.badness_max as f64)
    };
    out += &format!("    avg cancellation badness: {badness_pct:.2}%\n");
    out += &format!(
        "    max-error argument origins: {:#x}, {:#x}",
        entry.max_err_arg_origins.0, entry.max_err_arg_origins.1
    );
    out
}

/// Formats one `(stage) 0xKEY (COUNT)` block, matching the `stage_reports`
/// report kind (§6.3).
pub fn format_stage_report(report: &crate::analysis::StageReport) -> String {
    format!(
        "({}) {:#x} ({})\n    execution range: [{}, {}]\n    origin: {:#x}",
        report.stage, report.addr, report.count, report.iter_min, report.iter_max, report.origin
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_kind_file_stems_match_spec_naming() {
        assert_eq!(ReportKind::ShadowValuesRelativeError.file_stem(), "shadow_values_relative_error");
        assert_eq!(ReportKind::PsoLog.file_stem(), "pso");
    }

    #[test]
    fn shadow_entry_block_names_the_address_and_type() {
        let sv = crate::shadow_value::ShadowValue::introduce(
            crate::shadow_value::ShadowKey::Memory(0x2000),
            120,
            crate::ir::NativeValue::F64(1.5),
            0x1000,
        );
        let block = format_shadow_entry(1, 0x2000, &sv);
        assert!(block.starts_with("1: 0x2000 of type double"));
        assert!(block.contains("operation count: 0"));
    }

    #[test]
    fn stage_report_block_includes_iteration_range() {
        let report = crate::analysis::StageReport {
            stage: 1,
            addr: 0xA,
            count: 3,
            iter_min: 2,
            iter_max: 9,
            origin: 0x500,
        };
        let block = format_stage_report(&report);
        assert!(block.contains("[2, 9]"));
        assert!(block.contains("0x500"));
    }
}
