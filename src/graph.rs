//! Provenance graph dump (§6.3 "Graph files (VCG format)")
//!
//! Walks the mean-value table's `max_err_arg_origins` back-links starting
//! from one IP, emitting a VCG-format node/edge list bounded by
//! `MAX_LEVEL_OF_GRAPH`. Per §9's open questions this path is optional —
//! this crate commits to producing it, grounded in `DUMP_ERROR_GRAPH`'s
//! entry in the client-request table (§4.G) and the provenance-DAG design
//! note ("represent them as indices/keys, not pointers... explicit visited
//! set").

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::analysis::MeanValueTable;
use crate::consts::MAX_LEVEL_OF_GRAPH;
use crate::ir::Addr;

/// Renders the provenance DAG rooted at `start`, following `max_err_arg_origins`
/// back-links up to `MAX_LEVEL_OF_GRAPH` deep. `graph_index` numbers this dump
/// among the run's (at most `MAX_DUMPED_GRAPHS`) graphs, used only in the title.
/// Returns the rendered graph alongside every origin it walked, for a caller
/// honoring `careVisited` (§4.G) to fold into its own visited set.
pub fn dump_vcg(mean_values: &MeanValueTable, start: Addr, graph_index: u32) -> (String, HashSet<Addr>) {
    let mut out = String::new();
    let _ = writeln!(out, "graph: {{ title: \"fpdebug-error-graph-{graph_index}\"");
    let _ = writeln!(out, "  classname 1 : \"FpDebug\"");
    for i in 0..10u32 {
        let shade = 50 + i * 20;
        let _ = writeln!(out, "  colorentry {i} : {shade} {shade} {shade}");
    }

    let mut visited: HashSet<Addr> = HashSet::new();
    let mut edges = Vec::new();
    walk(mean_values, start, 0, &mut visited, &mut edges, &mut out);

    for (parent, child, label, color) in edges {
        let _ = writeln!(
            out,
            "  edge: {{ sourcename \"0x{parent:x}\" targetname \"0x{child:x}\" label \"{label}\" color {color} }}"
        );
    }

    out.push('}');
    (out, visited)
}

fn walk(
    mean_values: &MeanValueTable,
    ip: Addr,
    depth: usize,
    visited: &mut HashSet<Addr>,
    edges: &mut Vec<(Addr, Addr, &'static str, &'static str)>,
    out: &mut String,
) {
    if depth > MAX_LEVEL_OF_GRAPH || !visited.insert(ip) {
        return;
    }
    let Some(entry) = mean_values.get(ip) else {
        let _ = writeln!(out, "  node: {{ title: \"0x{ip:x}\" label: \"<unknown> (0x{ip:x})\" color: 1 }}");
        return;
    };

    let color = error_color(entry.max_rel_err);
    let _ = writeln!(
        out,
        "  node: {{ title: \"0x{ip:x}\" label: \"op (0x{ip:x})\" color: {color} info1: \"max_rel_err={:e}\" info2: \"canceled_max={}\" info3: \"count={}\" }}",
        entry.max_rel_err, entry.canceled_max, entry.count
    );

    let (a1, a2) = entry.max_err_arg_origins;
    if a1 != 0 {
        let label = if mean_values.get(a1).map(|e| e.max_rel_err).unwrap_or(0.0)
            >= mean_values.get(a2).map(|e| e.max_rel_err).unwrap_or(0.0)
        {
            "larger"
        } else {
            "smaller"
        };
        edges.push((ip, a1, label, if label == "larger" { "red" } else { "blue" }));
        walk(mean_values, a1, depth + 1, visited, edges, out);
    }
    if a2 != 0 {
        let label = if mean_values.get(a2).map(|e| e.max_rel_err).unwrap_or(0.0)
            >= mean_values.get(a1).map(|e| e.max_rel_err).unwrap_or(0.0)
        {
            "larger"
        } else {
            "smaller"
        };
        edges.push((ip, a2, label, if label == "larger" { "red" } else { "blue" }));
        walk(mean_values, a2, depth + 1, visited, edges, out);
    }
}

/// Maps a relative error onto the 50..249 node-color palette (§6.3).
fn error_color(rel_err: f64) -> u32 {
    if rel_err <= 0.0 {
        return 50;
    }
    let magnitude = (-rel_err.log10()).max(0.0);
    let scaled = 249.0 - magnitude * 20.0;
    scaled.clamp(50.0, 249.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_includes_header_and_root_node() {
        let mut table = MeanValueTable::default();
        table.update(0x1000, 0.5, 3, 1, (0, 0));
        let (vcg, visited) = dump_vcg(&table, 0x1000, 1);
        assert!(vcg.starts_with("graph: { title:"));
        assert!(vcg.contains("0x1000"));
        assert!(visited.contains(&0x1000));
    }

    #[test]
    fn cycle_does_not_infinite_loop() {
        let mut table = MeanValueTable::default();
        table.update(0x10, 0.1, 0, 0, (0x20, 0));
        table.update(0x20, 0.1, 0, 0, (0x10, 0));
        let (vcg, visited) = dump_vcg(&table, 0x10, 1);
        assert!(vcg.contains("0x10"));
        assert!(vcg.contains("0x20"));
        assert!(visited.contains(&0x10) && visited.contains(&0x20));
    }

    #[test]
    fn error_color_increases_toward_249_for_small_errors() {
        assert!(error_color(1e-10) > error_color(1e-2));
        assert_eq!(error_color(0.0), 50);
    }
}
