// dot.rs — Graphviz DOT output
//
// Transforms the analyzed structures into DOT format suitable for
// rendering with `dot` or other Graphviz layout engines: the table
// dependency graph (the core output), the per-control table flow graph,
// and the parse graph.
//
// Preconditions: inputs are fully constructed; the schedule (if given)
//                belongs to the same graph.
// Postconditions: returns a valid DOT string; output is deterministic for
//                 a fixed input.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::collections::HashSet;
use std::fmt::Write;

use crate::graph::{DepGraph, EdgeKind, EventKind};
use crate::hlir::{CfNodeKind, HlirProgram};
use crate::schedule::Schedule;

// ── Options ─────────────────────────────────────────────────────────────────

/// Label and filtering options for the dependency graph export.
#[derive(Debug, Clone, Copy)]
pub struct DotOptions {
    /// Draw control-flow-only edges.
    pub show_control_edges: bool,
    /// Label field-dependency edges with the responsible field set.
    pub show_fields: bool,
    /// Include condition source text in conditional node labels.
    pub show_conditions: bool,
    /// Fine mode: draw only edges on some critical path.
    pub critical_only: bool,
    /// Annotate nodes with computed stages and key/action bit widths.
    pub debug_labels: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        DotOptions {
            show_control_edges: true,
            show_fields: true,
            show_conditions: false,
            critical_only: false,
            debug_labels: false,
        }
    }
}

// ── Table dependency graph ──────────────────────────────────────────────────

/// Emit the table dependency graph as a Graphviz DOT string.
pub fn emit_dependency_dot(
    hlir: &HlirProgram,
    graph: &DepGraph,
    schedule: Option<&Schedule>,
    opts: &DotOptions,
) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph table_deps {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();
    writeln!(buf).unwrap();

    // Nodes, in arena order.
    for event in &graph.events {
        let (shape, color) = match event.kind {
            EventKind::Table(_) => ("box", "lightblue"),
            EventKind::Match(_) => ("ellipse", "lightcyan"),
            EventKind::Action(_) => ("box", "lightsalmon"),
            EventKind::Conditional(_) => ("diamond", "lightyellow"),
        };
        let label = node_label(hlir, graph, schedule, event.id.index(), opts);
        writeln!(
            buf,
            "    n{} [shape={shape}, style=filled, fillcolor={color}, label=\"{label}\"];",
            event.id.0
        )
        .unwrap();
    }

    writeln!(buf).unwrap();

    // Edges, in list order (already deterministic).
    for (idx, edge) in graph.edges.iter().enumerate() {
        let critical = match schedule {
            Some(Schedule::CriticalPath(cp)) => cp.is_critical_edge(idx),
            _ => false,
        };
        if opts.critical_only && !critical {
            continue;
        }
        if graph.is_intra_table(edge) {
            writeln!(
                buf,
                "    n{} -> n{} [style=dotted, color=gray70];",
                edge.source.0, edge.target.0
            )
            .unwrap();
            continue;
        }
        match edge.kind {
            EdgeKind::ControlFlow => {
                if !opts.show_control_edges {
                    continue;
                }
                let bold = if critical { ", penwidth=2" } else { "" };
                writeln!(
                    buf,
                    "    n{} -> n{} [style=dashed, color=gray50{bold}];",
                    edge.source.0, edge.target.0
                )
                .unwrap();
            }
            EdgeKind::FieldDependency => {
                let bold = if critical { ", penwidth=2" } else { "" };
                if opts.show_fields {
                    let fields: Vec<String> = edge
                        .fields
                        .iter()
                        .map(|&f| hlir.field_name(f))
                        .collect();
                    writeln!(
                        buf,
                        "    n{} -> n{} [color=red, label=\"{}\"{bold}];",
                        edge.source.0,
                        edge.target.0,
                        fields.join(", ")
                    )
                    .unwrap();
                } else {
                    writeln!(
                        buf,
                        "    n{} -> n{} [color=red{bold}];",
                        edge.source.0, edge.target.0
                    )
                    .unwrap();
                }
            }
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

fn node_label(
    hlir: &HlirProgram,
    graph: &DepGraph,
    schedule: Option<&Schedule>,
    index: usize,
    opts: &DotOptions,
) -> String {
    let event = &graph.events[index];
    let mut label = event.label.clone();

    if opts.show_conditions {
        if let EventKind::Conditional(c) = event.kind {
            label.push_str("\\n");
            label.push_str(&escape(&hlir.conditional(c).source_text));
        }
    }

    if opts.debug_labels {
        match event.kind {
            EventKind::Table(t) | EventKind::Match(t) => {
                label.push_str(&format!("\\nkey={}b", hlir.table_key_width(t)));
            }
            EventKind::Action(t) => {
                label.push_str(&format!("\\nact={}b", hlir.table_action_width(t)));
            }
            EventKind::Conditional(_) => {}
        }
        match schedule {
            Some(Schedule::Stages(stages)) => {
                label.push_str(&format!("\\nstage {}", stages.stages[index]));
            }
            Some(Schedule::CriticalPath(cp)) => {
                label.push_str(&format!(
                    "\\nearliest {} latest {}",
                    cp.forward[index],
                    cp.length.saturating_sub(1) - cp.backward[index]
                ));
            }
            None => {}
        }
    }

    label
}

// ── Table control-flow graph ────────────────────────────────────────────────

/// Emit the per-control table flow graph: one cluster per control block,
/// edges following the program-order successor relation.
pub fn emit_table_dot(hlir: &HlirProgram) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph table_flow {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();

    for control in &hlir.controls {
        let sanitized = sanitize(&control.name);
        writeln!(buf).unwrap();
        writeln!(buf, "    subgraph cluster_{sanitized} {{").unwrap();
        writeln!(buf, "        label=\"control: {}\";", control.name).unwrap();
        writeln!(buf, "        style=rounded;").unwrap();
        writeln!(buf, "        color=gray50;").unwrap();

        // Nodes owned by this control: everything reachable from its entry.
        let mut owned: Vec<usize> = Vec::new();
        if let Some(entry) = control.entry {
            let mut seen = HashSet::new();
            let mut stack = vec![entry.index()];
            while let Some(node) = stack.pop() {
                if !seen.insert(node) {
                    continue;
                }
                owned.push(node);
                stack.extend(hlir.cf_nodes[node].succs.iter().map(|s| s.index()));
            }
        }
        owned.sort_unstable();

        for &node in &owned {
            let (shape, color, label) = match hlir.cf_nodes[node].kind {
                CfNodeKind::Table(t) => ("box", "lightblue", hlir.table(t).name.clone()),
                CfNodeKind::Conditional(c) => {
                    ("diamond", "lightyellow", hlir.conditional(c).name.clone())
                }
            };
            writeln!(
                buf,
                "        {sanitized}_n{node} [shape={shape}, style=filled, fillcolor={color}, label=\"{label}\"];",
            )
            .unwrap();
        }

        writeln!(buf).unwrap();
        for &node in &owned {
            for succ in &hlir.cf_nodes[node].succs {
                writeln!(
                    buf,
                    "        {sanitized}_n{node} -> {sanitized}_n{};",
                    succ.index()
                )
                .unwrap();
            }
        }

        writeln!(buf, "    }}").unwrap();
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Parse graph ─────────────────────────────────────────────────────────────

/// Emit the parser state graph: states with their extracted instances,
/// select-labelled transitions, and exit nodes for control entry points.
pub fn emit_parse_dot(hlir: &HlirProgram) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph parse_graph {{").unwrap();
    writeln!(buf, "    rankdir=TB;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();
    writeln!(buf).unwrap();

    let state_names: HashSet<&str> = hlir
        .parse_states
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    for state in &hlir.parse_states {
        let mut label = state.name.clone();
        for &inst in &state.extracts {
            label.push_str("\\nextract ");
            label.push_str(&hlir.instances[inst.index()].name);
        }
        writeln!(
            buf,
            "    {} [shape=ellipse, style=filled, fillcolor=lightblue, label=\"{label}\"];",
            sanitize(&state.name)
        )
        .unwrap();
    }

    // Exit nodes: transition targets that are not parse states.
    let mut exits: Vec<&str> = hlir
        .parse_states
        .iter()
        .flat_map(|s| s.transitions.iter())
        .map(|t| t.target.as_str())
        .filter(|t| !state_names.contains(t))
        .collect();
    exits.sort_unstable();
    exits.dedup();
    for exit in &exits {
        writeln!(
            buf,
            "    {} [shape=box, style=filled, fillcolor=gray90, label=\"{exit}\"];",
            sanitize(exit)
        )
        .unwrap();
    }

    writeln!(buf).unwrap();
    for state in &hlir.parse_states {
        for transition in &state.transitions {
            match &transition.label {
                Some(label) => writeln!(
                    buf,
                    "    {} -> {} [label=\"{}\"];",
                    sanitize(&state.name),
                    sanitize(&transition.target),
                    escape(label)
                )
                .unwrap(),
                None => writeln!(
                    buf,
                    "    {} -> {};",
                    sanitize(&state.name),
                    sanitize(&transition.target)
                )
                .unwrap(),
            }
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Sanitize a name to valid DOT identifier characters.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Escape a label for inclusion in a double-quoted DOT string.
fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ───────────────────────────────────────────────────────────────────
