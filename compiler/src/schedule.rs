// schedule.rs — Stage scheduling over the dependency graph
//
// Two mutually exclusive algorithms, selected by the graph's mode tag:
// `count_min_stages` (coarse) computes the earliest stage of every event
// and the minimum stage count for the whole program; `critical_path`
// (fine) reports every event and edge lying on some longest dependency
// chain. Both are deterministic for a fixed graph.
//
// Preconditions: `graph` was produced by the builder (acyclic).
// Postconditions: see the per-function contracts.
// Failure modes: a cycle at scheduling time is a builder invariant
//                violation, reported as `CycleError`.
// Side effects: none.

use std::fmt;

use crate::graph::{DepGraph, EventKind, GraphMode};

// ── Errors ──────────────────────────────────────────────────────────────────

/// Topological sort impossible: the graph contains a cycle. Defensive —
/// the builder never hands over a cyclic graph.
#[derive(Debug)]
pub struct CycleError {
    /// Labels of the events stuck in cycles.
    pub stuck: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot schedule: {} event(s) in a dependency cycle ({})",
            self.stuck.len(),
            self.stuck.join(", ")
        )
    }
}

impl std::error::Error for CycleError {}

fn cycle_error(graph: &DepGraph) -> CycleError {
    // Kahn leftover: events never reaching in-degree zero are in cycles.
    let n = graph.event_count();
    let mut in_degree = vec![0usize; n];
    for edge in &graph.edges {
        in_degree[edge.target.index()] += 1;
    }
    let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut done = vec![false; n];
    let mut head = 0;
    while head < queue.len() {
        let u = queue[head];
        head += 1;
        done[u] = true;
        for &e in graph.outgoing(crate::id::EventId(u as u32)) {
            let v = graph.edges[e].target.index();
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push(v);
            }
        }
    }
    CycleError {
        stuck: (0..n)
            .filter(|&i| !done[i])
            .map(|i| graph.events[i].label.clone())
            .collect(),
    }
}

// ── Options ─────────────────────────────────────────────────────────────────

/// Coarse-mode stage accounting options.
#[derive(Debug, Clone, Copy)]
pub struct StageOptions {
    /// When false, conditional events are zero-cost pass-throughs: they
    /// keep their ordering role but add nothing to the stage count.
    pub conditionals_occupy: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        StageOptions {
            conditionals_occupy: true,
        }
    }
}

// ── count_min_stages (coarse) ───────────────────────────────────────────────

/// Per-event earliest stages plus the program's minimum stage count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAssignment {
    /// Earliest stage of each event, indexed by event id. Events with no
    /// predecessors sit in stage 0.
    pub stages: Vec<u32>,
    /// Minimum number of stages for the whole program: the longest path
    /// through the graph, weighted by event occupancy.
    pub min_stages: u32,
}

/// Compute the earliest stage of every event and the minimum stage count.
///
/// The earliest stage is the longest-occupancy path ending at the event;
/// the conditional flag only changes occupancy, never relative order.
/// Linear in events + edges over a topological order.
pub fn count_min_stages(
    graph: &DepGraph,
    opts: &StageOptions,
) -> Result<StageAssignment, CycleError> {
    let order = graph.topo_order().ok_or_else(|| cycle_error(graph))?;

    let cost = |kind: EventKind| -> u32 {
        match kind {
            EventKind::Conditional(_) if !opts.conditionals_occupy => 0,
            _ => 1,
        }
    };

    let n = graph.event_count();
    let mut stages = vec![0u32; n];
    let mut min_stages = 0u32;

    for &event in &order {
        let v = event.index();
        let mut stage = 0;
        for &e in graph.incoming(event) {
            let u = graph.edges[e].source.index();
            stage = stage.max(stages[u] + cost(graph.events[u].kind));
        }
        stages[v] = stage;
        min_stages = min_stages.max(stage + cost(graph.events[v].kind));
    }

    Ok(StageAssignment { stages, min_stages })
}

// ── critical_path (fine) ────────────────────────────────────────────────────

/// All events and edges lying on some longest dependency chain.
///
/// Fine-mode stage arithmetic: the intra-table match→action edge spans no
/// stage distance, every inter-event edge spans one. With that weighting
/// the critical-path length in stages equals the coarse minimum stage
/// count on the same HLIR (validated by property test, not assumed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalPath {
    /// Number of stages spanned by a longest chain (0 for an empty graph).
    pub length: u32,
    /// Longest weighted path from any source to the event.
    pub forward: Vec<u32>,
    /// Longest weighted path from the event to any sink.
    pub backward: Vec<u32>,
    /// True for events with zero slack.
    pub on_path: Vec<bool>,
    /// Indices (into the graph's edge list) of dependency edges on some
    /// longest path, ascending. Intra-table ordering edges are structural
    /// and never reported.
    pub critical_edges: Vec<usize>,
}

impl CriticalPath {
    pub fn is_critical_edge(&self, edge_index: usize) -> bool {
        self.critical_edges.binary_search(&edge_index).is_ok()
    }
}

/// Two-pass longest-path analysis: a forward pass over a topological
/// order, then a backward pass; an edge is critical iff its endpoints'
/// forward and backward values leave zero slack.
pub fn critical_path(graph: &DepGraph) -> Result<CriticalPath, CycleError> {
    let order = graph.topo_order().ok_or_else(|| cycle_error(graph))?;
    let n = graph.event_count();

    let weight =
        |e: usize| -> u32 {
            if graph.is_intra_table(&graph.edges[e]) {
                0
            } else {
                1
            }
        };

    let mut forward = vec![0u32; n];
    for &event in &order {
        let v = event.index();
        for &e in graph.incoming(event) {
            let u = graph.edges[e].source.index();
            forward[v] = forward[v].max(forward[u] + weight(e));
        }
    }
    let total = forward.iter().copied().max().unwrap_or(0);

    let mut backward = vec![0u32; n];
    for &event in order.iter().rev() {
        let u = event.index();
        for &e in graph.outgoing(event) {
            let v = graph.edges[e].target.index();
            backward[u] = backward[u].max(backward[v] + weight(e));
        }
    }

    let on_path: Vec<bool> = (0..n).map(|v| forward[v] + backward[v] == total).collect();

    let critical_edges: Vec<usize> = (0..graph.edge_count())
        .filter(|&e| {
            let edge = &graph.edges[e];
            !graph.is_intra_table(edge)
                && forward[edge.source.index()] + weight(e) + backward[edge.target.index()]
                    == total
        })
        .collect();

    let length = if n == 0 { 0 } else { total + 1 };

    Ok(CriticalPath {
        length,
        forward,
        backward,
        on_path,
        critical_edges,
    })
}

// ── Mode dispatch ───────────────────────────────────────────────────────────

/// The schedule for one graph, matching its construction mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Stages(StageAssignment),
    CriticalPath(CriticalPath),
}

/// Run the scheduling algorithm paired with the graph's mode. The pairing
/// is decided by the mode tag set at construction, so a coarse graph can
/// never be fed to the fine algorithm or vice versa.
pub fn schedule(graph: &DepGraph, opts: &StageOptions) -> Result<Schedule, CycleError> {
    match graph.mode {
        GraphMode::Coarse => Ok(Schedule::Stages(count_min_stages(graph, opts)?)),
        GraphMode::Fine => Ok(Schedule::CriticalPath(critical_path(graph)?)),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
