// reduce.rs — Transitive reduction of the coarse dependency graph
//
// Removes every edge implied by transitivity, leaving the unique minimal
// edge set with the same reachability relation. Used to shrink rendered
// graphs and the scheduler's work in coarse mode only — fine mode keeps
// every edge so the critical-path report can name the binding dependency.
//
// Preconditions: `graph` is acyclic (guaranteed by the builder).
// Postconditions: same reachability relation, fewer or equal edges, same
//                 minimum stage count, idempotent.
// Failure modes: none. A cyclic input (never produced by the builder) is
//                returned unchanged.
// Side effects: none.

use crate::graph::{DepEdge, DepGraph};

/// Compute the transitive reduction of a DAG.
///
/// An edge (u, w) is removed iff some other directed path of length ≥ 2
/// leads from u to w. On a DAG this minimal edge set is unique, so the
/// operation is idempotent and independent of edge order.
pub fn transitive_reduction(graph: &DepGraph) -> DepGraph {
    let order = match graph.topo_order() {
        Some(order) => order,
        None => return graph.clone(),
    };

    let n = graph.event_count();

    // Inclusive reachability per event (the event itself plus everything
    // strictly reachable), computed bottom-up in reverse topological order.
    let mut reach = vec![vec![false; n]; n];
    for &event in order.iter().rev() {
        let u = event.index();
        reach[u][u] = true;
        let row: Vec<usize> = graph
            .outgoing(event)
            .iter()
            .map(|&e| graph.edges[e].target.index())
            .collect();
        for v in row {
            // reach[u] |= reach[v]
            for w in 0..n {
                if reach[v][w] {
                    reach[u][w] = true;
                }
            }
        }
    }

    // Keep (u, w) iff no direct successor v ≠ w of u reaches w.
    let kept: Vec<DepEdge> = graph
        .edges
        .iter()
        .filter(|edge| {
            let u = edge.source;
            let w = edge.target.index();
            !graph.outgoing(u).iter().any(|&e| {
                let v = graph.edges[e].target.index();
                v != w && reach[v][w]
            })
        })
        .cloned()
        .collect();

    DepGraph::from_parts(graph.mode, graph.events.clone(), kept)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DepEdge, EdgeKind, Event, EventKind, GraphMode};
    use crate::id::{EventId, TableId};

    /// Hand-build a coarse graph over `n` table events with the given
    /// control-flow edges.
    fn graph_of(n: u32, edges: &[(u32, u32)]) -> DepGraph {
        let events: Vec<Event> = (0..n)
            .map(|i| Event {
                id: EventId(i),
                kind: EventKind::Table(TableId(i)),
                label: format!("t{i}"),
            })
            .collect();
        let dep_edges: Vec<DepEdge> = edges
            .iter()
            .map(|&(s, t)| DepEdge {
                source: EventId(s),
                target: EventId(t),
                kind: EdgeKind::ControlFlow,
                fields: Vec::new(),
            })
            .collect();
        DepGraph::from_parts(GraphMode::Coarse, events, dep_edges)
    }

    fn edge_pairs(graph: &DepGraph) -> Vec<(u32, u32)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source.0, e.target.0))
            .collect()
    }

    #[test]
    fn removes_transitive_shortcut() {
        // 0→1→2 plus shortcut 0→2.
        let graph = graph_of(3, &[(0, 1), (1, 2), (0, 2)]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(edge_pairs(&reduced), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn keeps_required_edges() {
        // Diamond: 0→1, 0→2, 1→3, 2→3 — nothing is redundant.
        let graph = graph_of(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(reduced.edge_count(), 4);
    }

    #[test]
    fn removes_long_range_shortcut() {
        // Chain of 5 plus a 0→4 shortcut spanning the whole chain.
        let graph = graph_of(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (0, 4)]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(
            edge_pairs(&reduced),
            vec![(0, 1), (1, 2), (2, 3), (3, 4)]
        );
    }

    #[test]
    fn idempotent() {
        let graph = graph_of(5, &[(0, 1), (1, 2), (2, 3), (0, 2), (0, 3), (1, 3), (3, 4)]);
        let once = transitive_reduction(&graph);
        let twice = transitive_reduction(&once);
        assert_eq!(edge_pairs(&once), edge_pairs(&twice));
    }

    #[test]
    fn preserves_reachability() {
        let graph = graph_of(6, &[(0, 1), (0, 2), (1, 3), (2, 3), (0, 3), (3, 4), (1, 4), (4, 5)]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(graph.reachability(), reduced.reachability());
    }

    #[test]
    fn empty_graph_unchanged() {
        let graph = graph_of(0, &[]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(reduced.event_count(), 0);
        assert_eq!(reduced.edge_count(), 0);
    }

    #[test]
    fn preserves_event_arena() {
        let graph = graph_of(3, &[(0, 1), (1, 2), (0, 2)]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(graph.events, reduced.events);
    }

    #[test]
    fn stage_count_invariant() {
        use crate::schedule::{count_min_stages, StageOptions};
        let graph = graph_of(5, &[(0, 1), (1, 2), (0, 2), (0, 3), (2, 4), (3, 4), (1, 4)]);
        let reduced = transitive_reduction(&graph);
        let opts = StageOptions::default();
        let full = count_min_stages(&graph, &opts).expect("stages on full graph");
        let less = count_min_stages(&reduced, &opts).expect("stages on reduced graph");
        assert_eq!(full.min_stages, less.min_stages);
    }

    #[test]
    fn cyclic_input_returned_unchanged() {
        let graph = graph_of(2, &[(0, 1), (1, 0)]);
        let reduced = transitive_reduction(&graph);
        assert_eq!(edge_pairs(&reduced), vec![(0, 1), (1, 0)]);
    }
}
