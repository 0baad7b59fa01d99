// graph.rs — Table dependency graph construction
//
// Transforms the HLIR control-flow relation and field read/write sets into
// a directed graph of schedulable events. Two granularities share one
// builder: coarse mode gives every table (and conditional) a single event;
// fine mode splits each table into a match event and an action event so a
// later table's match may share a stage with an earlier, independent
// table's action.
//
// Preconditions: `hlir` passed name resolution with no errors.
// Postconditions: the returned graph is acyclic, has no self edges, and
//                 holds at most one edge per (source, target) pair — a
//                 field dependency subsumes a control-flow-only edge.
// Failure modes: cyclic control flow or an out-of-scope field write →
//                `StructuralError`; no partial graph is returned.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use crate::hlir::{CfNodeKind, HlirProgram};
use crate::id::{CfNodeId, CondId, EventId, FieldId, TableId};

// ── Public types ────────────────────────────────────────────────────────────

/// Graph granularity, selected once per run. The scheduler dispatches on
/// this tag, so a graph can never be paired with the wrong algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    /// One event per table or conditional; tables are atomic.
    Coarse,
    /// Each table yields a match event (reads) and an action event
    /// (writes), ordered match-before-action.
    Fine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Whole table (coarse mode).
    Table(TableId),
    /// Table match phase (fine mode).
    Match(TableId),
    /// Table action phase (fine mode).
    Action(TableId),
    /// Conditional node (both modes).
    Conditional(CondId),
}

/// A schedulable unit in the dependency graph arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Program order must be kept even without field interaction.
    ControlFlow,
    /// The target may observe a value the source writes.
    FieldDependency,
}

/// A must-happen-no-earlier-than constraint between two events.
///
/// `fields` carries the responsible field set for labeling only; it never
/// affects ordering strength.
#[derive(Debug, Clone, PartialEq)]
pub struct DepEdge {
    pub source: EventId,
    pub target: EventId,
    pub kind: EdgeKind,
    pub fields: Vec<FieldId>,
}

/// The dependency graph: a dense event arena plus a deterministically
/// ordered edge list with adjacency indices.
#[derive(Debug, Clone)]
pub struct DepGraph {
    pub mode: GraphMode,
    pub events: Vec<Event>,
    pub edges: Vec<DepEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl DepGraph {
    /// Assemble a graph from an event arena and edge list, building the
    /// adjacency indices. Edge order is preserved.
    pub(crate) fn from_parts(mode: GraphMode, events: Vec<Event>, edges: Vec<DepEdge>) -> Self {
        let mut outgoing = vec![Vec::new(); events.len()];
        let mut incoming = vec![Vec::new(); events.len()];
        for (idx, edge) in edges.iter().enumerate() {
            outgoing[edge.source.index()].push(idx);
            incoming[edge.target.index()].push(idx);
        }
        DepGraph {
            mode,
            events,
            edges,
            outgoing,
            incoming,
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Indices into `edges` of the edges leaving `id`.
    pub fn outgoing(&self, id: EventId) -> &[usize] {
        &self.outgoing[id.index()]
    }

    /// Indices into `edges` of the edges entering `id`.
    pub fn incoming(&self, id: EventId) -> &[usize] {
        &self.incoming[id.index()]
    }

    /// True for the structural match→action edge inside one table. These
    /// occupy no stage distance and are not reported as critical edges.
    pub fn is_intra_table(&self, edge: &DepEdge) -> bool {
        matches!(
            (
                self.events[edge.source.index()].kind,
                self.events[edge.target.index()].kind,
            ),
            (EventKind::Match(a), EventKind::Action(b)) if a == b
        )
    }

    /// Events in a topological order, or `None` if the graph is cyclic.
    /// Deterministic: ready events are taken in arena order.
    pub fn topo_order(&self) -> Option<Vec<EventId>> {
        let n = self.events.len();
        let mut in_degree: Vec<usize> = vec![0; n];
        for edge in &self.edges {
            in_degree[edge.target.index()] += 1;
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut head = 0;

        while head < queue.len() {
            let u = queue[head];
            head += 1;
            order.push(EventId(u as u32));
            let mut ready = Vec::new();
            for &e in &self.outgoing[u] {
                let v = self.edges[e].target.index();
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    ready.push(v);
                }
            }
            ready.sort_unstable();
            queue.extend(ready);
        }

        if order.len() == n {
            Some(order)
        } else {
            None
        }
    }

    /// Strict reachability matrix over events: `m[u][v]` is true iff `v`
    /// is reachable from `u` along one or more edges.
    pub fn reachability(&self) -> Vec<Vec<bool>> {
        let n = self.events.len();
        let mut reach = vec![vec![false; n]; n];
        let order = self.topo_order().unwrap_or_default();
        for &u in order.iter().rev() {
            let u = u.index();
            for &e in &self.outgoing[u] {
                let v = self.edges[e].target.index();
                reach[u][v] = true;
                for w in 0..n {
                    if reach[v][w] {
                        reach[u][w] = true;
                    }
                }
            }
        }
        reach
    }
}

impl fmt::Display for DepGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            GraphMode::Coarse => "coarse",
            GraphMode::Fine => "fine",
        };
        writeln!(
            f,
            "DepGraph [{}] ({} events, {} edges)",
            mode,
            self.events.len(),
            self.edges.len()
        )?;
        for edge in &self.edges {
            let kind = match edge.kind {
                EdgeKind::ControlFlow => "control",
                EdgeKind::FieldDependency => "field",
            };
            writeln!(
                f,
                "  {} -> {} [{}]",
                self.events[edge.source.index()].label,
                self.events[edge.target.index()].label,
                kind
            )?;
        }
        Ok(())
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Fatal defects found during graph construction. No partial graph is
/// surfaced alongside these.
#[derive(Debug)]
pub enum StructuralError {
    /// The control-flow relation contains a cycle (unsupported IR shape).
    CyclicControlFlow { node: String },
    /// An action records a write to a field outside the arena.
    UnscopedWrite { action: String },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::CyclicControlFlow { node } => {
                write!(f, "cyclic control-flow region involving '{}'", node)
            }
            StructuralError::UnscopedWrite { action } => {
                write!(
                    f,
                    "action '{}' writes a field with no determinable scope",
                    action
                )
            }
        }
    }
}

impl std::error::Error for StructuralError {}

// ── Field-set predicates ────────────────────────────────────────────────────
//
// Overlap reasoning is a pure predicate over sorted field-identity sets so
// it can be property-tested independently of IR parsing.

/// True iff the sorted sets `a` and `b` share a field.
pub fn fields_overlap(a: &[FieldId], b: &[FieldId]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Sorted intersection of two sorted field sets.
pub fn field_intersection(a: &[FieldId], b: &[FieldId]) -> Vec<FieldId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the dependency graph for one HLIR snapshot at the given
/// granularity.
pub fn build_graph(hlir: &HlirProgram, mode: GraphMode) -> Result<DepGraph, StructuralError> {
    check_write_scopes(hlir)?;
    check_control_flow_acyclic(hlir)?;

    let builder = GraphBuilder { hlir, mode };
    let graph = builder.build();

    // Builder invariant: the event graph is a DAG. A failure here is an
    // internal defect, reported as the unsupported-shape error.
    if graph.topo_order().is_none() {
        let node = graph
            .events
            .first()
            .map(|e| e.label.clone())
            .unwrap_or_default();
        return Err(StructuralError::CyclicControlFlow { node });
    }

    Ok(graph)
}

// ── Validation ──────────────────────────────────────────────────────────────

fn check_write_scopes(hlir: &HlirProgram) -> Result<(), StructuralError> {
    for action in &hlir.actions {
        for &field in &action.writes {
            if field.index() >= hlir.fields.len() {
                return Err(StructuralError::UnscopedWrite {
                    action: action.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_control_flow_acyclic(hlir: &HlirProgram) -> Result<(), StructuralError> {
    // Three-color DFS over the control-flow nodes.
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let n = hlir.cf_nodes.len();
    let mut color = vec![WHITE; n];

    for start in 0..n {
        if color[start] != WHITE {
            continue;
        }
        // Iterative DFS: (node, next successor index).
        let mut stack = vec![(start, 0usize)];
        color[start] = GRAY;
        loop {
            let Some(top) = stack.last_mut() else { break };
            let (node, next) = *top;
            let succs = &hlir.cf_nodes[node].succs;
            if next < succs.len() {
                top.1 += 1;
                let succ = succs[next].index();
                match color[succ] {
                    WHITE => {
                        color[succ] = GRAY;
                        stack.push((succ, 0));
                    }
                    GRAY => {
                        return Err(StructuralError::CyclicControlFlow {
                            node: cf_node_label(hlir, CfNodeId(succ as u32)),
                        });
                    }
                    _ => {}
                }
            } else {
                color[node] = BLACK;
                stack.pop();
            }
        }
    }
    Ok(())
}

fn cf_node_label(hlir: &HlirProgram, id: CfNodeId) -> String {
    match hlir.cf_node(id).kind {
        CfNodeKind::Table(t) => hlir.table(t).name.clone(),
        CfNodeKind::Conditional(c) => hlir.conditional(c).name.clone(),
    }
}

// ── Internal builder ────────────────────────────────────────────────────────

struct GraphBuilder<'a> {
    hlir: &'a HlirProgram,
    mode: GraphMode,
}

/// Events allocated for one control-flow node.
#[derive(Debug, Clone, Copy)]
struct NodeEvents {
    /// Event receiving incoming constraints (match event or whole node).
    entry: EventId,
    /// Event producing outgoing constraints (action event or whole node).
    exit: EventId,
}

impl<'a> GraphBuilder<'a> {
    fn build(&self) -> DepGraph {
        let (events, node_events) = self.allocate_events();
        let reach = cf_reachability(self.hlir);

        // Deterministic edge accumulation keyed by (source, target).
        let mut edge_map: BTreeMap<(u32, u32), (EdgeKind, Vec<FieldId>)> = BTreeMap::new();

        // Intra-table ordering edges (fine mode only).
        if self.mode == GraphMode::Fine {
            for ne in &node_events {
                if ne.entry != ne.exit {
                    merge_edge(
                        &mut edge_map,
                        ne.entry,
                        ne.exit,
                        EdgeKind::ControlFlow,
                        Vec::new(),
                    );
                }
            }
        }

        // Pairwise constraints over reachable control-flow pairs.
        for (a, reachable) in reach.iter().enumerate() {
            for (b, &is_reachable) in reachable.iter().enumerate() {
                if !is_reachable || a == b {
                    continue;
                }
                self.emit_pair_edges(
                    CfNodeId(a as u32),
                    CfNodeId(b as u32),
                    &node_events,
                    &mut edge_map,
                );
            }
        }

        let edges: Vec<DepEdge> = edge_map
            .into_iter()
            .map(|((source, target), (kind, fields))| DepEdge {
                source: EventId(source),
                target: EventId(target),
                kind,
                fields,
            })
            .collect();

        DepGraph::from_parts(self.mode, events, edges)
    }

    /// Allocate events in control-flow-node order.
    fn allocate_events(&self) -> (Vec<Event>, Vec<NodeEvents>) {
        let mut events = Vec::new();
        let mut node_events = Vec::new();

        for node in &self.hlir.cf_nodes {
            match (self.mode, node.kind) {
                (GraphMode::Coarse, CfNodeKind::Table(t)) => {
                    let id = EventId(events.len() as u32);
                    events.push(Event {
                        id,
                        kind: EventKind::Table(t),
                        label: self.hlir.table(t).name.clone(),
                    });
                    node_events.push(NodeEvents {
                        entry: id,
                        exit: id,
                    });
                }
                (GraphMode::Fine, CfNodeKind::Table(t)) => {
                    let name = &self.hlir.table(t).name;
                    let match_id = EventId(events.len() as u32);
                    events.push(Event {
                        id: match_id,
                        kind: EventKind::Match(t),
                        label: format!("{name}.match"),
                    });
                    let action_id = EventId(events.len() as u32);
                    events.push(Event {
                        id: action_id,
                        kind: EventKind::Action(t),
                        label: format!("{name}.action"),
                    });
                    node_events.push(NodeEvents {
                        entry: match_id,
                        exit: action_id,
                    });
                }
                (_, CfNodeKind::Conditional(c)) => {
                    let id = EventId(events.len() as u32);
                    events.push(Event {
                        id,
                        kind: EventKind::Conditional(c),
                        label: self.hlir.conditional(c).name.clone(),
                    });
                    node_events.push(NodeEvents {
                        entry: id,
                        exit: id,
                    });
                }
            }
        }

        (events, node_events)
    }

    /// Emit the constraint between one ordered, reachable pair of
    /// control-flow nodes.
    fn emit_pair_edges(
        &self,
        a: CfNodeId,
        b: CfNodeId,
        node_events: &[NodeEvents],
        edge_map: &mut BTreeMap<(u32, u32), (EdgeKind, Vec<FieldId>)>,
    ) {
        let src = node_events[a.index()].exit;
        let writes_a: &[FieldId] = match self.hlir.cf_node(a).kind {
            CfNodeKind::Table(t) => &self.hlir.table(t).action_writes,
            CfNodeKind::Conditional(_) => &[],
        };

        match self.hlir.cf_node(b).kind {
            CfNodeKind::Table(t) => {
                let table = self.hlir.table(t);
                let entry = node_events[b.index()].entry;
                match self.mode {
                    GraphMode::Coarse => {
                        // Observation set: match key plus action-body reads.
                        let key_overlap = field_intersection(writes_a, &table.key_reads);
                        let act_overlap = field_intersection(writes_a, &table.action_reads);
                        if key_overlap.is_empty() && act_overlap.is_empty() {
                            merge_edge(edge_map, src, entry, EdgeKind::ControlFlow, Vec::new());
                        } else {
                            let mut fields = key_overlap;
                            fields.extend(act_overlap);
                            fields.sort();
                            fields.dedup();
                            merge_edge(edge_map, src, entry, EdgeKind::FieldDependency, fields);
                        }
                    }
                    GraphMode::Fine => {
                        let exit = node_events[b.index()].exit;
                        let key_overlap = field_intersection(writes_a, &table.key_reads);
                        let act_overlap = field_intersection(writes_a, &table.action_reads);
                        let independent = key_overlap.is_empty() && act_overlap.is_empty();
                        if !key_overlap.is_empty() {
                            merge_edge(
                                edge_map,
                                src,
                                entry,
                                EdgeKind::FieldDependency,
                                key_overlap,
                            );
                        }
                        if !act_overlap.is_empty() {
                            merge_edge(
                                edge_map,
                                src,
                                exit,
                                EdgeKind::FieldDependency,
                                act_overlap,
                            );
                        }
                        if independent {
                            // Program order still binds, match-side.
                            merge_edge(edge_map, src, entry, EdgeKind::ControlFlow, Vec::new());
                        }
                    }
                }
            }
            CfNodeKind::Conditional(c) => {
                let entry = node_events[b.index()].entry;
                let overlap = field_intersection(writes_a, &self.hlir.conditional(c).reads);
                if overlap.is_empty() {
                    merge_edge(edge_map, src, entry, EdgeKind::ControlFlow, Vec::new());
                } else {
                    merge_edge(edge_map, src, entry, EdgeKind::FieldDependency, overlap);
                }
            }
        }
    }
}

/// Merge an edge contribution into the accumulator: a field dependency
/// subsumes a control-flow-only edge between the same pair, and duplicate
/// field contributions union their field sets.
fn merge_edge(
    edge_map: &mut BTreeMap<(u32, u32), (EdgeKind, Vec<FieldId>)>,
    source: EventId,
    target: EventId,
    kind: EdgeKind,
    fields: Vec<FieldId>,
) {
    debug_assert_ne!(source, target, "self edges are never emitted");
    let slot = edge_map
        .entry((source.0, target.0))
        .or_insert((EdgeKind::ControlFlow, Vec::new()));
    if kind == EdgeKind::FieldDependency {
        slot.0 = EdgeKind::FieldDependency;
        slot.1.extend(fields);
        slot.1.sort();
        slot.1.dedup();
    }
}

/// Strict reachability over control-flow nodes, by DFS from every node.
fn cf_reachability(hlir: &HlirProgram) -> Vec<Vec<bool>> {
    let n = hlir.cf_nodes.len();
    let mut reach = vec![vec![false; n]; n];
    for start in 0..n {
        let mut stack: Vec<usize> = hlir.cf_nodes[start]
            .succs
            .iter()
            .map(|s| s.index())
            .collect();
        while let Some(node) = stack.pop() {
            if reach[start][node] {
                continue;
            }
            reach[start][node] = true;
            stack.extend(hlir.cf_nodes[node].succs.iter().map(|s| s.index()));
        }
    }
    reach
}

// ── Tests ───────────────────────────────────────────────────────────────────
