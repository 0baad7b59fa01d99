// pass.rs — Pass descriptor module: metadata, dependency resolution
//
// Declares the analysis passes (parse is outside the runner), their
// dependency edges, and the artifacts they produce. Used by the pipeline
// runner to compute minimal pass subsets for each requested output: the
// parse and table-flow graphs need only the HLIR, the dependency graph
// needs the full chain through scheduling.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each analysis pass (parse excluded — handled before the
/// runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Resolve,
    BuildHlir,
    BuildGraph,
    Reduce,
    Schedule,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type in
/// the analysis state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Resolved, // ResolvedProgram
    Hlir,     // HlirProgram
    Graph,    // DepGraph
    Reduced,  // DepGraph (coarse mode; identity otherwise)
    Schedule, // Schedule
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about an analysis pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// What invalidates this pass's output.
    pub invalidation_key: &'static str,
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Resolve => PassDescriptor {
            name: "resolve",
            inputs: &[],
            outputs: &[ArtifactId::Resolved],
            invalidation_key: "source + primitive registry",
            invariants: "all names checked, symbol tables populated",
        },
        PassId::BuildHlir => PassDescriptor {
            name: "build_hlir",
            inputs: &[PassId::Resolve],
            outputs: &[ArtifactId::Hlir],
            invalidation_key: "program + resolved + primitives",
            invariants: "arenas in declaration order, read/write sets sorted",
        },
        PassId::BuildGraph => PassDescriptor {
            name: "build_graph",
            inputs: &[PassId::BuildHlir],
            outputs: &[ArtifactId::Graph],
            invalidation_key: "hlir + mode",
            invariants: "graph acyclic, one edge per (source, target) pair",
        },
        PassId::Reduce => PassDescriptor {
            name: "reduce",
            inputs: &[PassId::BuildGraph],
            outputs: &[ArtifactId::Reduced],
            invalidation_key: "graph + reduction flag",
            invariants: "reachability preserved, coarse mode only",
        },
        PassId::Schedule => PassDescriptor {
            name: "schedule",
            inputs: &[PassId::Reduce],
            outputs: &[ArtifactId::Schedule],
            invalidation_key: "graph + stage options",
            invariants: "algorithm matches the graph's mode tag",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 5] = [
    PassId::Resolve,
    PassId::BuildHlir,
    PassId::BuildGraph,
    PassId::Reduce,
    PassId::Schedule,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
