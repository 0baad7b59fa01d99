// pipeline.rs — Analysis state and pass orchestration
//
// Runs the minimal pass chain for a requested terminal pass over one
// source snapshot, holding all artifacts in a single state struct. Also
// computes analysis provenance (source hash + primitive registry
// fingerprint) for hermetic, reproducible runs.
//
// Preconditions: `source` is preprocessed P4 text.
// Postconditions: artifacts for every required pass are populated, or a
//                 `PipelineError` is returned with nothing partial.
// Failure modes: parse errors, error-level resolve diagnostics, structural
//                or cycle errors from the core.
// Side effects: none.

use crate::diag::{has_errors, DiagLevel, Diagnostic};
use crate::graph::{build_graph, DepGraph, GraphMode, StructuralError};
use crate::hlir::{build_hlir, HlirProgram};
use crate::pass::{required_passes, PassId};
use crate::primitives::Primitives;
use crate::reduce::transitive_reduction;
use crate::schedule::{schedule, CycleError, Schedule, StageOptions};

// ── Options ─────────────────────────────────────────────────────────────────

/// Per-run analysis configuration: the mode pairing is fixed here once,
/// then flows to both the builder and the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub mode: GraphMode,
    /// Apply transitive reduction (coarse mode only; fine mode never
    /// reduces).
    pub reduce: bool,
    pub stage_options: StageOptions,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            mode: GraphMode::Coarse,
            reduce: true,
            stage_options: StageOptions::default(),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum PipelineError {
    /// Lex/parse errors, already formatted.
    Parse(Vec<String>),
    /// Error-level diagnostics from resolution.
    Resolve(Vec<Diagnostic>),
    Structural(StructuralError),
    Cycle(CycleError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Parse(errors) => {
                write!(f, "{} parse error(s)", errors.len())
            }
            PipelineError::Resolve(diags) => {
                write!(f, "{} resolve error(s)", diags.len())
            }
            PipelineError::Structural(e) => write!(f, "{e}"),
            PipelineError::Cycle(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<StructuralError> for PipelineError {
    fn from(e: StructuralError) -> Self {
        PipelineError::Structural(e)
    }
}

impl From<CycleError> for PipelineError {
    fn from(e: CycleError) -> Self {
        PipelineError::Cycle(e)
    }
}

// ── Provenance ──────────────────────────────────────────────────────────────

/// Provenance metadata for hermetic runs.
///
/// `source_hash`: SHA-256 of the preprocessed source text.
/// `primitives_fingerprint`: SHA-256 of `Primitives::canonical_json()`.
/// `analyzer_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub primitives_fingerprint: [u8; 32],
    pub analyzer_version: &'static str,
}

impl Provenance {
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    pub fn primitives_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.primitives_fingerprint)
    }

    /// Serialize as a JSON string for the `--provenance` output.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"primitives_fingerprint\": \"{}\",\n  \"analyzer_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.primitives_fingerprint_hex(),
            self.analyzer_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from source text and the primitive registry.
///
/// The registry fingerprint is computed from compact canonical JSON so it
/// is stable regardless of document merge order.
pub fn compute_provenance(source: &str, primitives: &Primitives) -> Provenance {
    use sha2::{Digest, Sha256};

    let source_hash = {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    let primitives_fingerprint = {
        let mut hasher = Sha256::new();
        hasher.update(primitives.canonical_json().as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance {
        source_hash,
        primitives_fingerprint,
        analyzer_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Analysis state ──────────────────────────────────────────────────────────

/// All artifacts produced by one run.
#[derive(Debug)]
pub struct AnalysisState {
    pub hlir: HlirProgram,
    /// Dependency graph, post-reduction when reduction applies.
    pub graph: Option<DepGraph>,
    pub schedule: Option<Schedule>,
    /// Warning-level diagnostics accumulated along the way.
    pub warnings: Vec<Diagnostic>,
    pub provenance: Provenance,
}

// ── Runner ──────────────────────────────────────────────────────────────────

/// Run the analysis chain up to (and including) `terminal`.
pub fn run_analysis(
    source: &str,
    primitives: &Primitives,
    options: &AnalysisOptions,
    terminal: PassId,
) -> Result<AnalysisState, PipelineError> {
    let provenance = compute_provenance(source, primitives);

    // Parse sits outside the pass runner.
    let parse_result = crate::parser::parse(source);
    if !parse_result.errors.is_empty() {
        return Err(PipelineError::Parse(
            parse_result
                .errors
                .iter()
                .map(|e| format!("{e:?}"))
                .collect(),
        ));
    }
    let program = match parse_result.program {
        Some(p) => p,
        None => {
            return Err(PipelineError::Parse(vec![
                "parse produced no output".to_string()
            ]))
        }
    };

    let mut warnings = Vec::new();
    let mut resolved = None;
    let mut hlir = None;
    let mut graph: Option<DepGraph> = None;
    let mut sched = None;

    // Every consumer of the state needs the HLIR, so the chain always
    // runs at least that far.
    let mut passes = required_passes(terminal);
    if !passes.contains(&PassId::BuildHlir) {
        passes = required_passes(PassId::BuildHlir);
    }

    for pass in passes {
        match pass {
            PassId::Resolve => {
                let result = crate::resolve::resolve(&program, primitives);
                if has_errors(&result.diagnostics) {
                    return Err(PipelineError::Resolve(
                        result
                            .diagnostics
                            .into_iter()
                            .filter(|d| d.level == DiagLevel::Error)
                            .collect(),
                    ));
                }
                warnings.extend(result.diagnostics);
                resolved = Some(result.resolved);
            }
            PassId::BuildHlir => {
                let resolved = resolved.as_ref().expect("resolve runs before build_hlir");
                hlir = Some(build_hlir(&program, resolved, primitives));
            }
            PassId::BuildGraph => {
                let hlir = hlir.as_ref().expect("build_hlir runs before build_graph");
                graph = Some(build_graph(hlir, options.mode)?);
            }
            PassId::Reduce => {
                // Reduction is only valid at the coarse granularity; the
                // fine graph must keep every edge for critical-path
                // reporting.
                if options.reduce && options.mode == GraphMode::Coarse {
                    let full = graph.take().expect("build_graph runs before reduce");
                    graph = Some(transitive_reduction(&full));
                }
            }
            PassId::Schedule => {
                let graph = graph.as_ref().expect("build_graph runs before schedule");
                sched = Some(schedule(graph, &options.stage_options)?);
            }
        }
    }

    let hlir = hlir.expect("terminal pass implies build_hlir");

    Ok(AnalysisState {
        hlir,
        graph,
        schedule: sched,
        warnings,
        provenance,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Schedule;

    const PROGRAM: &str = "\
header_type meta_t {
    fields {
        next_hop : 16;
        port : 9;
    }
}
metadata meta_t meta;

action pick_hop(h) {
    modify_field(meta.next_hop, h);
}
action pick_port(p) {
    modify_field(meta.port, p);
}

table t1 {
    actions { pick_hop; }
}
table t2 {
    reads { meta.next_hop : exact; }
    actions { pick_port; }
}

control ingress {
    apply(t1);
    apply(t2);
}
";

    #[test]
    fn full_chain_produces_schedule() {
        let primitives = Primitives::standard();
        let state = run_analysis(
            PROGRAM,
            &primitives,
            &AnalysisOptions::default(),
            PassId::Schedule,
        )
        .expect("analysis failed");
        assert!(state.graph.is_some());
        match state.schedule {
            Some(Schedule::Stages(ref s)) => assert_eq!(s.min_stages, 2),
            ref other => panic!("expected Stages, got {other:?}"),
        }
    }

    #[test]
    fn hlir_terminal_skips_graph() {
        let primitives = Primitives::standard();
        let state = run_analysis(
            PROGRAM,
            &primitives,
            &AnalysisOptions::default(),
            PassId::BuildHlir,
        )
        .expect("analysis failed");
        assert!(state.graph.is_none());
        assert!(state.schedule.is_none());
        assert_eq!(state.hlir.tables.len(), 2);
    }

    #[test]
    fn fine_mode_yields_critical_path() {
        let primitives = Primitives::standard();
        let options = AnalysisOptions {
            mode: GraphMode::Fine,
            ..AnalysisOptions::default()
        };
        let state =
            run_analysis(PROGRAM, &primitives, &options, PassId::Schedule).expect("analysis");
        match state.schedule {
            Some(Schedule::CriticalPath(ref cp)) => assert_eq!(cp.length, 2),
            ref other => panic!("expected CriticalPath, got {other:?}"),
        }
        // Fine mode keeps every edge: intra edges plus the dependency.
        assert_eq!(state.graph.as_ref().unwrap().edge_count(), 3);
    }

    #[test]
    fn reduction_flag_respected() {
        // Three chained tables: the t1→t3 shortcut survives --no-reduce.
        let source = "\
header_type m_t { fields { a : 8; b : 8; } }
metadata m_t m;
action wa(v) { modify_field(m.a, v); }
action wb(v) { modify_field(m.b, v); }
action n() { no_op(); }
table t1 { actions { wa; } }
table t2 { reads { m.a : exact; } actions { wb; } }
table t3 { actions { n; } }
control ingress { apply(t1); apply(t2); apply(t3); }
";
        let primitives = Primitives::standard();
        let reduced = run_analysis(
            source,
            &primitives,
            &AnalysisOptions::default(),
            PassId::Schedule,
        )
        .unwrap();
        let unreduced = run_analysis(
            source,
            &primitives,
            &AnalysisOptions {
                reduce: false,
                ..AnalysisOptions::default()
            },
            PassId::Schedule,
        )
        .unwrap();
        assert_eq!(reduced.graph.as_ref().unwrap().edge_count(), 2);
        assert_eq!(unreduced.graph.as_ref().unwrap().edge_count(), 3);

        // Stage-count invariance under reduction.
        match (&reduced.schedule, &unreduced.schedule) {
            (Some(Schedule::Stages(a)), Some(Schedule::Stages(b))) => {
                assert_eq!(a.min_stages, b.min_stages);
            }
            other => panic!("expected coarse schedules, got {other:?}"),
        }
    }

    #[test]
    fn parse_errors_abort() {
        let primitives = Primitives::standard();
        let err = run_analysis(
            "table { }",
            &primitives,
            &AnalysisOptions::default(),
            PassId::Schedule,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn resolve_errors_abort_with_only_errors() {
        let primitives = Primitives::standard();
        let err = run_analysis(
            "header missing_t h;\naction n() { no_op(); }\ntable t { actions { n; } }\ncontrol ingress { apply(t); }",
            &primitives,
            &AnalysisOptions::default(),
            PassId::Schedule,
        )
        .unwrap_err();
        match err {
            PipelineError::Resolve(diags) => {
                assert!(!diags.is_empty());
                assert!(diags.iter().all(|d| d.level == DiagLevel::Error));
            }
            other => panic!("expected Resolve, got {other:?}"),
        }
    }

    #[test]
    fn warnings_do_not_abort() {
        let primitives = Primitives::standard();
        let state = run_analysis(
            "action n() { no_op(); }\ntable orphan { actions { n; } }",
            &primitives,
            &AnalysisOptions::default(),
            PassId::Schedule,
        )
        .expect("warnings must not abort");
        assert!(!state.warnings.is_empty());
    }

    #[test]
    fn provenance_stable_and_sensitive() {
        let primitives = Primitives::standard();
        let a = compute_provenance(PROGRAM, &primitives);
        let b = compute_provenance(PROGRAM, &primitives);
        assert_eq!(a.source_hash, b.source_hash);
        assert_eq!(a.primitives_fingerprint, b.primitives_fingerprint);

        let c = compute_provenance("control ingress { }", &primitives);
        assert_ne!(a.source_hash, c.source_hash);

        let json = a.to_json();
        assert!(json.contains(&a.source_hash_hex()));
        assert_eq!(a.source_hash_hex().len(), 64);
    }
}
