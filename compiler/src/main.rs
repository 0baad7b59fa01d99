use clap::Parser;
use std::path::PathBuf;

use p4dg::dot::DotOptions;
use p4dg::graph::GraphMode;
use p4dg::pass::PassId;
use p4dg::pipeline::{run_analysis, AnalysisOptions, PipelineError};
use p4dg::preprocess::PreprocessOptions;
use p4dg::render::{render_dot, RenderError, SKIP_SENTINEL};
use p4dg::schedule::{Schedule, StageOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum GraphKind {
    /// Parser state graph.
    Parse,
    /// Per-control table flow graph.
    Table,
    /// Table dependency graph with stage analysis.
    Deps,
}

#[derive(Parser, Debug)]
#[command(
    name = "p4dg",
    version,
    about = "P4 table dependency graph analyzer — estimates pipeline stage requirements"
)]
struct Cli {
    /// Input P4 source file
    source: PathBuf,

    /// Output directory for graph descriptions (must exist)
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Preprocessor definition, NAME=VALUE (repeatable)
    #[arg(short = 'D', long = "define")]
    define: Vec<String>,

    /// Include search directory (repeatable)
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Supplementary primitive-definition JSON document (repeatable)
    #[arg(long)]
    primitives: Vec<PathBuf>,

    /// Graph kinds to produce (repeatable)
    #[arg(long, value_enum, default_values_t = [GraphKind::Deps])]
    graphs: Vec<GraphKind>,

    /// Build the split match/action graph instead of the whole-table one
    #[arg(long)]
    split: bool,

    /// Skip transitive reduction (coarse mode)
    #[arg(long)]
    no_reduce: bool,

    /// Draw only critical-path edges (split mode)
    #[arg(long)]
    critical_only: bool,

    /// Treat conditional nodes as zero-cost pass-throughs in stage counts
    #[arg(long)]
    conditionals_free: bool,

    /// Do not draw control-flow-only edges
    #[arg(long)]
    no_control_edges: bool,

    /// Include condition source text in node labels
    #[arg(long)]
    show_conditions: bool,

    /// Suppress field sets on edge labels
    #[arg(long)]
    no_fields: bool,

    /// Print intermediate stage/width computations and annotate labels
    #[arg(long)]
    debug: bool,

    /// Rendering output format, tried in order; 'none' means emit only the
    /// textual graph description (repeatable)
    #[arg(long = "format", default_values_t = [SKIP_SENTINEL.to_string()])]
    formats: Vec<String>,

    /// Also write an analysis provenance JSON next to the graphs
    #[arg(long)]
    provenance: bool,
}

fn main() {
    let cli = Cli::parse();

    // ── Configuration checks, before any analysis work ──
    if !cli.out.is_dir() {
        eprintln!(
            "p4dg: error: output directory '{}' does not exist",
            cli.out.display()
        );
        std::process::exit(2);
    }

    let mut primitives = p4dg::primitives::Primitives::standard();
    for path in &cli.primitives {
        match primitives.load_json(path) {
            Ok(n) => {
                if cli.debug {
                    eprintln!("p4dg: loaded {} primitive(s) from {}", n, path.display());
                }
            }
            Err(e) => {
                eprintln!("p4dg: error: {}", e);
                std::process::exit(2);
            }
        }
    }

    let mut defines = Vec::new();
    for spec in &cli.define {
        match spec.split_once('=') {
            Some((name, value)) => defines.push((name.to_string(), value.to_string())),
            None => defines.push((spec.clone(), String::new())),
        }
    }
    let pre_opts = PreprocessOptions {
        include_dirs: cli.include.clone(),
        defines,
    };

    let source = match p4dg::preprocess::preprocess(&cli.source, &pre_opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("p4dg: error: {}", e);
            std::process::exit(2);
        }
    };

    // ── Analysis ──
    let mut graphs = cli.graphs.clone();
    let mut seen = Vec::new();
    graphs.retain(|g| {
        if seen.contains(g) {
            false
        } else {
            seen.push(*g);
            true
        }
    });

    let terminal = if graphs.contains(&GraphKind::Deps) {
        PassId::Schedule
    } else {
        PassId::BuildHlir
    };

    let options = AnalysisOptions {
        mode: if cli.split {
            GraphMode::Fine
        } else {
            GraphMode::Coarse
        },
        reduce: !cli.no_reduce,
        stage_options: StageOptions {
            conditionals_occupy: !cli.conditionals_free,
        },
    };

    let state = match run_analysis(&source, &primitives, &options, terminal) {
        Ok(state) => state,
        Err(err) => {
            report_pipeline_error(&err);
            std::process::exit(1);
        }
    };

    for warning in &state.warnings {
        eprintln!("p4dg: {}", warning);
    }

    if cli.debug {
        eprint!("{}", state.hlir);
        print_debug_schedule(&state);
    }

    // ── Export ──
    let stem = cli
        .source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());

    let dot_opts = DotOptions {
        show_control_edges: !cli.no_control_edges,
        show_fields: !cli.no_fields,
        show_conditions: cli.show_conditions,
        critical_only: cli.critical_only,
        debug_labels: cli.debug,
    };

    let mut render_failed = false;

    for kind in &graphs {
        let (suffix, text) = match kind {
            GraphKind::Parse => ("parse", p4dg::dot::emit_parse_dot(&state.hlir)),
            GraphKind::Table => ("tables", p4dg::dot::emit_table_dot(&state.hlir)),
            GraphKind::Deps => {
                let graph = state
                    .graph
                    .as_ref()
                    .expect("dependency graph present for deps output");
                (
                    "deps",
                    p4dg::dot::emit_dependency_dot(
                        &state.hlir,
                        graph,
                        state.schedule.as_ref(),
                        &dot_opts,
                    ),
                )
            }
        };

        let dot_path = cli.out.join(format!("{stem}.{suffix}.dot"));
        if let Err(e) = std::fs::write(&dot_path, &text) {
            eprintln!("p4dg: error: {}: {}", dot_path.display(), e);
            std::process::exit(2);
        }
        println!("p4dg: wrote {}", dot_path.display());

        match render_dot(&dot_path, &cli.formats) {
            Ok(p4dg::render::RenderOutcome::Rendered { path, .. }) => {
                println!("p4dg: rendered {}", path.display());
            }
            Ok(p4dg::render::RenderOutcome::Skipped) => {}
            Err(e @ RenderError::ToolMissing { .. }) => {
                // The analysis and .dot text stand; the exit code reports
                // the unavailable renderer.
                eprintln!("p4dg: {}", e);
                render_failed = true;
            }
            Err(e) => {
                eprintln!("p4dg: {}", e);
                render_failed = true;
            }
        }
    }

    if cli.provenance {
        let path = cli.out.join(format!("{stem}.provenance.json"));
        if let Err(e) = std::fs::write(&path, state.provenance.to_json()) {
            eprintln!("p4dg: error: {}: {}", path.display(), e);
            std::process::exit(2);
        }
        println!("p4dg: wrote {}", path.display());
    }

    if render_failed {
        std::process::exit(1);
    }
}

fn report_pipeline_error(err: &PipelineError) {
    match err {
        PipelineError::Parse(errors) => {
            for e in errors {
                eprintln!("p4dg: parse error: {}", e);
            }
        }
        PipelineError::Resolve(diags) => {
            for d in diags {
                eprintln!("p4dg: {}", d);
            }
        }
        PipelineError::Structural(e) => eprintln!("p4dg: error: {}", e),
        PipelineError::Cycle(e) => eprintln!("p4dg: internal error: {}", e),
    }
}

fn print_debug_schedule(state: &p4dg::pipeline::AnalysisState) {
    let (graph, sched) = match (&state.graph, &state.schedule) {
        (Some(g), Some(s)) => (g, s),
        _ => return,
    };
    match sched {
        Schedule::Stages(stages) => {
            eprintln!("p4dg: minimum stages = {}", stages.min_stages);
            for (event, &stage) in graph.events.iter().zip(stages.stages.iter()) {
                eprintln!("p4dg:   stage {:>2}  {}", stage, event.label);
            }
        }
        Schedule::CriticalPath(cp) => {
            eprintln!("p4dg: critical path spans {} stage(s)", cp.length);
            for &e in &cp.critical_edges {
                let edge = &graph.edges[e];
                eprintln!(
                    "p4dg:   {} -> {}",
                    graph.events[edge.source.index()].label,
                    graph.events[edge.target.index()].label
                );
            }
        }
    }
}
