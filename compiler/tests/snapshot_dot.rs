// Snapshot tests: lock the DOT output to detect unintended formatting
// changes.
//
// Uses the library API (parse → resolve → build_hlir → build_graph) and
// snapshots the emitted DOT text. Snapshots are managed by `insta` and
// stored under `compiler/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update
// baselines.

use p4dg::diag::DiagLevel;
use p4dg::dot::{emit_dependency_dot, emit_parse_dot, DotOptions};
use p4dg::graph::{build_graph, GraphMode};
use p4dg::hlir::HlirProgram;
use p4dg::primitives::Primitives;

fn hlir_from(source: &str) -> HlirProgram {
    let parse_result = p4dg::parser::parse(source);
    assert!(
        parse_result.errors.is_empty(),
        "parse errors: {:?}",
        parse_result.errors
    );
    let program = parse_result.program.expect("parse failed");
    let primitives = Primitives::standard();
    let resolve_result = p4dg::resolve::resolve(&program, &primitives);
    assert!(
        resolve_result
            .diagnostics
            .iter()
            .all(|d| d.level != DiagLevel::Error),
        "resolve errors: {:#?}",
        resolve_result.diagnostics
    );
    p4dg::hlir::build_hlir(&program, &resolve_result.resolved, &primitives)
}

const PAIR_PROGRAM: &str = "\
header_type m_t {
    fields {
        a : 8;
        b : 8;
    }
}
metadata m_t m;

action wa(v) {
    modify_field(m.a, v);
}
action rb() {
    modify_field(m.b, m.a);
}

table producer {
    actions { wa; }
}
table consumer {
    reads { m.a : exact; }
    actions { rb; }
}

control ingress {
    apply(producer);
    apply(consumer);
}
";

const PARSE_PROGRAM: &str = "\
header_type eth_t {
    fields {
        etherType : 16;
    }
}
header eth_t eth;

parser start {
    extract(eth);
    return select(eth.etherType) {
        0x800 : parse_done;
        default : ingress;
    }
}
parser parse_done {
    return ingress;
}

control ingress { }
";

#[test]
fn dependency_dot_snapshot() {
    let hlir = hlir_from(PAIR_PROGRAM);
    let graph = build_graph(&hlir, GraphMode::Coarse).expect("graph build");
    let dot = emit_dependency_dot(&hlir, &graph, None, &DotOptions::default());
    insta::assert_snapshot!("pair_deps_dot", dot);
}

#[test]
fn parse_dot_snapshot() {
    let hlir = hlir_from(PARSE_PROGRAM);
    let dot = emit_parse_dot(&hlir);
    insta::assert_snapshot!("parse_graph_dot", dot);
}
