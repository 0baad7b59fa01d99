use criterion::{black_box, criterion_group, criterion_main, Criterion};

use p4dg::graph::{build_graph, GraphMode};
use p4dg::pass::PassId;
use p4dg::pipeline::{run_analysis, AnalysisOptions};
use p4dg::primitives::Primitives;
use p4dg::reduce::transitive_reduction;
use p4dg::schedule::{count_min_stages, critical_path, StageOptions};

// A mid-size pipeline: a chain of dependent tables plus an independent
// branch pair, enough structure for the reducer and both schedulers to do
// real work.

const PIPELINE: &str = r#"
header_type meta_t {
    fields {
        f0 : 16;
        f1 : 16;
        f2 : 16;
        f3 : 16;
        f4 : 16;
        f5 : 16;
    }
}
metadata meta_t meta;

action w0(v) { modify_field(meta.f0, v); }
action w1() { modify_field(meta.f1, meta.f0); }
action w2() { modify_field(meta.f2, meta.f1); }
action w3() { modify_field(meta.f3, meta.f2); }
action w4() { modify_field(meta.f4, meta.f3); }
action w5(v) { modify_field(meta.f5, v); }
action look() { no_op(); }

table t0 { actions { w0; } }
table t1 { reads { meta.f0 : exact; } actions { w1; } }
table t2 { reads { meta.f1 : exact; } actions { w2; } }
table t3 { reads { meta.f2 : ternary; } actions { w3; } }
table t4 { reads { meta.f3 : exact; } actions { w4; } }
table left { actions { w5; } }
table right { reads { meta.f5 : exact; } actions { look; } }

control ingress {
    apply(t0);
    apply(t1);
    apply(t2);
    if (meta.f4 == 0) {
        apply(left);
    } else {
        apply(right);
    }
    apply(t3);
    apply(t4);
}
"#;

fn build_hlir() -> p4dg::hlir::HlirProgram {
    let primitives = Primitives::standard();
    let parse_result = p4dg::parser::parse(PIPELINE);
    assert!(parse_result.errors.is_empty());
    let program = parse_result.program.unwrap();
    let resolved = p4dg::resolve::resolve(&program, &primitives);
    p4dg::hlir::build_hlir(&program, &resolved.resolved, &primitives)
}

fn bench_graph_build(c: &mut Criterion) {
    let hlir = build_hlir();
    c.bench_function("build_graph_coarse", |b| {
        b.iter(|| build_graph(black_box(&hlir), GraphMode::Coarse).unwrap())
    });
    c.bench_function("build_graph_fine", |b| {
        b.iter(|| build_graph(black_box(&hlir), GraphMode::Fine).unwrap())
    });
}

fn bench_reduce(c: &mut Criterion) {
    let hlir = build_hlir();
    let graph = build_graph(&hlir, GraphMode::Coarse).unwrap();
    c.bench_function("transitive_reduction", |b| {
        b.iter(|| transitive_reduction(black_box(&graph)))
    });
}

fn bench_schedulers(c: &mut Criterion) {
    let hlir = build_hlir();
    let coarse = transitive_reduction(&build_graph(&hlir, GraphMode::Coarse).unwrap());
    let fine = build_graph(&hlir, GraphMode::Fine).unwrap();
    let opts = StageOptions::default();
    c.bench_function("count_min_stages", |b| {
        b.iter(|| count_min_stages(black_box(&coarse), &opts).unwrap())
    });
    c.bench_function("critical_path", |b| {
        b.iter(|| critical_path(black_box(&fine)).unwrap())
    });
}

fn bench_end_to_end(c: &mut Criterion) {
    let primitives = Primitives::standard();
    c.bench_function("run_analysis", |b| {
        b.iter(|| {
            run_analysis(
                black_box(PIPELINE),
                &primitives,
                &AnalysisOptions::default(),
                PassId::Schedule,
            )
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_graph_build,
    bench_reduce,
    bench_schedulers,
    bench_end_to_end
);
criterion_main!(benches);
