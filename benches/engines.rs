use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use termtape::{compile_with, CompileOptions, Engine};

mod common;
use common::{nn_layer, point, rosenbrock, variables};

const ENGINES: [(Engine, &str); 2] = [(Engine::Interpreted, "interpreted"), (Engine::Jit, "jit")];

/// Gradient per call on an already compiled term.
fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("gradient");
    for n in [2, 10, 100] {
        let vars = variables(n);
        let f = rosenbrock(&vars);
        let x = point(n);
        for (engine, label) in ENGINES {
            let mut compiled = compile_with(&f, &vars, &CompileOptions::new().engine(engine)).unwrap();
            let mut grad = vec![0.0; n];
            group.bench_with_input(BenchmarkId::new(label, n), &x, |b, x| {
                b.iter(|| black_box(compiled.differentiate(black_box(x), &mut grad).unwrap()))
            });
        }
    }
    group.finish();
}

/// Value only.
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for n in [10, 100] {
        let vars = variables(n);
        let f = nn_layer(&vars);
        let x = point(n);
        for (engine, label) in ENGINES {
            let mut compiled = compile_with(&f, &vars, &CompileOptions::new().engine(engine)).unwrap();
            group.bench_with_input(BenchmarkId::new(label, n), &x, |b, x| {
                b.iter(|| black_box(compiled.evaluate(black_box(x)).unwrap()))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_gradient, bench_evaluate);
criterion_main!(benches);
