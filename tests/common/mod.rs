#![allow(dead_code)]

use termtape::{compile_with, CompileOptions, CompiledTerm, Engine, Term, Variable};

/// Both engines, for tests that must hold regardless of the executor.
pub const ENGINES: [Engine; 2] = [Engine::Interpreted, Engine::Jit];

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compile_for(term: &Term, variables: &[Variable], engine: Engine) -> CompiledTerm {
    init_logging();
    compile_with(term, variables, &CompileOptions::new().engine(engine)).unwrap()
}

pub fn variables(n: usize) -> Vec<Variable> {
    (0..n).map(|i| Variable::named(format!("x{i}"))).collect()
}

/// Σ (1 - x_i)² + 100 (x_{i+1} - x_i²)²
pub fn rosenbrock(x: &[Variable]) -> Term {
    let mut sum = Term::zero();
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - &x[i];
        let t2 = &x[i + 1] - &x[i] * &x[i];
        sum = sum + &t1 * &t1 + 100.0 * &t2 * &t2;
    }
    sum
}

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

/// Central finite-difference gradient of the compiled term's value.
pub fn finite_diff_gradient(f: &mut CompiledTerm, x: &[f64]) -> Vec<f64> {
    let h = 1e-6;
    let mut probe = x.to_vec();
    (0..x.len())
        .map(|i| {
            let scale = x[i].abs().max(1.0);
            probe[i] = x[i] + h * scale;
            let up = f.evaluate(&probe).unwrap();
            probe[i] = x[i] - h * scale;
            let down = f.evaluate(&probe).unwrap();
            probe[i] = x[i];
            (up - down) / (2.0 * h * scale)
        })
        .collect()
}
