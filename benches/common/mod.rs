#![allow(dead_code)]

use termtape::{Term, Variable};

pub fn variables(n: usize) -> Vec<Variable> {
    (0..n).map(|i| Variable::named(format!("x{i}"))).collect()
}

pub fn point(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock(x: &[Variable]) -> Term {
    let mut sum = Term::zero();
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - &x[i];
        let t2 = &x[i + 1] - &x[i] * &x[i];
        sum = sum + &t1 * &t1 + 100.0 * &t2 * &t2;
    }
    sum
}

// ─── Neural network layer ──────────────────────────────────────────────────
// f(x) = Σ_j sigmoid(Σ_i w_ji·x_i + b_j), 4 hidden units, deterministic
// weights w_ji = sin(j·N + i + 1) / (N + 1), b_j = 0.1·(j + 1).

pub fn nn_layer(x: &[Variable]) -> Term {
    let n = x.len();
    let mut out = Term::zero();
    for j in 0..4 {
        let mut z = Term::constant(0.1 * (j + 1) as f64);
        for (i, xi) in x.iter().enumerate() {
            let w = ((j * n + i + 1) as f64).sin() / (n + 1) as f64;
            z = z + w * xi;
        }
        out = out + 1.0 / (1.0 + (-z).exp());
    }
    out
}
