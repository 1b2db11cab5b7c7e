//! Reverse-mode gradients against central finite differences.

mod common;

use approx::assert_relative_eq;
use common::{compile_for, finite_diff_gradient, rosenbrock, rosenbrock_f64, variables, ENGINES};
use termtape::{Term, Variable};

fn check_against_fd(term: &Term, vars: &[Variable], points: &[&[f64]]) {
    for engine in ENGINES {
        let mut f = compile_for(term, vars, engine);
        for &p in points {
            let (_, grad) = f.gradient(p).unwrap();
            let fd = finite_diff_gradient(&mut f, p);
            for (g, d) in grad.iter().zip(&fd) {
                assert_relative_eq!(*g, *d, max_relative = 1e-6, epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn rosenbrock_gradient() {
    let vars = variables(4);
    let f = rosenbrock(&vars);
    let x = [0.3, -0.7, 1.1, 0.9];
    check_against_fd(&f, &vars, &[&x, &[1.0, 1.0, 1.0, 1.0]]);

    let mut c = compile_for(&f, &vars, termtape::Engine::Jit);
    assert_relative_eq!(c.evaluate(&x).unwrap(), rosenbrock_f64(&x), max_relative = 1e-14);
}

#[test]
fn quotient_and_negation() {
    let vars = variables(2);
    let (x, y) = (&vars[0], &vars[1]);
    let f = -(x / (y * y + 1.0)) + x.term().powt(y.term().exp());
    check_against_fd(&f, &vars, &[&[0.8, 0.4], &[1.7, -0.3]]);
}

#[test]
fn log_sum_exp() {
    let vars = variables(3);
    let exps: Vec<Term> = vars.iter().map(|v| v.term().exp()).collect();
    let f = Term::sum(exps).unwrap().ln();
    check_against_fd(&f, &vars, &[&[0.1, -0.5, 2.0], &[-3.0, 0.0, 1.0]]);
}

#[test]
fn shared_subexpression() {
    let vars = variables(2);
    let (x, y) = (&vars[0], &vars[1]);
    let s = (x * y).sqrt();
    let f = &s * &s * &s + (&s + 1.0).ln();
    check_against_fd(&f, &vars, &[&[2.0, 3.0], &[0.5, 0.25]]);
}

#[test]
fn fractional_const_powers() {
    let x = Variable::named("x");
    let f = Term::sum([
        x.term().pow(-1.5).unwrap(),
        x.term().pow(0.3).unwrap(),
        x.term().pow(1.0).unwrap(),
    ])
    .unwrap();
    check_against_fd(&f, &[x], &[&[0.7], &[3.2]]);
}
