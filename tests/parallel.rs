#![cfg(feature = "parallel")]

mod common;

use common::{compile_for, rosenbrock, variables, ENGINES};
use termtape::ArgumentError;

#[test]
fn gradient_batch_par_matches_serial() {
    let vars = variables(5);
    let f = rosenbrock(&vars);
    let points: Vec<Vec<f64>> = (0..64)
        .map(|k| (0..5).map(|i| 0.1 * (k as f64) - 0.3 * i as f64).collect())
        .collect();
    let refs: Vec<&[f64]> = points.iter().map(Vec::as_slice).collect();

    for engine in ENGINES {
        let mut serial = compile_for(&f, &vars, engine);
        let expected = serial.gradient_batch(&refs).unwrap();
        let parallel = serial.gradient_batch_par(&refs).unwrap();
        assert_eq!(parallel, expected);
    }
}

#[test]
fn evaluate_batch_par_in_order() {
    let vars = variables(2);
    let f = &vars[0] * &vars[1];
    let c = compile_for(&f, &vars, termtape::Engine::Jit);
    let points: Vec<[f64; 2]> = (0..100).map(|k| [k as f64, 2.0]).collect();
    let refs: Vec<&[f64]> = points.iter().map(|p| &p[..]).collect();
    let values = c.evaluate_batch_par(&refs).unwrap();
    let expected: Vec<f64> = (0..100).map(|k| 2.0 * k as f64).collect();
    assert_eq!(values, expected);
}

#[test]
fn bad_point_rejects_whole_batch() {
    let vars = variables(2);
    let c = compile_for(&(&vars[0] + &vars[1]), &vars, termtape::Engine::Interpreted);
    let good = [1.0, 2.0];
    let bad = [1.0];
    let err = c.gradient_batch_par(&[&good[..], &bad[..]]).unwrap_err();
    assert_eq!(
        err,
        ArgumentError::LengthMismatch {
            what: "point",
            expected: 2,
            got: 1
        }
    );
}
