//! User-supplied functions on both engines.

mod common;

use approx::assert_relative_eq;
use common::{compile_for, variables, ENGINES};
use termtape::{
    compile_with, BinaryFunc, CompileError, CompileOptions, Engine, NaryFunc, NaryOp, Term,
    UnaryFunc,
};

struct LogSumExp;

impl NaryOp for LogSumExp {
    fn eval(&self, args: &[f64]) -> f64 {
        let m = args.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        m + args.iter().map(|a| (a - m).exp()).sum::<f64>().ln()
    }

    fn gradient(&self, args: &[f64], out: &mut [f64]) {
        let lse = self.eval(args);
        for (g, a) in out.iter_mut().zip(args) {
            *g = (a - lse).exp();
        }
    }
}

#[test]
fn unary_sine() {
    let x = variables(1);
    let sin = UnaryFunc::from_fns(f64::sin, f64::cos).with_label("sin");
    let f = Term::unary(sin, &x[0]) * &x[0];
    assert_eq!(f.to_string(), "(sin(x0) * x0)");
    for engine in ENGINES {
        let mut c = compile_for(&f, &x, engine);
        let a = 0.9_f64;
        let (v, g) = c.gradient(&[a]).unwrap();
        assert_relative_eq!(v, a.sin() * a, max_relative = 1e-15);
        assert_relative_eq!(g[0], a.cos() * a + a.sin(), max_relative = 1e-15);
    }
}

#[test]
fn binary_hypot() {
    let v = variables(2);
    let hypot = BinaryFunc::from_fns(f64::hypot, |a, b| {
        let h = a.hypot(b);
        (a / h, b / h)
    });
    let f = Term::binary(hypot, &v[0], &v[1]);
    for engine in ENGINES {
        let mut c = compile_for(&f, &v, engine);
        let (val, g) = c.gradient(&[3.0, 4.0]).unwrap();
        assert_relative_eq!(val, 5.0, max_relative = 1e-15);
        assert_relative_eq!(g[0], 0.6, max_relative = 1e-15);
        assert_relative_eq!(g[1], 0.8, max_relative = 1e-15);
    }
}

#[test]
fn nary_with_shared_argument() {
    let v = variables(2);
    let lse = NaryFunc::new(LogSumExp);
    // Same variable twice: both edges feed one slot.
    let f = Term::nary(lse, [&v[0], &v[1], &v[0]]).unwrap();
    for engine in ENGINES {
        let mut c = compile_for(&f, &v, engine);
        let (a, b) = (0.2_f64, -0.4_f64);
        let (val, g) = c.gradient(&[a, b]).unwrap();
        let z = 2.0 * a.exp() + b.exp();
        assert_relative_eq!(val, z.ln(), max_relative = 1e-14);
        assert_relative_eq!(g[0], 2.0 * a.exp() / z, max_relative = 1e-14);
        assert_relative_eq!(g[1], b.exp() / z, max_relative = 1e-14);
    }
}

#[test]
fn one_callback_object_in_several_nodes() {
    let v = variables(2);
    let square = UnaryFunc::from_fns(|a| a * a, |a| 2.0 * a);
    let f = Term::unary(square.clone(), &v[0]) + Term::unary(square, &v[1]);
    for engine in ENGINES {
        let mut c = compile_for(&f, &v, engine);
        let (val, g) = c.gradient(&[1.5, -2.0]).unwrap();
        assert_eq!(val, 6.25);
        assert_eq!(g, vec![3.0, -4.0]);
    }
}

#[test]
fn jit_can_refuse_callbacks() {
    let v = variables(1);
    let f = Term::unary(UnaryFunc::from_fns(f64::tanh, |a| 1.0 - a.tanh().powi(2)), &v[0]);
    let opts = CompileOptions::new().engine(Engine::Jit).opaque_calls(false);
    let err = compile_with(&f, &v, &opts).unwrap_err();
    assert_eq!(err, CompileError::CallbacksNotSupported { count: 1 });

    // The interpreter ignores the flag.
    let opts = opts.engine(Engine::Interpreted);
    assert!(compile_with(&f, &v, &opts).is_ok());

    // Without callbacks the flag is irrelevant.
    let plain = v[0].term().exp();
    let opts = opts.engine(Engine::Jit);
    assert!(compile_with(&plain, &v, &opts).is_ok());
}
