//! Value and partial-derivative rules for the built-in tape operations.
//!
//! [`eval_forward`] computes a node's value from its operand values and
//! [`reverse_partials`] the local partials that become edge weights. Both
//! engines call these, which keeps their results bit-for-bit comparable.
//! `Sum` and the callback operations are n-ary or opaque and are handled by
//! the engines directly.

use num_traits::Float;

use crate::tape::Op;

/// Evaluate a fixed-arity built-in operation.
///
/// `a` is the first operand value, `b` the second (ignored by unary ops).
#[inline]
pub fn eval_forward<T: Float>(op: Op, a: T, b: T) -> T {
    match op {
        Op::Product => a * b,
        Op::ConstPower(k) => const_power(a, k),
        Op::TermPower => a.powf(b),
        Op::Exp => a.exp(),
        Op::Log => a.ln(),
        Op::Input | Op::Const => {
            unreachable!("Input/Const values are set when the tape is built or loaded")
        }
        Op::Sum | Op::Unary(_) | Op::Binary(_) | Op::Nary(_) => {
            unreachable!("{op:?} is dispatched by the engine")
        }
    }
}

/// Partials `(∂r/∂a, ∂r/∂b)` of a fixed-arity built-in operation, where `r`
/// is the already computed result. The second partial is zero for unary ops.
#[inline]
pub fn reverse_partials<T: Float>(op: Op, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    match op {
        Op::Product => (b, a),
        Op::ConstPower(k) => (const_power_partial(a, k), zero),
        Op::TermPower => {
            // d/da a^b = b * a^(b-1)
            // d/db a^b = a^b * ln(a)
            (b * a.powf(b - T::one()), r * a.ln())
        }
        Op::Exp => (r, zero),
        Op::Log => (T::one() / a, zero),
        Op::Input | Op::Const => (zero, zero),
        Op::Sum | Op::Unary(_) | Op::Binary(_) | Op::Nary(_) => {
            unreachable!("{op:?} is dispatched by the engine")
        }
    }
}

/// `b ^ k` for a constant exponent.
#[inline]
pub fn const_power<T: Float>(b: T, k: f64) -> T {
    if k == 1.0 {
        return b;
    }
    b.powf(lift(k))
}

/// `k · b ^ (k - 1)`.
#[inline]
pub fn const_power_partial<T: Float>(b: T, k: f64) -> T {
    if k == 1.0 {
        return T::one();
    }
    lift::<T>(k) * b.powf(lift(k - 1.0))
}

#[inline]
fn lift<T: Float>(k: f64) -> T {
    T::from(k).unwrap_or_else(T::nan)
}
