//! Arithmetic operators for building terms.
//!
//! Every operator allocates fresh nodes and performs no simplification:
//!
//! | expression | node built                      |
//! |------------|---------------------------------|
//! | `a + b`    | `Sum[a, b]`                     |
//! | `a - b`    | `Sum[a, Product(-1, b)]`        |
//! | `a * b`    | `Product(a, b)`                 |
//! | `a / b`    | `Product(a, ConstPower(b, -1))` |
//! | `-a`       | `Product(-1, a)`                |

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::term::{Term, Variable};

#[inline]
fn add(lhs: Term, rhs: Term) -> Term {
    Term::sum2(lhs, rhs)
}

#[inline]
fn sub(lhs: Term, rhs: Term) -> Term {
    Term::sum2(lhs, Term::negated(rhs))
}

#[inline]
fn mul(lhs: Term, rhs: Term) -> Term {
    Term::product(lhs, rhs)
}

#[inline]
fn div(lhs: Term, rhs: Term) -> Term {
    Term::product(lhs, Term::reciprocal(rhs))
}

// Binary operators for every pairing of operand types.
macro_rules! impl_binary_ops {
    ($lhs:ty, $rhs:ty) => {
        impl Add<$rhs> for $lhs {
            type Output = Term;
            #[inline]
            fn add(self, rhs: $rhs) -> Term {
                add(Term::from(self), Term::from(rhs))
            }
        }

        impl Sub<$rhs> for $lhs {
            type Output = Term;
            #[inline]
            fn sub(self, rhs: $rhs) -> Term {
                sub(Term::from(self), Term::from(rhs))
            }
        }

        impl Mul<$rhs> for $lhs {
            type Output = Term;
            #[inline]
            fn mul(self, rhs: $rhs) -> Term {
                mul(Term::from(self), Term::from(rhs))
            }
        }

        impl Div<$rhs> for $lhs {
            type Output = Term;
            #[inline]
            fn div(self, rhs: $rhs) -> Term {
                div(Term::from(self), Term::from(rhs))
            }
        }
    };
}

macro_rules! impl_ops_for {
    ($lhs:ty) => {
        impl_binary_ops!($lhs, Term);
        impl_binary_ops!($lhs, &Term);
        impl_binary_ops!($lhs, Variable);
        impl_binary_ops!($lhs, &Variable);
        impl_binary_ops!($lhs, f64);
        impl_binary_ops!(f64, $lhs);

        impl Neg for $lhs {
            type Output = Term;
            #[inline]
            fn neg(self) -> Term {
                Term::negated(Term::from(self))
            }
        }
    };
}

impl_ops_for!(Term);
impl_ops_for!(&Term);
impl_ops_for!(Variable);
impl_ops_for!(&Variable);

// Compound assignment rebinds the handle to a new node; other handles to the
// old node are unaffected.
macro_rules! impl_assign_op {
    ($trait:ident, $method:ident, $build:ident) => {
        impl<R: Into<Term>> $trait<R> for Term {
            #[inline]
            fn $method(&mut self, rhs: R) {
                let lhs = std::mem::replace(self, Term::zero());
                *self = $build(lhs, rhs.into());
            }
        }
    };
}

impl_assign_op!(AddAssign, add_assign, add);
impl_assign_op!(SubAssign, sub_assign, sub);
impl_assign_op!(MulAssign, mul_assign, mul);
impl_assign_op!(DivAssign, div_assign, div);

#[cfg(test)]
mod tests {
    use crate::term::{TermKind, Variable};
    use crate::Term;

    #[test]
    fn operators_build_expected_nodes() {
        let x = Variable::named("x");
        let y = Variable::named("y");
        assert_eq!((&x + &y).to_string(), "(x + y)");
        assert_eq!((&x - &y).to_string(), "(x + (-1 * y))");
        assert_eq!((&x * 2.0).to_string(), "(x * 2)");
        assert_eq!((1.0 / &x).to_string(), "(1 * x^-1)");
        assert_eq!((-&x).to_string(), "(-1 * x)");
    }

    #[test]
    fn no_simplification() {
        let x = Variable::new();
        let t = &x * 1.0 + 0.0;
        assert!(matches!(t.kind(), TermKind::Sum(terms) if terms.len() == 2));
    }

    #[test]
    fn operands_keep_identity() {
        let x = Variable::new();
        let sq = &x * &x;
        let t = &sq + &sq;
        let ops = t.operands();
        assert!(ops[0].same_node(&ops[1]));
        assert!(ops[0].operands()[0].same_node(x.term()));
    }

    #[test]
    fn assign_ops_rebind() {
        let x = Variable::named("x");
        let mut acc = Term::from(&x);
        let before = acc.clone();
        acc += 1.0;
        acc *= &x;
        assert_eq!(acc.to_string(), "((x + 1) * x)");
        assert_eq!(before.to_string(), "x");
    }
}
