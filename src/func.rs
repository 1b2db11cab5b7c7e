//! User-supplied functions with caller-provided derivatives.
//!
//! Implement [`UnaryOp`], [`BinaryOp`] or [`NaryOp`] for a function that is
//! not expressible in the built-in term algebra, or wrap a pair of closures
//! with [`UnaryFunc::from_fns`] and friends. Both engines treat these as
//! opaque: the value and the partials come only from the callbacks.
//!
//! # Example
//!
//! ```
//! use termtape::{UnaryFunc, UnaryOp};
//!
//! struct Softplus;
//!
//! impl UnaryOp for Softplus {
//!     fn eval(&self, a: f64) -> f64 {
//!         (1.0 + a.exp()).ln()
//!     }
//!     fn derivative(&self, a: f64) -> f64 {
//!         1.0 / (1.0 + (-a).exp())
//!     }
//! }
//!
//! let softplus = UnaryFunc::new(Softplus);
//! assert!((softplus.eval(0.0) - 2f64.ln()).abs() < 1e-15);
//! ```

use std::fmt;
use std::sync::Arc;

/// A scalar function of one argument together with its derivative.
pub trait UnaryOp: Send + Sync {
    /// `f(a)`.
    fn eval(&self, a: f64) -> f64;
    /// `f'(a)`.
    fn derivative(&self, a: f64) -> f64;
}

/// A scalar function of two arguments together with its partials.
pub trait BinaryOp: Send + Sync {
    /// `f(a, b)`.
    fn eval(&self, a: f64, b: f64) -> f64;
    /// `(∂f/∂a, ∂f/∂b)`.
    fn partials(&self, a: f64, b: f64) -> (f64, f64);
}

/// A scalar function of a variable number of arguments.
pub trait NaryOp: Send + Sync {
    /// `f(args)`.
    fn eval(&self, args: &[f64]) -> f64;
    /// Write `∂f/∂args[k]` into `out[k]`. `out` has the same length as `args`
    /// and is zeroed before the call.
    fn gradient(&self, args: &[f64], out: &mut [f64]);
}

struct Fns<E, D> {
    eval: E,
    diff: D,
}

impl<E, D> UnaryOp for Fns<E, D>
where
    E: Fn(f64) -> f64 + Send + Sync,
    D: Fn(f64) -> f64 + Send + Sync,
{
    fn eval(&self, a: f64) -> f64 {
        (self.eval)(a)
    }
    fn derivative(&self, a: f64) -> f64 {
        (self.diff)(a)
    }
}

impl<E, D> BinaryOp for Fns<E, D>
where
    E: Fn(f64, f64) -> f64 + Send + Sync,
    D: Fn(f64, f64) -> (f64, f64) + Send + Sync,
{
    fn eval(&self, a: f64, b: f64) -> f64 {
        (self.eval)(a, b)
    }
    fn partials(&self, a: f64, b: f64) -> (f64, f64) {
        (self.diff)(a, b)
    }
}

impl<E, D> NaryOp for Fns<E, D>
where
    E: Fn(&[f64]) -> f64 + Send + Sync,
    D: Fn(&[f64], &mut [f64]) + Send + Sync,
{
    fn eval(&self, args: &[f64]) -> f64 {
        (self.eval)(args)
    }
    fn gradient(&self, args: &[f64], out: &mut [f64]) {
        (self.diff)(args, out)
    }
}

macro_rules! func_handle {
    ($(#[$meta:meta])* $name:ident, $op:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            op: Arc<dyn $op>,
            label: Option<Arc<str>>,
        }

        impl $name {
            /// Wrap an operation.
            pub fn new(op: impl $op + 'static) -> Self {
                $name {
                    op: Arc::new(op),
                    label: None,
                }
            }

            /// Wrap an already shared operation.
            pub fn from_arc(op: Arc<dyn $op>) -> Self {
                $name { op, label: None }
            }

            /// Attach a display label, used when printing terms.
            pub fn with_label(mut self, label: &str) -> Self {
                self.label = Some(Arc::from(label));
                self
            }

            /// Display label, if one was attached.
            pub fn label(&self) -> Option<&str> {
                self.label.as_deref()
            }

            #[inline]
            pub(crate) fn op(&self) -> &dyn $op {
                &*self.op
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("label", &self.label)
                    .finish_non_exhaustive()
            }
        }
    };
}

func_handle!(
    /// Shared handle to a [`UnaryOp`].
    UnaryFunc,
    UnaryOp
);
func_handle!(
    /// Shared handle to a [`BinaryOp`].
    BinaryFunc,
    BinaryOp
);
func_handle!(
    /// Shared handle to an [`NaryOp`].
    NaryFunc,
    NaryOp
);

impl UnaryFunc {
    /// Build from a function and its derivative.
    pub fn from_fns(
        eval: impl Fn(f64) -> f64 + Send + Sync + 'static,
        derivative: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self::new(Fns {
            eval,
            diff: derivative,
        })
    }

    #[inline]
    pub fn eval(&self, a: f64) -> f64 {
        self.op.eval(a)
    }

    #[inline]
    pub fn derivative(&self, a: f64) -> f64 {
        self.op.derivative(a)
    }
}

impl BinaryFunc {
    /// Build from a function and its pair of partials.
    pub fn from_fns(
        eval: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        partials: impl Fn(f64, f64) -> (f64, f64) + Send + Sync + 'static,
    ) -> Self {
        Self::new(Fns {
            eval,
            diff: partials,
        })
    }

    #[inline]
    pub fn eval(&self, a: f64, b: f64) -> f64 {
        self.op.eval(a, b)
    }

    #[inline]
    pub fn partials(&self, a: f64, b: f64) -> (f64, f64) {
        self.op.partials(a, b)
    }
}

impl NaryFunc {
    /// Build from a function and a gradient writer.
    pub fn from_fns(
        eval: impl Fn(&[f64]) -> f64 + Send + Sync + 'static,
        gradient: impl Fn(&[f64], &mut [f64]) + Send + Sync + 'static,
    ) -> Self {
        Self::new(Fns {
            eval,
            diff: gradient,
        })
    }

    #[inline]
    pub fn eval(&self, args: &[f64]) -> f64 {
        self.op.eval(args)
    }

    /// Write the gradient into `out`, which is zeroed first.
    #[inline]
    pub fn gradient(&self, args: &[f64], out: &mut [f64]) {
        debug_assert_eq!(args.len(), out.len());
        out.iter_mut().for_each(|g| *g = 0.0);
        self.op.gradient(args, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_adapt_to_ops() {
        let sq = UnaryFunc::from_fns(|a| a * a, |a| 2.0 * a);
        assert_eq!(sq.eval(3.0), 9.0);
        assert_eq!(sq.derivative(3.0), 6.0);

        let hyp = BinaryFunc::from_fns(|a, b| a.hypot(b), |a, b| {
            let r = a.hypot(b);
            (a / r, b / r)
        });
        assert_eq!(hyp.eval(3.0, 4.0), 5.0);
        assert_eq!(hyp.partials(3.0, 4.0), (0.6, 0.8));

        let dot = NaryFunc::from_fns(
            |x| x.iter().map(|v| v * v).sum(),
            |x, g| {
                for (gi, xi) in g.iter_mut().zip(x) {
                    *gi = 2.0 * xi;
                }
            },
        );
        let mut g = [7.0; 3];
        dot.gradient(&[1.0, 2.0, 3.0], &mut g);
        assert_eq!(g, [2.0, 4.0, 6.0]);
    }

    #[test]
    fn labels_show_in_debug() {
        let f = UnaryFunc::from_fns(f64::sin, f64::cos).with_label("sin");
        assert_eq!(f.label(), Some("sin"));
        assert!(format!("{f:?}").contains("sin"));
    }
}
