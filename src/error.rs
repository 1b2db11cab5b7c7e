//! Error types.
//!
//! Only structural problems are errors. Numeric domain conditions (logarithm
//! of a non-positive value, zero raised to a negative power) are not: they
//! propagate as NaN/Inf through values and adjoints.

use thiserror::Error;

/// A variable could not be bound to a tape slot.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The term references a variable that is missing from the variable list.
    #[error("variable `{name}` is used by the term but not declared in the variable list")]
    UnboundVariable {
        /// Display name of the variable.
        name: String,
    },
    /// The same variable object appears twice in the variable list.
    #[error("variable `{name}` is declared twice (positions {first} and {second})")]
    DuplicateVariable {
        /// Display name of the variable.
        name: String,
        /// Position of the first declaration.
        first: usize,
        /// Position of the repeated declaration.
        second: usize,
    },
}

/// An argument violated a construction-time or call-time contract.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ArgumentError {
    /// An n-ary node was given fewer operands than it requires.
    #[error("{kind} requires at least {min} terms, got {got}")]
    TooFewTerms {
        /// Node kind being constructed.
        kind: &'static str,
        /// Minimum operand count.
        min: usize,
        /// Operand count supplied.
        got: usize,
    },
    /// A constant exponent was NaN, infinite, or zero.
    #[error("invalid constant exponent {0}: must be finite and non-zero")]
    InvalidExponent(f64),
    /// An input or output slice did not match the compiled dimension.
    #[error("{what} has length {got}, expected {expected}")]
    LengthMismatch {
        /// Which argument was wrong.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        got: usize,
    },
}

/// Compilation of a term into an executable form failed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CompileError {
    /// Variable binding failed.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// An argument passed to the compiler was invalid.
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    /// The selected engine was configured without support for opaque
    /// callback nodes, but the tape contains some.
    #[error("engine does not accept opaque callbacks, tape contains {count}")]
    CallbacksNotSupported {
        /// Number of callback nodes on the tape.
        count: usize,
    },
}

/// Check that `got == expected`, naming the argument on failure.
#[inline]
pub(crate) fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), ArgumentError> {
    if expected == got {
        Ok(())
    } else {
        Err(ArgumentError::LengthMismatch {
            what,
            expected,
            got,
        })
    }
}
