//! Reverse-mode automatic differentiation of expression DAGs.
//!
//! Build a [`Term`] from [`Variable`]s, constants and operations, compile it
//! once against an ordered variable list, then evaluate the function and its
//! full gradient at many points:
//!
//! ```
//! use termtape::{compile_with, CompileOptions, Engine, Variable};
//!
//! let x = Variable::named("x");
//! let y = Variable::named("y");
//! let f = 2.0 * &x * &x - 3.0 * &y * &y;
//!
//! let opts = CompileOptions::new().engine(Engine::Jit);
//! let mut compiled = compile_with(&f, &[x, y], &opts).unwrap();
//!
//! let mut grad = [0.0; 2];
//! let value = compiled.differentiate(&[2.0, 3.0], &mut grad).unwrap();
//! assert_eq!(value, -19.0);
//! assert_eq!(grad, [8.0, -18.0]);
//! ```
//!
//! Compilation walks the term once, deduplicating by node identity: a
//! [`Term`] handle reused in several places becomes one tape slot. The
//! resulting [`Tape`] runs either through the interpreted sweeps
//! ([`Engine::Interpreted`]) or through straight-line routines generated for
//! that tape ([`Engine::Jit`]).
//!
//! # Features
//!
//! - `parallel`: rayon-backed [`CompiledTerm::gradient_batch_par`].
//! - `serde`: `Serialize`/`Deserialize` for [`Tape`] (tapes without user
//!   callbacks only).

pub mod compiled;
pub mod error;
pub mod func;
pub mod parametric;
pub mod rules;
pub mod tape;
pub mod term;
pub mod visit;
mod traits;

pub use compiled::{CompileOptions, CompiledTerm, Engine};
pub use error::{ArgumentError, BindingError, CompileError};
pub use func::{BinaryFunc, BinaryOp, NaryFunc, NaryOp, UnaryFunc, UnaryOp};
pub use parametric::ParametricCompiledTerm;
pub use tape::{CallbackHandle, EdgeRange, InputEdge, JitProgram, Op, Tape, TapeElement};
pub use term::{Term, TermId, TermKind, Variable};
pub use visit::{TermVisitor, VariableCollector};

/// Compile `term` over `variables` with the interpreted engine.
///
/// `variables[k]` binds to coordinate `k` of every point later passed in.
///
/// # Errors
/// [`CompileError::Binding`] if the term uses a variable missing from
/// `variables`, or if `variables` lists one twice.
pub fn compile(term: &Term, variables: &[Variable]) -> Result<CompiledTerm, CompileError> {
    CompiledTerm::new(term, variables)
}

/// Compile `term` over `variables` with explicit options.
///
/// # Errors
/// As for [`compile`], plus [`CompileError::CallbacksNotSupported`] when the
/// JIT engine is asked to refuse user callbacks and the term has some.
pub fn compile_with(
    term: &Term,
    variables: &[Variable],
    options: &CompileOptions,
) -> Result<CompiledTerm, CompileError> {
    CompiledTerm::with_options(term, variables, options)
}
