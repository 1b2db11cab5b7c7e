//! Compile-once, call-many executable terms.
//!
//! A [`CompiledTerm`] owns its tape and the buffers of the chosen engine.
//! Every call overwrites those buffers, so calls take `&mut self`; to use one
//! function from several threads, clone it (one instance per thread) or
//! guard a single instance with a lock.

use log::debug;

use crate::error::{check_len, ArgumentError, CompileError};
use crate::tape::{JitProgram, Tape};
use crate::term::{Term, Variable};

#[cfg(feature = "parallel")]
mod parallel;

/// Execution strategy, chosen at compile time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Engine {
    /// Sweep the tape, dispatching on each node's operation.
    #[default]
    Interpreted,
    /// Generate straight-line value and derivative routines once, then run
    /// those. Higher compile cost, lower per-call overhead.
    Jit,
}

/// Compilation settings.
///
/// ```
/// use termtape::{CompileOptions, Engine};
///
/// let opts = CompileOptions::new().engine(Engine::Jit).opaque_calls(false);
/// assert_eq!(opts.engine, Engine::Jit);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Which engine runs the compiled tape.
    pub engine: Engine,
    /// Whether the code-generating engine may emit calls to user callbacks.
    /// The interpreter always supports them.
    pub opaque_calls: bool,
}

impl CompileOptions {
    /// Default options: interpreted engine, opaque calls allowed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the execution engine.
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Allow or refuse user callbacks in the code-generating engine.
    pub fn opaque_calls(mut self, allowed: bool) -> Self {
        self.opaque_calls = allowed;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            engine: Engine::Interpreted,
            opaque_calls: true,
        }
    }
}

#[derive(Clone, Debug)]
enum Executor {
    Interpreted,
    Jit(JitProgram),
}

/// A term compiled against an ordered variable list.
#[derive(Clone, Debug)]
pub struct CompiledTerm {
    tape: Tape,
    variables: Vec<Variable>,
    executor: Executor,
}

impl CompiledTerm {
    /// Compile with default options (interpreted engine).
    ///
    /// # Errors
    /// See [`CompiledTerm::with_options`].
    pub fn new(term: &Term, variables: &[Variable]) -> Result<Self, CompileError> {
        Self::with_options(term, variables, &CompileOptions::default())
    }

    /// Compile `term` so that `variables[k]` binds to coordinate `k` of every
    /// point passed in later.
    ///
    /// # Errors
    /// [`CompileError::Binding`] if `term` uses a variable missing from
    /// `variables` or `variables` repeats an entry;
    /// [`CompileError::CallbacksNotSupported`] if the JIT engine is selected
    /// with `opaque_calls == false` and the term calls user functions.
    pub fn with_options(
        term: &Term,
        variables: &[Variable],
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let tape = Tape::from_term(term, variables)?;
        Self::assemble(tape, variables.to_vec(), options)
    }

    /// Rebuild an executable term from an existing tape, for instance one
    /// that was deserialized.
    ///
    /// # Errors
    /// [`CompileError::Argument`] if `variables.len()` differs from the tape
    /// dimension, [`CompileError::CallbacksNotSupported`] as for
    /// [`with_options`](Self::with_options).
    pub fn from_tape(
        tape: Tape,
        variables: Vec<Variable>,
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        check_len("variable list", tape.dimension(), variables.len())?;
        if tape.is_empty() {
            return Err(ArgumentError::TooFewTerms {
                kind: "tape",
                min: 1,
                got: 0,
            }
            .into());
        }
        Self::assemble(tape, variables, options)
    }

    fn assemble(
        tape: Tape,
        variables: Vec<Variable>,
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let executor = match options.engine {
            Engine::Interpreted => Executor::Interpreted,
            Engine::Jit => Executor::Jit(JitProgram::build(&tape, options.opaque_calls)?),
        };
        debug!(
            "compiled term over {} variables for {:?} engine",
            variables.len(),
            options.engine
        );
        Ok(CompiledTerm {
            tape,
            variables,
            executor,
        })
    }

    /// Number of variables, the required length of every point.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.tape.dimension()
    }

    /// The variables, in binding order.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The engine in use.
    pub fn engine(&self) -> Engine {
        match self.executor {
            Executor::Interpreted => Engine::Interpreted,
            Executor::Jit(_) => Engine::Jit,
        }
    }

    /// The compiled tape. With the interpreted engine its values, adjoints
    /// and weights reflect the most recent call.
    #[inline]
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Take the tape out, dropping any generated code.
    pub fn into_tape(self) -> Tape {
        self.tape
    }

    /// Function value at `point`.
    ///
    /// # Errors
    /// [`ArgumentError::LengthMismatch`] if `point.len() != self.dimension()`.
    pub fn evaluate(&mut self, point: &[f64]) -> Result<f64, ArgumentError> {
        check_len("point", self.dimension(), point.len())?;
        Ok(match &mut self.executor {
            Executor::Interpreted => self.tape.evaluate(point),
            Executor::Jit(jit) => jit.evaluate(point),
        })
    }

    /// Function value and gradient at `point`. The gradient is written into
    /// `gradient`; the value is returned.
    ///
    /// # Errors
    /// [`ArgumentError::LengthMismatch`] if either slice length differs from
    /// `self.dimension()`.
    pub fn differentiate(
        &mut self,
        point: &[f64],
        gradient: &mut [f64],
    ) -> Result<f64, ArgumentError> {
        check_len("point", self.dimension(), point.len())?;
        check_len("gradient", self.dimension(), gradient.len())?;
        Ok(match &mut self.executor {
            Executor::Interpreted => self.tape.differentiate(point, gradient),
            Executor::Jit(jit) => jit.differentiate(point, gradient),
        })
    }

    /// Like [`differentiate`](Self::differentiate), allocating the gradient.
    pub fn gradient(&mut self, point: &[f64]) -> Result<(f64, Vec<f64>), ArgumentError> {
        let mut grad = vec![0.0; self.dimension()];
        let value = self.differentiate(point, &mut grad)?;
        Ok((value, grad))
    }

    /// Value and gradient at each of `points`, in order.
    pub fn gradient_batch(
        &mut self,
        points: &[&[f64]],
    ) -> Result<Vec<(f64, Vec<f64>)>, ArgumentError> {
        points.iter().map(|p| self.gradient(p)).collect()
    }
}
