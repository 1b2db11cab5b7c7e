//! Compiled terms with a fixed split between free variables and parameters.
//!
//! Parameters are ordinary variables on the tape, placed after the free
//! ones. They are supplied on every call like the point, but they are not
//! differentiated with respect to: the gradient covers the free variables
//! only.

use crate::compiled::{CompileOptions, CompiledTerm, Engine};
use crate::error::{check_len, ArgumentError, CompileError};
use crate::term::{Term, Variable};

/// A [`CompiledTerm`] over `variables ++ parameters`.
///
/// ```
/// use termtape::{ParametricCompiledTerm, Variable};
///
/// let x = Variable::named("x");
/// let a = Variable::named("a");
/// let f = &a * &x * &x;
/// let mut pf = ParametricCompiledTerm::new(&f, &[x], &[a]).unwrap();
///
/// let mut grad = [0.0];
/// let value = pf.differentiate(&[3.0], &[2.0], &mut grad).unwrap();
/// assert_eq!(value, 18.0);
/// assert_eq!(grad, [12.0]);
/// ```
#[derive(Clone, Debug)]
pub struct ParametricCompiledTerm {
    inner: CompiledTerm,
    num_free: usize,
    /// Concatenated point and parameters.
    joined: Vec<f64>,
    /// Gradient over the full tape dimension.
    full_grad: Vec<f64>,
}

impl ParametricCompiledTerm {
    /// Compile with default options.
    ///
    /// # Errors
    /// See [`ParametricCompiledTerm::compile`].
    pub fn new(
        term: &Term,
        variables: &[Variable],
        parameters: &[Variable],
    ) -> Result<Self, CompileError> {
        Self::compile(term, variables, parameters, &CompileOptions::default())
    }

    /// Compile `term` with `variables` as the differentiated prefix and
    /// `parameters` after them.
    ///
    /// # Errors
    /// As for [`CompiledTerm::with_options`] over the concatenated list; in
    /// particular a variable listed both as free and as a parameter is a
    /// [`BindingError::DuplicateVariable`](crate::BindingError::DuplicateVariable).
    pub fn compile(
        term: &Term,
        variables: &[Variable],
        parameters: &[Variable],
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let all: Vec<Variable> = variables.iter().chain(parameters).cloned().collect();
        let inner = CompiledTerm::with_options(term, &all, options)?;
        let dim = all.len();
        Ok(ParametricCompiledTerm {
            inner,
            num_free: variables.len(),
            joined: vec![0.0; dim],
            full_grad: vec![0.0; dim],
        })
    }

    /// Number of free variables, the length of every point and gradient.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.num_free
    }

    #[inline]
    pub fn num_parameters(&self) -> usize {
        self.inner.dimension() - self.num_free
    }

    pub fn variables(&self) -> &[Variable] {
        &self.inner.variables()[..self.num_free]
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.inner.variables()[self.num_free..]
    }

    pub fn engine(&self) -> Engine {
        self.inner.engine()
    }

    /// The underlying term compiled over all variables.
    pub fn inner(&self) -> &CompiledTerm {
        &self.inner
    }

    fn join(&mut self, point: &[f64], params: &[f64]) -> Result<(), ArgumentError> {
        check_len("point", self.num_free, point.len())?;
        check_len("parameters", self.num_parameters(), params.len())?;
        let (head, tail) = self.joined.split_at_mut(self.num_free);
        head.copy_from_slice(point);
        tail.copy_from_slice(params);
        Ok(())
    }

    /// Function value at `point` with the given parameter values.
    ///
    /// # Errors
    /// [`ArgumentError::LengthMismatch`] if `point` or `params` has the wrong
    /// length.
    pub fn evaluate(&mut self, point: &[f64], params: &[f64]) -> Result<f64, ArgumentError> {
        self.join(point, params)?;
        self.inner.evaluate(&self.joined)
    }

    /// Function value, with the gradient over the free variables written
    /// into `gradient`.
    ///
    /// # Errors
    /// [`ArgumentError::LengthMismatch`] if any slice has the wrong length.
    pub fn differentiate(
        &mut self,
        point: &[f64],
        params: &[f64],
        gradient: &mut [f64],
    ) -> Result<f64, ArgumentError> {
        check_len("gradient", self.num_free, gradient.len())?;
        self.join(point, params)?;
        let value = self.inner.differentiate(&self.joined, &mut self.full_grad)?;
        gradient.copy_from_slice(&self.full_grad[..self.num_free]);
        Ok(value)
    }

    /// Like [`differentiate`](Self::differentiate), allocating the gradient.
    pub fn gradient(
        &mut self,
        point: &[f64],
        params: &[f64],
    ) -> Result<(f64, Vec<f64>), ArgumentError> {
        let mut grad = vec![0.0; self.num_free];
        let value = self.differentiate(point, params, &mut grad)?;
        Ok((value, grad))
    }
}
