//! Flat, topologically ordered tape of compiled term nodes.
//!
//! The tape is one contiguous array of [`TapeElement`]s plus one contiguous
//! array of [`InputEdge`]s. Each element names its predecessors through an
//! `(offset, len)` window into the edge array, and every edge points at a
//! strictly earlier element. The first [`dimension`](Tape::dimension)
//! elements are the variables in caller order and the last element is the
//! function's output.
//!
//! Tapes are produced by [`compile`](crate::compile) (or
//! [`Tape::from_term`]) and executed either by the interpreted sweeps in
//! this module or by a [`JitProgram`].

use std::ops::Range;

use crate::func::{BinaryFunc, NaryFunc, UnaryFunc};

// Submodules: each adds impl blocks to Tape
mod compile;
mod interpret;
mod jit;

#[cfg(feature = "serde")]
mod serde_support;

pub use self::jit::JitProgram;

/// Index of a registered callback in the tape's callback table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallbackHandle(pub(crate) u32);

/// Operation performed by a tape element.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    /// Variable slot; value copied from the caller's point.
    Input,
    /// Constant (including zero); value fixed at compile time.
    Const,
    /// Sum of all inputs.
    Sum,
    /// Product of two inputs.
    Product,
    /// Input raised to a constant power.
    ConstPower(f64),
    /// First input raised to the second.
    TermPower,
    /// Exponential of the input.
    Exp,
    /// Natural logarithm of the input.
    Log,
    /// User function of one input.
    Unary(CallbackHandle),
    /// User function of two inputs.
    Binary(CallbackHandle),
    /// User function of all inputs.
    Nary(CallbackHandle),
}

impl Op {
    /// Whether the operation calls back into user code.
    #[inline]
    pub fn is_callback(self) -> bool {
        matches!(self, Op::Unary(_) | Op::Binary(_) | Op::Nary(_))
    }

    /// Whether the operation accepts `n` operands.
    pub fn accepts_operands(self, n: usize) -> bool {
        match self {
            Op::Input | Op::Const => n == 0,
            Op::Sum => n >= 2,
            Op::Nary(_) => n >= 1,
            Op::Product | Op::TermPower | Op::Binary(_) => n == 2,
            Op::ConstPower(_) | Op::Exp | Op::Log | Op::Unary(_) => n == 1,
        }
    }
}

/// Window into the shared edge array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeRange {
    pub offset: u32,
    pub len: u32,
}

impl EdgeRange {
    #[inline]
    pub fn range(self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.len as usize
    }
}

/// A predecessor reference: `source` slot plus the local partial
/// `∂(this node)/∂(source)` filled in by a differentiation sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputEdge {
    pub source: u32,
    pub weight: f64,
}

/// One compiled node.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TapeElement {
    pub op: Op,
    pub value: f64,
    /// Reverse accumulator, `∂output/∂value`.
    pub adjoint: f64,
    pub inputs: EdgeRange,
}

/// Callback table referenced by [`CallbackHandle`]s.
#[derive(Clone, Debug, Default)]
pub(crate) struct Callbacks {
    pub(crate) unary: Vec<UnaryFunc>,
    pub(crate) binary: Vec<BinaryFunc>,
    pub(crate) nary: Vec<NaryFunc>,
}

impl Callbacks {
    #[inline]
    pub(crate) fn unary(&self, h: CallbackHandle) -> &UnaryFunc {
        &self.unary[h.0 as usize]
    }

    #[inline]
    pub(crate) fn binary(&self, h: CallbackHandle) -> &BinaryFunc {
        &self.binary[h.0 as usize]
    }

    #[inline]
    pub(crate) fn nary(&self, h: CallbackHandle) -> &NaryFunc {
        &self.nary[h.0 as usize]
    }

    fn is_empty(&self) -> bool {
        self.unary.is_empty() && self.binary.is_empty() && self.nary.is_empty()
    }
}

fn handle(len: usize) -> CallbackHandle {
    assert!(len <= u32::MAX as usize, "too many callbacks");
    CallbackHandle(len as u32)
}

/// A compiled term: elements, shared edges and the callback table.
#[derive(Clone, Debug, Default)]
pub struct Tape {
    pub(crate) elements: Vec<TapeElement>,
    pub(crate) edges: Vec<InputEdge>,
    pub(crate) dimension: u32,
    pub(crate) callbacks: Callbacks,
    /// Operand values for n-ary callbacks.
    scratch_args: Vec<f64>,
    /// Gradient output for n-ary callbacks.
    scratch_grad: Vec<f64>,
}

impl Tape {
    /// Create an empty tape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tape with pre-allocated capacity.
    pub fn with_capacity(est_nodes: usize, est_edges: usize) -> Self {
        Tape {
            elements: Vec::with_capacity(est_nodes),
            edges: Vec::with_capacity(est_edges),
            ..Self::default()
        }
    }

    /// Register a new variable slot. Returns its index.
    ///
    /// # Panics
    /// Panics if an operation or constant was already pushed: variables must
    /// occupy the leading slots.
    pub fn push_input(&mut self) -> u32 {
        assert_eq!(
            self.elements.len(),
            self.dimension as usize,
            "inputs must be pushed before any other node"
        );
        self.dimension += 1;
        self.push_element(Op::Input, 0.0, &[])
    }

    /// Register a constant. Returns its index.
    pub fn push_const(&mut self, value: f64) -> u32 {
        self.push_element(Op::Const, value, &[])
    }

    /// Record an operation over earlier slots. Returns its index.
    ///
    /// # Panics
    /// Panics if a source does not precede the new node, or if the operand
    /// count does not fit the operation.
    pub fn push_op(&mut self, op: Op, sources: &[u32]) -> u32 {
        let arity_ok = !matches!(op, Op::Input | Op::Const) && op.accepts_operands(sources.len());
        assert!(arity_ok, "{op:?} cannot take {} operands", sources.len());
        let next = self.elements.len() as u32;
        assert!(
            sources.iter().all(|&s| s < next),
            "operands must precede the node that uses them"
        );
        self.push_element(op, 0.0, sources)
    }

    fn push_element(&mut self, op: Op, value: f64, sources: &[u32]) -> u32 {
        let idx = self.elements.len();
        assert!(idx < u32::MAX as usize, "tape too long");
        let offset = self.edges.len() as u32;
        self.edges.extend(sources.iter().map(|&source| InputEdge {
            source,
            weight: 0.0,
        }));
        self.elements.push(TapeElement {
            op,
            value,
            adjoint: 0.0,
            inputs: EdgeRange {
                offset,
                len: sources.len() as u32,
            },
        });
        idx as u32
    }

    /// Register a unary callback for use with [`Op::Unary`].
    pub fn register_unary(&mut self, func: UnaryFunc) -> CallbackHandle {
        let h = handle(self.callbacks.unary.len());
        self.callbacks.unary.push(func);
        h
    }

    /// Register a binary callback for use with [`Op::Binary`].
    pub fn register_binary(&mut self, func: BinaryFunc) -> CallbackHandle {
        let h = handle(self.callbacks.binary.len());
        self.callbacks.binary.push(func);
        h
    }

    /// Register an n-ary callback for use with [`Op::Nary`].
    pub fn register_nary(&mut self, func: NaryFunc) -> CallbackHandle {
        let h = handle(self.callbacks.nary.len());
        self.callbacks.nary.push(func);
        h
    }

    // ── Accessors ──

    /// Number of variables (length of the leading input prefix).
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension as usize
    }

    /// Number of tape elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Total number of edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn elements(&self) -> &[TapeElement] {
        &self.elements
    }

    #[inline]
    pub fn edges(&self) -> &[InputEdge] {
        &self.edges
    }

    /// The input edges of element `index`.
    #[inline]
    pub fn inputs(&self, index: usize) -> &[InputEdge] {
        &self.edges[self.elements[index].inputs.range()]
    }

    /// Index of the output element.
    ///
    /// # Panics
    /// Panics on an empty tape.
    #[inline]
    pub fn output_index(&self) -> usize {
        assert!(!self.elements.is_empty(), "empty tape has no output");
        self.elements.len() - 1
    }

    /// Value of the output element after the last sweep.
    #[inline]
    pub fn output_value(&self) -> f64 {
        self.elements[self.output_index()].value
    }

    /// Number of elements that call back into user code.
    pub fn num_callback_nodes(&self) -> usize {
        self.elements.iter().filter(|e| e.op.is_callback()).count()
    }

    /// Returns `true` if the tape calls any user callbacks.
    #[inline]
    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.is_empty()
    }

    /// Check the structural invariants: leading inputs followed by at least
    /// one output node, operand counts that fit each operation, constant
    /// exponents that are finite and non-zero, every edge pointing backwards,
    /// and edge windows that tile the edge array in order.
    pub fn is_well_formed(&self) -> bool {
        let dim = self.dimension as usize;
        if self.elements.len() <= dim {
            return false;
        }
        let mut expected_offset = 0usize;
        self.elements.iter().enumerate().all(|(i, e)| {
            if let Op::ConstPower(k) = e.op {
                if !k.is_finite() || k == 0.0 {
                    return false;
                }
            }
            let leading_ok = (i < dim) == (e.op == Op::Input);
            let range = e.inputs.range();
            let window_ok = range.start == expected_offset && range.end <= self.edges.len();
            expected_offset = range.end;
            window_ok
                && leading_ok
                && e.op.accepts_operands(range.len())
                && self.edges[range].iter().all(|edge| (edge.source as usize) < i)
        }) && expected_offset == self.edges.len()
    }
}
