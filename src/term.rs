//! Immutable expression DAG.
//!
//! A [`Term`] is a cheap-to-clone shared handle. Cloning a handle keeps the
//! node's identity, and identity is what the tape compiler deduplicates on:
//! reusing one `Term` in several places produces a single tape slot, while
//! two separately built but structurally equal terms produce two.
//!
//! ```
//! use termtape::{Term, Variable};
//!
//! let x = Variable::named("x");
//! let sq = Term::product(&x, &x);
//! let f = Term::sum([sq.clone(), sq, Term::constant(1.0)]).unwrap();
//! assert_eq!(f.to_string(), "((x * x) + (x * x) + 1)");
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::ArgumentError;
use crate::func::{BinaryFunc, NaryFunc, UnaryFunc};
use crate::visit::{TermVisitor, VariableCollector};

/// Node kinds of the expression DAG.
///
/// Operands of fixed-arity nodes are stored as arrays so that
/// [`Term::operands`] can hand them out as a slice.
#[derive(Debug)]
pub enum TermKind {
    /// A fixed value.
    Constant(f64),
    /// The constant zero.
    Zero,
    /// An independent variable, optionally named.
    Variable(Option<String>),
    /// `Σ terms`, at least two operands.
    Sum(Vec<Term>),
    /// `[left, right]` → `left · right`.
    Product([Term; 2]),
    /// `base ^ exponent` with a constant, finite, non-zero exponent.
    ConstPower([Term; 1], f64),
    /// `[base, exponent]` → `base ^ exponent`.
    TermPower([Term; 2]),
    /// `e ^ arg`.
    Exp([Term; 1]),
    /// `ln(arg)`.
    Log([Term; 1]),
    /// User function of one argument.
    UnaryFunc(UnaryFunc, [Term; 1]),
    /// User function of two arguments.
    BinaryFunc(BinaryFunc, [Term; 2]),
    /// User function of one or more arguments.
    NaryFunc(NaryFunc, Vec<Term>),
}

/// Stable identity of a term node, valid while any handle to it is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(usize);

/// Shared handle to an immutable expression node.
#[derive(Clone)]
pub struct Term(Arc<TermKind>);

impl Term {
    fn from_kind(kind: TermKind) -> Self {
        Term(Arc::new(kind))
    }

    /// A constant leaf.
    pub fn constant(value: f64) -> Self {
        Self::from_kind(TermKind::Constant(value))
    }

    /// The zero leaf.
    pub fn zero() -> Self {
        Self::from_kind(TermKind::Zero)
    }

    /// Sum of two or more terms.
    pub fn sum<I>(terms: I) -> Result<Self, ArgumentError>
    where
        I: IntoIterator,
        I::Item: Into<Term>,
    {
        let terms: Vec<Term> = terms.into_iter().map(Into::into).collect();
        if terms.len() < 2 {
            return Err(ArgumentError::TooFewTerms {
                kind: "sum",
                min: 2,
                got: terms.len(),
            });
        }
        Ok(Self::from_kind(TermKind::Sum(terms)))
    }

    /// `left · right`.
    pub fn product(left: impl Into<Term>, right: impl Into<Term>) -> Self {
        Self::from_kind(TermKind::Product([left.into(), right.into()]))
    }

    /// `base ^ exponent` for a constant exponent.
    ///
    /// Rejects NaN, infinite and zero exponents.
    pub fn power(base: impl Into<Term>, exponent: f64) -> Result<Self, ArgumentError> {
        if !exponent.is_finite() || exponent == 0.0 {
            return Err(ArgumentError::InvalidExponent(exponent));
        }
        Ok(Self::from_kind(TermKind::ConstPower([base.into()], exponent)))
    }

    /// `base ^ exponent` where the exponent is itself a term.
    pub fn term_power(base: impl Into<Term>, exponent: impl Into<Term>) -> Self {
        Self::from_kind(TermKind::TermPower([base.into(), exponent.into()]))
    }

    /// `e ^ arg`.
    pub fn exp_of(arg: impl Into<Term>) -> Self {
        Self::from_kind(TermKind::Exp([arg.into()]))
    }

    /// `ln(arg)`.
    pub fn log_of(arg: impl Into<Term>) -> Self {
        Self::from_kind(TermKind::Log([arg.into()]))
    }

    /// Apply a user function of one argument.
    pub fn unary(func: UnaryFunc, arg: impl Into<Term>) -> Self {
        Self::from_kind(TermKind::UnaryFunc(func, [arg.into()]))
    }

    /// Apply a user function of two arguments.
    pub fn binary(func: BinaryFunc, left: impl Into<Term>, right: impl Into<Term>) -> Self {
        Self::from_kind(TermKind::BinaryFunc(func, [left.into(), right.into()]))
    }

    /// Apply a user function of one or more arguments.
    pub fn nary<I>(func: NaryFunc, terms: I) -> Result<Self, ArgumentError>
    where
        I: IntoIterator,
        I::Item: Into<Term>,
    {
        let terms: Vec<Term> = terms.into_iter().map(Into::into).collect();
        if terms.is_empty() {
            return Err(ArgumentError::TooFewTerms {
                kind: "n-ary function",
                min: 1,
                got: 0,
            });
        }
        Ok(Self::from_kind(TermKind::NaryFunc(func, terms)))
    }

    // ── Method-style helpers ──

    /// `e ^ self`.
    pub fn exp(&self) -> Self {
        Self::exp_of(self)
    }

    /// `ln(self)`.
    pub fn ln(&self) -> Self {
        Self::log_of(self)
    }

    /// `self ^ exponent`; see [`Term::power`].
    pub fn pow(&self, exponent: f64) -> Result<Self, ArgumentError> {
        Self::power(self, exponent)
    }

    /// `self ^ exponent` with a term exponent.
    pub fn powt(&self, exponent: impl Into<Term>) -> Self {
        Self::term_power(self, exponent)
    }

    /// `self ^ 0.5`.
    pub fn sqrt(&self) -> Self {
        Self::from_kind(TermKind::ConstPower([self.clone()], 0.5))
    }

    /// `self ^ 2`.
    pub fn squared(&self) -> Self {
        Self::from_kind(TermKind::ConstPower([self.clone()], 2.0))
    }

    // Operator building blocks, infallible for their fixed arity.

    pub(crate) fn sum2(left: Term, right: Term) -> Self {
        Self::from_kind(TermKind::Sum(vec![left, right]))
    }

    pub(crate) fn negated(term: Term) -> Self {
        Self::product(Term::constant(-1.0), term)
    }

    pub(crate) fn reciprocal(term: Term) -> Self {
        Self::from_kind(TermKind::ConstPower([term], -1.0))
    }

    // ── Inspection ──

    /// The node kind.
    #[inline]
    pub fn kind(&self) -> &TermKind {
        &self.0
    }

    /// Identity of this node.
    #[inline]
    pub fn id(&self) -> TermId {
        TermId(Arc::as_ptr(&self.0) as usize)
    }

    /// Whether both handles point at the same node.
    #[inline]
    pub fn same_node(&self, other: &Term) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this node is a variable leaf.
    #[inline]
    pub fn is_variable(&self) -> bool {
        matches!(*self.0, TermKind::Variable(_))
    }

    /// Direct operands of this node, in edge order.
    pub fn operands(&self) -> &[Term] {
        match &*self.0 {
            TermKind::Constant(_) | TermKind::Zero | TermKind::Variable(_) => &[],
            TermKind::Sum(terms) | TermKind::NaryFunc(_, terms) => terms,
            TermKind::Product(ops)
            | TermKind::TermPower(ops)
            | TermKind::BinaryFunc(_, ops) => ops,
            TermKind::ConstPower(ops, _)
            | TermKind::Exp(ops)
            | TermKind::Log(ops)
            | TermKind::UnaryFunc(_, ops) => ops,
        }
    }

    /// Dispatch on the node kind. See [`TermVisitor`].
    pub fn accept<V: TermVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match &*self.0 {
            TermKind::Constant(value) => visitor.visit_constant(self, *value),
            TermKind::Zero => visitor.visit_zero(self),
            TermKind::Variable(name) => visitor.visit_variable(self, name.as_deref()),
            TermKind::Sum(terms) => visitor.visit_sum(self, terms),
            TermKind::Product([left, right]) => visitor.visit_product(self, left, right),
            TermKind::ConstPower([base], exponent) => {
                visitor.visit_const_power(self, base, *exponent)
            }
            TermKind::TermPower([base, exponent]) => {
                visitor.visit_term_power(self, base, exponent)
            }
            TermKind::Exp([arg]) => visitor.visit_exp(self, arg),
            TermKind::Log([arg]) => visitor.visit_log(self, arg),
            TermKind::UnaryFunc(func, [arg]) => visitor.visit_unary(self, func, arg),
            TermKind::BinaryFunc(func, [left, right]) => {
                visitor.visit_binary(self, func, left, right)
            }
            TermKind::NaryFunc(func, terms) => visitor.visit_nary(self, func, terms),
        }
    }

    /// Visit every distinct node reachable from `self` once, operands before
    /// the nodes that use them.
    ///
    /// Traversal uses an explicit stack, so deep terms do not exhaust the
    /// call stack.
    pub fn walk<V: TermVisitor<Output = ()> + ?Sized>(&self, visitor: &mut V) {
        let mut seen: HashSet<TermId> = HashSet::new();
        let mut stack: Vec<(&Term, bool)> = vec![(self, false)];
        while let Some((term, expanded)) = stack.pop() {
            if expanded {
                term.accept(visitor);
                continue;
            }
            if !seen.insert(term.id()) {
                continue;
            }
            stack.push((term, true));
            for operand in term.operands().iter().rev() {
                if !seen.contains(&operand.id()) {
                    stack.push((operand, false));
                }
            }
        }
    }

    /// Distinct variables reachable from this term, in first-use order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut collector = VariableCollector::default();
        self.walk(&mut collector);
        collector.into_variables()
    }

    /// Number of distinct nodes reachable from this term.
    pub fn node_count(&self) -> usize {
        struct Count(usize);
        impl TermVisitor for Count {
            type Output = ();
            fn default_visit(&mut self, _term: &Term) {
                self.0 += 1;
            }
        }
        let mut count = Count(0);
        self.walk(&mut count);
        count.0
    }
}

/// Tear down uniquely owned subtrees iteratively: long chains built with
/// operators (`acc = acc + t` in a loop) would otherwise recurse once per
/// level when dropped.
impl Drop for Term {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_operands(&mut self.0, &mut pending);
        while let Some(mut term) = pending.pop() {
            detach_operands(&mut term.0, &mut pending);
        }
    }
}

/// If `node` is uniquely owned, move its operands into `out` and leave a
/// leaf in its place.
fn detach_operands(node: &mut Arc<TermKind>, out: &mut Vec<Term>) {
    let Some(kind) = Arc::get_mut(node) else {
        return;
    };
    if matches!(
        kind,
        TermKind::Constant(_) | TermKind::Zero | TermKind::Variable(_)
    ) {
        return;
    }
    match std::mem::replace(kind, TermKind::Zero) {
        TermKind::Sum(terms) | TermKind::NaryFunc(_, terms) => out.extend(terms),
        TermKind::Product(ops) | TermKind::TermPower(ops) | TermKind::BinaryFunc(_, ops) => {
            out.extend(ops)
        }
        TermKind::ConstPower(ops, _)
        | TermKind::Exp(ops)
        | TermKind::Log(ops)
        | TermKind::UnaryFunc(_, ops) => out.extend(ops),
        TermKind::Constant(_) | TermKind::Zero | TermKind::Variable(_) => {}
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term({self})")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, terms: &[Term], sep: &str) -> fmt::Result {
            for (k, t) in terms.iter().enumerate() {
                if k > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{t}")?;
            }
            Ok(())
        }

        match &*self.0 {
            TermKind::Constant(v) => write!(f, "{v}"),
            TermKind::Zero => f.write_str("0"),
            TermKind::Variable(Some(name)) => f.write_str(name),
            TermKind::Variable(None) => write!(f, "v{:x}", self.id().0),
            TermKind::Sum(terms) => {
                f.write_str("(")?;
                join(f, terms, " + ")?;
                f.write_str(")")
            }
            TermKind::Product([l, r]) => write!(f, "({l} * {r})"),
            TermKind::ConstPower([b], k) => write!(f, "{b}^{k}"),
            TermKind::TermPower([b, e]) => write!(f, "{b}^{e}"),
            TermKind::Exp([a]) => write!(f, "exp({a})"),
            TermKind::Log([a]) => write!(f, "ln({a})"),
            TermKind::UnaryFunc(func, [a]) => {
                write!(f, "{}({a})", func.label().unwrap_or("unary"))
            }
            TermKind::BinaryFunc(func, [l, r]) => {
                write!(f, "{}({l}, {r})", func.label().unwrap_or("binary"))
            }
            TermKind::NaryFunc(func, terms) => {
                write!(f, "{}(", func.label().unwrap_or("nary"))?;
                join(f, terms, ", ")?;
                f.write_str(")")
            }
        }
    }
}

/// An independent variable.
///
/// Each call to [`Variable::new`] or [`Variable::named`] creates a distinct
/// variable; clones refer to the same one. Two variables with the same name
/// are still different variables.
#[derive(Clone)]
pub struct Variable(Term);

impl Variable {
    /// An anonymous variable.
    pub fn new() -> Self {
        Variable(Term::from_kind(TermKind::Variable(None)))
    }

    /// A variable with a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Variable(Term::from_kind(TermKind::Variable(Some(name.into()))))
    }

    /// Recover a variable from a term that is a variable leaf.
    pub fn from_term(term: &Term) -> Option<Self> {
        term.is_variable().then(|| Variable(term.clone()))
    }

    /// Display name, if any.
    pub fn name(&self) -> Option<&str> {
        match self.0.kind() {
            TermKind::Variable(name) => name.as_deref(),
            _ => unreachable!("Variable always wraps a variable leaf"),
        }
    }

    /// The variable as a term; shares the variable's identity.
    #[inline]
    pub fn term(&self) -> &Term {
        &self.0
    }

    /// Identity of the variable.
    #[inline]
    pub fn id(&self) -> TermId {
        self.0.id()
    }

    /// Name used in error messages and printing.
    pub fn display_name(&self) -> String {
        self.0.to_string()
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_node(&other.0)
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variable({})", self.0)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Term {
        v.0
    }
}

impl From<&Variable> for Term {
    fn from(v: &Variable) -> Term {
        v.0.clone()
    }
}

impl From<&Term> for Term {
    fn from(t: &Term) -> Term {
        t.clone()
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Term {
        Term::constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_needs_two_terms() {
        let x = Variable::new();
        assert_eq!(
            Term::sum([&x]).unwrap_err(),
            ArgumentError::TooFewTerms {
                kind: "sum",
                min: 2,
                got: 1
            }
        );
        assert!(Term::sum([&x, &x]).is_ok());
    }

    #[test]
    fn power_rejects_degenerate_exponents() {
        let x = Variable::new();
        for k in [0.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                Term::power(&x, k),
                Err(ArgumentError::InvalidExponent(_))
            ));
        }
        assert!(Term::power(&x, -1.5).is_ok());
    }

    #[test]
    fn nary_needs_an_operand() {
        let f = NaryFunc::from_fns(|x| x.iter().sum(), |_, g| g.fill(1.0));
        assert!(Term::nary(f.clone(), Vec::<Term>::new()).is_err());
        assert!(Term::nary(f, [Term::constant(1.0)]).is_ok());
    }

    #[test]
    fn identity_not_structure() {
        let a = Term::constant(2.0);
        let b = Term::constant(2.0);
        assert!(!a.same_node(&b));
        assert!(a.same_node(&a.clone()));
        let x = Variable::named("x");
        assert_eq!(x, x.clone());
        assert_ne!(x, Variable::named("x"));
        assert!(Term::from(&x).same_node(x.term()));
    }

    #[test]
    fn variables_in_first_use_order() {
        let x = Variable::named("x");
        let y = Variable::named("y");
        let f = Term::product(Term::product(&y, &x), &y);
        assert_eq!(f.variables(), vec![y, x]);
    }

    #[test]
    fn shared_nodes_counted_once() {
        let x = Variable::new();
        let sq = Term::product(&x, &x);
        let f = Term::sum([&sq, &sq, &sq]).unwrap();
        // x, sq, f
        assert_eq!(f.node_count(), 3);
    }

    #[test]
    fn display() {
        let x = Variable::named("x");
        let f = Term::log_of(Term::exp_of(x.term().pow(3.0).unwrap()));
        assert_eq!(f.to_string(), "ln(exp(x^3))");
    }
}
