//! Per-kind dispatch over term nodes.
//!
//! [`TermVisitor`] has one method per node kind and an associated `Output`
//! type: `Output = ()` gives side-effecting traversals (see [`Term::walk`]),
//! any other type gives a typed result (the tape compiler returns the slot
//! index of each node). Every method falls back to
//! [`default_visit`](TermVisitor::default_visit), so a visitor only spells
//! out the kinds it cares about.

use std::collections::HashSet;

use crate::func::{BinaryFunc, NaryFunc, UnaryFunc};
use crate::term::{Term, TermId, Variable};

/// Visitor over the twelve node kinds. Called through [`Term::accept`].
///
/// Each method receives the node itself followed by its payload.
#[allow(unused_variables)]
pub trait TermVisitor {
    /// Result of visiting one node.
    type Output;

    /// Fallback for kinds without a dedicated override.
    fn default_visit(&mut self, term: &Term) -> Self::Output;

    fn visit_constant(&mut self, term: &Term, value: f64) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_zero(&mut self, term: &Term) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_variable(&mut self, term: &Term, name: Option<&str>) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_sum(&mut self, term: &Term, terms: &[Term]) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_product(&mut self, term: &Term, left: &Term, right: &Term) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_const_power(&mut self, term: &Term, base: &Term, exponent: f64) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_term_power(&mut self, term: &Term, base: &Term, exponent: &Term) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_exp(&mut self, term: &Term, arg: &Term) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_log(&mut self, term: &Term, arg: &Term) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_unary(&mut self, term: &Term, func: &UnaryFunc, arg: &Term) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_binary(
        &mut self,
        term: &Term,
        func: &BinaryFunc,
        left: &Term,
        right: &Term,
    ) -> Self::Output {
        self.default_visit(term)
    }

    fn visit_nary(&mut self, term: &Term, func: &NaryFunc, terms: &[Term]) -> Self::Output {
        self.default_visit(term)
    }
}

/// Collects distinct variables in the order [`Term::walk`] reaches them.
#[derive(Default)]
pub struct VariableCollector {
    seen: HashSet<TermId>,
    variables: Vec<Variable>,
}

impl VariableCollector {
    /// The variables collected so far.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Consume the collector, returning the variables in traversal order.
    pub fn into_variables(self) -> Vec<Variable> {
        self.variables
    }
}

impl TermVisitor for VariableCollector {
    type Output = ();

    fn default_visit(&mut self, _term: &Term) {}

    fn visit_variable(&mut self, term: &Term, _name: Option<&str>) {
        if self.seen.insert(term.id()) {
            if let Some(v) = Variable::from_term(term) {
                self.variables.push(v);
            }
        }
    }
}
