use std::collections::HashMap;

use log::debug;

use crate::error::BindingError;
use crate::func::{BinaryFunc, NaryFunc, UnaryFunc};
use crate::tape::{Op, Tape};
use crate::term::{Term, TermId, Variable};
use crate::visit::TermVisitor;

impl Tape {
    /// Lower `term` into a tape whose leading slots are `variables`, in order.
    ///
    /// Nodes are keyed by identity: a `Term` handle reused in several places
    /// occupies one slot. Operands are always compiled before the nodes that
    /// use them, so every edge points backwards. A bare variable as the whole
    /// function is wrapped in `x^1` so the output is always a computed slot.
    ///
    /// # Errors
    /// [`BindingError::DuplicateVariable`] if `variables` repeats an entry,
    /// [`BindingError::UnboundVariable`] if `term` uses a variable missing
    /// from `variables`.
    pub fn from_term(term: &Term, variables: &[Variable]) -> Result<Self, BindingError> {
        let mut compiler = TapeCompiler::new(variables.len());
        for (position, var) in variables.iter().enumerate() {
            compiler.bind(var, position)?;
        }

        let mut root = compiler.compile(term)?;
        if (root as usize) < variables.len() {
            root = compiler.tape.push_op(Op::ConstPower(1.0), &[root]);
        }

        let tape = compiler.tape;
        debug_assert_eq!(root as usize, tape.len() - 1, "output must be the last slot");
        debug_assert!(tape.is_well_formed());
        debug!(
            "compiled term: {} variables, {} nodes, {} edges, {} cache hits",
            tape.dimension(),
            tape.len(),
            tape.num_edges(),
            compiler.hits
        );
        Ok(tape)
    }
}

/// Depth-first post-order lowering with an identity-keyed slot cache.
struct TapeCompiler {
    tape: Tape,
    slots: HashMap<TermId, u32>,
    /// Scratch for operand slot lists.
    sources: Vec<u32>,
    hits: usize,
}

impl TapeCompiler {
    fn new(dimension: usize) -> Self {
        TapeCompiler {
            tape: Tape::with_capacity(dimension * 4 + 16, dimension * 4 + 16),
            slots: HashMap::new(),
            sources: Vec::new(),
            hits: 0,
        }
    }

    fn bind(&mut self, var: &Variable, position: usize) -> Result<(), BindingError> {
        if let Some(&first) = self.slots.get(&var.id()) {
            return Err(BindingError::DuplicateVariable {
                name: var.display_name(),
                first: first as usize,
                second: position,
            });
        }
        let slot = self.tape.push_input();
        debug_assert_eq!(slot as usize, position);
        self.slots.insert(var.id(), slot);
        Ok(())
    }

    /// Compile `root` and everything below it. Uses an explicit stack so deep
    /// terms cannot overflow the call stack.
    fn compile(&mut self, root: &Term) -> Result<u32, BindingError> {
        let mut stack: Vec<(&Term, bool)> = vec![(root, false)];
        while let Some((term, expanded)) = stack.pop() {
            if self.slots.contains_key(&term.id()) {
                // Reached again through another parent before its first
                // expansion finished.
                if !expanded {
                    self.hits += 1;
                }
                continue;
            }
            if expanded {
                let slot = term.accept(self)?;
                self.slots.insert(term.id(), slot);
                continue;
            }
            if term.is_variable() {
                return Err(BindingError::UnboundVariable {
                    name: term.to_string(),
                });
            }
            stack.push((term, true));
            for operand in term.operands().iter().rev() {
                if self.slots.contains_key(&operand.id()) {
                    self.hits += 1;
                } else {
                    stack.push((operand, false));
                }
            }
        }
        Ok(self.slot(root))
    }

    /// Slot of an already compiled term.
    #[inline]
    fn slot(&self, term: &Term) -> u32 {
        match self.slots.get(&term.id()) {
            Some(&slot) => slot,
            None => unreachable!("operands are compiled before their users"),
        }
    }

    fn emit(&mut self, op: Op, operands: &[Term]) -> u32 {
        let mut sources = std::mem::take(&mut self.sources);
        sources.clear();
        sources.extend(operands.iter().map(|t| self.slot(t)));
        let idx = self.tape.push_op(op, &sources);
        self.sources = sources;
        idx
    }
}

/// Emits the tape node for one term whose operands already have slots.
impl TermVisitor for TapeCompiler {
    type Output = Result<u32, BindingError>;

    fn default_visit(&mut self, term: &Term) -> Self::Output {
        unreachable!("every term kind is handled explicitly: {term}")
    }

    fn visit_constant(&mut self, _term: &Term, value: f64) -> Self::Output {
        Ok(self.tape.push_const(value))
    }

    fn visit_zero(&mut self, _term: &Term) -> Self::Output {
        Ok(self.tape.push_const(0.0))
    }

    fn visit_variable(&mut self, term: &Term, _name: Option<&str>) -> Self::Output {
        // Bound variables are seeded into the cache up front.
        Err(BindingError::UnboundVariable {
            name: term.to_string(),
        })
    }

    fn visit_sum(&mut self, _term: &Term, terms: &[Term]) -> Self::Output {
        Ok(self.emit(Op::Sum, terms))
    }

    fn visit_product(&mut self, term: &Term, _left: &Term, _right: &Term) -> Self::Output {
        Ok(self.emit(Op::Product, term.operands()))
    }

    fn visit_const_power(&mut self, term: &Term, _base: &Term, exponent: f64) -> Self::Output {
        Ok(self.emit(Op::ConstPower(exponent), term.operands()))
    }

    fn visit_term_power(&mut self, term: &Term, _base: &Term, _exponent: &Term) -> Self::Output {
        Ok(self.emit(Op::TermPower, term.operands()))
    }

    fn visit_exp(&mut self, term: &Term, _arg: &Term) -> Self::Output {
        Ok(self.emit(Op::Exp, term.operands()))
    }

    fn visit_log(&mut self, term: &Term, _arg: &Term) -> Self::Output {
        Ok(self.emit(Op::Log, term.operands()))
    }

    fn visit_unary(&mut self, term: &Term, func: &UnaryFunc, _arg: &Term) -> Self::Output {
        let h = self.tape.register_unary(func.clone());
        Ok(self.emit(Op::Unary(h), term.operands()))
    }

    fn visit_binary(
        &mut self,
        term: &Term,
        func: &BinaryFunc,
        _left: &Term,
        _right: &Term,
    ) -> Self::Output {
        let h = self.tape.register_binary(func.clone());
        Ok(self.emit(Op::Binary(h), term.operands()))
    }

    fn visit_nary(&mut self, _term: &Term, func: &NaryFunc, terms: &[Term]) -> Self::Output {
        let h = self.tape.register_nary(func.clone());
        Ok(self.emit(Op::Nary(h), terms))
    }
}
