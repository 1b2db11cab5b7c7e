use crate::rules;
use crate::tape::{Op, Tape};

impl Tape {
    /// Copy `inputs` into the leading variable slots.
    #[inline]
    fn load_inputs(&mut self, inputs: &[f64]) {
        assert_eq!(inputs.len(), self.dimension(), "wrong number of inputs");
        for (el, &v) in self.elements.iter_mut().zip(inputs) {
            el.value = v;
        }
    }

    /// Value-only forward sweep. Overwrites element values in place; edge
    /// weights are left untouched.
    ///
    /// # Panics
    /// Panics if `inputs.len() != self.dimension()`.
    pub fn forward(&mut self, inputs: &[f64]) {
        self.load_inputs(inputs);
        for i in self.dimension()..self.elements.len() {
            self.elements[i].value = self.node_value(i);
        }
    }

    fn node_value(&mut self, i: usize) -> f64 {
        let el = self.elements[i];
        let edges = &self.edges[el.inputs.range()];
        let values = &self.elements;
        let arg = |k: usize| values[edges[k].source as usize].value;
        match el.op {
            Op::Input | Op::Const => el.value,
            Op::Sum => edges
                .iter()
                .fold(0.0, |acc, e| acc + values[e.source as usize].value),
            Op::Unary(h) => self.callbacks.unary(h).eval(arg(0)),
            Op::Binary(h) => self.callbacks.binary(h).eval(arg(0), arg(1)),
            Op::Nary(h) => {
                self.scratch_args.clear();
                self.scratch_args
                    .extend(edges.iter().map(|e| values[e.source as usize].value));
                self.callbacks.nary(h).eval(&self.scratch_args)
            }
            op => {
                let b = if edges.len() > 1 { arg(1) } else { 0.0 };
                rules::eval_forward(op, arg(0), b)
            }
        }
    }

    /// Forward sweep that also writes each edge's local partial into its
    /// weight, evaluated at `inputs`.
    ///
    /// # Panics
    /// Panics if `inputs.len() != self.dimension()`.
    pub fn forward_with_weights(&mut self, inputs: &[f64]) {
        self.load_inputs(inputs);
        for i in self.dimension()..self.elements.len() {
            self.elements[i].value = self.node_value_and_weights(i);
        }
    }

    fn node_value_and_weights(&mut self, i: usize) -> f64 {
        let el = self.elements[i];
        let range = el.inputs.range();
        let values = &self.elements;
        let edges = &mut self.edges[range];
        match el.op {
            Op::Input | Op::Const => el.value,
            Op::Sum => {
                let mut acc = 0.0;
                for e in edges.iter_mut() {
                    acc += values[e.source as usize].value;
                    e.weight = 1.0;
                }
                acc
            }
            Op::Unary(h) => {
                let f = self.callbacks.unary(h);
                let a = values[edges[0].source as usize].value;
                edges[0].weight = f.derivative(a);
                f.eval(a)
            }
            Op::Binary(h) => {
                let f = self.callbacks.binary(h);
                let a = values[edges[0].source as usize].value;
                let b = values[edges[1].source as usize].value;
                let (da, db) = f.partials(a, b);
                edges[0].weight = da;
                edges[1].weight = db;
                f.eval(a, b)
            }
            Op::Nary(h) => {
                let f = self.callbacks.nary(h);
                self.scratch_args.clear();
                self.scratch_args
                    .extend(edges.iter().map(|e| values[e.source as usize].value));
                self.scratch_grad.clear();
                self.scratch_grad.resize(edges.len(), 0.0);
                f.gradient(&self.scratch_args, &mut self.scratch_grad);
                for (e, &w) in edges.iter_mut().zip(&self.scratch_grad) {
                    e.weight = w;
                }
                f.eval(&self.scratch_args)
            }
            op => {
                let a = values[edges[0].source as usize].value;
                let b = if edges.len() > 1 {
                    values[edges[1].source as usize].value
                } else {
                    0.0
                };
                let r = rules::eval_forward(op, a, b);
                let (da, db) = rules::reverse_partials(op, a, b, r);
                edges[0].weight = da;
                if let Some(e) = edges.get_mut(1) {
                    e.weight = db;
                }
                r
            }
        }
    }

    /// Reverse sweep: seed the output adjoint with one and push adjoints
    /// back along the weighted edges.
    ///
    /// Reads the weights left by [`forward_with_weights`](Self::forward_with_weights).
    /// Zero adjoints are not skipped, so NaN/Inf weights propagate the same
    /// way plain float arithmetic would.
    pub fn reverse(&mut self) {
        for el in &mut self.elements {
            el.adjoint = 0.0;
        }
        let Some(last) = self.elements.last_mut() else {
            return;
        };
        last.adjoint = 1.0;

        let dim = self.dimension();
        for i in (dim..self.elements.len()).rev() {
            let el = self.elements[i];
            for e in &self.edges[el.inputs.range()] {
                let src = &mut self.elements[e.source as usize].adjoint;
                *src += el.adjoint * e.weight;
            }
        }
    }

    /// Evaluate the function at `inputs`.
    ///
    /// # Panics
    /// Panics if `inputs.len() != self.dimension()`.
    pub fn evaluate(&mut self, inputs: &[f64]) -> f64 {
        self.forward(inputs);
        self.output_value()
    }

    /// Forward and reverse sweep. Writes the gradient into `gradient` and
    /// returns the function value.
    ///
    /// # Panics
    /// Panics if either slice length differs from `self.dimension()`.
    pub fn differentiate(&mut self, inputs: &[f64], gradient: &mut [f64]) -> f64 {
        assert_eq!(gradient.len(), self.dimension(), "wrong gradient length");
        self.forward_with_weights(inputs);
        self.reverse();
        for (g, el) in gradient.iter_mut().zip(&self.elements) {
            *g = el.adjoint;
        }
        self.output_value()
    }
}
