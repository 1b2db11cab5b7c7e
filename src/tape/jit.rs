//! Straight-line value and derivative routines for a compiled tape.
//!
//! The reverse sweep is unrolled into one `diff[i] += diff[j] * w`
//! instruction per edge, in the interpreter's accumulation order.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::error::CompileError;
use crate::rules;
use crate::tape::{Op, Tape};

/// Working buffers shared by both routines.
#[derive(Clone, Debug, Default)]
struct Registers {
    values: Vec<f64>,
    diffs: Vec<f64>,
    /// Callback partials, indexed like the tape's edge array.
    partials: Vec<f64>,
    /// Operand values for n-ary callbacks.
    scratch: Vec<f64>,
}

type Instr = Arc<dyn Fn(&mut Registers) + Send + Sync>;

/// A tape compiled into a value routine and a derivative routine.
///
/// Cloning shares the generated code and copies the buffers, giving an
/// independent instance for another thread.
#[derive(Clone)]
pub struct JitProgram {
    dimension: usize,
    regs: Registers,
    value_code: Arc<[Instr]>,
    derivative_code: Arc<[Instr]>,
}

impl JitProgram {
    /// Whether this backend can emit calls to opaque user callbacks.
    pub const SUPPORTS_OPAQUE_CALLS: bool = true;

    /// Generate both routines for `tape`.
    ///
    /// With `opaque_calls == false` the build refuses tapes that contain
    /// user callbacks.
    ///
    /// # Errors
    /// [`CompileError::CallbacksNotSupported`] as described above.
    pub fn build(tape: &Tape, opaque_calls: bool) -> Result<Self, CompileError> {
        let callback_nodes = tape.num_callback_nodes();
        if callback_nodes > 0 && !(opaque_calls && Self::SUPPORTS_OPAQUE_CALLS) {
            return Err(CompileError::CallbacksNotSupported {
                count: callback_nodes,
            });
        }

        let n = tape.len();
        let regs = Registers {
            values: tape.elements.iter().map(|e| e.value).collect(),
            diffs: vec![0.0; n],
            partials: vec![0.0; tape.num_edges()],
            scratch: Vec::new(),
        };
        let value_code = emit_value_routine(tape);
        let derivative_code = emit_derivative_routine(tape);
        debug!(
            "generated {} value and {} derivative instructions for {} nodes",
            value_code.len(),
            derivative_code.len(),
            n
        );

        Ok(JitProgram {
            dimension: tape.dimension(),
            regs,
            value_code: value_code.into(),
            derivative_code: derivative_code.into(),
        })
    }

    /// Number of variables.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Instruction count of the value routine.
    pub fn value_routine_len(&self) -> usize {
        self.value_code.len()
    }

    /// Instruction count of the derivative routine, prologue included.
    pub fn derivative_routine_len(&self) -> usize {
        self.derivative_code.len()
    }

    fn run_value_routine(&mut self, inputs: &[f64]) {
        assert_eq!(inputs.len(), self.dimension, "wrong number of inputs");
        self.regs.values[..self.dimension].copy_from_slice(inputs);
        for instr in self.value_code.iter() {
            instr(&mut self.regs);
        }
    }

    /// Evaluate the function at `inputs`.
    ///
    /// # Panics
    /// Panics if `inputs.len() != self.dimension()`.
    pub fn evaluate(&mut self, inputs: &[f64]) -> f64 {
        self.run_value_routine(inputs);
        self.output_value()
    }

    /// Run both routines. Writes the gradient into `gradient` and returns the
    /// function value.
    ///
    /// # Panics
    /// Panics if either slice length differs from `self.dimension()`.
    pub fn differentiate(&mut self, inputs: &[f64], gradient: &mut [f64]) -> f64 {
        assert_eq!(gradient.len(), self.dimension, "wrong gradient length");
        self.run_value_routine(inputs);

        let diffs = &mut self.regs.diffs;
        diffs.iter_mut().for_each(|d| *d = 0.0);
        if let Some(last) = diffs.last_mut() {
            *last = 1.0;
        }
        for instr in self.derivative_code.iter() {
            instr(&mut self.regs);
        }

        gradient.copy_from_slice(&self.regs.diffs[..self.dimension]);
        self.output_value()
    }

    #[inline]
    fn output_value(&self) -> f64 {
        self.regs.values.last().copied().unwrap_or(f64::NAN)
    }
}

impl fmt::Debug for JitProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JitProgram")
            .field("dimension", &self.dimension)
            .field("value_instructions", &self.value_code.len())
            .field("derivative_instructions", &self.derivative_code.len())
            .finish()
    }
}

fn sources(tape: &Tape, i: usize) -> Vec<usize> {
    tape.inputs(i).iter().map(|e| e.source as usize).collect()
}

fn emit_value_routine(tape: &Tape) -> Vec<Instr> {
    let mut code: Vec<Instr> = Vec::with_capacity(tape.len() - tape.dimension());
    for (i, el) in tape.elements.iter().enumerate().skip(tape.dimension()) {
        let src = sources(tape, i);
        trace!("value[{i}] <- {:?} {src:?}", el.op);
        let instr: Instr = match el.op {
            Op::Input | Op::Const => continue,
            Op::Sum if src.len() == 2 => {
                let (a, b) = (src[0], src[1]);
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a] + r.values[b])
            }
            Op::Sum => {
                let src: Box<[usize]> = src.into();
                Arc::new(move |r: &mut Registers| {
                    r.values[i] = src.iter().fold(0.0, |acc, &s| acc + r.values[s]);
                })
            }
            Op::Product => {
                let (a, b) = (src[0], src[1]);
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a] * r.values[b])
            }
            Op::ConstPower(k) if k == 1.0 => {
                let a = src[0];
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a])
            }
            Op::ConstPower(k) if k == 2.0 => {
                let a = src[0];
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a] * r.values[a])
            }
            Op::ConstPower(k) => {
                let a = src[0];
                Arc::new(move |r: &mut Registers| r.values[i] = rules::const_power(r.values[a], k))
            }
            Op::TermPower => {
                let (a, b) = (src[0], src[1]);
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a].powf(r.values[b]))
            }
            Op::Exp => {
                let a = src[0];
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a].exp())
            }
            Op::Log => {
                let a = src[0];
                Arc::new(move |r: &mut Registers| r.values[i] = r.values[a].ln())
            }
            Op::Unary(h) => {
                let f = tape.callbacks.unary(h).clone();
                let a = src[0];
                Arc::new(move |r: &mut Registers| r.values[i] = f.eval(r.values[a]))
            }
            Op::Binary(h) => {
                let f = tape.callbacks.binary(h).clone();
                let (a, b) = (src[0], src[1]);
                Arc::new(move |r: &mut Registers| r.values[i] = f.eval(r.values[a], r.values[b]))
            }
            Op::Nary(h) => {
                let f = tape.callbacks.nary(h).clone();
                let src: Box<[usize]> = src.into();
                Arc::new(move |r: &mut Registers| {
                    r.scratch.clear();
                    r.scratch.extend(src.iter().map(|&s| r.values[s]));
                    r.values[i] = f.eval(&r.scratch);
                })
            }
        };
        code.push(instr);
    }
    code
}

fn emit_derivative_routine(tape: &Tape) -> Vec<Instr> {
    let n = tape.len();
    let mut code: Vec<Instr> = Vec::with_capacity(tape.num_edges() + tape.num_callback_nodes());

    // Prologue: one call per callback node, partials cached by edge index.
    for (j, el) in tape.elements.iter().enumerate() {
        let range = el.inputs.range();
        let src = sources(tape, j);
        let instr: Instr = match el.op {
            Op::Unary(h) => {
                let f = tape.callbacks.unary(h).clone();
                let (a, e) = (src[0], range.start);
                Arc::new(move |r: &mut Registers| r.partials[e] = f.derivative(r.values[a]))
            }
            Op::Binary(h) => {
                let f = tape.callbacks.binary(h).clone();
                let (a, b, e) = (src[0], src[1], range.start);
                Arc::new(move |r: &mut Registers| {
                    let (da, db) = f.partials(r.values[a], r.values[b]);
                    r.partials[e] = da;
                    r.partials[e + 1] = db;
                })
            }
            Op::Nary(h) => {
                let f = tape.callbacks.nary(h).clone();
                let src: Box<[usize]> = src.into();
                Arc::new(move |r: &mut Registers| {
                    r.scratch.clear();
                    r.scratch.extend(src.iter().map(|&s| r.values[s]));
                    f.gradient(&r.scratch, &mut r.partials[range.clone()]);
                })
            }
            _ => continue,
        };
        trace!("partials[{j}] <- {:?}", el.op);
        code.push(instr);
    }

    // Consumers of each slot as (consumer, edge position), consumers in
    // descending order to match the interpreted reverse sweep.
    let mut consumers: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for j in (0..n).rev() {
        for (k, e) in tape.inputs(j).iter().enumerate() {
            consumers[e.source as usize].push((j, k));
        }
    }

    for i in (0..n).rev() {
        if tape.elements[i].op == Op::Const {
            continue;
        }
        for &(j, k) in &consumers[i] {
            trace!("diff[{i}] += diff[{j}] * d{:?}/d{k}", tape.elements[j].op);
            code.push(accumulate(tape, i, j, k));
        }
    }
    code
}

/// `diff[i] += diff[j] * ∂value[j]/∂(operand k)`, where operand `k` of `j`
/// is slot `i`.
fn accumulate(tape: &Tape, i: usize, j: usize, k: usize) -> Instr {
    let src = sources(tape, j);
    match tape.elements[j].op {
        Op::Sum => Arc::new(move |r: &mut Registers| {
            let d = r.diffs[j];
            r.diffs[i] += d;
        }),
        Op::Product => {
            let other = src[1 - k];
            Arc::new(move |r: &mut Registers| {
                let d = r.diffs[j] * r.values[other];
                r.diffs[i] += d;
            })
        }
        Op::ConstPower(p) => Arc::new(move |r: &mut Registers| {
            let d = r.diffs[j] * rules::const_power_partial(r.values[i], p);
            r.diffs[i] += d;
        }),
        Op::TermPower => {
            let (base, exponent) = (src[0], src[1]);
            Arc::new(move |r: &mut Registers| {
                let (db, de) = rules::reverse_partials(
                    Op::TermPower,
                    r.values[base],
                    r.values[exponent],
                    r.values[j],
                );
                let d = r.diffs[j] * if k == 0 { db } else { de };
                r.diffs[i] += d;
            })
        }
        Op::Exp => Arc::new(move |r: &mut Registers| {
            let d = r.diffs[j] * r.values[j];
            r.diffs[i] += d;
        }),
        Op::Log => Arc::new(move |r: &mut Registers| {
            let d = r.diffs[j] * (1.0 / r.values[i]);
            r.diffs[i] += d;
        }),
        Op::Unary(_) | Op::Binary(_) | Op::Nary(_) => {
            let e = tape.elements[j].inputs.offset as usize + k;
            Arc::new(move |r: &mut Registers| {
                let d = r.diffs[j] * r.partials[e];
                r.diffs[i] += d;
            })
        }
        Op::Input | Op::Const => unreachable!("leaves have no operands"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::UnaryFunc;
    use crate::term::{Term, Variable};

    #[test]
    fn routine_sizes() {
        let x = Variable::new();
        let y = Variable::new();
        // x*y + exp(x): product, exp, sum
        let f = Term::sum([Term::product(&x, &y), Term::exp_of(&x)]).unwrap();
        let tape = Tape::from_term(&f, &[x, y]).unwrap();
        let jit = JitProgram::build(&tape, true).unwrap();
        assert_eq!(jit.value_routine_len(), 3);
        // one accumulation per edge: 2 (product) + 1 (exp) + 2 (sum)
        assert_eq!(jit.derivative_routine_len(), 5);
    }

    #[test]
    fn constants_get_no_instructions() {
        let x = Variable::new();
        let f = Term::product(&x, 3.0);
        let tape = Tape::from_term(&f, &[x]).unwrap();
        let mut jit = JitProgram::build(&tape, true).unwrap();
        assert_eq!(jit.value_routine_len(), 1);
        assert_eq!(jit.derivative_routine_len(), 1);
        let mut g = [0.0];
        assert_eq!(jit.differentiate(&[2.0], &mut g), 6.0);
        assert_eq!(g, [3.0]);
    }

    #[test]
    fn callbacks_refused_when_disabled() {
        let x = Variable::new();
        let f = Term::unary(UnaryFunc::from_fns(f64::sin, f64::cos), &x);
        let tape = Tape::from_term(&f, &[x]).unwrap();
        assert_eq!(
            JitProgram::build(&tape, false).unwrap_err(),
            CompileError::CallbacksNotSupported { count: 1 }
        );
        let mut jit = JitProgram::build(&tape, true).unwrap();
        // prologue + one accumulation
        assert_eq!(jit.derivative_routine_len(), 2);
        let mut g = [0.0];
        jit.differentiate(&[0.0], &mut g);
        assert_eq!(g, [1.0]);
    }

    #[test]
    fn clones_are_independent() {
        let x = Variable::new();
        let tape = Tape::from_term(&Term::exp_of(&x), &[x]).unwrap();
        let mut a = JitProgram::build(&tape, true).unwrap();
        let mut b = a.clone();
        assert_eq!(a.evaluate(&[0.0]), 1.0);
        assert!((b.evaluate(&[1.0]) - std::f64::consts::E).abs() < 1e-15);
        assert_eq!(a.output_value(), 1.0);
    }
}
