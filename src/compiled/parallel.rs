use rayon::prelude::*;

use crate::error::{check_len, ArgumentError};

impl super::CompiledTerm {
    /// Value and gradient at each of `points`, evaluated in parallel.
    ///
    /// Takes `&self`: every rayon worker clones its own instance, so the
    /// buffers of `self` are never shared. Results are in input order.
    ///
    /// # Errors
    /// [`ArgumentError::LengthMismatch`] if any point has the wrong length;
    /// no point is evaluated in that case.
    pub fn gradient_batch_par(
        &self,
        points: &[&[f64]],
    ) -> Result<Vec<(f64, Vec<f64>)>, ArgumentError> {
        let dim = self.dimension();
        for p in points {
            check_len("point", dim, p.len())?;
        }

        points
            .par_iter()
            .map_init(|| self.clone(), |local, p| local.gradient(p))
            .collect()
    }

    /// Function value at each of `points`, evaluated in parallel.
    ///
    /// # Errors
    /// As for [`gradient_batch_par`](Self::gradient_batch_par).
    pub fn evaluate_batch_par(&self, points: &[&[f64]]) -> Result<Vec<f64>, ArgumentError> {
        let dim = self.dimension();
        for p in points {
            check_len("point", dim, p.len())?;
        }

        points
            .par_iter()
            .map_init(|| self.clone(), |local, p| local.evaluate(p))
            .collect()
    }
}
