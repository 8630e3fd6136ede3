//! Convergence tracking & tolerance checks for iterative solvers.

/// Stopping criteria: relative defect reduction and iteration cap.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    pub reduction: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    /// Returns (should_stop, converged) for the defect norm at iteration `i`.
    /// Stopping at the iteration cap does not count as convergence.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> (bool, bool) {
        let converged = if res0_norm > T::zero() {
            res_norm / res0_norm <= self.reduction
        } else {
            true
        };
        (converged || i >= self.max_iters, converged)
    }
}
