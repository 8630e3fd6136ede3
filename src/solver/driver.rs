//! The iteration loop skeleton shared by all solvers.
//!
//! Every Krylov method tracks the same things around its recurrences:
//! the initial defect, the per-iteration convergence check and the
//! verbosity reporting. `IterationDriver` centralizes that so the solver
//! files contain only their recurrences.

use num_traits::Float;

use crate::core::traits::MatVec;
use crate::utils::convergence::{Convergence, SolveStats};

/// Verbosity levels: 0 silent, 1 summary line, 2 per-iteration table.
#[derive(Clone, Debug)]
pub struct IterationDriver<T> {
    pub conv: Convergence<T>,
    pub verbose: usize,
}

impl<T: Float> IterationDriver<T> {
    pub fn new(reduction: T, max_iters: usize) -> Self {
        IterationDriver {
            conv: Convergence {
                reduction,
                max_iters,
            },
            verbose: 0,
        }
    }

    pub fn with_verbosity(mut self, verbose: usize) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_iters(&self) -> usize {
        self.conv.max_iters
    }

    /// Start a solve from the initial defect norm.
    pub fn begin(&self, name: &str, res0: T) -> Iteration<'_, T> {
        if self.verbose > 0 {
            println!("=== {name}");
        }
        if self.verbose > 1 {
            println!("{:>6} {:>16}", "iter", "defect");
            println!("{:>6} {:>16.6e}", 0, to_f64(res0));
        }
        Iteration {
            driver: self,
            res0,
            res: res0,
            iterations: 0,
            converged: res0 <= T::zero(),
        }
    }
}

/// State of one running solve.
pub struct Iteration<'d, T> {
    driver: &'d IterationDriver<T>,
    res0: T,
    res: T,
    iterations: usize,
    converged: bool,
}

impl<'d, T: Float> Iteration<'d, T> {
    /// Record the defect norm of iteration `i`; returns true when the
    /// solve should stop (converged or iteration cap reached).
    pub fn step(&mut self, i: usize, res: T) -> bool {
        if self.driver.verbose > 1 {
            println!("{:>6} {:>16.6e}", i, to_f64(res));
        }
        let (stop, converged) = self.driver.conv.check(res, self.res0, i);
        self.res = res;
        self.iterations = i;
        self.converged = converged;
        stop
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Close the solve and emit the summary line.
    pub fn finish(self) -> SolveStats<T> {
        if self.driver.verbose > 0 {
            let reduction = if self.res0 > T::zero() {
                self.res / self.res0
            } else {
                T::zero()
            };
            let rate = if self.iterations > 0 {
                to_f64(reduction).powf(1.0 / self.iterations as f64)
            } else {
                0.0
            };
            println!(
                "=== rate={rate:.4e}, iterations={}, reduction={:.4e}, converged={}",
                self.iterations,
                to_f64(reduction),
                self.converged
            );
        }
        SolveStats {
            iterations: self.iterations,
            final_residual: self.res,
            converged: self.converged,
        }
    }
}

fn to_f64<T: Float>(v: T) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Initial defect d = b - A x.
pub(crate) fn defect<M, V, T>(a: &M, b: &V, x: &V) -> V
where
    M: MatVec<V>,
    V: AsRef<[T]> + From<Vec<T>>,
    T: Float,
{
    let n = b.as_ref().len();
    let mut tmp = V::from(vec![T::zero(); n]);
    a.matvec(x, &mut tmp);
    V::from(
        tmp.as_ref()
            .iter()
            .zip(b.as_ref())
            .map(|(&ax, &bi)| bi - ax)
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_when_reduction_is_met() {
        let driver = IterationDriver::new(1e-6, 100);
        let mut it = driver.begin("test", 1.0);
        assert!(!it.step(1, 0.1));
        assert!(it.step(2, 1e-7));
        let stats = it.finish();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 2);
    }

    #[test]
    fn cap_stops_without_convergence() {
        let driver = IterationDriver::new(1e-12, 3);
        let mut it = driver.begin("test", 1.0);
        assert!(!it.step(1, 0.9));
        assert!(!it.step(2, 0.8));
        assert!(it.step(3, 0.7));
        let stats = it.finish();
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 3);
    }
}
