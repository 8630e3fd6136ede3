//! Preconditioned Richardson iteration.
//!
//! One step applies the preconditioner to the current defect and adds
//! the update to the iterate. Without a preconditioner the update is the
//! defect itself.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::solver::driver::{defect, IterationDriver};
use crate::solver::{match_categories, LinearSolver, SolverCategory};
use crate::utils::convergence::SolveStats;

pub struct LoopSolver<T> {
    pub driver: IterationDriver<T>,
    pub category: SolverCategory,
}

impl<T: Copy + num_traits::Float> LoopSolver<T> {
    pub fn new(reduction: T, max_iters: usize) -> Self {
        Self {
            driver: IterationDriver::new(reduction, max_iters),
            category: SolverCategory::Sequential,
        }
    }

    pub fn with_verbosity(mut self, verbose: usize) -> Self {
        self.driver = self.driver.with_verbosity(verbose);
        self
    }
}

impl<M, V, T> LinearSolver<M, V> for LoopSolver<T>
where
    M: MatVec<V>,
    (): InnerProduct<V, Scalar = T>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: num_traits::Float + From<f64>,
{
    type Error = IdexError;
    type Scalar = T;

    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<T>, IdexError> {
        if let Some(pc) = pc {
            match_categories(self.category, pc.category())?;
        }
        let n = b.as_ref().len();
        let ip = ();
        let mut xk = x.as_ref().to_vec();
        let mut d = defect(a, b, &V::from(xk.clone()));
        let def0 = ip.norm(&d);
        let mut it = self.driver.begin("LoopSolver", def0);
        if it.converged() {
            return Ok(it.finish());
        }

        let mut v = V::from(vec![T::zero(); n]);
        let mut av = V::from(vec![T::zero(); n]);
        for i in 1..=self.driver.max_iters() {
            match pc {
                Some(pc) => pc.apply(&d, &mut v)?,
                None => v.clone_from(&d),
            }
            for (xj, vj) in xk.iter_mut().zip(v.as_ref()) {
                *xj = *xj + *vj;
            }
            a.matvec(&v, &mut av);
            for (dj, avj) in d.as_mut().iter_mut().zip(av.as_ref()) {
                *dj = *dj - *avj;
            }
            if it.step(i, ip.norm(&d)) {
                break;
            }
        }
        *x = V::from(xk);
        Ok(it.finish())
    }
}
