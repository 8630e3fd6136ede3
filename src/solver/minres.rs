//! MINRES for symmetric (possibly indefinite) systems, per
//! Paige & Saunders: a Lanczos recurrence with Givens rotations applied
//! on the fly, so the residual norm falls out of the rotation state.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::solver::driver::{defect, IterationDriver};
use crate::solver::{LinearSolver, SolverCategory};
use crate::utils::convergence::SolveStats;

pub struct MinresSolver<T> {
    pub driver: IterationDriver<T>,
    pub category: SolverCategory,
}

impl<T: Copy + num_traits::Float> MinresSolver<T> {
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

impl<M, V, T> LinearSolver<M, V> for MinresSolver<T>
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
        let _ = pc; // MINRES runs unpreconditioned here
        let n = b.as_ref().len();
        let ip = ();
        let mut xk = x.as_ref().to_vec();
        let r = defect(a, b, &V::from(xk.clone()));
        let beta1 = ip.norm(&r);
        let mut it = self.driver.begin("MinresSolver", beta1);
        if it.converged() {
            return Ok(it.finish());
        }

        // Lanczos vectors v_{k-1}, v_k and direction history w_{k-1}, w_{k-2}.
        let mut v_old = V::from(vec![T::zero(); n]);
        let mut v = V::from(
            r.as_ref()
                .iter()
                .map(|&ri| ri / beta1)
                .collect::<Vec<_>>(),
        );
        let mut w1 = V::from(vec![T::zero(); n]);
        let mut w2 = V::from(vec![T::zero(); n]);
        let mut beta = beta1;
        let mut eta = beta1;
        // Rotation state of the two previous iterations.
        let (mut c0, mut c1) = (T::one(), T::one());
        let (mut s0, mut s1) = (T::zero(), T::zero());

        let mut q = V::from(vec![T::zero(); n]);
        for i in 1..=self.driver.max_iters() {
            // Lanczos step: q = A v_k - alpha v_k - beta v_{k-1}
            a.matvec(&v, &mut q);
            let alpha = ip.dot(&v, &q);
            for ((qj, vj), voj) in q.as_mut().iter_mut().zip(v.as_ref()).zip(v_old.as_ref()) {
                *qj = *qj - alpha * *vj - beta * *voj;
            }
            let beta_new = ip.norm(&q);

            // Apply the two previous rotations to the new column, then
            // form the rotation annihilating beta_new.
            let delta = c1 * alpha - c0 * s1 * beta;
            let rho2 = s1 * alpha + c0 * c1 * beta;
            let rho3 = s0 * beta;
            let rho1 = (delta * delta + beta_new * beta_new).sqrt();
            if rho1 < T::epsilon() {
                break; // singular tridiagonal block
            }
            let c_new = delta / rho1;
            let s_new = beta_new / rho1;

            // w_new = (v - rho2 w1 - rho3 w2) / rho1 overwrites w2,
            // which is consumed in the same element position.
            let step = c_new * eta;
            for ((wj, vj), w1j) in w2.as_mut().iter_mut().zip(v.as_ref()).zip(w1.as_ref()) {
                *wj = (*vj - rho2 * *w1j - rho3 * *wj) / rho1;
            }
            for (xj, wj) in xk.iter_mut().zip(w2.as_ref()) {
                *xj = *xj + step * *wj;
            }
            std::mem::swap(&mut w1, &mut w2);

            eta = -s_new * eta;
            if it.step(i, eta.abs()) {
                break;
            }
            if beta_new < T::epsilon() {
                break; // invariant subspace reached
            }
            // Shift the Lanczos and rotation history.
            let inv = T::one() / beta_new;
            for (voj, vj) in v_old.as_mut().iter_mut().zip(v.as_ref()) {
                *voj = *vj;
            }
            for (vj, qj) in v.as_mut().iter_mut().zip(q.as_ref()) {
                *vj = *qj * inv;
            }
            beta = beta_new;
            c0 = c1;
            c1 = c_new;
            s0 = s1;
            s1 = s_new;
        }
        *x = V::from(xk);
        Ok(it.finish())
    }
}
