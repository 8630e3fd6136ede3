//! BiCGStab solver (Saad §7.4.2), preconditioned.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::solver::driver::{defect, IterationDriver};
use crate::solver::{match_categories, LinearSolver, SolverCategory};
use crate::utils::convergence::SolveStats;

pub struct BiCgStabSolver<T> {
    pub driver: IterationDriver<T>,
    pub category: SolverCategory,
}

impl<T: Copy + num_traits::Float> BiCgStabSolver<T> {
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

impl<M, V, T> LinearSolver<M, V> for BiCgStabSolver<T>
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
        let mut r = defect(a, b, &V::from(xk.clone()));
        let r_hat = r.clone(); // shadow residual
        let mut rho_prev = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();
        let mut v = V::from(vec![T::zero(); n]);
        let mut p = r.clone();
        let mut y = V::from(vec![T::zero(); n]);
        let mut z = V::from(vec![T::zero(); n]);
        let mut t = V::from(vec![T::zero(); n]);

        let res0 = ip.norm(&r);
        let mut it = self.driver.begin("BiCgStabSolver", res0);
        if it.converged() {
            return Ok(it.finish());
        }

        for i in 1..=self.driver.max_iters() {
            let rho = ip.dot(&r_hat, &r);
            if rho.abs() < T::epsilon() {
                break; // breakdown
            }
            if i > 1 {
                let beta = (rho / rho_prev) * (alpha / omega);
                // p = r + beta * (p - omega * v)
                for ((pj, rj), vj) in p.as_mut().iter_mut().zip(r.as_ref()).zip(v.as_ref()) {
                    *pj = *rj + beta * (*pj - omega * *vj);
                }
            }
            match pc {
                Some(pc) => pc.apply(&p, &mut y)?,
                None => y.clone_from(&p),
            }
            a.matvec(&y, &mut v);
            let den = ip.dot(&r_hat, &v);
            if den.abs() < T::epsilon() {
                break; // breakdown
            }
            alpha = rho / den;
            // s = r - alpha * v (reuse r)
            for (rj, vj) in r.as_mut().iter_mut().zip(v.as_ref()) {
                *rj = *rj - alpha * *vj;
            }
            // Early exit on the half-step residual keeps the half update.
            let s_norm = ip.norm(&r);
            let (_, s_converged) = self.driver.conv.check(s_norm, res0, i);
            if s_converged {
                for (xj, yj) in xk.iter_mut().zip(y.as_ref()) {
                    *xj = *xj + alpha * *yj;
                }
                it.step(i, s_norm);
                break;
            }
            match pc {
                Some(pc) => pc.apply(&r, &mut z)?,
                None => z.clone_from(&r),
            }
            a.matvec(&z, &mut t);
            let tt = ip.dot(&t, &t);
            if tt.abs() < T::epsilon() {
                break; // breakdown
            }
            omega = ip.dot(&t, &r) / tt;
            // x = x + alpha * y + omega * z
            for ((xj, yj), zj) in xk.iter_mut().zip(y.as_ref()).zip(z.as_ref()) {
                *xj = *xj + alpha * *yj + omega * *zj;
            }
            // r = s - omega * t
            for (rj, tj) in r.as_mut().iter_mut().zip(t.as_ref()) {
                *rj = *rj - omega * *tj;
            }
            if it.step(i, ip.norm(&r)) {
                break;
            }
            if omega.abs() < T::epsilon() {
                break; // breakdown
            }
            rho_prev = rho;
        }
        *x = V::from(xk);
        Ok(it.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    // Well-conditioned non-symmetric 3x3 system
    fn nonsym_3x3() -> (Mat<f64>, Vec<f64>) {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { 4.0 } else { (i + 2 * j) as f64 * 0.3 });
        let x_true = vec![1.0, 2.0, 3.0];
        let mut b = vec![0.0; 3];
        for i in 0..3 {
            for j in 0..3 {
                b[i] += a[(i, j)] * x_true[j];
            }
        }
        (a, b)
    }

    #[test]
    fn bicgstab_solves_nonsymmetric() {
        let (a, b) = nonsym_3x3();
        let mut x = vec![0.0; 3];
        let mut solver = BiCgStabSolver::new(1e-10, 100);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "BiCGStab did not converge: {stats:?}");
        let x_true = [1.0, 2.0, 3.0];
        for i in 0..3 {
            assert!((x[i] - x_true[i]).abs() < 1e-7, "x[{i}] = {}", x[i]);
        }
    }

    #[test]
    fn bicgstab_with_identity_pc_matches_plain() {
        use crate::preconditioner::Identity;
        let (a, b) = nonsym_3x3();
        let mut x_plain = vec![0.0; 3];
        let mut x_pc = vec![0.0; 3];
        BiCgStabSolver::new(1e-10, 100)
            .solve(&a, None, &b, &mut x_plain)
            .unwrap();
        BiCgStabSolver::new(1e-10, 100)
            .solve(&a, Some(&Identity), &b, &mut x_pc)
            .unwrap();
        for (p, q) in x_plain.iter().zip(x_pc.iter()) {
            assert!((p - q).abs() < 1e-9);
        }
    }
}
