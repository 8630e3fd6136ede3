//! Conjugate Gradient (unpreconditioned) per Saad §6.1.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::solver::driver::{defect, IterationDriver};
use crate::solver::{LinearSolver, SolverCategory};
use crate::utils::convergence::SolveStats;

pub struct CgSolver<T> {
    pub driver: IterationDriver<T>,
    pub category: SolverCategory,
}

impl<T: Copy + num_traits::Float> CgSolver<T> {
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

impl<M, V, T> LinearSolver<M, V> for CgSolver<T>
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
        let _ = pc; // CG does not use a preconditioner
        let n = b.as_ref().len();
        let ip = ();
        let mut xk = x.as_ref().to_vec();
        let mut r = defect(a, b, &V::from(xk.clone()));
        let mut p = r.clone();
        let mut rsq = ip.dot(&r, &r);
        let res0 = rsq.sqrt();
        let mut it = self.driver.begin("CgSolver", res0);
        if it.converged() {
            return Ok(it.finish());
        }

        let mut ap = V::from(vec![T::zero(); n]);
        for i in 1..=self.driver.max_iters() {
            a.matvec(&p, &mut ap);
            let alpha = rsq / ip.dot(&p, &ap);
            for (xj, pj) in xk.iter_mut().zip(p.as_ref()) {
                *xj = *xj + alpha * *pj;
            }
            for (rj, apj) in r.as_mut().iter_mut().zip(ap.as_ref()) {
                *rj = *rj - alpha * *apj;
            }
            let rsq_new = ip.dot(&r, &r);
            if it.step(i, rsq_new.sqrt()) {
                break;
            }
            let beta = rsq_new / rsq;
            for (pj, rj) in p.as_mut().iter_mut().zip(r.as_ref()) {
                *pj = *rj + beta * *pj;
            }
            rsq = rsq_new;
        }
        *x = V::from(xk);
        Ok(it.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MatVec;

    // Simple dense matrix type for testing
    #[derive(Clone)]
    struct DenseMat {
        data: Vec<Vec<f64>>,
    }
    impl MatVec<Vec<f64>> for DenseMat {
        fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
            for (i, row) in self.data.iter().enumerate() {
                y[i] = row.iter().zip(x.iter()).map(|(a, b)| a * b).sum();
            }
        }
    }

    #[test]
    fn cg_solves_simple_spd() {
        // SPD system: [[4,1],[1,3]] x = [1,2]
        let a = DenseMat {
            data: vec![vec![4.0, 1.0], vec![1.0, 3.0]],
        };
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        let expected = [0.09090909090909091, 0.6363636363636364];
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {xi}, expected = {ei}");
        }
        assert!(stats.converged, "CG did not converge");
    }

    #[test]
    fn cg_solves_spd() {
        // A = [[4,1,0],[1,3,1],[0,1,2]], b = A * [1,2,3]
        let a = DenseMat {
            data: vec![
                vec![4.0, 1.0, 0.0],
                vec![1.0, 3.0, 1.0],
                vec![0.0, 1.0, 2.0],
            ],
        };
        let x_true = vec![1.0, 2.0, 3.0];
        let b = {
            let mut b = vec![0.0; 3];
            a.matvec(&x_true, &mut b);
            b
        };
        let mut x = vec![0.0; 3];
        let mut solver = CgSolver::new(1e-10, 100);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        let mut r = vec![0.0; 3];
        a.matvec(&x, &mut r);
        let res_norm = r
            .iter()
            .zip(b.iter())
            .map(|(ri, bi)| (bi - ri) * (bi - ri))
            .sum::<f64>()
            .sqrt();
        assert!(res_norm <= 1e-8, "final residual = {res_norm:.6}");
        assert!(stats.converged, "CG did not converge");
    }
}
