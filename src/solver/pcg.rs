//! Preconditioned Conjugate Gradient per Saad §9.2, with an optional
//! restart cycle for preconditioners whose action varies between
//! iterations (the generalized variant).

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::solver::driver::{defect, IterationDriver};
use crate::solver::{match_categories, LinearSolver, SolverCategory};
use crate::utils::convergence::SolveStats;

pub struct PcgSolver<T> {
    pub driver: IterationDriver<T>,
    pub category: SolverCategory,
    /// Restart the direction recurrence every `k` iterations. `None`
    /// keeps plain PCG.
    pub restart: Option<usize>,
}

impl<T: Copy + num_traits::Float> PcgSolver<T> {
    pub fn new(reduction: T, max_iters: usize) -> Self {
        Self {
            driver: IterationDriver::new(reduction, max_iters),
            category: SolverCategory::Sequential,
            restart: None,
        }
    }

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = Some(restart);
        self
    }

    pub fn with_verbosity(mut self, verbose: usize) -> Self {
        self.driver = self.driver.with_verbosity(verbose);
        self
    }
}

impl<M, V, T> LinearSolver<M, V> for PcgSolver<T>
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
        let mut z = V::from(vec![T::zero(); n]);
        match pc {
            Some(pc) => pc.apply(&r, &mut z)?,
            None => z.clone_from(&r),
        }
        let mut p = z.clone();
        let mut rz = ip.dot(&r, &z);
        let res0 = ip.norm(&r);
        let mut it = self.driver.begin("PcgSolver", res0);
        if it.converged() {
            return Ok(it.finish());
        }

        let mut ap = V::from(vec![T::zero(); n]);
        for i in 1..=self.driver.max_iters() {
            a.matvec(&p, &mut ap);
            let pap = ip.dot(&p, &ap);
            if pap <= T::zero() {
                return Err(IdexError::SolveError(
                    "indefinite operator detected in PCG".into(),
                ));
            }
            let alpha = rz / pap;
            for (xj, pj) in xk.iter_mut().zip(p.as_ref()) {
                *xj = *xj + alpha * *pj;
            }
            for (rj, apj) in r.as_mut().iter_mut().zip(ap.as_ref()) {
                *rj = *rj - alpha * *apj;
            }
            match pc {
                Some(pc) => pc.apply(&r, &mut z)?,
                None => z.clone_from(&r),
            }
            let rz_new = ip.dot(&r, &z);
            if it.step(i, ip.norm(&r)) {
                break;
            }
            let beta = if self.restart.is_some_and(|k| k > 0 && i % k == 0) {
                T::zero()
            } else {
                let beta = rz_new / rz;
                if beta < T::zero() {
                    return Err(IdexError::SolveError(
                        "indefinite preconditioner detected in PCG".into(),
                    ));
                }
                beta
            };
            for (pj, zj) in p.as_mut().iter_mut().zip(z.as_ref()) {
                *pj = *zj + beta * *pj;
            }
            rz = rz_new;
        }
        *x = V::from(xk);
        Ok(it.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MatVec;
    use crate::preconditioner::Identity;

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

    struct InvDiag(Vec<f64>);
    impl Preconditioner<DenseMat, Vec<f64>> for InvDiag {
        fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), IdexError> {
            for ((zi, ri), di) in z.iter_mut().zip(r).zip(&self.0) {
                *zi = ri / di;
            }
            Ok(())
        }
    }

    fn spd_3x3() -> (DenseMat, Vec<f64>, Vec<f64>) {
        let a = DenseMat {
            data: vec![
                vec![4.0, 1.0, 0.0],
                vec![1.0, 3.0, 1.0],
                vec![0.0, 1.0, 2.0],
            ],
        };
        let x_true = vec![1.0, 2.0, 3.0];
        let mut b = vec![0.0; 3];
        a.matvec(&x_true, &mut b);
        (a, b, x_true)
    }

    #[test]
    fn pcg_with_jacobi_matches_truth() {
        let (a, b, x_true) = spd_3x3();
        let pc = InvDiag(vec![4.0, 3.0, 2.0]);
        let mut x = vec![0.0; 3];
        let mut solver = PcgSolver::new(1e-12, 100);
        let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged, "PCG did not converge: {stats:?}");
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {xi}, expected = {ei}");
        }
    }

    #[test]
    fn restarted_pcg_still_converges() {
        let (a, b, x_true) = spd_3x3();
        let mut x = vec![0.0; 3];
        let mut solver = PcgSolver::new(1e-12, 200).with_restart(2);
        let stats = solver.solve(&a, Some(&Identity), &b, &mut x).unwrap();
        assert!(stats.converged);
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-8);
        }
    }

    #[test]
    fn indefinite_operator_is_reported() {
        let a = DenseMat {
            data: vec![vec![-1.0, 0.0], vec![0.0, -1.0]],
        };
        let b = vec![1.0, 1.0];
        let mut x = vec![0.0, 0.0];
        let mut solver = PcgSolver::new(1e-10, 10);
        let err = solver.solve(&a, None, &b, &mut x).unwrap_err();
        assert!(matches!(err, IdexError::SolveError(_)));
    }
}
