//! Restarted GMRES (Saad §6.4) with optional left preconditioning.
//!
//! Arnoldi with modified Gram-Schmidt, Givens rotations for the
//! least-squares update and happy-breakdown detection. With a left
//! preconditioner the reported defect norms are preconditioned norms.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::solver::driver::{defect, IterationDriver};
use crate::solver::{match_categories, LinearSolver, SolverCategory};
use crate::utils::convergence::SolveStats;

pub struct GmresSolver<T> {
    /// Number of Arnoldi vectors before restart.
    pub restart: usize,
    pub driver: IterationDriver<T>,
    pub category: SolverCategory,
}

impl<T: Copy + num_traits::Float> GmresSolver<T> {
    pub fn new(restart: usize, reduction: T, max_iters: usize) -> Self {
        Self {
            restart,
            driver: IterationDriver::new(reduction, max_iters),
            category: SolverCategory::Sequential,
        }
    }

    pub fn with_verbosity(mut self, verbose: usize) -> Self {
        self.driver = self.driver.with_verbosity(verbose);
        self
    }

    /// Solve the upper-triangular least-squares system Hy = g.
    fn back_substitution(h: &[Vec<T>], g: &[T], y: &mut [T], m: usize) {
        for i in (0..m).rev() {
            y[i] = g[i];
            for j in (i + 1)..m {
                y[i] = y[i] - h[i][j] * y[j];
            }
            if h[i][i].abs() > T::epsilon() {
                y[i] = y[i] / h[i][i];
            } else {
                y[i] = T::zero();
            }
        }
    }
}

impl<M, V, T> LinearSolver<M, V> for GmresSolver<T>
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
        if self.restart == 0 {
            return Err(IdexError::SolveError(
                "GMRES restart length must be positive".into(),
            ));
        }
        let n = b.as_ref().len();
        let ip = ();
        let mut xk = x.as_ref().to_vec();

        let preconditioned_defect = |xk: &[T]| -> Result<V, IdexError> {
            let r = defect(a, b, &V::from(xk.to_vec()));
            match pc {
                Some(pc) => {
                    let mut z = V::from(vec![T::zero(); n]);
                    pc.apply(&r, &mut z)?;
                    Ok(z)
                }
                None => Ok(r),
            }
        };

        let mut r = preconditioned_defect(&xk)?;
        let mut beta = ip.norm(&r);
        let mut it = self.driver.begin("GmresSolver", beta);
        if it.converged() {
            return Ok(it.finish());
        }

        let mut iteration = 0;
        'outer: while iteration < self.driver.max_iters() {
            let mut v_basis: Vec<V> = Vec::with_capacity(self.restart + 1);
            v_basis.push(V::from(
                r.as_ref().iter().map(|&ri| ri / beta).collect::<Vec<_>>(),
            ));
            let mut h = vec![vec![T::zero(); self.restart]; self.restart + 1];
            let mut g = vec![T::zero(); self.restart + 1];
            g[0] = beta;
            let mut cs = vec![T::zero(); self.restart];
            let mut sn = vec![T::zero(); self.restart];
            let mut m = 0;
            let mut stop = false;

            for j in 0..self.restart {
                iteration += 1;
                // Arnoldi step on (M⁻¹)A with modified Gram-Schmidt.
                let mut w = V::from(vec![T::zero(); n]);
                a.matvec(&v_basis[j], &mut w);
                if let Some(pc) = pc {
                    let mut z = V::from(vec![T::zero(); n]);
                    pc.apply(&w, &mut z)?;
                    w = z;
                }
                for i in 0..=j {
                    h[i][j] = ip.dot(&w, &v_basis[i]);
                    for (wk, vik) in w.as_mut().iter_mut().zip(v_basis[i].as_ref()) {
                        *wk = *wk - h[i][j] * *vik;
                    }
                }
                h[j + 1][j] = ip.norm(&w);
                let happy = h[j + 1][j] < T::epsilon();
                if !happy {
                    v_basis.push(V::from(
                        w.as_ref()
                            .iter()
                            .map(|&wi| wi / h[j + 1][j])
                            .collect::<Vec<_>>(),
                    ));
                }

                // Apply previous rotations, then annihilate h[j+1][j].
                for i in 0..j {
                    let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
                    h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
                    h[i][j] = temp;
                }
                let rho = (h[j][j] * h[j][j] + h[j + 1][j] * h[j + 1][j]).sqrt();
                if rho < T::epsilon() {
                    cs[j] = T::one();
                    sn[j] = T::zero();
                } else {
                    cs[j] = h[j][j] / rho;
                    sn[j] = h[j + 1][j] / rho;
                }
                h[j][j] = cs[j] * h[j][j] + sn[j] * h[j + 1][j];
                h[j + 1][j] = T::zero();
                let temp = cs[j] * g[j];
                g[j + 1] = -sn[j] * g[j];
                g[j] = temp;

                m = j + 1;
                stop = it.step(iteration, g[j + 1].abs());
                if stop || happy {
                    break;
                }
            }

            // Update the iterate from the least-squares solution.
            let mut y = vec![T::zero(); m];
            Self::back_substitution(&h, &g, &mut y, m);
            for (j, yj) in y.iter().enumerate() {
                for (xk_i, vj_i) in xk.iter_mut().zip(v_basis[j].as_ref()) {
                    *xk_i = *xk_i + *yj * *vj_i;
                }
            }
            if stop || it.converged() {
                break 'outer;
            }
            r = preconditioned_defect(&xk)?;
            beta = ip.norm(&r);
            if beta <= T::zero() {
                break;
            }
        }
        *x = V::from(xk);
        Ok(it.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MatVec;
    use crate::preconditioner::Preconditioner;

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

    fn nonsym_4x4() -> (DenseMat, Vec<f64>, Vec<f64>) {
        let a = DenseMat {
            data: vec![
                vec![4.0, 1.0, 0.0, 0.0],
                vec![1.0, 3.0, 1.0, 0.0],
                vec![0.0, 1.0, 2.0, 1.0],
                vec![0.0, 0.0, 1.0, 3.0],
            ],
        };
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let mut b = vec![0.0; 4];
        a.matvec(&x_true, &mut b);
        (a, b, x_true)
    }

    #[test]
    fn gmres_solves_nonsymmetric() {
        let (a, b, x_true) = nonsym_4x4();
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(4, 1e-10, 100);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "GMRES did not converge: {stats:?}");
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {xi}, expected = {ei}");
        }
    }

    #[test]
    fn restarted_gmres_converges() {
        let (a, b, x_true) = nonsym_4x4();
        let mut x = vec![0.0; 4];
        // Restart shorter than the problem dimension.
        let mut solver = GmresSolver::new(2, 1e-10, 200);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "restarted GMRES did not converge");
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-7, "xi = {xi}, expected = {ei}");
        }
    }

    #[test]
    fn gmres_with_jacobi_preconditioner() {
        let (a, b, x_true) = nonsym_4x4();
        let pc = InvDiag(vec![4.0, 3.0, 2.0, 3.0]);
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(4, 1e-10, 100);
        let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged, "GMRES+Jacobi did not converge");
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {xi}, expected = {ei}");
        }
    }
}
