//! Iterative solvers on random dense systems.
//!
//! Systems are built with `faer` matrices through the `MatVec` wrapper;
//! right-hand sides are manufactured from a known solution so results
//! can be compared elementwise.

use approx::assert_abs_diff_eq;
use faer::Mat;
use idex::core::traits::MatVec;
use idex::preconditioner::{Identity, Preconditioner};
use idex::solver::{
    BiCgStabSolver, CgSolver, GmresSolver, LinearSolver, LoopSolver, MinresSolver, PcgSolver,
    SolverCategory,
};
use idex::IdexError;
use rand::Rng;

/// Random SPD matrix A = Mᵀ M + n·I and a manufactured solution.
fn random_spd(n: usize) -> (Mat<f64>, Vec<f64>, Vec<f64>) {
    let mut rng = rand::thread_rng();
    let data: Vec<f64> = (0..n * n).map(|_| rng.gen::<f64>()).collect();
    let m = Mat::from_fn(n, n, |i, j| data[j * n + i]);
    let a = Mat::from_fn(n, n, |i, j| {
        let mut acc = if i == j { n as f64 } else { 0.0 };
        for k in 0..n {
            acc += m[(k, i)] * m[(k, j)];
        }
        acc
    });
    let x_true: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let mut b = vec![0.0; n];
    a.matvec(&x_true, &mut b);
    (a, x_true, b)
}

/// Random diagonally dominant non-symmetric matrix.
fn random_dominant(n: usize) -> (Mat<f64>, Vec<f64>, Vec<f64>) {
    let mut rng = rand::thread_rng();
    let data: Vec<f64> = (0..n * n).map(|_| rng.gen::<f64>()).collect();
    let a = Mat::from_fn(n, n, |i, j| {
        let v = data[i * n + j];
        if i == j {
            n as f64 + v
        } else {
            v
        }
    });
    let x_true: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let mut b = vec![0.0; n];
    a.matvec(&x_true, &mut b);
    (a, x_true, b)
}

#[test]
fn cg_on_random_spd() {
    let (a, x_true, b) = random_spd(12);
    let mut x = vec![0.0; 12];
    let mut solver = CgSolver::new(1e-12, 500);
    let stats = solver.solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    for (xi, ei) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn pcg_on_random_spd_with_jacobi() {
    let (a, x_true, b) = random_spd(12);
    struct InvDiag(Vec<f64>);
    impl Preconditioner<Mat<f64>, Vec<f64>> for InvDiag {
        fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), IdexError> {
            for ((zi, ri), di) in z.iter_mut().zip(r).zip(&self.0) {
                *zi = ri / di;
            }
            Ok(())
        }
    }
    let pc = InvDiag((0..12).map(|i| a[(i, i)]).collect());
    let mut x = vec![0.0; 12];
    let mut solver = PcgSolver::new(1e-12, 500);
    let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged);
    for (xi, ei) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn minres_on_random_spd() {
    let (a, x_true, b) = random_spd(10);
    let mut x = vec![0.0; 10];
    let mut solver = MinresSolver::new(1e-12, 500);
    let stats = solver.solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    for (xi, ei) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn bicgstab_on_random_dominant() {
    let (a, x_true, b) = random_dominant(10);
    let mut x = vec![0.0; 10];
    let mut solver = BiCgStabSolver::new(1e-12, 500);
    let stats = solver.solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    for (xi, ei) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn gmres_on_random_dominant() {
    let (a, x_true, b) = random_dominant(10);
    let mut x = vec![0.0; 10];
    let mut solver = GmresSolver::new(10, 1e-12, 500);
    let stats = solver.solve(&a, None, &b, &mut x).unwrap();
    assert!(stats.converged);
    for (xi, ei) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn loop_solver_with_jacobi_on_dominant() {
    let (a, x_true, b) = random_dominant(8);
    struct InvDiag(Vec<f64>);
    impl Preconditioner<Mat<f64>, Vec<f64>> for InvDiag {
        fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), IdexError> {
            for ((zi, ri), di) in z.iter_mut().zip(r).zip(&self.0) {
                *zi = ri / di;
            }
            Ok(())
        }
    }
    let pc = InvDiag((0..8).map(|i| a[(i, i)]).collect());
    let mut x = vec![0.0; 8];
    let mut solver = LoopSolver::new(1e-10, 2000);
    let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged, "Jacobi-preconditioned Richardson diverged");
    for (xi, ei) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn mismatched_categories_are_rejected() {
    struct OverlappingIdentity;
    impl Preconditioner<Mat<f64>, Vec<f64>> for OverlappingIdentity {
        fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), IdexError> {
            z.clone_from(r);
            Ok(())
        }
        fn category(&self) -> SolverCategory {
            SolverCategory::Overlapping
        }
    }
    let (a, _, b) = random_spd(4);
    let mut x = vec![0.0; 4];
    let mut solver = PcgSolver::new(1e-10, 10);
    let err = solver
        .solve(&a, Some(&OverlappingIdentity), &b, &mut x)
        .unwrap_err();
    assert!(matches!(err, IdexError::CategoryMismatch(_)));

    // Matching categories pass the check.
    let mut solver = PcgSolver::new(1e-10, 100);
    assert!(solver.solve(&a, Some(&Identity), &b, &mut x).is_ok());
}
