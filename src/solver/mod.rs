//! Iterative solver interfaces.

use crate::error::IdexError;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::SolveStats;

/// Parallelization category of operators, scalar products,
/// preconditioners and solvers. Components combined in one solve must
/// agree on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolverCategory {
    Sequential,
    Overlapping,
    NonOverlapping,
}

/// Check that a solver and the component it drives share a category.
pub fn match_categories(
    solver: SolverCategory,
    other: SolverCategory,
) -> Result<(), IdexError> {
    if solver == other {
        Ok(())
    } else {
        Err(IdexError::CategoryMismatch(format!(
            "solver is {solver:?}, component is {other:?}"
        )))
    }
}

/// Common interface for iterative solvers.
pub trait LinearSolver<M, V> {
    type Error;
    type Scalar: Copy + PartialOrd + From<f64>;

    /// Solve A·x = b, writing the result into `x`.
    /// Returns iteration stats (including convergence info).
    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<Self::Scalar>, Self::Error>;
}

pub mod driver;
pub use driver::IterationDriver;

pub mod loop_solver;
pub use loop_solver::LoopSolver;

pub mod cg;
pub use cg::CgSolver;

pub mod pcg;
pub use pcg::PcgSolver;

pub mod bicgstab;
pub use bicgstab::BiCgStabSolver;

pub mod minres;
pub use minres::MinresSolver;

pub mod gmres;
pub use gmres::GmresSolver;
