//! Preconditioner interface.
//!
//! Implementations live in downstream crates; this layer only fixes the
//! contract the solvers drive and the category tag that must agree with
//! the operator's before a solve starts.

use crate::error::IdexError;
use crate::solver::SolverCategory;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r.
    fn apply(&self, r: &V, z: &mut V) -> Result<(), IdexError>;

    /// Optionally: setup/factorize from A.
    fn setup(&mut self, _a: &M) -> Result<(), IdexError> {
        Ok(())
    }

    /// Parallelization category; checked against the solver's.
    fn category(&self) -> SolverCategory {
        SolverCategory::Sequential
    }
}

/// The identity preconditioner, z = r.
pub struct Identity;

impl<M, V: Clone> Preconditioner<M, V> for Identity {
    fn apply(&self, r: &V, z: &mut V) -> Result<(), IdexError> {
        z.clone_from(r);
        Ok(())
    }
}
