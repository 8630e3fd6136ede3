//! Core linear-algebra trait seams.

pub mod traits;
pub mod wrappers;

pub use traits::{InnerProduct, MatVec};
