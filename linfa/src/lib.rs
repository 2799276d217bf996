//! # linfa
//!
//! `linfa` is the shared foundation of the estimator crates in this
//! workspace (`linfa-svm`, `linfa-trees`, `linfa-reduction`,
//! `linfa-clustering`, `linfa-linear`, `linfa-nn`): the floating point
//! bound every estimator is generic over, the `Dataset` container samples
//! and targets are passed around in, the `Pr` class-probability wrapper,
//! the `Fit`/`Predict`/`Transformer` trait trio, the workspace error type,
//! and axis-wise moment statistics (mean / variance / skewness / kurtosis)
//! plus in-place standardisation.
pub mod dataset;
pub mod error;
pub mod stats;
pub mod traits;

pub use dataset::{Dataset, DatasetView, Pr};
pub use error::{Error, Result};
pub use traits::{Fit, Predict, Transformer};

/// Trait bound shared by every numeric estimator in the workspace.
///
/// This plays the role of the C/C++ core's `T` template parameter
/// (`float`/`double`), restricted to the two IEEE types the original
/// library instantiates. `ndarray::NdFloat` brings in the BLAS-friendly
/// arithmetic bound; `num_traits::Float` brings `sqrt`/`exp`/`tanh`/`ln`
/// and friends used throughout the kernel, solver and impurity code.
pub trait Float:
    ndarray::NdFloat
    + num_traits::Float
    + num_traits::FromPrimitive
    + num_traits::NumAssignOps
    + Default
    + Send
    + Sync
    + std::iter::Sum
    + std::fmt::Debug
    + 'static
{
    /// Machine epsilon, used as the SMO `tau` floor and support-vector
    /// non-zero threshold for the nu formulations.
    ///
    /// Named `mach_eps` rather than `epsilon` to avoid colliding with
    /// `num_traits::Float::epsilon`/`ndarray::NdFloat::epsilon`, which
    /// this trait's supertraits already bring into scope.
    fn mach_eps() -> Self {
        Self::from(f64::EPSILON).unwrap()
    }
}

impl Float for f32 {}
impl Float for f64 {}
