//! # Dimensionality Reduction
//!
//! Principal Component Analysis: standardise a sample matrix, decompose it
//! with the selected LAPACK driver, and keep the top components as a
//! linear map to and from a lower-dimensional score space.
//!
//! ```
//! use linfa_reduction::{Pca, PcaMethod};
//! use ndarray::array;
//!
//! let records = array![[1.0, 2.0], [3.0, 4.5], [5.0, 6.5], [2.0, 1.5]];
//! let pca = Pca::params(1).method(PcaMethod::Covariance).fit(&records).unwrap();
//! let scores = pca.transform(&records);
//! assert_eq!(scores.ncols(), 1);
//! ```
pub mod pca;

pub use pca::{Pca, PcaMethod, PcaParams, PcaSolver};
