//! Shared error type.
//!
//! Collapses the tagged `da_status` enum of the original library (thirty
//!-odd variants covering handle lifecycle, dimension checks, option
//! validation and numerical failure) into a small `thiserror` enum. Crate
//! -specific estimators (`linfa_svm::SvmError`, `linfa_trees::TreeError`,
//! ...) wrap this type with `#[from]` rather than re-deriving the same
//! dimension/NaN checks.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A sample matrix / target vector pair has inconsistent or impossible
    /// dimensions (`n_samples`, `n_features`, leading dimension, etc.).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An option, or combination of options, is individually valid but
    /// meaningless in context (e.g. requesting `U` from an eigendecomposition
    /// path that does not materialise it).
    #[error("incompatible options: {0}")]
    IncompatibleOptions(String),

    /// A classification target contained a non-integer or negative class
    /// label.
    #[error("invalid class labels: {0}")]
    InvalidLabels(String),

    /// A result was requested before the estimator was fit, or after the
    /// data the fit was based on has gone stale.
    #[error("estimator has not been fit yet")]
    NotFitted,

    /// The fit ran to completion but produced a degenerate result (zero
    /// variance under an automatic gamma, a zero bias normaliser in nu-SVC,
    /// a negative entry under a geometric mean, ...).
    #[error("numerical difficulties: {0}")]
    NumericalDifficulties(String),

    #[error("shape error")]
    ShapeError(#[from] ndarray::ShapeError),
}
