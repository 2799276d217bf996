//! # Linear and Logistic Regression
//!
//! Both estimators in this crate share one nonlinear-solver façade
//! ([`solver`]): a registered cost/gradient pair is minimised
//! by a bound-constrained L-BFGS-B driver built on `argmin`'s quasi-Newton
//! solver. [`linear::LinearRegression`] minimises mean squared error (plus
//! an optional ridge penalty); [`logistic::LogisticRegression`] minimises
//! the average binomial log-loss.
//!
//! ```
//! use linfa_linear::LinearRegression;
//! use ndarray::{array, Array2};
//!
//! let records: Array2<f64> = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
//! let targets = array![1.0, 3.0, 5.0, 7.0];
//!
//! let model = LinearRegression::params().fit(&records, &targets).unwrap();
//! assert!((model.coefficients()[0] - 2.0).abs() < 1e-2);
//! ```
pub mod linear;
pub mod logistic;
pub mod solver;

pub use linear::{LinearRegression, LinearRegressionParams};
pub use logistic::{LogisticRegression, LogisticRegressionParams};
