//! Ordinary and ridge-penalised linear regression.
//!
//! Grounded on `linear_model/linear_model.hpp`'s "linear" objective
//! registered with the nonlinear-solver façade: rather than
//! a closed-form normal-equations solve, the coefficients are the minimiser
//! of the mean squared error (plus an optional L2 penalty) found by
//! [`crate::solver::minimize`], keeping linear and logistic regression on
//! one shared solver path.
use linfa::Float;
use ndarray::{s, Array1, Array2, Axis};

use crate::solver::{self, Objective, SolverOptions};
use argmin::prelude::ArgminFloat;

/// Hyperparameters for [`LinearRegression`], built via
/// [`LinearRegressionParams::params`].
#[derive(Clone)]
pub struct LinearRegressionParams<F> {
    fit_intercept: bool,
    l2_penalty: F,
    tol: F,
    max_iter: usize,
}

impl<F: Float> LinearRegressionParams<F> {
    pub fn params() -> Self {
        LinearRegressionParams {
            fit_intercept: true,
            l2_penalty: F::zero(),
            tol: F::from(1e-8).unwrap(),
            max_iter: 200,
        }
    }

    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Ridge penalty added to the mean-squared-error objective. Zero (the
    /// default) reproduces ordinary least squares.
    pub fn l2_penalty(mut self, l2_penalty: F) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    pub fn tolerance(mut self, tol: F) -> Self {
        self.tol = tol;
        self
    }

    pub fn max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn fit(&self, records: &Array2<F>, targets: &Array1<F>) -> linfa::Result<LinearRegression<F>>
    where
        F: ArgminFloat,
    {
        let (n, p) = records.dim();
        if n == 0 || p == 0 {
            return Err(linfa::Error::InvalidInput(
                "records must have at least one sample and one feature".into(),
            ));
        }
        if targets.len() != n {
            return Err(linfa::Error::InvalidInput(
                "targets length must match the number of samples".into(),
            ));
        }

        let n_params = if self.fit_intercept { p + 1 } else { p };
        let objective = MseObjective { records, targets, fit_intercept: self.fit_intercept, l2: self.l2_penalty };
        let opts = SolverOptions { tol: self.tol, max_iter: self.max_iter, bounds: None, time_limit: None };
        let result = solver::minimize(&objective, Array1::zeros(n_params), &opts, None)?;

        let (intercept, coefficients) = if self.fit_intercept {
            (result.x[0], result.x.slice(s![1..]).to_owned())
        } else {
            (F::zero(), result.x)
        };

        Ok(LinearRegression { intercept, coefficients })
    }
}

struct MseObjective<'a, F> {
    records: &'a Array2<F>,
    targets: &'a Array1<F>,
    fit_intercept: bool,
    l2: F,
}

impl<'a, F: Float> MseObjective<'a, F> {
    fn residuals(&self, x: &Array1<F>) -> Array1<F> {
        let (intercept, coef) = if self.fit_intercept {
            (x[0], x.slice(s![1..]))
        } else {
            (F::zero(), x.slice(s![..]))
        };
        self.records
            .axis_iter(Axis(0))
            .zip(self.targets.iter())
            .map(|(row, &y)| intercept + row.dot(&coef) - y)
            .collect()
    }
}

impl<'a, F: Float> Objective<F> for MseObjective<'a, F> {
    fn cost(&self, x: &Array1<F>) -> F {
        let n = F::from(self.targets.len()).unwrap();
        let residuals = self.residuals(x);
        let mse = residuals.iter().map(|&r| r * r).fold(F::zero(), |a, b| a + b) / n;
        let reg = self.l2 * x.iter().map(|&v| v * v).fold(F::zero(), |a, b| a + b);
        mse + reg
    }

    fn gradient(&self, x: &Array1<F>) -> Array1<F> {
        let n = F::from(self.targets.len()).unwrap();
        let residuals = self.residuals(x);
        let two = F::from(2.0).unwrap();

        let mut grad = Array1::zeros(x.len());
        if self.fit_intercept {
            grad[0] = two * residuals.iter().fold(F::zero(), |a, &r| a + r) / n;
        }
        let offset = if self.fit_intercept { 1 } else { 0 };
        for (j, mut g) in grad.slice_mut(s![offset..]).iter_mut().enumerate() {
            let col_dot: F = self
                .records
                .column(j)
                .iter()
                .zip(residuals.iter())
                .map(|(&xij, &r)| xij * r)
                .fold(F::zero(), |a, b| a + b);
            *g = two * col_dot / n;
        }
        grad + x.mapv(|v| two * self.l2 * v)
    }
}

/// A fitted linear regression model: an intercept and one coefficient per
/// feature.
pub struct LinearRegression<F> {
    intercept: F,
    coefficients: Array1<F>,
}

impl<F: Float> LinearRegression<F> {
    pub fn params() -> LinearRegressionParams<F> {
        LinearRegressionParams::params()
    }

    pub fn intercept(&self) -> F {
        self.intercept
    }

    pub fn coefficients(&self) -> &Array1<F> {
        &self.coefficients
    }

    pub fn predict(&self, records: &Array2<F>) -> Array1<F> {
        records.axis_iter(Axis(0)).map(|row| self.intercept + row.dot(&self.coefficients)).collect()
    }

    /// Coefficient of determination R^2.
    pub fn score(&self, records: &Array2<F>, targets: &Array1<F>) -> F {
        let pred = self.predict(records);
        let mean = targets.iter().copied().fold(F::zero(), |a, b| a + b) / F::from(targets.len()).unwrap();
        let ss_res = pred.iter().zip(targets.iter()).map(|(&p, &t)| (t - p) * (t - p)).fold(F::zero(), |a, b| a + b);
        let ss_tot = targets.iter().map(|&t| (t - mean) * (t - mean)).fold(F::zero(), |a, b| a + b);
        if ss_tot.is_zero() {
            F::one()
        } else {
            F::one() - ss_res / ss_tot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn recovers_a_known_linear_function() {
        let records: Array2<f64> = Array2::from_shape_vec((6, 1), (0..6).map(|v| v as f64).collect()).unwrap();
        let targets = records.column(0).mapv(|x| 2.0 * x + 1.0);

        let model = LinearRegression::params().fit(&records, &targets).unwrap();
        assert!((model.intercept() - 1.0).abs() < 1e-2, "intercept={}", model.intercept());
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-2, "coef={}", model.coefficients()[0]);
        assert!(model.score(&records, &targets) > 0.99);
    }

    #[test]
    fn without_intercept_fits_through_origin() {
        let records: Array2<f64> = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let targets = records.column(0).mapv(|x| 3.0 * x);

        let model = LinearRegression::params().fit_intercept(false).fit(&records, &targets).unwrap();
        assert_eq!(model.intercept(), 0.0);
        assert!((model.coefficients()[0] - 3.0).abs() < 1e-2);
    }
}
