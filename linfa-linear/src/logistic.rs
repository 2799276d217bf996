//! Binary logistic regression.
//!
//! Grounded on `linear_model/linear_model.hpp`'s "logistic" objective,
//! which is the same nonlinear-solver façade as [`crate::linear`] with a
//! different cost/gradient pair: the average binomial log-loss plus an
//! optional L2 penalty, minimised by [`crate::solver::minimize`] over the
//! intercept-augmented coefficient vector.
use linfa::dataset::Pr;
use linfa::Float;
use ndarray::{s, Array1, Array2, Axis};
use num_traits::ToPrimitive;

use crate::solver::{self, Objective, SolverOptions};
use argmin::prelude::ArgminFloat;

fn sigmoid<F: Float>(z: F) -> F {
    F::one() / (F::one() + (-z).exp())
}

/// Hyperparameters for [`LogisticRegression`], built via
/// [`LogisticRegressionParams::params`].
#[derive(Clone)]
pub struct LogisticRegressionParams<F> {
    fit_intercept: bool,
    l2_penalty: F,
    tol: F,
    max_iter: usize,
}

impl<F: Float> LogisticRegressionParams<F> {
    pub fn params() -> Self {
        LogisticRegressionParams {
            fit_intercept: true,
            l2_penalty: F::from(1e-6).unwrap(),
            tol: F::from(1e-8).unwrap(),
            max_iter: 200,
        }
    }

    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

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

    pub fn fit(&self, records: &Array2<F>, targets: &[bool]) -> linfa::Result<LogisticRegression<F>>
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
        let objective = LogLossObjective { records, targets, fit_intercept: self.fit_intercept, l2: self.l2_penalty };
        let opts = SolverOptions { tol: self.tol, max_iter: self.max_iter, bounds: None, time_limit: None };
        let result = solver::minimize(&objective, Array1::zeros(n_params), &opts, None)?;

        let (intercept, coefficients) = if self.fit_intercept {
            (result.x[0], result.x.slice(s![1..]).to_owned())
        } else {
            (F::zero(), result.x)
        };

        Ok(LogisticRegression { intercept, coefficients })
    }
}

struct LogLossObjective<'a, F> {
    records: &'a Array2<F>,
    targets: &'a [bool],
    fit_intercept: bool,
    l2: F,
}

impl<'a, F: Float> LogLossObjective<'a, F> {
    fn logits(&self, x: &Array1<F>) -> Array1<F> {
        let (intercept, coef) = if self.fit_intercept {
            (x[0], x.slice(s![1..]))
        } else {
            (F::zero(), x.slice(s![..]))
        };
        self.records.axis_iter(Axis(0)).map(|row| intercept + row.dot(&coef)).collect()
    }
}

impl<'a, F: Float> Objective<F> for LogLossObjective<'a, F> {
    fn cost(&self, x: &Array1<F>) -> F {
        let n = F::from(self.targets.len()).unwrap();
        let logits = self.logits(x);
        let loss = logits
            .iter()
            .zip(self.targets.iter())
            .map(|(&z, &y)| {
                // log(1 + exp(z)) - y*z, numerically stable for large |z|.
                let softplus = if z > F::zero() { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
                softplus - if y { z } else { F::zero() }
            })
            .fold(F::zero(), |a, b| a + b)
            / n;
        let reg = self.l2 * x.iter().map(|&v| v * v).fold(F::zero(), |a, b| a + b);
        loss + reg
    }

    fn gradient(&self, x: &Array1<F>) -> Array1<F> {
        let n = F::from(self.targets.len()).unwrap();
        let logits = self.logits(x);
        let residuals: Array1<F> = logits
            .iter()
            .zip(self.targets.iter())
            .map(|(&z, &y)| sigmoid(z) - if y { F::one() } else { F::zero() })
            .collect();

        let mut grad = Array1::zeros(x.len());
        if self.fit_intercept {
            grad[0] = residuals.iter().fold(F::zero(), |a, &r| a + r) / n;
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
            *g = col_dot / n;
        }
        grad + x.mapv(|v| F::from(2.0).unwrap() * self.l2 * v)
    }
}

/// A fitted binary logistic regression model.
pub struct LogisticRegression<F> {
    intercept: F,
    coefficients: Array1<F>,
}

impl<F: Float> LogisticRegression<F> {
    pub fn params() -> LogisticRegressionParams<F> {
        LogisticRegressionParams::params()
    }

    pub fn intercept(&self) -> F {
        self.intercept
    }

    pub fn coefficients(&self) -> &Array1<F> {
        &self.coefficients
    }

    fn logit(&self, row: ndarray::ArrayView1<F>) -> F {
        self.intercept + row.dot(&self.coefficients)
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, records: &Array2<F>) -> Vec<Pr> {
        records.axis_iter(Axis(0)).map(|row| Pr(sigmoid(self.logit(row)).to_f32().unwrap())).collect()
    }

    pub fn predict(&self, records: &Array2<F>) -> Vec<bool> {
        records.axis_iter(Axis(0)).map(|row| self.logit(row) > F::zero()).collect()
    }

    pub fn score(&self, records: &Array2<F>, targets: &[bool]) -> F {
        let pred = self.predict(records);
        let correct = pred.iter().zip(targets.iter()).filter(|(p, t)| p == t).count();
        F::from(correct).unwrap() / F::from(targets.len()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn separates_two_clusters() {
        let records: Array2<f64> =
            Array2::from_shape_vec((8, 1), vec![-3.0, -2.5, -2.0, -1.5, 1.5, 2.0, 2.5, 3.0]).unwrap();
        let targets = vec![false, false, false, false, true, true, true, true];

        let model = LogisticRegression::params().max_iterations(500).fit(&records, &targets).unwrap();
        assert_eq!(model.score(&records, &targets), 1.0);
    }

    #[test]
    fn predict_proba_is_monotone_in_the_logit() {
        let records: Array2<f64> = Array2::from_shape_vec((6, 1), vec![-3.0, -2.0, -1.0, 1.0, 2.0, 3.0]).unwrap();
        let targets = vec![false, false, false, true, true, true];
        let model = LogisticRegression::params().max_iterations(500).fit(&records, &targets).unwrap();

        let probs: Vec<f32> = model.predict_proba(&records).iter().map(|p| p.0).collect();
        for w in probs.windows(2) {
            assert!(w[1] >= w[0] - 1e-6);
        }
    }
}
