//! Kernel matrix construction and evaluation.
//!
//! `Kernel` eagerly computes the `n x n` Gram matrix of a training set under
//! one of the four kernel functions a dispatch table switches on for its
//! `kernel_compute`/`decision_function` routines (linear, polynomial, RBF,
//! sigmoid). [`Kernel::weighted_sum`] evaluates the same
//! kernel function between an arbitrary query point and every training
//! point, which is what a fitted SVM's `predict` needs instead of a
//! precomputed entry.
//!
//! The Gram matrix and the training set it was built from are both owned by
//! `Kernel` (rather than borrowed) so that a fitted [`linfa_svm::Svm`] can
//! own its kernel outright instead of threading a lifetime parameter through
//! every estimator in the workspace; the one-versus-one multiclass driver in
//! particular needs `K(K-1)/2` independently-owned sub-problem kernels built
//! over filtered row subsets, which a borrowed `ArrayView2` cannot express
//! without a self-referential struct.
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

#[cfg_attr(feature = "serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "serde_crate"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelMethod<F> {
    Linear,
    Polynomial { gamma: F, degree: F, coef0: F },
    Gaussian { gamma: F },
    Sigmoid { gamma: F, coef0: F },
}

impl<F: Float> KernelMethod<F> {
    /// Evaluate the kernel function directly between two arbitrary vectors,
    /// without going through a precomputed [`Kernel`]. Used by callers that
    /// keep their own subset of support vectors around (one-versus-one
    /// multiclass reduction) instead of a full Gram matrix.
    pub fn apply(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.eval(a, b)
    }

    fn eval(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        match *self {
            KernelMethod::Linear => a.dot(&b),
            KernelMethod::Polynomial { gamma, degree, coef0 } => {
                (gamma * a.dot(&b) + coef0).powf(degree)
            }
            KernelMethod::Gaussian { gamma } => {
                let d2 = a.iter().zip(b.iter()).map(|(&x, &y)| (x - y) * (x - y)).sum::<F>();
                // clamp to zero: accumulated rounding in the squared-distance
                // sum can otherwise drive the exponent fractionally positive.
                (-gamma * d2.max(F::zero())).exp()
            }
            KernelMethod::Sigmoid { gamma, coef0 } => (gamma * a.dot(&b) + coef0).tanh(),
        }
    }

    /// Replace a negative (`auto`) gamma with `1 / (n_features * Var(X))`.
    /// Fails if the data has zero variance.
    pub fn resolve_auto_gamma(self, dataset: &Array2<F>) -> linfa::Result<Self> {
        let resolve = |gamma: F| -> linfa::Result<F> {
            if gamma >= F::zero() {
                return Ok(gamma);
            }
            let p = dataset.ncols();
            let mean = linfa::stats::mean(dataset, linfa::stats::Axis::All)[0];
            let var = linfa::stats::variance(dataset, linfa::stats::Axis::All, linfa::stats::Dof::N, Some(&[mean]))[0];
            if var.is_zero() {
                return Err(linfa::Error::NumericalDifficulties(
                    "cannot derive an automatic gamma from a zero-variance dataset".into(),
                ));
            }
            Ok(F::one() / (F::from(p).unwrap() * var))
        };
        Ok(match self {
            KernelMethod::Gaussian { gamma } => KernelMethod::Gaussian { gamma: resolve(gamma)? },
            KernelMethod::Polynomial { gamma, degree, coef0 } => {
                KernelMethod::Polynomial { gamma: resolve(gamma)?, degree, coef0 }
            }
            KernelMethod::Sigmoid { gamma, coef0 } => {
                KernelMethod::Sigmoid { gamma: resolve(gamma)?, coef0 }
            }
            KernelMethod::Linear => KernelMethod::Linear,
        })
    }
}

/// A precomputed Gram matrix over an owned training set, together with the
/// kernel function used to build it.
#[cfg_attr(feature = "serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "serde_crate"))]
pub struct Kernel<F: Float> {
    pub method: KernelMethod<F>,
    dataset: Array2<F>,
    matrix: Array2<F>,
}

impl<F: Float> Kernel<F> {
    pub fn new(dataset: ArrayView2<F>, method: KernelMethod<F>) -> Self {
        let n = dataset.nrows();
        let mut matrix = Array2::zeros((n, n));
        for i in 0..n {
            let row_i = dataset.row(i);
            for j in i..n {
                let k = method.eval(row_i, dataset.row(j));
                matrix[[i, j]] = k;
                matrix[[j, i]] = k;
            }
        }
        Kernel { method, dataset: dataset.to_owned(), matrix }
    }

    pub fn linear(dataset: &Array2<F>) -> Self {
        Self::new(dataset.view(), KernelMethod::Linear)
    }

    pub fn polynomial(dataset: &Array2<F>, coef0: F, degree: F) -> Self {
        Self::new(
            dataset.view(),
            KernelMethod::Polynomial { gamma: F::one(), degree, coef0 },
        )
    }

    pub fn gaussian(dataset: &Array2<F>, gamma: F) -> Self {
        Self::new(dataset.view(), KernelMethod::Gaussian { gamma })
    }

    pub fn sigmoid(dataset: &Array2<F>, gamma: F, coef0: F) -> Self {
        Self::new(dataset.view(), KernelMethod::Sigmoid { gamma, coef0 })
    }

    /// Number of training points this Gram matrix was built over.
    pub fn size(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of features of the underlying training set.
    pub fn ncols(&self) -> usize {
        self.dataset.ncols()
    }

    /// The `i`-th training point, for callers that need the raw features
    /// rather than a precomputed kernel entry (building a linear decision
    /// weight vector, one-versus-one multiclass sub-problems).
    pub fn training_row(&self, i: usize) -> ArrayView1<F> {
        self.dataset.row(i)
    }

    pub fn entry(&self, i: usize, j: usize) -> F {
        self.matrix[[i, j]]
    }

    pub fn column(&self, i: usize) -> ArrayView1<F> {
        self.matrix.column(i)
    }

    pub fn diagonal(&self) -> Array1<F> {
        self.matrix.diag().to_owned()
    }

    /// `sum_i weights[i] * k(x_i, sample)`, the form `decision_function`
    /// needs at prediction time: the query point was never part of the
    /// training Gram matrix, so each entry is recomputed against it rather
    /// than looked up. Evaluated in blocks of [`PREDICT_BLOCK`] training
    /// points, bounding the largest kernel sub-matrix materialised during
    /// prediction.
    pub fn weighted_sum(&self, weights: &[F], sample: ArrayView1<F>) -> F {
        let n = self.dataset.nrows();
        let mut total = F::zero();
        let mut start = 0;
        while start < n {
            let end = (start + PREDICT_BLOCK).min(n);
            let mut block_sum = F::zero();
            for (row, &w) in self
                .dataset
                .slice(ndarray::s![start..end, ..])
                .axis_iter(Axis(0))
                .zip(weights[start..end].iter())
            {
                if !w.is_zero() {
                    block_sum += w * self.method.eval(row, sample);
                }
            }
            total += block_sum;
            start = end;
        }
        total
    }
}

/// Bound on the number of support vectors evaluated against a query point in
/// one kernel-block pass.
pub const PREDICT_BLOCK: usize = 2048;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn linear_kernel_matches_dot_product() {
        let x = array![[1.0_f64, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let k = Kernel::linear(&x);
        assert_eq!(k.size(), 3);
        assert!((k.entry(0, 2) - 1.0).abs() < 1e-12);
        assert!((k.entry(2, 2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_kernel_diagonal_is_one() {
        let x = array![[1.0_f64, 2.0], [3.0, -1.0]];
        let k = Kernel::gaussian(&x, 0.5);
        for &d in k.diagonal().iter() {
            assert!((d - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn weighted_sum_matches_training_column() {
        let x = array![[1.0_f64, 0.0], [0.0, 1.0]];
        let k = Kernel::linear(&x);
        let weights = [1.0, 2.0];
        let at_first_point = k.weighted_sum(&weights, x.row(0));
        let expected = weights[0] * k.entry(0, 0) + weights[1] * k.entry(1, 0);
        assert!((at_first_point - expected).abs() < 1e-12);
    }

    #[test]
    fn auto_gamma_is_inverse_of_feature_count_times_variance() {
        let x = array![[1.0_f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let resolved = KernelMethod::<f64>::Gaussian { gamma: -1.0 }
            .resolve_auto_gamma(&x)
            .unwrap();
        if let KernelMethod::Gaussian { gamma } = resolved {
            assert!(gamma > 0.0);
        } else {
            panic!("expected gaussian");
        }
    }
}
