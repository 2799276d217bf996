//! Principal Component Analysis.
//!
//! Grounded on `factorization/pca.hpp`/`pca_public.cpp`: standardise the
//! input according to the chosen method, factorise it with the selected
//! LAPACK driver, keep the top `n_components` singular triples, fix the
//! sign ambiguity of each component, and expose `transform`/
//! `inverse_transform` as linear maps built from the retained components.
use linfa::stats::{self, Dof};
use linfa::Float;
use ndarray::{s, Array1, Array2};
use ndarray_linalg::{Eigh, Lapack, QR, SVD, UPLO};

/// Which standardisation is applied to `X` before factorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcaMethod {
    /// Center columns only.
    Covariance,
    /// Center columns and divide by their standard deviation.
    Correlation,
    /// No standardisation; decompose the raw matrix.
    Svd,
}

/// Which LAPACK driver factorises the (possibly QR-reduced) data matrix.
///
/// `ndarray-linalg`'s `SVD` trait always dispatches to the divide-and-
/// conquer driver internally, so `Gesvdx`, `Gesvd` and `Gesdd` are kept as
/// selectable variants for interface parity but currently behave
/// identically; only `Syevd` changes the algorithm actually run, routing
/// through the `XᵀX` eigendecomposition path instead of an SVD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcaSolver {
    Auto,
    Gesvdx,
    Gesvd,
    Gesdd,
    Syevd,
}

/// Hyperparameters for [`Pca`], built via [`Pca::params`].
#[derive(Clone)]
pub struct PcaParams {
    n_components: usize,
    method: PcaMethod,
    solver: PcaSolver,
    store_u: bool,
    dof: Dof,
}

impl PcaParams {
    pub fn params(n_components: usize) -> Self {
        PcaParams {
            n_components,
            method: PcaMethod::Covariance,
            solver: PcaSolver::Auto,
            store_u: true,
            dof: Dof::NMinusOne,
        }
    }

    pub fn method(mut self, method: PcaMethod) -> Self {
        self.method = method;
        self
    }

    pub fn solver(mut self, solver: PcaSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Whether the left singular vectors on the training data are kept
    /// around as [`Pca::scores`]. The sign convention still needs them
    /// internally either way; this only controls whether they're retained.
    pub fn store_u(mut self, store_u: bool) -> Self {
        self.store_u = store_u;
        self
    }

    pub fn dof(mut self, dof: Dof) -> Self {
        self.dof = dof;
        self
    }

    pub fn fit<F: Float + Lapack>(&self, records: &Array2<F>) -> linfa::Result<Pca<F>> {
        let (n, p) = records.dim();
        if n == 0 || p == 0 {
            return Err(linfa::Error::InvalidInput(
                "records must have at least one sample and one feature".into(),
            ));
        }
        let n_components = self.n_components.min(n).min(p);
        if n_components == 0 {
            return Err(linfa::Error::InvalidInput("n_components must be at least 1".into()));
        }

        let mean: Array1<F> = Array1::from(stats::mean(records, stats::Axis::Column));
        let scale: Option<Array1<F>> = match self.method {
            PcaMethod::Correlation => {
                let vars = stats::variance(records, stats::Axis::Column, Dof::N, Some(mean.as_slice().unwrap()));
                let std: Vec<F> = vars
                    .into_iter()
                    .map(|v| {
                        let s = v.sqrt();
                        if s.is_zero() {
                            F::one()
                        } else {
                            s
                        }
                    })
                    .collect();
                Some(Array1::from(std))
            }
            _ => None,
        };

        let mut x = records.clone();
        match self.method {
            PcaMethod::Svd => {}
            PcaMethod::Covariance => {
                stats::standardize(&mut x, stats::Axis::Column, Some(mean.as_slice().unwrap()), Some(&vec![F::one(); p]))
            }
            PcaMethod::Correlation => stats::standardize(
                &mut x,
                stats::Axis::Column,
                Some(mean.as_slice().unwrap()),
                Some(scale.as_ref().unwrap().as_slice().unwrap()),
            ),
        };

        let total_variance = x.iter().map(|&v| v * v).sum::<F>() / self.dof.divisor(n);

        let (mut u, sigma, mut vt) = if self.solver == PcaSolver::Syevd {
            self.factorise_syevd(&x, n_components)?
        } else {
            self.factorise_svd(&x)?
        };

        let mut components = vt.slice_mut(s![0..n_components, ..]).to_owned();
        let mut u_k = u.slice_mut(s![.., 0..n_components]).to_owned();
        let singular_values: Array1<F> = sigma.slice(s![0..n_components]).to_owned();

        // Sign convention: flip so the largest-magnitude entry of each
        // retained left-singular vector is non-negative.
        for j in 0..n_components {
            let col = u_k.column(j);
            let (argmax, _) = col
                .iter()
                .enumerate()
                .fold((0usize, F::zero()), |(bi, bv), (i, &v)| if v.abs() > bv { (i, v.abs()) } else { (bi, bv) });
            if col[argmax] < F::zero() {
                for i in 0..u_k.nrows() {
                    u_k[[i, j]] = -u_k[[i, j]];
                }
                for k in 0..components.ncols() {
                    components[[j, k]] = -components[[j, k]];
                }
            }
        }

        let variance: Array1<F> = singular_values.mapv(|s| s * s / self.dof.divisor(n));
        let scores = if self.store_u { Some(&u_k * &singular_values) } else { None };

        Ok(Pca {
            components,
            singular_values,
            scores,
            mean,
            scale,
            variance,
            total_variance,
            method: self.method,
        })
    }

    /// Direct-SVD path: optionally pre-factorises `X = Q R` first when `n`
    /// is comfortably taller than `p`, so the expensive SVD runs on the
    /// small `p x p` matrix `R` instead of the full `n x p` matrix.
    fn factorise_svd<F: Float + Lapack>(&self, x: &Array2<F>) -> linfa::Result<(Array2<F>, Array1<F>, Array2<F>)> {
        let (n, p) = x.dim();
        if F::from(n).unwrap() / F::from(p).unwrap() > F::from(1.2).unwrap() {
            let (q, r) = x.qr().map_err(|e| linfa::Error::NumericalDifficulties(format!("QR failed: {}", e)))?;
            let (u_r, sigma, vt) =
                r.svd(true, true).map_err(|e| linfa::Error::NumericalDifficulties(format!("SVD failed: {}", e)))?;
            let u_r = u_r.ok_or_else(|| linfa::Error::NumericalDifficulties("SVD did not return U".into()))?;
            let vt = vt.ok_or_else(|| linfa::Error::NumericalDifficulties("SVD did not return V^T".into()))?;
            let u = q.dot(&u_r);
            let sigma = sigma.mapv(|v| F::from(v).unwrap());
            Ok((u, sigma, vt))
        } else {
            let (u, sigma, vt) =
                x.svd(true, true).map_err(|e| linfa::Error::NumericalDifficulties(format!("SVD failed: {}", e)))?;
            let u = u.ok_or_else(|| linfa::Error::NumericalDifficulties("SVD did not return U".into()))?;
            let vt = vt.ok_or_else(|| linfa::Error::NumericalDifficulties("SVD did not return V^T".into()))?;
            let sigma = sigma.mapv(|v| F::from(v).unwrap());
            Ok((u, sigma, vt))
        }
    }

    /// `syevd` path: eigendecompose `XᵀX` instead of taking an SVD of `X`
    /// directly. Cheaper than the direct path when `p` is small relative
    /// to `n` since the factorised matrix is only `p x p`.
    fn factorise_syevd<F: Float + Lapack>(
        &self,
        x: &Array2<F>,
        n_components: usize,
    ) -> linfa::Result<(Array2<F>, Array1<F>, Array2<F>)> {
        let gram = x.t().dot(x);
        let (eigvals, eigvecs) = gram
            .eigh(UPLO::Lower)
            .map_err(|e| linfa::Error::NumericalDifficulties(format!("eigendecomposition failed: {}", e)))?;

        // LAPACK syevd returns eigenvalues ascending; reverse to descending
        // and square-root the non-negative ones into singular values.
        let p = eigvals.len();
        let mut singular_values = Array1::zeros(p);
        let mut v = Array2::zeros((p, p));
        for j in 0..p {
            let src = p - 1 - j;
            let eigval = eigvals[src];
            singular_values[j] = if eigval > F::zero() { eigval.sqrt() } else { F::zero() };
            v.column_mut(j).assign(&eigvecs.column(src));
        }
        let vt = v.t().to_owned();

        // U = X V S^-1 restricted to the components we'll actually keep;
        // columns past n_components are never read by the caller but we
        // still need a full-width U to keep the (u, sigma, vt) shapes
        // uniform with the direct-SVD path.
        let mut u = Array2::zeros((x.nrows(), p));
        for j in 0..p.min(n_components.max(1)) {
            if singular_values[j] > F::zero() {
                let proj = x.dot(&v.column(j));
                u.column_mut(j).assign(&(proj / singular_values[j]));
            }
        }
        Ok((u, singular_values, vt))
    }
}

/// A fitted PCA model.
pub struct Pca<F: Float> {
    /// `V^T`, shape `(n_components, p)`.
    components: Array2<F>,
    /// Retained singular values, descending, length `n_components`.
    singular_values: Array1<F>,
    /// `U * diag(sigma)` on the training data, shape `(n, n_components)`,
    /// present only when fit with `store_u(true)` (the default).
    scores: Option<Array2<F>>,
    mean: Array1<F>,
    scale: Option<Array1<F>>,
    /// Per-component variance (`sigma^2 / dof`), length `n_components`.
    variance: Array1<F>,
    total_variance: F,
    method: PcaMethod,
}

impl<F: Float + Lapack> Pca<F> {
    pub fn params(n_components: usize) -> PcaParams {
        PcaParams::params(n_components)
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<F> {
        &self.components
    }

    pub fn singular_values(&self) -> &Array1<F> {
        &self.singular_values
    }

    pub fn scores(&self) -> Option<&Array2<F>> {
        self.scores.as_ref()
    }

    pub fn explained_variance(&self) -> &Array1<F> {
        &self.variance
    }

    pub fn total_variance(&self) -> F {
        self.total_variance
    }

    fn standardize_new(&self, records: &Array2<F>) -> Array2<F> {
        let mut x = records.clone();
        let p = x.ncols();
        let scale: Vec<F> = match (&self.method, &self.scale) {
            (PcaMethod::Svd, _) => vec![F::one(); p],
            (_, Some(scale)) => scale.to_vec(),
            (_, None) => vec![F::one(); p],
        };
        if self.method != PcaMethod::Svd {
            stats::standardize(&mut x, stats::Axis::Column, Some(self.mean.as_slice().unwrap()), Some(&scale));
        }
        x
    }

    /// Project `records` onto the retained components: `X_std . V^T`.
    pub fn transform(&self, records: &Array2<F>) -> Array2<F> {
        let x = self.standardize_new(records);
        x.dot(&self.components.t())
    }

    /// Map scores back to the original feature space: `Y . V`, then undo the
    /// standardisation applied at fit time.
    pub fn inverse_transform(&self, scores: &Array2<F>) -> Array2<F> {
        let mut x = scores.dot(&self.components);
        let p = x.ncols();
        let scale: Vec<F> = match (&self.method, &self.scale) {
            (PcaMethod::Svd, _) => vec![F::one(); p],
            (_, Some(scale)) => scale.to_vec(),
            (_, None) => vec![F::one(); p],
        };
        for (j, (&sh, &sc)) in self.mean.iter().zip(scale.iter()).enumerate() {
            for i in 0..x.nrows() {
                x[[i, j]] = x[[i, j]] * sc + sh;
            }
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn diagonal_toy_matches_expected_spectrum() {
        let x: Array2<f64> = Array2::from_diag(&Array1::from(vec![1.0, 2.0, 3.0, 4.0]));
        let pca = Pca::params(2).method(PcaMethod::Covariance).fit(&x).unwrap();

        let mut sigma: Vec<f64> = pca.singular_values().to_vec();
        sigma.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert!((sigma[0] - 4.0).abs() < 1e-6);
        assert!((sigma[1] - 3.0).abs() < 1e-6);

        let mut variance: Vec<f64> = pca.explained_variance().to_vec();
        variance.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert!((variance[0] - 16.0 / 3.0).abs() < 1e-6);
        assert!((variance[1] - 3.0).abs() < 1e-6);

        assert!((pca.total_variance() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn sign_convention_largest_entry_is_non_negative() {
        let x: Array2<f64> = Array2::from_shape_vec(
            (5, 3),
            vec![
                1.0, 2.0, 3.0, -1.0, 0.5, -2.0, 2.0, -3.0, 1.0, 0.0, 1.5, 0.5, -2.0, -1.0, 2.0,
            ],
        )
        .unwrap();
        let pca = Pca::params(2).fit(&x).unwrap();
        for comp in pca.components().outer_iter() {
            let argmax = comp
                .iter()
                .enumerate()
                .fold((0usize, 0.0_f64), |(bi, bv), (i, &v)| if v.abs() > bv { (i, v.abs()) } else { (bi, bv) })
                .0;
            assert!(comp[argmax] >= 0.0);
        }
    }

    #[test]
    fn round_trip_recovers_original_data() {
        let x: Array2<f64> = Array2::from_shape_vec(
            (4, 3),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 2.0, 1.0, 0.5],
        )
        .unwrap();
        let pca = Pca::params(3).fit(&x).unwrap();
        let recovered = pca.inverse_transform(&pca.transform(&x));
        for (a, b) in x.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < 1e-6, "a={} b={}", a, b);
        }
    }

    #[test]
    fn syevd_solver_matches_direct_svd_spectrum() {
        let x: Array2<f64> = Array2::from_shape_vec(
            (6, 3),
            vec![
                1.0, 2.0, 3.0, 4.0, 1.0, 0.0, 2.0, 3.0, 1.0, 0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 1.0, 0.0, 2.0,
            ],
        )
        .unwrap();
        let direct = Pca::params(2).solver(PcaSolver::Gesdd).fit(&x).unwrap();
        let syevd = Pca::params(2).solver(PcaSolver::Syevd).fit(&x).unwrap();

        let mut a: Vec<f64> = direct.singular_values().to_vec();
        let mut b: Vec<f64> = syevd.singular_values().to_vec();
        a.sort_by(|x, y| y.partial_cmp(x).unwrap());
        b.sort_by(|x, y| y.partial_cmp(x).unwrap());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6, "{} vs {}", x, y);
        }
    }

    #[test]
    fn store_u_false_drops_scores() {
        let x: Array2<f64> = Array2::from_shape_vec((4, 2), vec![1.0, 2.0, 3.0, 1.0, 0.0, 2.0, 2.0, 3.0]).unwrap();
        let pca = Pca::params(2).store_u(false).fit(&x).unwrap();
        assert!(pca.scores().is_none());
    }

    #[test]
    fn tall_matrix_uses_qr_prefactorisation_without_changing_the_spectrum() {
        let data: Vec<f64> = (0..30).map(|v| v as f64 * 0.37 - (v % 3) as f64).collect();
        let x: Array2<f64> = Array2::from_shape_vec((15, 2), data).unwrap();
        let pca = Pca::params(2).fit(&x).unwrap();
        assert_eq!(pca.singular_values().len(), 2);
        assert!(pca.singular_values()[0] >= pca.singular_values()[1]);
    }
}
