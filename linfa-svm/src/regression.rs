//! Support Vector Regression.
//!
//! Grounded on `base_svm.hpp`'s doubled dual-variable trick:
//! a regression problem over `n` samples is solved as a `2n`-variable
//! classification-shaped QP, where the first `n` duals are the "up" slack
//! `alpha+` of the epsilon tube and the last `n` are the "down" slack
//! `alpha-`. [`PermutableKernelRegression`] is the `Q`-matrix view that
//! folds the doubled sign convention (`Q_ts = sign(t) sign(s) K(x_{t%n},
//! x_{s%n})`) into a single [`super::permutable_kernel::Permutable`], so the
//! same [`super::solver_smo::SolverState`] used by `classification.rs`
//! drives both epsilon-SVR and nu-SVR.
use linfa::Float;
use ndarray::Array1;

use super::permutable_kernel::{Kernel, Permutable};
use super::solver_smo::SolverState;
use super::SolverParams;
use super::Svm;

pub(crate) type SvmResult<A> = Svm<A, A>;

/// `Q` view over the doubled `2n`-variable regression dual: column `i`
/// (`i < n` or `i >= n`) is `+-K(x_{i%n}, x_{j%n})` for every `j`, signed by
/// whether `i` and `j` fall in the same half.
struct PermutableKernelRegression<A: Float> {
    kernel: Kernel<A>,
}

impl<A: Float> PermutableKernelRegression<A> {
    fn new(kernel: Kernel<A>) -> Self {
        PermutableKernelRegression { kernel }
    }
}

impl<A: Float> Permutable<A> for PermutableKernelRegression<A> {
    fn size(&self) -> usize {
        2 * self.kernel.size()
    }

    fn column(&self, i: usize) -> Vec<A> {
        let l = self.kernel.size();
        let si = if i < l { A::one() } else { -A::one() };
        let base = self.kernel.column(i % l);
        let mut out = Vec::with_capacity(2 * l);
        out.extend(base.iter().map(|&k| si * k));
        out.extend(base.iter().map(|&k| -si * k));
        out
    }

    fn diagonal(&self) -> Vec<A> {
        let d = self.kernel.diagonal();
        let mut out: Vec<A> = d.to_vec();
        out.extend(d.to_vec());
        out
    }

    fn inner(&self) -> &Kernel<A> {
        &self.kernel
    }

    fn into_inner(self) -> Kernel<A> {
        self.kernel
    }
}

/// `alpha+[i] - alpha-[i]` from the solved `2n`-length dual, recovering the
/// single signed per-training-point coefficient stored for regression.
fn fold_doubled_alpha<A: Float>(alpha: Vec<A>) -> Vec<A> {
    let l = alpha.len() / 2;
    (0..l).map(|i| alpha[i] - alpha[i + l]).collect()
}

/// Epsilon-insensitive support vector regression.
///
/// Solves `min 1/2 (a+-a-)^T Q (a+-a-) + eps sum(a+ + a-) - y^T(a+ - a-)`
/// subject to `sum(a+ - a-) = 0`, `0 <= a+_i, a-_i <= C`.
pub fn fit_epsilon<A: Float>(
    params: &SolverParams<A>,
    kernel: Kernel<A>,
    targets: &Array1<A>,
    c: A,
    epsilon: A,
) -> SvmResult<A> {
    let l = targets.len();
    let p: Vec<A> = (0..l)
        .map(|i| epsilon - targets[i])
        .chain((0..l).map(|i| epsilon + targets[i]))
        .collect();
    let signed_targets: Vec<bool> = (0..l).map(|_| true).chain((0..l).map(|_| false)).collect();

    let permutable = PermutableKernelRegression::new(kernel);
    let solver = SolverState::new(
        vec![A::zero(); 2 * l],
        p,
        signed_targets,
        permutable,
        vec![c; 2 * l],
        params,
        false,
    );

    let res = solver.solve();
    finish(res, l)
}

/// Nu support vector regression: replaces the fixed `epsilon` tube width
/// with a `nu in (0, 1]` controlling the fraction of points allowed outside
/// it, via the same warm-started-alpha trick `fit_nu` (classification) uses
/// (`base_svm.hpp`'s `nusvm::initialisation`).
pub fn fit_nu<A: Float>(
    params: &SolverParams<A>,
    kernel: Kernel<A>,
    targets: &Array1<A>,
    nu: A,
    c: A,
) -> SvmResult<A> {
    let l = targets.len();
    let mut sum = c * nu * A::from(l).unwrap() / A::from(2.0).unwrap();
    let mut init_alpha = vec![A::zero(); 2 * l];
    for i in 0..l {
        let val = A::min(sum, c);
        init_alpha[i] = val;
        init_alpha[i + l] = val;
        sum -= val;
    }
    let p: Vec<A> = (0..l)
        .map(|i| -targets[i])
        .chain((0..l).map(|i| targets[i]))
        .collect();
    let signed_targets: Vec<bool> = (0..l).map(|_| true).chain((0..l).map(|_| false)).collect();

    let permutable = PermutableKernelRegression::new(kernel);
    let solver = SolverState::new(
        init_alpha,
        p,
        signed_targets,
        permutable,
        vec![c; 2 * l],
        params,
        true,
    );

    // Unlike nu-SVC, nu-SVR's equality constraint is already satisfied by
    // the warm-started alpha above, so the post-solve `r` rescale
    // (`classification::fit_nu`) does not apply here: `rho` and `alpha` are
    // used exactly as the solver returns them.
    let res = solver.solve();
    finish(res, l)
}

fn finish<A: Float>(mut res: Svm<A, linfa::dataset::Pr>, l: usize) -> SvmResult<A> {
    res.alpha = fold_doubled_alpha(std::mem::take(&mut res.alpha));
    debug_assert_eq!(res.alpha.len(), l);
    res.with_phantom::<A>()
}

#[cfg(test)]
mod tests {
    use super::{fit_epsilon, fit_nu, SolverParams};
    use linfa_kernel::Kernel;
    use ndarray::{array, Array2};

    #[test]
    fn epsilon_svr_fits_a_line() {
        let x: Array2<f64> = Array2::from_shape_vec((10, 1), (0..10).map(|v| v as f64).collect()).unwrap();
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let kernel = Kernel::linear(&x);
        let params = SolverParams { eps: 1e-4, shrinking: false };

        let svr = fit_epsilon(&params, kernel, &y, 10.0, 0.01);
        for (row, &target) in x.outer_iter().zip(y.iter()) {
            let pred = svr.predict(row);
            assert!((pred - target).abs() < 0.5, "pred={} target={}", pred, target);
        }
    }

    #[test]
    fn nu_svr_fits_a_line() {
        let x: Array2<f64> = Array2::from_shape_vec((10, 1), (0..10).map(|v| v as f64).collect()).unwrap();
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let kernel = Kernel::linear(&x);
        let params = SolverParams { eps: 1e-4, shrinking: false };

        let svr = fit_nu(&params, kernel, &y, 0.5, 10.0);
        for (row, &target) in x.outer_iter().zip(y.iter()) {
            let pred = svr.predict(row);
            assert!((pred - target).abs() < 1.0, "pred={} target={}", pred, target);
        }
    }
}
