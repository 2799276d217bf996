//! Sequential Minimal Optimization decomposition engine.
//!
//! Grounded on the working-set selection (`wssi`/`wssj`) and two-variable
//! update step in `base_svm.hpp`, `c_svm.cpp` and `nu_svm.cpp`. The
//! original blocks the working set to a power-of-two capped at a hardware
//! constant (`compute_ws_size`) so that each local SMO pass amortises a
//! handful of BLAS calls over a wide kernel sub-block; this solver
//! reproduces that structure directly:
//!
//! * [`working_set_size`] picks `ws`, the largest power of two not
//!   exceeding the problem size and capped at 1024.
//! * [`SolverState::select_working_set`] scans the gradient-sorted
//!   permutation from both ends (`I_up` ascending, `I_low` descending,
//!   split into positive/negative streams for the nu formulations) to
//!   build the next working set, warm-started by copying the upper half
//!   of the previous working set into the lower half of the new one
//!   (`base_svm.hpp`'s `reuse_ws`).
//! * [`local_smo`] runs up to `100 * ws` two-variable updates on the
//!   `ws x ws` local sub-problem, maintaining a local gradient that never
//!   touches the full `n`-length vector.
//! * [`SolverState::solve`] applies the resulting `alpha` delta to the
//!   global gradient with a single AXPY pass over the `n x ws` kernel
//!   block (`base_svm.hpp`'s `update_gradient`) and checks global
//!   convergence against the first local duality gap of each outer
//!   iteration, exiting once that gap is below `tol` or has changed by
//!   less than `1e-3 * tol` for five consecutive outer iterations, never
//!   before the fifth outer iteration.
use linfa::{dataset::Pr, Float};
use ndarray::Array1;
use std::marker::PhantomData;

use super::permutable_kernel::Permutable;
use super::{ExitReason, Svm};

/// Solver-wide settings: `eps` is the duality-gap threshold `tol` of
/// `base_svm.hpp`, `shrinking` toggles active-set shrinking (currently
/// accepted for API compatibility but not yet implemented, see
/// `DESIGN.md`).
#[derive(Debug, Clone)]
pub struct SolverParams<F> {
    pub eps: F,
    pub shrinking: bool,
}

/// Largest power of two not exceeding `n`, capped at 1024 —
/// `base_svm.hpp`'s `compute_ws_size`.
fn working_set_size(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut ws = 1usize;
    while ws * 2 <= n && ws < 1024 {
        ws *= 2;
    }
    ws
}

fn local_is_upper<F: Float>(alpha: F, bound: F, response: F) -> bool {
    (alpha < bound && response > F::zero()) || (alpha > F::zero() && response < F::zero())
}

fn local_is_lower<F: Float>(alpha: F, bound: F, response: F) -> bool {
    (alpha < bound && response < F::zero()) || (alpha > F::zero() && response > F::zero())
}

fn local_is_upper_pos<F: Float>(alpha: F, bound: F, response: F) -> bool {
    alpha < bound && response > F::zero()
}

fn local_is_upper_neg<F: Float>(alpha: F, bound: F, response: F) -> bool {
    alpha > F::zero() && response < F::zero()
}

fn local_is_lower_pos<F: Float>(alpha: F, bound: F, response: F) -> bool {
    alpha > F::zero() && response > F::zero()
}

fn local_is_lower_neg<F: Float>(alpha: F, bound: F, response: F) -> bool {
    alpha < bound && response < F::zero()
}

/// `wssi` + `wssj` restricted to the local working set: pick the
/// maximum-violating pair `(i, j)` among the `m` local indices, returning
/// the pair, the duality-gap estimate `max_grad - min_grad`, the
/// unclamped step `delta = b / a`, and the objective-improvement estimate
/// `delta * b` used to arbitrate between the positive-class and
/// negative-class pairs in the nu formulations.
#[allow(clippy::too_many_arguments)]
fn local_violating_pair<F: Float>(
    m: usize,
    gradient: &[F],
    diagonal: &[F],
    q: impl Fn(usize, usize) -> F,
    tau: F,
    up: impl Fn(usize) -> bool,
    low: impl Fn(usize) -> bool,
) -> Option<(usize, usize, F, F, F)> {
    let mut min_grad = F::infinity();
    let mut i = None;
    for t in 0..m {
        if up(t) && gradient[t] < min_grad {
            min_grad = gradient[t];
            i = Some(t);
        }
    }
    let i = i?;

    let mut max_grad = F::neg_infinity();
    let mut max_fun = F::neg_infinity();
    let mut j = None;
    let mut best_delta = F::zero();
    for t in 0..m {
        if low(t) {
            if gradient[t] > max_grad {
                max_grad = gradient[t];
            }
            let b = gradient[t] - min_grad;
            if b <= F::zero() {
                continue;
            }
            let mut a = diagonal[i] + diagonal[t] - F::from(2.0).unwrap() * q(i, t);
            if a <= F::zero() {
                a = tau;
            }
            let ratio = b / a;
            let fun = ratio * b;
            if fun > max_fun {
                max_fun = fun;
                j = Some(t);
                best_delta = ratio;
            }
        }
    }
    let j = j?;
    Some((i, j, max_grad - min_grad, best_delta, max_fun))
}

/// Two-variable update on the local sub-problem, mirroring
/// `base_svm.hpp`'s `update_alpha`: clamps `delta` against both
/// variables' box constraints, applies the signed update and refreshes
/// the local gradient with the local `ws x ws` block only.
fn local_update<F: Float>(
    alpha: &mut [F],
    response: &[F],
    bounds: &[F],
    gradient: &mut [F],
    q: impl Fn(usize, usize) -> F,
    i: usize,
    j: usize,
    delta: F,
) {
    let alpha_i_diff = if response[i] > F::zero() {
        bounds[i] - alpha[i]
    } else {
        alpha[i]
    };
    let alpha_j_diff = F::min(
        if response[j] > F::zero() {
            alpha[j]
        } else {
            bounds[j] - alpha[j]
        },
        delta,
    );
    let delta = F::min(alpha_i_diff, alpha_j_diff);

    alpha[i] += delta * response[i];
    alpha[j] -= delta * response[j];

    for t in 0..gradient.len() {
        gradient[t] += delta * (q(i, t) - q(j, t));
    }
}

/// Result of one local SMO pass over a working set: the duality gap
/// measured before any local update (`base_svm.hpp`'s `first_diff`,
/// used to judge global convergence) and the number of two-variable
/// updates actually applied.
struct LocalResult<F> {
    first_diff: F,
    updates: usize,
}

/// Run local SMO on the `m`-sized working set `w`, reading/writing
/// `alpha`/`gradient` in place. `columns[k]` is the full-length-`n`
/// kernel column for `w[k]`, so the local `Q` entry for local indices
/// `(a, b)` is `columns[b][w[a]]`.
fn local_smo<F: Float>(
    w: &[usize],
    columns: &[Vec<F>],
    alpha: &mut [F],
    response: &[F],
    bounds: &[F],
    diagonal: &[F],
    gradient: &mut [F],
    tau: F,
    tol: F,
    nu_constraint: bool,
) -> LocalResult<F> {
    let m = w.len();
    let q = |a: usize, b: usize| columns[b][w[a]];
    let mut first_diff = None;
    let mut updates = 0usize;
    let max_inner = (100 * m).max(1);

    for inner in 0..max_inner {
        let selected = if !nu_constraint {
            local_violating_pair(
                m,
                gradient,
                diagonal,
                q,
                tau,
                |t| local_is_upper(alpha[t], bounds[t], response[t]),
                |t| local_is_lower(alpha[t], bounds[t], response[t]),
            )
        } else {
            let pos = local_violating_pair(
                m,
                gradient,
                diagonal,
                q,
                tau,
                |t| local_is_upper_pos(alpha[t], bounds[t], response[t]),
                |t| local_is_lower_pos(alpha[t], bounds[t], response[t]),
            );
            let neg = local_violating_pair(
                m,
                gradient,
                diagonal,
                q,
                tau,
                |t| local_is_upper_neg(alpha[t], bounds[t], response[t]),
                |t| local_is_lower_neg(alpha[t], bounds[t], response[t]),
            );
            match (pos, neg) {
                (Some(p), Some(n)) => {
                    let gap = p.2.max(n.2);
                    if p.4 > n.4 {
                        Some((p.0, p.1, gap, p.3, p.4))
                    } else {
                        Some((n.0, n.1, gap, n.3, n.4))
                    }
                }
                (Some(p), None) => Some(p),
                (None, Some(n)) => Some(n),
                (None, None) => None,
            }
        };

        let (i, j, diff, delta) = match selected {
            Some((i, j, diff, delta, _)) => (i, j, diff, delta),
            None => break,
        };

        if inner == 0 {
            first_diff = Some(diff);
        }
        let eps_inner = F::max(tol, F::from(0.1).unwrap() * first_diff.unwrap());
        if diff < eps_inner {
            break;
        }

        local_update(alpha, response, bounds, gradient, q, i, j, delta);
        updates += 1;
    }

    LocalResult {
        first_diff: first_diff.unwrap_or_else(F::zero),
        updates,
    }
}

/// One running SMO problem: `min 1/2 a^T Q a + p^T a` subject to
/// `y^T a == 0` (classification problems) and `0 <= a_i <= bounds[i]`.
pub struct SolverState<'a, F: Float, K: Permutable<F>> {
    alpha: Vec<F>,
    p: Vec<F>,
    gradient: Vec<F>,
    response: Vec<F>,
    bounds: Vec<F>,
    diagonal: Vec<F>,
    kernel: K,
    params: &'a SolverParams<F>,
    nu_constraint: bool,
    tau: F,
    phantom: PhantomData<&'a F>,
}

impl<'a, F: Float, K: Permutable<F>> SolverState<'a, F, K> {
    pub fn new(
        alpha: Vec<F>,
        p: Vec<F>,
        targets: Vec<bool>,
        kernel: K,
        bounds: Vec<F>,
        params: &'a SolverParams<F>,
        nu_constraint: bool,
    ) -> Self {
        let n = alpha.len();
        let response: Vec<F> = targets
            .iter()
            .map(|&t| if t { F::one() } else { -F::one() })
            .collect();
        let diagonal = kernel.diagonal();

        // gradient = p + Q.alpha; for a cold start alpha is all zero and
        // this is just `p`, but nu-SVC and nu-SVR start from a non-trivial
        // alpha (`nusvm::initialisation`'s `initialise_gradient`) and need
        // the warm-start sum, computed here via a blocked column scan
        // rather than the all-zero-alpha shortcut C-problems take.
        let mut gradient = p.clone();
        for j in 0..n {
            if !alpha[j].is_zero() {
                let qj = kernel.column(j);
                for (g, q) in gradient.iter_mut().zip(qj.iter()) {
                    *g += alpha[j] * *q;
                }
            }
        }

        SolverState {
            alpha,
            p,
            gradient,
            response,
            bounds,
            diagonal,
            kernel,
            params,
            nu_constraint,
            tau: F::from(1e-12).unwrap(),
            phantom: PhantomData,
        }
    }

    fn size(&self) -> usize {
        self.alpha.len()
    }

    fn is_upper(&self, i: usize) -> bool {
        (self.alpha[i] < self.bounds[i] && self.response[i] > F::zero())
            || (self.alpha[i] > F::zero() && self.response[i] < F::zero())
    }

    fn is_lower(&self, i: usize) -> bool {
        (self.alpha[i] < self.bounds[i] && self.response[i] < F::zero())
            || (self.alpha[i] > F::zero() && self.response[i] > F::zero())
    }

    fn is_upper_pos(&self, i: usize) -> bool {
        self.alpha[i] < self.bounds[i] && self.response[i] > F::zero()
    }

    fn is_upper_neg(&self, i: usize) -> bool {
        self.alpha[i] > F::zero() && self.response[i] < F::zero()
    }

    fn is_lower_pos(&self, i: usize) -> bool {
        self.alpha[i] > F::zero() && self.response[i] > F::zero()
    }

    fn is_lower_neg(&self, i: usize) -> bool {
        self.alpha[i] < self.bounds[i] && self.response[i] < F::zero()
    }

    /// Outer working-set selection (`base_svm.hpp`'s `select_working_set`):
    /// scan the gradient-ascending permutation from the left for `I_up`
    /// candidates and from the right for `I_low` candidates (split into
    /// positive/negative streams for the nu formulations, since the nu
    /// equality constraint only couples same-sign variables), each stream
    /// keeping its own cursor so a single pass fills the set. `prev_w`
    /// warm-starts the scan: its upper half (the working set's back half)
    /// is copied into the new set before the scan runs, so state persists
    /// across outer iterations the way `reuse_ws` does.
    fn select_working_set(&self, prev_w: &[usize], ws: usize) -> Option<Vec<usize>> {
        let n = self.size();
        if n == 0 {
            return None;
        }
        let ws = ws.min(n);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            self.gradient[a]
                .partial_cmp(&self.gradient[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut w: Vec<usize> = Vec::with_capacity(ws);
        let mut chosen = vec![false; n];

        if !prev_w.is_empty() {
            let half = prev_w.len() / 2;
            for &idx in &prev_w[prev_w.len() - half..] {
                if !chosen[idx] {
                    w.push(idx);
                    chosen[idx] = true;
                }
            }
        }

        // (ascending, predicate): ascending streams scan `order` left to
        // right picking `I_up` members, descending streams scan right to
        // left picking `I_low` members.
        let streams: Vec<(bool, fn(&Self, usize) -> bool)> = if self.nu_constraint {
            vec![
                (true, Self::is_upper_pos),
                (true, Self::is_upper_neg),
                (false, Self::is_lower_pos),
                (false, Self::is_lower_neg),
            ]
        } else {
            vec![(true, Self::is_upper), (false, Self::is_lower)]
        };

        let mut left = vec![0usize; streams.len()];
        let mut right = vec![n; streams.len()];

        let mut progressed = true;
        while w.len() < ws && progressed {
            progressed = false;
            for (s, &(ascending, pred)) in streams.iter().enumerate() {
                if w.len() >= ws {
                    break;
                }
                if ascending {
                    while left[s] < n {
                        let idx = order[left[s]];
                        left[s] += 1;
                        if chosen[idx] {
                            continue;
                        }
                        if pred(self, idx) {
                            w.push(idx);
                            chosen[idx] = true;
                            progressed = true;
                            break;
                        }
                    }
                } else {
                    while right[s] > 0 {
                        right[s] -= 1;
                        let idx = order[right[s]];
                        if chosen[idx] {
                            continue;
                        }
                        if pred(self, idx) {
                            w.push(idx);
                            chosen[idx] = true;
                            progressed = true;
                            break;
                        }
                    }
                }
            }
        }

        if w.is_empty() {
            None
        } else {
            Some(w)
        }
    }

    /// Free-vector-averaged (or midpoint, if there are none) bias, mirroring
    /// `csvm::set_bias`/`nusvm::set_bias`. For the nu formulations this also
    /// returns the `scale` factor (`r` in the classification/regression
    /// drivers) used to renormalise `alpha`/`rho`/`obj` back to the
    /// standard nu-SVM scale once the sign of `alpha` has been restored by
    /// the caller.
    fn compute_bias(&self) -> (F, Option<F>) {
        let two = F::from(2.0).unwrap();
        if !self.nu_constraint {
            let mut sum = F::zero();
            let mut nfree = 0usize;
            let mut min_value = F::infinity();
            let mut max_value = F::neg_infinity();
            for i in 0..self.size() {
                if self.alpha[i] > F::zero() && self.alpha[i] < self.bounds[i] {
                    sum += self.gradient[i];
                    nfree += 1;
                }
                if self.is_upper(i) {
                    min_value = min_value.min(self.gradient[i]);
                }
                if self.is_lower(i) {
                    max_value = max_value.max(self.gradient[i]);
                }
            }
            let bias = if nfree == 0 {
                -(min_value + max_value) / two
            } else {
                -sum / F::from(nfree).unwrap()
            };
            (bias, None)
        } else {
            let mut sum_p = F::zero();
            let mut sum_n = F::zero();
            let mut nfree_p = 0usize;
            let mut nfree_n = 0usize;
            let mut min_p = F::infinity();
            let mut min_n = F::infinity();
            let mut max_p = F::neg_infinity();
            let mut max_n = F::neg_infinity();
            for i in 0..self.size() {
                if self.alpha[i] > F::zero() && self.alpha[i] < self.bounds[i] {
                    if self.response[i] > F::zero() {
                        sum_p += self.gradient[i];
                        nfree_p += 1;
                    } else {
                        sum_n -= self.gradient[i];
                        nfree_n += 1;
                    }
                }
                if self.is_upper_pos(i) {
                    min_p = min_p.min(self.gradient[i]);
                }
                if self.is_lower_pos(i) {
                    max_p = max_p.max(self.gradient[i]);
                }
                if self.is_upper_neg(i) {
                    min_n = min_n.min(self.gradient[i]);
                }
                if self.is_lower_neg(i) {
                    max_n = max_n.max(self.gradient[i]);
                }
            }
            let bias_p = if nfree_p == 0 {
                (min_p + max_p) / two
            } else {
                sum_p / F::from(nfree_p).unwrap()
            };
            let bias_n = if nfree_n == 0 {
                -(min_n + max_n) / two
            } else {
                sum_n / F::from(nfree_n).unwrap()
            };
            ((bias_n - bias_p) / two, Some((bias_p + bias_n) / two))
        }
    }

    fn objective(&self) -> F {
        let half = F::from(0.5).unwrap();
        (0..self.size())
            .map(|i| self.alpha[i] * (self.gradient[i] + self.p[i]))
            .sum::<F>()
            * half
    }

    /// Run the blocked decomposition to convergence (or `max_iter` outer
    /// iterations) and build the fitted model. `alpha` in the returned
    /// [`Svm`] is still unsigned (`0 <= a_i <= bounds[i]`) — classification
    /// and regression drivers restore the target sign themselves, since
    /// the nu-SVM rescale by `r` has to happen after that sign restoration.
    ///
    /// Each outer iteration: select a `ws`-sized working set (warm-started
    /// from the previous one), run [`local_smo`] on its `ws x ws`
    /// sub-problem, then fold the resulting `alpha` delta into the global
    /// gradient with one AXPY pass over the `n x ws` kernel block. Global
    /// convergence tracks the first local duality gap of each outer
    /// iteration (`first_diff`) and stops once it drops below `tol`, or has
    /// changed by less than `1e-3 * tol` for five consecutive outer
    /// iterations — never before the fifth outer iteration runs.
    pub fn solve(mut self) -> Svm<F, Pr> {
        let n = self.size();
        let ws = working_set_size(n);
        let max_outer = (n * 100 / ws.max(1)).max(1000);

        let mut prev_w: Vec<usize> = Vec::new();
        let mut outer_iter = 0usize;
        let mut total_updates = 0usize;
        let mut prev_first_diff: Option<F> = None;
        let mut stable_count = 0usize;
        let exit_reason;

        loop {
            let w = match self.select_working_set(&prev_w, ws) {
                Some(w) => w,
                None => {
                    exit_reason = ExitReason::ReachedThreshold;
                    break;
                }
            };

            let columns: Vec<Vec<F>> = w.iter().map(|&idx| self.kernel.column(idx)).collect();

            let mut alpha_local: Vec<F> = w.iter().map(|&idx| self.alpha[idx]).collect();
            let response_local: Vec<F> = w.iter().map(|&idx| self.response[idx]).collect();
            let bounds_local: Vec<F> = w.iter().map(|&idx| self.bounds[idx]).collect();
            let diagonal_local: Vec<F> = w.iter().map(|&idx| self.diagonal[idx]).collect();
            let mut gradient_local: Vec<F> = w.iter().map(|&idx| self.gradient[idx]).collect();
            let alpha_local_start = alpha_local.clone();

            let result = local_smo(
                &w,
                &columns,
                &mut alpha_local,
                &response_local,
                &bounds_local,
                &diagonal_local,
                &mut gradient_local,
                self.tau,
                self.params.eps,
                self.nu_constraint,
            );
            total_updates += result.updates;

            for (k, &idx) in w.iter().enumerate() {
                self.alpha[idx] = alpha_local[k];
            }

            // Global gradient AXPY update over the `n x ws` kernel block.
            for (k, col) in columns.iter().enumerate() {
                let da = alpha_local[k] - alpha_local_start[k];
                if da.is_zero() {
                    continue;
                }
                for t in 0..n {
                    self.gradient[t] += da * col[t];
                }
            }

            outer_iter += 1;

            if let Some(prev) = prev_first_diff {
                if (result.first_diff - prev).abs() < F::from(1e-3).unwrap() * self.params.eps {
                    stable_count += 1;
                } else {
                    stable_count = 0;
                }
            }
            prev_first_diff = Some(result.first_diff);

            let converged = result.first_diff < self.params.eps || stable_count >= 5;
            if outer_iter >= 5 && converged {
                exit_reason = ExitReason::ReachedThreshold;
                break;
            }
            if outer_iter >= max_outer {
                exit_reason = ExitReason::ReachedIterations;
                break;
            }

            prev_w = w;
        }

        let (rho, r) = self.compute_bias();
        let obj = self.objective();

        let linear_decision = if self.kernel.inner().method == linfa_kernel::KernelMethod::Linear {
            let n_train = self.kernel.inner().size();
            let p = self.kernel.inner().ncols();
            let mut w = Array1::zeros(p);
            for (i, &a) in self.alpha.iter().enumerate() {
                if !a.is_zero() {
                    let signed = a * self.response[i];
                    let row = self.kernel.inner().training_row(i % n_train);
                    for (w_k, x_k) in w.iter_mut().zip(row.iter()) {
                        *w_k += signed * *x_k;
                    }
                }
            }
            Some(w)
        } else {
            None
        };

        Svm {
            alpha: self.alpha,
            rho,
            r,
            exit_reason,
            iterations: total_updates,
            obj,
            kernel: self.kernel.into_inner(),
            linear_decision,
            phantom: PhantomData,
        }
    }
}
