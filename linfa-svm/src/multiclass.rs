//! One-versus-one multiclass reduction.
//!
//! For `K > 2` classes, `svm.cpp`'s multiclass driver allocates `K(K-1)/2`
//! binary sub-problems in lexicographic class-index order, trains each over
//! the row subset belonging to its two classes, then reconciles support
//! vectors across sub-problems: a training point is a global support vector
//! if it is a support vector in *any* sub-problem it took part in. The
//! unusual per-class support-vector count (`n_sv_per_class`) and the global
//! support-vector index list are kept so callers can reproduce the LibSVM
//! `nSV`/`idx_support_vectors` result ids.
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1};

use super::classification;
use super::solver_smo::SolverParams;
use super::{Svm, SvmParams};
use linfa::dataset::Pr;
use linfa_kernel::Kernel;

/// One binary sub-problem of the one-versus-one expansion: the fitted model
/// plus the mapping from its local training-row index back into the
/// caller's original sample matrix.
struct PairModel<A: Float> {
    class_lo: usize,
    class_hi: usize,
    model: Svm<A, Pr>,
    row_index: Vec<usize>,
}

/// A multiclass Support Vector Classifier: `K(K-1)/2` pairwise binary models
/// plus per-class support-vector counts and the global support-vector
/// index list.
pub struct SvmMulticlass<A: Float> {
    classes: Vec<usize>,
    pairs: Vec<PairModel<A>>,
    n_sv_per_class: Vec<usize>,
    support_indexes: Vec<usize>,
}

impl<A: Float> SvmMulticlass<A> {
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Number of support vectors contributed by each class, in the same
    /// order as [`Self::classes`].
    pub fn n_sv_per_class(&self) -> &[usize] {
        &self.n_sv_per_class
    }

    /// Global training-row indices that are a support vector in at least
    /// one of the pairwise sub-problems.
    pub fn support_indexes(&self) -> &[usize] {
        &self.support_indexes
    }

    /// Per-class vote count from the `K(K-1)/2` pairwise decisions, plus a
    /// folded per-class confidence score:
    /// each pairwise decision adds its magnitude to the winning class's
    /// score and subtracts it from the losing class's.
    pub fn votes_and_scores(&self, x: ArrayView1<A>) -> (Vec<usize>, Vec<A>) {
        let k = self.classes.len();
        let mut votes = vec![0usize; k];
        let mut scores = vec![A::zero(); k];
        for pair in &self.pairs {
            let lo = self.classes.iter().position(|&c| c == pair.class_lo).unwrap();
            let hi = self.classes.iter().position(|&c| c == pair.class_hi).unwrap();
            let decision = pair.model.predict(x);
            if decision > A::zero() {
                votes[hi] += 1;
            } else {
                votes[lo] += 1;
            }
            scores[hi] += decision;
            scores[lo] -= decision;
        }
        (votes, scores)
    }

    /// Majority-vote class label; ties are broken by the smallest class
    /// index.
    pub fn predict(&self, x: ArrayView1<A>) -> usize {
        let (votes, _) = self.votes_and_scores(x);
        let mut best = 0;
        for i in 1..votes.len() {
            if votes[i] > votes[best] {
                best = i;
            }
        }
        self.classes[best]
    }

    pub fn predict_batch(&self, x: &Array2<A>) -> Array1<usize> {
        x.outer_iter().map(|row| self.predict(row)).collect()
    }
}

/// Either a single binary model (two classes) or the full one-versus-one
/// reduction (more than two), unified behind one `predict`.
pub enum SvmClassifier<A: Float> {
    Binary { model: Svm<A, Pr>, classes: [usize; 2] },
    Multi(SvmMulticlass<A>),
}

impl<A: Float> SvmClassifier<A> {
    pub fn predict(&self, x: ArrayView1<A>) -> usize {
        match self {
            SvmClassifier::Binary { model, classes } => {
                if model.predict(x) > A::zero() {
                    classes[1]
                } else {
                    classes[0]
                }
            }
            SvmClassifier::Multi(m) => m.predict(x),
        }
    }

    pub fn predict_batch(&self, x: &Array2<A>) -> Array1<usize> {
        x.outer_iter().map(|row| self.predict(row)).collect()
    }

    pub fn classes(&self) -> Vec<usize> {
        match self {
            SvmClassifier::Binary { classes, .. } => classes.to_vec(),
            SvmClassifier::Multi(m) => m.classes().to_vec(),
        }
    }

    pub fn support_indexes(&self) -> Vec<usize> {
        match self {
            SvmClassifier::Binary { model, .. } => model.support_indexes(),
            SvmClassifier::Multi(m) => m.support_indexes().to_vec(),
        }
    }
}

/// Train the one-versus-one (or plain binary) classifier for `targets`,
/// which must hold whole-number class labels `{0, ..., K-1}`.
pub fn fit_one_vs_one<A: Float>(
    params: &SvmParams<A, Pr>,
    records: &Array2<A>,
    targets: &Array1<usize>,
) -> linfa::Result<SvmClassifier<A>> {
    let mut classes: Vec<usize> = targets.iter().copied().collect();
    classes.sort_unstable();
    classes.dedup();

    if classes.len() < 2 {
        return Err(linfa::Error::InvalidLabels(
            "classification requires at least two distinct classes".into(),
        ));
    }

    let kernel_method = params.kernel.resolve_auto_gamma(records)?;

    if classes.len() == 2 {
        let bool_targets: Vec<bool> = targets.iter().map(|&t| t == classes[1]).collect();
        let kernel = Kernel::new(records.view(), kernel_method);
        let model = fit_binary_kernel(params, kernel, &bool_targets)?;
        return Ok(SvmClassifier::Binary { model, classes: [classes[0], classes[1]] });
    }

    let mut pairs = Vec::with_capacity(classes.len() * (classes.len() - 1) / 2);
    let mut support_flags = vec![false; records.nrows()];

    for (ci, &class_lo) in classes.iter().enumerate() {
        for &class_hi in &classes[ci + 1..] {
            let row_index: Vec<usize> = targets
                .iter()
                .enumerate()
                .filter(|(_, &t)| t == class_lo || t == class_hi)
                .map(|(i, _)| i)
                .collect();
            let sub_records = records.select(ndarray::Axis(0), &row_index);
            let sub_targets: Vec<bool> = row_index.iter().map(|&i| targets[i] == class_hi).collect();

            let kernel = Kernel::new(sub_records.view(), kernel_method);
            let model = fit_binary_kernel(params, kernel, &sub_targets)?;

            for local in model.support_indexes() {
                support_flags[row_index[local]] = true;
            }

            pairs.push(PairModel { class_lo, class_hi, model, row_index });
        }
    }

    let n_sv_per_class: Vec<usize> = classes
        .iter()
        .map(|&c| {
            targets
                .iter()
                .enumerate()
                .filter(|(i, &t)| t == c && support_flags[*i])
                .count()
        })
        .collect();

    let support_indexes: Vec<usize> = support_flags
        .iter()
        .enumerate()
        .filter(|(_, &flag)| flag)
        .map(|(i, _)| i)
        .collect();

    Ok(SvmClassifier::Multi(SvmMulticlass { classes, pairs, n_sv_per_class, support_indexes }))
}

pub(crate) fn fit_binary_kernel<A: Float>(
    params: &SvmParams<A, Pr>,
    kernel: Kernel<A>,
    targets: &[bool],
) -> linfa::Result<Svm<A, Pr>> {
    let solver_params: &SolverParams<A> = &params.solver_params;
    Ok(match (params.c, params.nu) {
        (Some((cpos, cneg)), _) => classification::fit_c(solver_params, kernel, targets, cpos, cneg),
        (None, Some((nu, _))) => classification::fit_nu(solver_params, kernel, targets, nu),
        (None, None) => {
            return Err(linfa::Error::IncompatibleOptions(
                "neither C nor Nu was set for classification".into(),
            ))
        }
    })
}
