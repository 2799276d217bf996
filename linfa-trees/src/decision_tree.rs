//! A single decision tree classifier.
//!
//! Grounded on `decision_forest/decision_tree.hpp`'s `node`/`decision_tree`
//! pair: the tree is a single growing arena of nodes addressed by index
//!, never by pointer, so there is no
//! parent-pointer cycle to manage and the structure trivially derives
//! `Clone`. Each node owns a contiguous slice `[start, end)` of a shared
//! `samples_idx` permutation buffer; splitting a node means partitioning its
//! slice in place (by sorting on the chosen feature) and handing each half to
//! a child.
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_isaac::Isaac64Rng;
use std::collections::VecDeque;

/// Impurity measure used to score candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpurityCriterion {
    Gini,
    CrossEntropy,
    Misclassification,
}

/// Order in which pending nodes are grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOrder {
    DepthFirst,
    BreadthFirst,
}

/// How many features each split considers (mirrors a `features selection`
/// knob on the candidate-split search).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSelection {
    All,
    Sqrt,
    Log2,
    Custom(usize),
}

impl FeatureSelection {
    fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            FeatureSelection::All => n_features,
            FeatureSelection::Sqrt => (n_features as f64).sqrt().round() as usize,
            FeatureSelection::Log2 => (n_features as f64).log2().round() as usize,
            FeatureSelection::Custom(k) => k,
        };
        n.max(1).min(n_features)
    }
}

fn gini_score<F: Float>(n_samples: usize, counts: &[usize]) -> F {
    let n = F::from(n_samples).unwrap();
    let sq_sum: usize = counts.iter().map(|&c| c * c).sum();
    F::one() - F::from(sq_sum).unwrap() / (n * n)
}

fn entropy_score<F: Float>(n_samples: usize, counts: &[usize]) -> F {
    let n = F::from(n_samples).unwrap();
    let thresh = F::from(1e-5).unwrap();
    counts.iter().fold(F::zero(), |acc, &c| {
        let p = F::from(c).unwrap() / n;
        if p > thresh {
            acc - p * p.log2()
        } else {
            acc
        }
    })
}

fn misclassification_score<F: Float>(n_samples: usize, counts: &[usize]) -> F {
    let n = F::from(n_samples).unwrap();
    let max_c = counts.iter().copied().max().unwrap_or(0);
    F::one() - F::from(max_c).unwrap() / n
}

fn impurity<F: Float>(criterion: ImpurityCriterion, n_samples: usize, counts: &[usize]) -> F {
    if n_samples == 0 {
        return F::zero();
    }
    match criterion {
        ImpurityCriterion::Gini => gini_score(n_samples, counts),
        ImpurityCriterion::CrossEntropy => entropy_score(n_samples, counts),
        ImpurityCriterion::Misclassification => misclassification_score(n_samples, counts),
    }
}

fn count_classes(targets: &[usize], samples_idx: &[usize], start: usize, end: usize, n_class: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_class];
    for &idx in &samples_idx[start..end] {
        counts[targets[idx]] += 1;
    }
    counts
}

fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0;
    let mut best_count = counts[0];
    for (c, &count) in counts.iter().enumerate().skip(1) {
        if count > best_count {
            best = c;
            best_count = count;
        }
    }
    best
}

#[derive(Clone)]
struct Node<F: Float> {
    is_leaf: bool,
    left_child: Option<usize>,
    right_child: Option<usize>,
    depth: usize,
    score: F,
    y_pred: usize,
    counts: Vec<usize>,
    feature: usize,
    threshold: F,
    start: usize,
    end: usize,
}

impl<F: Float> Node<F> {
    fn n_samples(&self) -> usize {
        self.end - self.start
    }
}

/// Candidate split found by [`find_best_split`].
struct Split<F: Float> {
    feature: usize,
    /// Position in the node's slice right before the split (`samples_idx[start+pos]`
    /// is the last element of the left child).
    pos: usize,
    score: F,
    threshold: F,
    left_score: F,
    right_score: F,
}

/// Hyperparameters for [`DecisionTree`], built via [`DecisionTreeParams::params`].
#[derive(Clone)]
pub struct DecisionTreeParams<F: Float> {
    max_depth: usize,
    min_node_sample: usize,
    min_split_score: F,
    min_improvement: F,
    feat_thresh: F,
    nfeat_split: FeatureSelection,
    criterion: ImpurityCriterion,
    build_order: BuildOrder,
    pub(crate) bootstrap: bool,
    pub(crate) seed: Option<u64>,
}

impl<F: Float> DecisionTreeParams<F> {
    pub fn params() -> Self {
        DecisionTreeParams {
            max_depth: usize::MAX,
            min_node_sample: 2,
            min_split_score: F::zero(),
            min_improvement: F::zero(),
            feat_thresh: F::from(1e-5).unwrap(),
            nfeat_split: FeatureSelection::All,
            criterion: ImpurityCriterion::Gini,
            build_order: BuildOrder::DepthFirst,
            bootstrap: false,
            seed: None,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn min_node_sample(mut self, min_node_sample: usize) -> Self {
        self.min_node_sample = min_node_sample;
        self
    }

    pub fn min_split_score(mut self, min_split_score: F) -> Self {
        self.min_split_score = min_split_score;
        self
    }

    pub fn min_improvement(mut self, min_improvement: F) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    pub fn feat_thresh(mut self, feat_thresh: F) -> Self {
        self.feat_thresh = feat_thresh;
        self
    }

    pub fn feature_selection(mut self, nfeat_split: FeatureSelection) -> Self {
        self.nfeat_split = nfeat_split;
        self
    }

    pub fn criterion(mut self, criterion: ImpurityCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn build_order(mut self, build_order: BuildOrder) -> Self {
        self.build_order = build_order;
        self
    }

    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn fit(&self, records: &Array2<F>, targets: &Array1<usize>) -> linfa::Result<DecisionTree<F>> {
        let n_samples = records.nrows();
        self.fit_with_n_obs(records, targets, n_samples)
    }

    /// Entry point shared with [`crate::random_forest`]: `n_obs` lets a
    /// forest shrink the effective bootstrap size below `n_samples`)`).
    pub(crate) fn fit_with_n_obs(
        &self,
        records: &Array2<F>,
        targets: &Array1<usize>,
        n_obs: usize,
    ) -> linfa::Result<DecisionTree<F>> {
        let n_samples = records.nrows();
        let n_features = records.ncols();
        if n_samples == 0 || n_features == 0 {
            return Err(linfa::Error::InvalidInput(
                "records must have at least one sample and one feature".into(),
            ));
        }
        if targets.len() != n_samples {
            return Err(linfa::Error::InvalidInput(format!(
                "targets length {} does not match n_samples {}",
                targets.len(),
                n_samples
            )));
        }
        if n_obs == 0 || n_obs > n_samples {
            return Err(linfa::Error::InvalidInput(format!(
                "n_obs = {} must be in (0, n_samples = {}]",
                n_obs, n_samples
            )));
        }
        let n_class = targets.iter().copied().max().unwrap_or(0) + 1;
        let targets_slice: Vec<usize> = targets.iter().copied().collect();

        let nfeat_split = self.nfeat_split.resolve(n_features);

        let seed = self.seed.unwrap_or(0);
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        let mut samples_idx: Vec<usize> = if !self.bootstrap {
            (0..n_samples).collect()
        } else {
            (0..n_obs).map(|_| rng.gen_range(0, n_samples)).collect()
        };

        let init_capacity = (1usize << self.max_depth.min(9)) + 1;
        let mut nodes: Vec<Node<F>> = Vec::with_capacity(init_capacity);
        let root_counts = count_classes(&targets_slice, &samples_idx, 0, n_obs, n_class);
        let root_score = impurity(self.criterion, n_obs, &root_counts);
        nodes.push(Node {
            is_leaf: true,
            left_child: None,
            right_child: None,
            depth: 0,
            score: root_score,
            y_pred: majority_class(&root_counts),
            counts: root_counts,
            feature: 0,
            threshold: F::zero(),
            start: 0,
            end: n_obs,
        });

        let mut queue: VecDeque<usize> = VecDeque::new();
        if self.max_depth > 0 {
            queue.push_back(0);
        }

        let mut features_idx: Vec<usize> = (0..n_features).collect();
        let mut depth_reached = 0usize;

        while let Some(node_idx) = match self.build_order {
            BuildOrder::DepthFirst => queue.pop_back(),
            BuildOrder::BreadthFirst => queue.pop_front(),
        } {
            let (start, end, node_score, node_depth) = {
                let node = &nodes[node_idx];
                (node.start, node.end, node.score, node.depth)
            };
            let maximum_split_score = node_score - self.min_improvement;

            if nfeat_split < n_features {
                features_idx.shuffle(&mut rng);
            }

            let mut best: Option<Split<F>> = None;
            for &feat in features_idx.iter().take(nfeat_split) {
                if let Some(sp) = find_best_split(
                    records,
                    &targets_slice,
                    &mut samples_idx,
                    start,
                    end,
                    feat,
                    n_class,
                    self.criterion,
                    self.feat_thresh,
                    maximum_split_score,
                    node_score,
                ) {
                    let better = match &best {
                        None => true,
                        Some(cur) => sp.score < cur.score,
                    };
                    if better {
                        best = Some(sp);
                    }
                }
            }

            if let Some(sp) = best {
                // Re-sort by the winning feature: `find_best_split` may have
                // left the slice ordered by a different, losing feature.
                sort_slice(records, &mut samples_idx, start, end, sp.feature);

                let split_at = start + sp.pos + 1;
                let (left_counts, right_counts) = {
                    let left = count_classes(&targets_slice, &samples_idx, start, split_at, n_class);
                    let right = count_classes(&targets_slice, &samples_idx, split_at, end, n_class);
                    (left, right)
                };

                {
                    let node = &mut nodes[node_idx];
                    node.is_leaf = false;
                    node.feature = sp.feature;
                    node.threshold = sp.threshold;
                }

                let right_idx = nodes.len();
                nodes.push(Node {
                    is_leaf: true,
                    left_child: None,
                    right_child: None,
                    depth: node_depth + 1,
                    score: sp.right_score,
                    y_pred: majority_class(&right_counts),
                    counts: right_counts,
                    feature: 0,
                    threshold: F::zero(),
                    start: split_at,
                    end,
                });
                let left_idx = nodes.len();
                nodes.push(Node {
                    is_leaf: true,
                    left_child: None,
                    right_child: None,
                    depth: node_depth + 1,
                    score: sp.left_score,
                    y_pred: majority_class(&left_counts),
                    counts: left_counts,
                    feature: 0,
                    threshold: F::zero(),
                    start,
                    end: split_at,
                });
                nodes[node_idx].left_child = Some(left_idx);
                nodes[node_idx].right_child = Some(right_idx);
                depth_reached = depth_reached.max(node_depth + 1);

                if sp.right_score > self.min_split_score
                    && nodes[right_idx].n_samples() >= self.min_node_sample
                    && node_depth + 1 < self.max_depth
                {
                    queue.push_back(right_idx);
                }
                if sp.left_score > self.min_split_score
                    && nodes[left_idx].n_samples() >= self.min_node_sample
                    && node_depth + 1 < self.max_depth
                {
                    queue.push_back(left_idx);
                }
            }
        }

        Ok(DecisionTree {
            nodes,
            n_features,
            n_class,
            depth: depth_reached,
        })
    }
}

/// Sort `samples_idx[start..end]` by `records[:, feat]`, filling no separate
/// buffer (ties broken by original order since `sort_by` is stable).
fn sort_slice<F: Float>(records: &Array2<F>, samples_idx: &mut [usize], start: usize, end: usize, feat: usize) {
    samples_idx[start..end].sort_by(|&i, &j| {
        records[[i, feat]]
            .partial_cmp(&records[[j, feat]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Evaluate every candidate split of `feat` on `samples_idx[start..end]` and
/// return the best one found, or `None` if every candidate either fails the
/// `feat_thresh`/`min_improvement` gate or the feature is constant on this
/// slice.
#[allow(clippy::too_many_arguments)]
fn find_best_split<F: Float>(
    records: &Array2<F>,
    targets: &[usize],
    samples_idx: &mut [usize],
    start: usize,
    end: usize,
    feat: usize,
    n_class: usize,
    criterion: ImpurityCriterion,
    feat_thresh: F,
    maximum_split_score: F,
    parent_score: F,
) -> Option<Split<F>> {
    let n_samples = end - start;
    if n_samples < 2 {
        return None;
    }

    sort_slice(records, samples_idx, start, end, feat);
    let feature_values: Vec<F> = samples_idx[start..end].iter().map(|&i| records[[i, feat]]).collect();
    let mut count_left = vec![0usize; n_class];
    let mut count_right = count_classes(targets, samples_idx, start, end, n_class);

    let mut best: Option<Split<F>> = None;
    let mut ns_left = 0usize;
    let mut ns_right = n_samples;

    let mut pos = 0usize;
    while pos < n_samples - 1 {
        let c = targets[samples_idx[start + pos]];
        count_left[c] += 1;
        count_right[c] -= 1;
        ns_left += 1;
        ns_right -= 1;

        while pos + 1 < n_samples && (feature_values[pos + 1] - feature_values[pos]).abs() < feat_thresh {
            let c = targets[samples_idx[start + pos + 1]];
            count_left[c] += 1;
            count_right[c] -= 1;
            ns_left += 1;
            ns_right -= 1;
            pos += 1;
        }
        if pos == n_samples - 1 {
            break;
        }

        let left_score = impurity(criterion, ns_left, &count_left);
        let right_score = impurity(criterion, ns_right, &count_right);
        let split_score = (left_score * F::from(ns_left).unwrap() + right_score * F::from(ns_right).unwrap())
            / F::from(n_samples).unwrap();

        let improves = match &best {
            None => split_score < parent_score,
            Some(cur) => split_score < cur.score,
        };
        if improves && split_score < maximum_split_score {
            best = Some(Split {
                feature: feat,
                pos,
                score: split_score,
                threshold: (feature_values[pos] + feature_values[pos + 1]) / F::from(2.0).unwrap(),
                left_score,
                right_score,
            });
        }

        pos += 1;
    }

    best
}

/// A fitted decision tree.
#[derive(Clone)]
pub struct DecisionTree<F: Float> {
    nodes: Vec<Node<F>>,
    n_features: usize,
    n_class: usize,
    depth: usize,
}

impl<F: Float> DecisionTree<F> {
    pub fn params() -> DecisionTreeParams<F> {
        DecisionTreeParams::params()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf).count()
    }

    pub fn n_classes(&self) -> usize {
        self.n_class
    }

    fn leaf_for(&self, x: ArrayView1<F>) -> &Node<F> {
        let mut node = &self.nodes[0];
        while !node.is_leaf {
            let go_left = x[node.feature] < node.threshold;
            let next = if go_left { node.left_child } else { node.right_child };
            node = &self.nodes[next.expect("internal node always has both children")];
        }
        node
    }

    pub fn predict_one(&self, x: ArrayView1<F>) -> usize {
        self.leaf_for(x).y_pred
    }

    pub fn predict(&self, records: &Array2<F>) -> Array1<usize> {
        records.axis_iter(Axis(0)).map(|row| self.predict_one(row)).collect()
    }

    pub fn predict_proba_one(&self, x: ArrayView1<F>) -> Vec<F> {
        let node = self.leaf_for(x);
        let n = F::from(node.n_samples().max(1)).unwrap();
        node.counts.iter().map(|&c| F::from(c).unwrap() / n).collect()
    }

    pub fn predict_proba(&self, records: &Array2<F>) -> Array2<F> {
        let rows: Vec<Vec<F>> = records
            .axis_iter(Axis(0))
            .map(|row| self.predict_proba_one(row))
            .collect();
        let mut out = Array2::zeros((rows.len(), self.n_class));
        for (i, row) in rows.into_iter().enumerate() {
            for (c, v) in row.into_iter().enumerate() {
                out[[i, c]] = v;
            }
        }
        out
    }

    /// Elementwise logarithm of [`Self::predict_proba`]; `-inf` for zero
    /// probability, never `NaN`.
    pub fn predict_log_proba(&self, records: &Array2<F>) -> Array2<F> {
        self.predict_proba(records).mapv(|p| if p.is_zero() { F::neg_infinity() } else { p.ln() })
    }

    pub fn score(&self, records: &Array2<F>, targets: &Array1<usize>) -> F {
        let pred = self.predict(records);
        let correct = pred.iter().zip(targets.iter()).filter(|(p, t)| p == t).count();
        F::from(correct).unwrap() / F::from(targets.len()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn quadrant_root_split_matches_expected_range() {
        let records = array![
            [0.1, 0.3],
            [0.4, 0.7],
            [0.4, 0.6],
            [0.6, 0.7],
            [0.6, 0.3],
            [0.9, 0.3],
            [0.9, 0.7],
            [0.1, 0.1],
        ];
        let targets = Array1::from(vec![0, 0, 1, 1, 1, 1, 1, 0]);

        let tree = DecisionTree::params()
            .max_depth(1)
            .criterion(ImpurityCriterion::Gini)
            .fit(&records, &targets)
            .unwrap();

        let root = &tree.nodes[0];
        assert_eq!(root.feature, 0);
        assert!(root.threshold >= 0.4 && root.threshold <= 0.6);
    }

    #[test]
    fn deep_tree_perfectly_fits_separable_quadrants() {
        let records = array![
            [0.1, 0.3],
            [0.4, 0.7],
            [0.4, 0.6],
            [0.6, 0.7],
            [0.6, 0.3],
            [0.9, 0.3],
            [0.9, 0.7],
            [0.1, 0.1],
        ];
        let targets = Array1::from(vec![0, 0, 1, 1, 1, 1, 1, 0]);

        let tree = DecisionTree::params().max_depth(8).fit(&records, &targets).unwrap();
        assert_eq!(tree.score(&records, &targets), 1.0);
    }

    #[test]
    fn split_partitions_samples_idx_exactly() {
        let records = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let targets = Array1::from(vec![0, 0, 0, 1, 1, 1]);
        let tree = DecisionTree::params().max_depth(4).fit(&records, &targets).unwrap();

        for node in &tree.nodes {
            if !node.is_leaf {
                let left = node.left_child.unwrap();
                let right = node.right_child.unwrap();
                assert_eq!(tree.nodes[left].start, node.start);
                assert_eq!(tree.nodes[left].end, tree.nodes[right].start);
                assert_eq!(tree.nodes[right].end, node.end);
            }
        }
    }

    #[test]
    fn predict_proba_sums_to_one() {
        let records = array![[0.0], [1.0], [2.0], [3.0]];
        let targets = Array1::from(vec![0, 0, 1, 1]);
        let tree = DecisionTree::params().max_depth(1).fit(&records, &targets).unwrap();
        let proba = tree.predict_proba(&records);
        for row in proba.axis_iter(Axis(0)) {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn bootstrap_sampling_is_deterministic_for_a_fixed_seed() {
        let records = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let targets = Array1::from(vec![0, 0, 1, 1, 1]);
        let a = DecisionTree::params()
            .bootstrap(true)
            .seed(42)
            .max_depth(3)
            .fit(&records, &targets)
            .unwrap();
        let b = DecisionTree::params()
            .bootstrap(true)
            .seed(42)
            .max_depth(3)
            .fit(&records, &targets)
            .unwrap();
        assert_eq!(a.nodes.len(), b.nodes.len());
        for (na, nb) in a.nodes.iter().zip(b.nodes.iter()) {
            assert_eq!(na.start, nb.start);
            assert_eq!(na.end, nb.end);
            assert_eq!(na.y_pred, nb.y_pred);
        }
    }
}
