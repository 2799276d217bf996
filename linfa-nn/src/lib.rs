//! # k-Nearest-Neighbors
//!
//! Grounded on `neighbors/knn.hpp`: a brute-force classifier (the only
//! algorithm implemented; no ball tree or k-d tree) supporting `uniform`
//! and `distance` neighbor weighting over `euclidean` or `sqeuclidean`
//! distances.
//!
//! ```
//! use linfa_nn::{KNearestNeighborsClassifier, Weights};
//! use ndarray::array;
//!
//! let records = array![[0.0], [1.0], [10.0], [11.0]];
//! let targets = vec![0usize, 0, 1, 1];
//!
//! let model = KNearestNeighborsClassifier::params(1)
//!     .weights(Weights::Uniform)
//!     .fit(&records, &targets)
//!     .unwrap();
//! assert_eq!(model.predict(&array![[0.5]])[0], 0);
//! ```
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Distance metric used when ranking neighbors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Metric {
    Euclidean,
    SquaredEuclidean,
}

impl Metric {
    fn distance<F: Float>(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        let sq = a.iter().zip(b.iter()).map(|(&x, &y)| (x - y) * (x - y)).fold(F::zero(), |acc, v| acc + v);
        match self {
            Metric::Euclidean => sq.sqrt(),
            Metric::SquaredEuclidean => sq,
        }
    }
}

/// How neighbor votes are combined into a class probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Weights {
    /// Every neighbor counts for one vote.
    Uniform,
    /// Neighbors are weighted by the reciprocal of their distance. If any
    /// of the k neighbors has zero distance to the query point, the vote
    /// collapses to a uniform split across exactly the zero-distance
    /// neighbors (the inverse-distance weight would otherwise be
    /// infinite).
    Distance,
}

/// Hyperparameters for [`KNearestNeighborsClassifier`], built via
/// [`KNearestNeighborsClassifier::params`].
#[derive(Clone)]
pub struct KNearestNeighborsParams {
    k: usize,
    weights: Weights,
    metric: Metric,
}

impl KNearestNeighborsParams {
    pub fn params(k: usize) -> Self {
        KNearestNeighborsParams { k, weights: Weights::Uniform, metric: Metric::Euclidean }
    }

    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn fit<F: Float>(
        &self,
        records: &Array2<F>,
        targets: &[usize],
    ) -> linfa::Result<KNearestNeighborsClassifier<F>> {
        let n = records.nrows();
        if n == 0 || records.ncols() == 0 {
            return Err(linfa::Error::InvalidInput(
                "records must have at least one sample and one feature".into(),
            ));
        }
        if targets.len() != n {
            return Err(linfa::Error::InvalidInput(
                "targets length must match the number of samples".into(),
            ));
        }
        if self.k == 0 || self.k > n {
            return Err(linfa::Error::InvalidInput(format!(
                "k = {} must be in (0, n_samples = {}]",
                self.k, n
            )));
        }

        let n_classes = targets.iter().max().map(|&m| m + 1).unwrap_or(0);
        Ok(KNearestNeighborsClassifier {
            records: records.clone(),
            targets: targets.to_vec(),
            n_classes,
            k: self.k,
            weights: self.weights,
            metric: self.metric,
        })
    }
}

/// A fitted k-NN model. Fitting only stores the training set: all work
/// happens at predict time (brute-force algorithm).
pub struct KNearestNeighborsClassifier<F> {
    records: Array2<F>,
    targets: Vec<usize>,
    n_classes: usize,
    k: usize,
    weights: Weights,
    metric: Metric,
}

impl<F: Float> KNearestNeighborsClassifier<F> {
    pub fn params(k: usize) -> KNearestNeighborsParams {
        KNearestNeighborsParams::params(k)
    }

    /// For each query row, the indices (into the training set) and
    /// distances of its k nearest neighbors, both sorted by ascending
    /// distance.
    pub fn kneighbors(&self, queries: &Array2<F>) -> (Array2<usize>, Array2<F>) {
        let k = self.k;
        let mut idx_out = Array2::zeros((queries.nrows(), k));
        let mut dist_out = Array2::zeros((queries.nrows(), k));

        for (q, query) in queries.axis_iter(Axis(0)).enumerate() {
            let mut dists: Vec<(usize, F)> =
                self.records.axis_iter(Axis(0)).enumerate().map(|(i, row)| (i, self.metric.distance(query, row))).collect();
            dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            for (slot, &(i, d)) in dists.iter().take(k).enumerate() {
                idx_out[[q, slot]] = i;
                dist_out[[q, slot]] = d;
            }
        }
        (idx_out, dist_out)
    }

    /// Per-class probability estimate for each query row, via a weighted
    /// histogram over its k nearest neighbors.
    pub fn predict_proba(&self, queries: &Array2<F>) -> Array2<F> {
        let (idx, dist) = self.kneighbors(queries);
        let mut proba = Array2::zeros((queries.nrows(), self.n_classes));

        for q in 0..queries.nrows() {
            let row_dist = dist.row(q);
            let row_idx = idx.row(q);

            let zero_tied: Vec<usize> =
                (0..self.k).filter(|&j| row_dist[j] <= F::zero()).collect();

            let use_uniform_tie = self.weights == Weights::Distance && !zero_tied.is_empty();

            let mut counts = vec![F::zero(); self.n_classes];
            if use_uniform_tie {
                for &j in &zero_tied {
                    let c = self.targets[row_idx[j]];
                    counts[c] += F::one();
                }
            } else {
                for j in 0..self.k {
                    let c = self.targets[row_idx[j]];
                    let w = match self.weights {
                        Weights::Uniform => F::one(),
                        Weights::Distance => F::one() / row_dist[j],
                    };
                    counts[c] += w;
                }
            }

            let total = counts.iter().fold(F::zero(), |a, &b| a + b);
            for c in 0..self.n_classes {
                proba[[q, c]] = if total > F::zero() { counts[c] / total } else { F::zero() };
            }
        }
        proba
    }

    pub fn predict(&self, queries: &Array2<F>) -> Array1<usize> {
        let proba = self.predict_proba(queries);
        proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0usize, F::neg_infinity()), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
                    .0
            })
            .collect()
    }

    pub fn score(&self, queries: &Array2<F>, targets: &[usize]) -> F {
        let pred = self.predict(queries);
        let correct = pred.iter().zip(targets.iter()).filter(|(p, t)| p == t).count();
        F::from(correct).unwrap() / F::from(targets.len()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn separates_two_well_spaced_groups() {
        let records = array![[0.0], [0.5], [1.0], [9.0], [9.5], [10.0]];
        let targets = vec![0usize, 0, 0, 1, 1, 1];
        let model = KNearestNeighborsClassifier::params(3).fit(&records, &targets).unwrap();
        assert_eq!(model.predict(&array![[0.2], [9.8]])[0], 0);
        assert_eq!(model.predict(&array![[0.2], [9.8]])[1], 1);
        assert_eq!(model.score(&records, &targets), 1.0);
    }

    #[test]
    fn distance_weighting_favors_the_closer_neighbor() {
        let records = array![[0.0], [1.0], [100.0]];
        let targets = vec![0usize, 1, 1];
        let model = KNearestNeighborsClassifier::params(3).weights(Weights::Distance).fit(&records, &targets).unwrap();
        // Query sits almost on top of class 0's single point; despite being
        // outvoted 2-to-1 by class 1, inverse-distance weighting should
        // still favor the near neighbor once the distances are this lopsided.
        let proba = model.predict_proba(&array![[0.01]]);
        assert!(proba[[0, 0]] > proba[[0, 1]]);
    }

    #[test]
    fn zero_distance_tie_collapses_to_uniform_among_exact_matches() {
        let records = array![[0.0], [0.0], [5.0]];
        let targets = vec![0usize, 1, 0];
        let model = KNearestNeighborsClassifier::params(3).weights(Weights::Distance).fit(&records, &targets).unwrap();
        let proba = model.predict_proba(&array![[0.0]]);
        // Two exact-distance-zero neighbors (classes 0 and 1) should split
        // the vote evenly, ignoring the distant third neighbor entirely.
        assert!((proba[[0, 0]] - 0.5).abs() < 1e-9);
        assert!((proba[[0, 1]] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_k_larger_than_sample_count() {
        let records = array![[0.0], [1.0]];
        let targets = vec![0usize, 1];
        assert!(KNearestNeighborsClassifier::params(3).fit(&records, &targets).is_err());
    }
}
