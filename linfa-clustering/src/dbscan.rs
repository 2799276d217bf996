//! Density-based spatial clustering (DBSCAN).
//!
//! Grounded on `cluster/dbscan.hpp`: brute-force epsilon-neighborhood
//! queries, a breadth-first expansion of each unvisited core point, and
//! noise/border relabelling. No spatial index is built; neighbor queries
//! are the full O(n^2) pairwise scan, matching the brute algorithm the
//! nearest-neighbor crate in this workspace also defaults to.
use std::collections::VecDeque;

use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, Axis};

const NOISE: i64 = -1;
const UNVISITED: i64 = -2;

/// Distance metric used to build epsilon-neighborhoods.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Metric<F> {
    Euclidean,
    Manhattan,
    /// Minkowski distance with the given order `p`.
    Minkowski(F),
}

impl<F: Float> Metric<F> {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        match self {
            Metric::Euclidean => {
                a.iter().zip(b.iter()).map(|(&x, &y)| (x - y) * (x - y)).fold(F::zero(), |acc, v| acc + v).sqrt()
            }
            Metric::Manhattan => a.iter().zip(b.iter()).map(|(&x, &y)| (x - y).abs()).fold(F::zero(), |acc, v| acc + v),
            Metric::Minkowski(p) => {
                let sum = a
                    .iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| (x - y).abs().powf(*p))
                    .fold(F::zero(), |acc, v| acc + v);
                sum.powf(F::one() / *p)
            }
        }
    }
}

/// Hyperparameters for [`Dbscan::params`].
#[derive(Clone)]
pub struct DbscanParams<F> {
    eps: F,
    min_samples: usize,
    metric: Metric<F>,
}

impl<F: Float> DbscanParams<F> {
    pub fn params(eps: F, min_samples: usize) -> Self {
        DbscanParams { eps, min_samples, metric: Metric::Euclidean }
    }

    pub fn metric(mut self, metric: Metric<F>) -> Self {
        self.metric = metric;
        self
    }

    pub fn fit(&self, records: &Array2<F>) -> linfa::Result<DbscanResult> {
        let n = records.nrows();
        if n == 0 {
            return Err(linfa::Error::InvalidInput("records must have at least one sample".into()));
        }
        if self.eps <= F::zero() {
            return Err(linfa::Error::InvalidInput("eps must be strictly positive".into()));
        }
        if self.min_samples == 0 {
            return Err(linfa::Error::InvalidInput("min_samples must be strictly positive".into()));
        }

        let region_query = |i: usize| -> Vec<usize> {
            let point = records.row(i);
            (0..n).filter(|&j| self.metric.distance(point, records.row(j)) <= self.eps).collect()
        };

        let mut labels = vec![UNVISITED; n];
        let mut is_core = vec![false; n];
        let mut cluster_id = 0i64;

        for i in 0..n {
            if labels[i] != UNVISITED {
                continue;
            }
            let neighbors = region_query(i);
            if neighbors.len() < self.min_samples {
                labels[i] = NOISE;
                continue;
            }

            is_core[i] = true;
            cluster_id += 1;
            labels[i] = cluster_id;

            let mut seeds: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
            while let Some(j) = seeds.pop_front() {
                if labels[j] == NOISE {
                    labels[j] = cluster_id;
                }
                if labels[j] != UNVISITED {
                    continue;
                }
                labels[j] = cluster_id;
                let j_neighbors = region_query(j);
                if j_neighbors.len() >= self.min_samples {
                    is_core[j] = true;
                    for k in j_neighbors {
                        if labels[k] == UNVISITED || labels[k] == NOISE {
                            seeds.push_back(k);
                        }
                    }
                }
            }
        }

        let core_sample_indices = (0..n).filter(|&i| is_core[i]).collect();
        Ok(DbscanResult { labels: Array1::from(labels), core_sample_indices })
    }
}

/// The outcome of a DBSCAN fit: a cluster label per sample (`-1` meaning
/// noise) and the indices of the points that satisfied the core-point
/// density criterion.
pub struct DbscanResult {
    labels: Array1<i64>,
    core_sample_indices: Vec<usize>,
}

impl DbscanResult {
    pub fn labels(&self) -> &Array1<i64> {
        &self.labels
    }

    pub fn core_sample_indices(&self) -> &[usize] {
        &self.core_sample_indices
    }

    pub fn n_clusters(&self) -> usize {
        self.labels.iter().filter(|&&l| l != NOISE).map(|&l| l).collect::<std::collections::HashSet<_>>().len()
    }
}

/// Entry point mirroring the `KMeans`/`DecisionTree` builder convention:
/// `Dbscan::params(eps, min_samples).fit(&records)`.
pub struct Dbscan;

impl Dbscan {
    pub fn params<F: Float>(eps: F, min_samples: usize) -> DbscanParams<F> {
        DbscanParams::params(eps, min_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn two_dense_blobs_one_outlier() {
        let records = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, -0.1],
            [-0.1, 0.2],
            [5.0, 5.0],
            [5.2, 5.1],
            [5.1, 4.9],
            [5.0, 5.3],
            [100.0, 100.0],
        ];
        let result = Dbscan::params(1.0, 3).fit(&records).unwrap();
        let labels = result.labels();
        assert_eq!(labels[8], -1);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[2], labels[3]);
        assert_eq!(labels[4], labels[5]);
        assert_eq!(labels[5], labels[6]);
        assert_eq!(labels[6], labels[7]);
        assert_ne!(labels[0], labels[4]);
        assert_eq!(result.n_clusters(), 2);
    }

    #[test]
    fn sparse_points_are_all_noise() {
        let records = array![[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [30.0, 30.0]];
        let result = Dbscan::params(1.0, 2).fit(&records).unwrap();
        assert!(result.labels().iter().all(|&l| l == -1));
        assert!(result.core_sample_indices().is_empty());
    }

    #[test]
    fn rejects_non_positive_eps() {
        let records = array![[0.0], [1.0]];
        assert!(Dbscan::params(0.0, 2).fit(&records).is_err());
    }
}
