//! Lloyd's-algorithm k-means with k-means++ seeding.
//!
//! Grounded on `clustering/kmeans.hpp`. Seeding and the update loop follow
//! the same RNG-hygiene and per-fit-determinism rules as [`crate::dbscan`]
//! and the tree learner: a single `rand_isaac::Isaac64Rng` seeded via
//! `seed_from_u64`.
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_isaac::Isaac64Rng;

fn sq_euclidean<F: Float>(a: ArrayView1<F>, b: ArrayView1<F>) -> F {
    a.iter().zip(b.iter()).map(|(&x, &y)| (x - y) * (x - y)).fold(F::zero(), |acc, v| acc + v)
}

/// Nearest centroid index and squared distance to it.
fn nearest<F: Float>(point: ArrayView1<F>, centroids: &Array2<F>) -> (usize, F) {
    let mut best = 0usize;
    let mut best_dist = F::infinity();
    for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let d = sq_euclidean(point, centroid);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    (best, best_dist)
}

/// k-means++ seeding: the first centroid is drawn uniformly, every
/// subsequent one is drawn with probability proportional to its squared
/// distance to the nearest centroid already chosen.
fn kmeans_plus_plus<F: Float>(records: &Array2<F>, k: usize, rng: &mut Isaac64Rng) -> Array2<F> {
    let n = records.nrows();
    let mut centroids = Array2::zeros((k, records.ncols()));
    let first = rng.gen_range(0, n);
    centroids.row_mut(0).assign(&records.row(first));

    let mut closest_sq_dist: Vec<F> = records.axis_iter(Axis(0)).map(|row| sq_euclidean(row, centroids.row(0))).collect();

    for c in 1..k {
        let weights: Vec<f64> = closest_sq_dist.iter().map(|&d| d.to_f64().unwrap().max(0.0) + 1e-12).collect();
        let dist = WeightedIndex::new(&weights).expect("at least one positive weight");
        let chosen = dist.sample(rng);
        centroids.row_mut(c).assign(&records.row(chosen));

        for (i, row) in records.axis_iter(Axis(0)).enumerate() {
            let d = sq_euclidean(row, centroids.row(c));
            if d < closest_sq_dist[i] {
                closest_sq_dist[i] = d;
            }
        }
    }
    centroids
}

/// Hyperparameters for [`KMeans`], built via [`KMeansParams::params`].
#[derive(Clone)]
pub struct KMeansParams<F> {
    n_clusters: usize,
    max_iter: usize,
    tol: F,
    seed: u64,
}

impl<F: Float> KMeansParams<F> {
    pub fn params(n_clusters: usize) -> Self {
        KMeansParams { n_clusters, max_iter: 300, tol: F::from(1e-4).unwrap(), seed: 0 }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tol: F) -> Self {
        self.tol = tol;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&self, records: &Array2<F>) -> linfa::Result<KMeans<F>> {
        let n = records.nrows();
        if n == 0 || records.ncols() == 0 {
            return Err(linfa::Error::InvalidInput(
                "records must have at least one sample and one feature".into(),
            ));
        }
        if self.n_clusters == 0 || self.n_clusters > n {
            return Err(linfa::Error::InvalidInput(format!(
                "n_clusters = {} must be in (0, n_samples = {}]",
                self.n_clusters, n
            )));
        }

        let mut rng = Isaac64Rng::seed_from_u64(self.seed);
        let mut centroids = kmeans_plus_plus(records, self.n_clusters, &mut rng);
        let mut assignments = vec![0usize; n];
        let mut inertia = F::zero();

        for _ in 0..self.max_iter {
            inertia = F::zero();
            for (i, row) in records.axis_iter(Axis(0)).enumerate() {
                let (c, d) = nearest(row, &centroids);
                assignments[i] = c;
                inertia += d;
            }

            let mut sums = Array2::zeros((self.n_clusters, records.ncols()));
            let mut counts = vec![0usize; self.n_clusters];
            for (i, row) in records.axis_iter(Axis(0)).enumerate() {
                let c = assignments[i];
                counts[c] += 1;
                let mut dest = sums.row_mut(c);
                dest += &row;
            }

            let mut shift = F::zero();
            for c in 0..self.n_clusters {
                if counts[c] == 0 {
                    // Empty cluster: re-seed at the point currently farthest
                    // from its own centroid, matching the common Lloyd's
                    // fallback rather than leaving a degenerate centroid.
                    let (farthest, _) = records
                        .axis_iter(Axis(0))
                        .enumerate()
                        .map(|(i, row)| (i, nearest(row, &centroids).1))
                        .fold((0usize, F::neg_infinity()), |(bi, bd), (i, d)| if d > bd { (i, d) } else { (bi, bd) });
                    let new_centroid = records.row(farthest).to_owned();
                    shift += sq_euclidean(centroids.row(c), new_centroid.view());
                    centroids.row_mut(c).assign(&new_centroid);
                    continue;
                }
                let new_centroid = sums.row(c).to_owned() / F::from(counts[c]).unwrap();
                shift += sq_euclidean(centroids.row(c), new_centroid.view());
                centroids.row_mut(c).assign(&new_centroid);
            }

            if shift < self.tol {
                break;
            }
        }

        Ok(KMeans { centroids, inertia })
    }
}

/// A fitted k-means model: cluster centroids and the training-set inertia
/// (sum of squared distances to the assigned centroid).
pub struct KMeans<F> {
    centroids: Array2<F>,
    inertia: F,
}

impl<F: Float> KMeans<F> {
    pub fn params(n_clusters: usize) -> KMeansParams<F> {
        KMeansParams::params(n_clusters)
    }

    pub fn centroids(&self) -> &Array2<F> {
        &self.centroids
    }

    pub fn inertia(&self) -> F {
        self.inertia
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn predict(&self, records: &Array2<F>) -> Array1<usize> {
        records.axis_iter(Axis(0)).map(|row| nearest(row, &self.centroids).0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn separates_two_well_spaced_blobs() {
        let records = array![
            [0.0, 0.0],
            [0.1, -0.1],
            [-0.1, 0.1],
            [10.0, 10.0],
            [10.1, 9.9],
            [9.9, 10.1],
        ];
        let model = KMeans::params(2).seed(1).fit(&records).unwrap();
        let labels = model.predict(&records);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn inertia_is_non_negative_and_finite() {
        let records = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [8.0, 8.0]];
        let model = KMeans::params(2).seed(7).fit(&records).unwrap();
        assert!(model.inertia() >= 0.0);
        assert!(model.inertia().is_finite());
    }

    #[test]
    fn rejects_more_clusters_than_samples() {
        let records = array![[0.0], [1.0]];
        assert!(KMeans::params(3).fit(&records).is_err());
    }
}
