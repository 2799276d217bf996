//! # Clustering
//!
//! Unsupervised partitioning: [`KMeans`] (Lloyd's algorithm with
//! k-means++ seeding) for a fixed number of roughly-spherical clusters,
//! and [`Dbscan`] for density-based clustering that discovers the number
//! of clusters itself and marks outliers as noise.
//!
//! ```
//! use linfa_clustering::KMeans;
//! use ndarray::array;
//!
//! let records = array![[0.0, 0.0], [0.1, -0.1], [8.0, 8.0], [8.1, 7.9]];
//! let model = KMeans::params(2).seed(0).fit(&records).unwrap();
//! let labels = model.predict(&records);
//! assert_eq!(labels[0], labels[1]);
//! assert_eq!(labels[2], labels[3]);
//! ```
pub mod dbscan;
pub mod kmeans;

pub use dbscan::{Dbscan, DbscanParams, DbscanResult, Metric};
pub use kmeans::{KMeans, KMeansParams};
