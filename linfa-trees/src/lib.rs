//! # Decision Trees and Random Forests
//!
//! A decision tree recursively partitions a sample matrix along single
//! feature thresholds, choosing at every step the split that best separates
//! the training classes under an impurity measure. A random forest trains
//! many such trees independently, each on its own bootstrap resample and
//! random feature subset, and aggregates their votes.
//!
//! ## Fitting a tree
//!
//! ```
//! use linfa_trees::DecisionTree;
//! use ndarray::{array, Array1};
//!
//! let records = array![[0.1, 0.3], [0.9, 0.7], [0.2, 0.2], [0.8, 0.9]];
//! let targets = Array1::from(vec![0, 1, 0, 1]);
//!
//! let tree = DecisionTree::params().max_depth(3).fit(&records, &targets).unwrap();
//! assert_eq!(tree.score(&records, &targets), 1.0);
//! ```
//!
//! ## Fitting a forest
//!
//! ```
//! use linfa_trees::RandomForest;
//! use ndarray::{array, Array1};
//!
//! let records = array![[0.1, 0.3], [0.9, 0.7], [0.2, 0.2], [0.8, 0.9]];
//! let targets = Array1::from(vec![0, 1, 0, 1]);
//!
//! let forest = RandomForest::params().n_trees(10).seed(0).fit(&records, &targets).unwrap();
//! assert_eq!(forest.score(&records, &targets), 1.0);
//! ```
pub mod decision_tree;
pub mod random_forest;

pub use decision_tree::{BuildOrder, DecisionTree, DecisionTreeParams, FeatureSelection, ImpurityCriterion};
pub use random_forest::{RandomForest, RandomForestParams};
