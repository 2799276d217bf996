//! Sample/target containers.
//!
//! `Dataset` owns a column-major `records` matrix (`n_samples x n_features`)
//! and a `targets` array. `DatasetView` borrows both instead of owning them,
//! for the common case where the caller's arrays already live in the
//! canonical layout and a copy would be wasted.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A fitted classifier's prediction for one class, as a probability in
/// `[0, 1]`. Kept as a distinct type (rather than a bare float) so that
/// `SvmParams<F, Pr>` and `SvmParams<F, F>` (classification vs. regression)
/// can be disambiguated at the type level, the way `linfa-svm` does with
/// its `T` parameter.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pr(pub f32);

impl Pr {
    pub fn new(p: f32) -> Self {
        Pr(p)
    }
}

impl From<f32> for Pr {
    fn from(p: f32) -> Self {
        Pr(p)
    }
}

/// An owned dataset: a column-major `n x p` sample matrix and a length-`n`
/// target array.
#[derive(Debug, Clone)]
pub struct Dataset<F, T> {
    pub records: Array2<F>,
    pub targets: Array1<T>,
}

impl<F, T> Dataset<F, T> {
    pub fn new(records: Array2<F>, targets: Array1<T>) -> Self {
        Dataset { records, targets }
    }

    pub fn nsamples(&self) -> usize {
        self.records.nrows()
    }

    pub fn nfeatures(&self) -> usize {
        self.records.ncols()
    }

    pub fn view(&self) -> DatasetView<'_, F, T> {
        DatasetView {
            records: self.records.view(),
            targets: self.targets.view(),
        }
    }
}

/// A borrowed view over a dataset. `set_data` in the original library
/// borrows the caller's pointers whenever they are already column-major
/// with a tight leading dimension; this is the Rust equivalent of that
/// no-copy path.
#[derive(Debug, Clone, Copy)]
pub struct DatasetView<'a, F, T> {
    pub records: ArrayView2<'a, F>,
    pub targets: ArrayView1<'a, T>,
}

impl<'a, F, T> DatasetView<'a, F, T> {
    pub fn new(records: ArrayView2<'a, F>, targets: ArrayView1<'a, T>) -> Self {
        DatasetView { records, targets }
    }

    pub fn nsamples(&self) -> usize {
        self.records.nrows()
    }

    pub fn nfeatures(&self) -> usize {
        self.records.ncols()
    }
}
