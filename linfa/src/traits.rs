//! The `Fit`/`Predict`/`Transformer` trio every estimator in the workspace
//! implements, standing in for the original library's
//! `set_data` -> `fit`/`compute` -> `predict`/`transform`/`score` control
//! flow.
use crate::error::Result;

/// An estimator that consumes a dataset (or a view of one) and produces a
/// fitted model, mirroring `set_data` immediately followed by `fit`.
pub trait Fit<Records, Targets, Model> {
    fn fit(&self, records: &Records, targets: &Targets) -> Result<Model>;
}

/// A fitted model that maps records to predictions.
pub trait Predict<Records, Output> {
    fn predict(&self, records: Records) -> Output;
}

/// A fitted model that maps records to a new representation of themselves
/// (PCA's `transform`, standardisation).
pub trait Transformer<Input, Output> {
    fn transform(&self, input: Input) -> Output;
}
