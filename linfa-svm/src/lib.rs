//! # Support Vector Machines
//!
//! Support Vector Machines are a major branch of machine learning models and offer classification or
//! regression analysis of labeled datasets. They seek a discriminant, which seperates the data in
//! an optimal way, e.g. have the fewest numbers of miss-classifications and maximizes the margin
//! between positive and negative classes. A support vector
//! contributes to the discriminant and is therefore important for the classification/regression
//! task. The balance between the number of support vectors and model performance can be controlled
//! with hyperparameters.
//!
//! More details can be found [here](https://en.wikipedia.org/wiki/Support_vector_machine)
//!
//! ## Available parameters in Classification and Regression
//!
//! For supervised classification tasks the C or Nu values are used to control this balance. In
//! [classification::fit_c] the
//! C value controls the penalty given to missclassification and should be in the interval (0, inf). In
//! [classification::fit_nu] the Nu value controls the number of support vectors and should be in the interval (0, 1].
//!
//! For supervised classification with just one class of data a special classifier is available in
//! [classification::fit_one_class]. It also accepts a Nu value.
//!
//! For support vector regression two flavors are available. With
//! [regression::fit_epsilon] a regression task is learned while minimizing deviation
//! larger than epsilon. In [regression::fit_nu] the parameter epsilon is replaced with Nu
//! again and should be in the interval (0, 1]
//!
//! For more than two classes, [multiclass::fit_one_vs_one] trains the
//! `K(K-1)/2` pairwise sub-problems and reconciles their support vectors
//! into a single model.
//!
//! ## Kernel Methods
//! Normally the resulting discriminant is linear, but with [Kernel Methods](https://en.wikipedia.org/wiki/Kernel_method) non-linear relations between the input features
//! can be learned in order improve the performance of the model.
//!
//! # The solver
//! This implementation uses Sequential Minimal Optimization, a widely used optimization tool for
//! convex problems. It selects in each optimization step two variables and updates the variables.
//! In each step it performs:
//!
//! 1. Find a variable, which violates the KKT conditions for the optimization problem
//! 2. Pick a second variables and crate a pair (a1, a2)
//! 3. Optimize the pair (a1, a2)
//!
//! After a couple of iterations the solution may be optimal.
use linfa::{dataset::Pr, Float};
use ndarray::{Array1, ArrayBase, ArrayView1, Data, Ix1};

use std::fmt;
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

pub mod classification;
pub mod multiclass;
mod permutable_kernel;
pub mod regression;
pub mod solver_smo;

use linfa_kernel::{Kernel, KernelMethod};
pub use solver_smo::SolverParams;

/// SVM Hyperparameters
///
/// The SVM fitting process can be controlled in different ways. For classification the C and Nu
/// parameters control the ratio of support vectors and accuracy, eps controls the required
/// precision. After setting the desired parameters a model can be fitted by calling `fit`.
///
/// ## Example
///
/// ```ignore
/// let model = Svm::params()
///     .eps(0.1f64)
///     .shrinking(true)
///     .nu_weight(0.1)
///     .fit(&dataset);
/// ```
///
pub struct SvmParams<F: Float, T> {
    pub(crate) c: Option<(F, F)>,
    pub(crate) nu: Option<(F, F)>,
    pub(crate) solver_params: SolverParams<F>,
    pub(crate) kernel: KernelMethod<F>,
    phantom: PhantomData<T>,
}

impl<F: Float, T> SvmParams<F, T> {
    /// Set stopping condition
    ///
    /// This parameter controls the stopping condition. It checks whether the sum of gradients of
    /// the max violating pair is below this threshold and then stops the optimization proces.
    pub fn eps(mut self, new_eps: F) -> Self {
        self.solver_params.eps = new_eps;
        self
    }

    /// Shrink active variable set
    ///
    /// This parameter controls whether the active variable set is shrinked or not. This can speed
    /// up the optimization process, but may degredade the solution performance.
    pub fn shrinking(mut self, shrinking: bool) -> Self {
        self.solver_params.shrinking = shrinking;

        self
    }

    /// Use a linear kernel: `k(x, z) = x . z`.
    pub fn linear_kernel(mut self) -> Self {
        self.kernel = KernelMethod::Linear;
        self
    }

    /// Use a Gaussian (RBF) kernel: `k(x, z) = exp(-gamma ||x - z||^2)`. A
    /// negative `gamma` is resolved at fit time to `1 / (n_features * Var(X))`
    ///, failing the fit if the data has zero variance.
    pub fn gaussian_kernel(mut self, gamma: F) -> Self {
        self.kernel = KernelMethod::Gaussian { gamma };
        self
    }

    /// Use a polynomial kernel: `k(x, z) = (gamma x.z + coef0)^degree`.
    pub fn polynomial_kernel(mut self, gamma: F, degree: F, coef0: F) -> Self {
        self.kernel = KernelMethod::Polynomial { gamma, degree, coef0 };
        self
    }

    /// Use a sigmoid kernel: `k(x, z) = tanh(gamma x.z + coef0)`.
    pub fn sigmoid_kernel(mut self, gamma: F, coef0: F) -> Self {
        self.kernel = KernelMethod::Sigmoid { gamma, coef0 };
        self
    }
}

impl<F: Float> SvmParams<F, Pr> {
    /// Set the C value for positive and negative samples.
    pub fn pos_neg_weights(mut self, c_pos: F, c_neg: F) -> Self {
        self.c = Some((c_pos, c_neg));
        self.nu = None;

        self
    }

    /// Set the Nu value for classification
    ///
    /// The Nu value should lie in range [0, 1] and sets the relation between support vectors and
    /// solution performance.
    pub fn nu_weight(mut self, nu: F) -> Self {
        self.nu = Some((nu, nu));
        self.c = None;

        self
    }

    /// Fit a binary classifier (`targets` already reduced to the two-class
    /// sign convention). Dispatches to [classification::fit_c] or
    /// [classification::fit_nu] depending on which hyperparameter was set.
    pub fn fit_binary(
        &self,
        records: &ndarray::Array2<F>,
        targets: &[bool],
    ) -> linfa::Result<Svm<F, Pr>> {
        let kernel_method = self.kernel.resolve_auto_gamma(records)?;
        let kernel = Kernel::new(records.view(), kernel_method);
        multiclass::fit_binary_kernel(self, kernel, targets)
    }

    /// Fit a one-class novelty detector with the configured Nu value.
    pub fn fit_one_class(&self, records: &ndarray::Array2<F>) -> linfa::Result<Svm<F, Pr>> {
        let nu = self
            .nu
            .ok_or_else(|| linfa::Error::IncompatibleOptions("one-class SVM requires Nu".into()))?
            .0;
        let kernel_method = self.kernel.resolve_auto_gamma(records)?;
        let kernel = Kernel::new(records.view(), kernel_method);
        Ok(classification::fit_one_class(&self.solver_params, kernel, nu))
    }

    /// Fit a classifier over `targets` with two or more distinct classes.
    /// Two classes dispatch to [`Self::fit_binary`]; more than two dispatch
    /// to the one-versus-one multiclass driver.
    pub fn fit(
        &self,
        records: &ndarray::Array2<F>,
        targets: &Array1<usize>,
    ) -> linfa::Result<multiclass::SvmClassifier<F>> {
        multiclass::fit_one_vs_one(self, records, targets)
    }
}

impl<F: Float> SvmParams<F, F> {
    /// Set the C value for regression
    pub fn c_eps(mut self, c: F, eps: F) -> Self {
        self.c = Some((c, eps));
        self.nu = None;

        self
    }

    /// Set the Nu-Eps value for regression
    pub fn nu_eps(mut self, nu: F, eps: F) -> Self {
        self.nu = Some((nu, eps));
        self.c = None;

        self
    }

    /// Fit a regressor. Dispatches to [regression::fit_epsilon] or
    /// [regression::fit_nu] depending on which hyperparameter was set.
    pub fn fit(&self, records: &ndarray::Array2<F>, targets: &Array1<F>) -> linfa::Result<Svm<F, F>> {
        let kernel_method = self.kernel.resolve_auto_gamma(records)?;
        let kernel = Kernel::new(records.view(), kernel_method);
        Ok(match (self.c, self.nu) {
            (Some((c, eps)), _) => regression::fit_epsilon(&self.solver_params, kernel, targets, c, eps),
            (None, Some((nu, c))) => regression::fit_nu(&self.solver_params, kernel, targets, nu, c),
            (None, None) => {
                return Err(linfa::Error::IncompatibleOptions(
                    "neither C nor Nu was set for regression".into(),
                ))
            }
        })
    }
}

/// Reason for stopping
///
/// SMO can either exit because a threshold is reached or the iterations are maxed out. To
/// differentiate between both this flag is passed with the solution.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ReachedThreshold,
    ReachedIterations,
}

/// Fitted Support Vector Machines model
///
/// This is the result of the SMO optimizer and contains the support vectors, quality of solution
/// and optionally the linear hyperplane.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Svm<A: Float, T> {
    pub alpha: Vec<A>,
    pub rho: A,
    r: Option<A>,
    exit_reason: ExitReason,
    iterations: usize,
    obj: A,
    kernel: Kernel<A>,
    linear_decision: Option<Array1<A>>,
    phantom: PhantomData<T>,
}

impl<A: Float, T> Svm<A, T> {
    /// Create hyper parameter set
    ///
    /// This creates a `SvmParams` and sets it to the default values:
    ///  * C values of (1, 1)
    ///  * Eps of 1e-7
    ///  * No shrinking
    ///  * Gaussian kernel with automatic gamma
    pub fn params() -> SvmParams<A, T> {
        SvmParams {
            c: Some((A::one(), A::one())),
            nu: None,
            solver_params: SolverParams {
                eps: A::from(1e-7).unwrap(),
                shrinking: false,
            },
            kernel: KernelMethod::Gaussian { gamma: -A::one() },
            phantom: PhantomData,
        }
    }

    /// Returns the number of support vectors
    ///
    /// This function returns the number of support vectors which have an influence on the decision
    /// outcome greater than zero.
    pub fn nsupport(&self) -> usize {
        self.alpha
            .iter()
            .filter(|x| x.abs() > A::from(1e-5).unwrap())
            .count()
    }

    /// Dual coefficients (`alpha . y_dual` for classification, `alpha+ -
    /// alpha-` for regression), one per training sample.
    pub fn dual_coefficients(&self) -> &[A] {
        &self.alpha
    }

    /// The fitted bias term.
    pub fn bias(&self) -> A {
        self.rho
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn exit_reason(&self) -> ExitReason {
        self.exit_reason
    }

    pub fn objective(&self) -> A {
        self.obj
    }

    /// Indices of the support vectors into the training set this model was
    /// fit on.
    pub fn support_indexes(&self) -> Vec<usize> {
        let thresh = A::from(1e-5).unwrap();
        self.alpha
            .iter()
            .enumerate()
            .filter(|(_, a)| a.abs() > thresh)
            .map(|(i, _)| i)
            .collect()
    }

    /// Decision value at `x`: `sum_s alpha_s k(x_s, x) + rho`, or the linear
    /// shortcut `w . x + rho` when the kernel is linear.
    pub fn decision_function<S: Data<Elem = A>>(&self, x: ArrayBase<S, Ix1>) -> A {
        match &self.linear_decision {
            Some(w) => x.dot(w) + self.rho,
            None => self.kernel.weighted_sum(&self.alpha, x.view()) + self.rho,
        }
    }

    pub(crate) fn with_phantom<S>(self) -> Svm<A, S> {
        Svm {
            alpha: self.alpha,
            rho: self.rho,
            r: self.r,
            exit_reason: self.exit_reason,
            obj: self.obj,
            iterations: self.iterations,
            kernel: self.kernel,
            linear_decision: self.linear_decision,
            phantom: PhantomData,
        }
    }
}

impl<A: Float> Svm<A, Pr> {
    /// Binary decision value; positive means the positive class. Tests and
    /// callers threshold this at zero to recover the class label.
    pub fn predict<S: Data<Elem = A>>(&self, x: ArrayBase<S, Ix1>) -> A {
        self.decision_function(x)
    }

    pub fn predict_batch(&self, x: &ndarray::Array2<A>) -> Array1<A> {
        x.outer_iter().map(|row| self.predict(row)).collect()
    }
}

impl<A: Float> Svm<A, A> {
    /// Regression estimate at `x`.
    pub fn predict<S: Data<Elem = A>>(&self, x: ArrayBase<S, Ix1>) -> A {
        self.decision_function(x)
    }

    pub fn predict_batch(&self, x: &ndarray::Array2<A>) -> Array1<A> {
        x.outer_iter().map(|row| self.predict(row)).collect()
    }
}

impl<A: Float, T> linfa::Predict<ArrayView1<'_, A>, A> for Svm<A, T> {
    fn predict(&self, x: ArrayView1<A>) -> A {
        self.decision_function(x)
    }
}

/// Display solution
///
/// In order to understand the solution of the SMO solver the objective, number of iterations and
/// required support vectors are printed here.
impl<A: Float, T> fmt::Display for Svm<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_reason {
            ExitReason::ReachedThreshold => write!(
                f,
                "Exited after {} iterations with obj = {} and {} support vectors",
                self.iterations,
                self.obj,
                self.nsupport()
            ),
            ExitReason::ReachedIterations => write!(
                f,
                "Reached maximal iterations {} with obj = {} and {} support vectors",
                self.iterations,
                self.obj,
                self.nsupport()
            ),
        }
    }
}
