//! Kernel wrappers consumed by the SMO solver.
//!
//! `base_svm.hpp`'s outer loop always works with `Q_ij`, never the raw
//! kernel entry `K_ij` directly: for classification and nu-SVM problems
//! `Q_ij = y_i y_j K_ij` (the target sign folded in), while the one-class
//! problem uses `K_ij` unchanged. [`PermutableKernel`] and
//! [`PermutableKernelOneClass`] provide that view over an owned
//! [`linfa_kernel::Kernel`] without copying the underlying Gram matrix; the
//! solver hands the kernel back (via [`Permutable::into_inner`]) to the
//! fitted [`crate::Svm`] once training finishes.
use linfa::Float;
pub use linfa_kernel::{Kernel, KernelMethod};

/// What the solver needs from a kernel: its size, one `Q` column at a time
/// (working-set selection and the gradient update both scan a column), and
/// a way back to the untouched kernel for prediction.
pub trait Permutable<F: Float> {
    fn size(&self) -> usize;
    fn column(&self, i: usize) -> Vec<F>;
    fn diagonal(&self) -> Vec<F>;
    fn inner(&self) -> &Kernel<F>;
    fn into_inner(self) -> Kernel<F>;
}

pub struct PermutableKernel<F: Float> {
    kernel: Kernel<F>,
    signs: Vec<F>,
}

impl<F: Float> PermutableKernel<F> {
    pub fn new(kernel: Kernel<F>, targets: Vec<bool>) -> Self {
        let signs = targets
            .into_iter()
            .map(|t| if t { F::one() } else { -F::one() })
            .collect();
        PermutableKernel { kernel, signs }
    }
}

impl<F: Float> Permutable<F> for PermutableKernel<F> {
    fn size(&self) -> usize {
        self.kernel.size()
    }

    fn column(&self, i: usize) -> Vec<F> {
        let si = self.signs[i];
        self.kernel
            .column(i)
            .iter()
            .zip(self.signs.iter())
            .map(|(&k, &sj)| si * sj * k)
            .collect()
    }

    fn diagonal(&self) -> Vec<F> {
        // s_i * s_i == 1 for every i, so permutation leaves the diagonal
        // untouched.
        self.kernel.diagonal().to_vec()
    }

    fn inner(&self) -> &Kernel<F> {
        &self.kernel
    }

    fn into_inner(self) -> Kernel<F> {
        self.kernel
    }
}

pub struct PermutableKernelOneClass<F: Float> {
    kernel: Kernel<F>,
}

impl<F: Float> PermutableKernelOneClass<F> {
    pub fn new(kernel: Kernel<F>) -> Self {
        PermutableKernelOneClass { kernel }
    }
}

impl<F: Float> Permutable<F> for PermutableKernelOneClass<F> {
    fn size(&self) -> usize {
        self.kernel.size()
    }

    fn column(&self, i: usize) -> Vec<F> {
        self.kernel.column(i).to_vec()
    }

    fn diagonal(&self) -> Vec<F> {
        self.kernel.diagonal().to_vec()
    }

    fn inner(&self) -> &Kernel<F> {
        &self.kernel
    }

    fn into_inner(self) -> Kernel<F> {
        self.kernel
    }
}
