//! Axis-wise moment statistics and in-place standardisation.
//!
//! Grounded on `basic_statistics/moment_statistics.hpp` and
//! `statistical_utilities.hpp`: arithmetic / geometric / harmonic mean,
//! variance, skewness, kurtosis and the k-th central moment, each
//! parametrised by an [`Axis`] (row, column or the whole matrix) and a
//! degrees-of-freedom convention ([`Dof`]).
use crate::{Error, Float, Result};
use ndarray::Array2;

/// Which direction a reduction runs along. `Row` reduces across columns
/// (one result per row), `Column` reduces across rows (one result per
/// column), `All` reduces to a single scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
    All,
}

/// Degrees-of-freedom convention for second (and higher) moments: negative
/// divides by the raw count, zero divides by `count - 1`, positive divides
/// by the supplied value.
#[derive(Debug, Clone, Copy)]
pub enum Dof {
    N,
    NMinusOne,
    Custom(f64),
}

impl Dof {
    pub fn from_i64(v: i64) -> Self {
        if v < 0 {
            Dof::N
        } else if v == 0 {
            Dof::NMinusOne
        } else {
            Dof::Custom(v as f64)
        }
    }

    /// Divisor applied to a sum-of-squares accumulator for this convention.
    pub fn divisor<F: Float>(self, n: usize) -> F {
        match self {
            Dof::N => F::from(n).unwrap(),
            Dof::NMinusOne => F::from(n.max(1) - 1 + ((n == 0) as usize)).unwrap(),
            Dof::Custom(d) => F::from(d).unwrap(),
        }
    }
}

/// One slice (row or column) of the matrix along the reduction axis, used
/// to keep `mean`/`variance`/... generic over `Axis::Row` vs `Axis::Column`
/// vs `Axis::All` without triplicating the arithmetic.
fn slices<F: Float>(x: &Array2<F>, axis: Axis) -> Vec<Vec<F>> {
    match axis {
        Axis::Row => x.rows().into_iter().map(|r| r.to_vec()).collect(),
        Axis::Column => x.columns().into_iter().map(|c| c.to_vec()).collect(),
        Axis::All => vec![x.iter().copied().collect()],
    }
}

/// Arithmetic mean along `axis`.
pub fn mean<F: Float>(x: &Array2<F>, axis: Axis) -> Vec<F> {
    slices(x, axis)
        .into_iter()
        .map(|s| s.iter().copied().sum::<F>() / F::from(s.len()).unwrap())
        .collect()
}

/// Geometric mean along `axis`. Any exactly-zero entry in a slice makes
/// that slice's result `-inf`; a negative entry is an error.
pub fn geometric_mean<F: Float>(x: &Array2<F>, axis: Axis) -> Result<Vec<F>> {
    slices(x, axis)
        .into_iter()
        .map(|s| {
            let mut acc = F::zero();
            for &v in &s {
                if v < F::zero() {
                    return Err(Error::NumericalDifficulties(
                        "geometric mean of a negative entry is undefined".into(),
                    ));
                }
                if v.is_zero() {
                    return Ok(F::neg_infinity());
                }
                acc += v.ln();
            }
            Ok((acc / F::from(s.len()).unwrap()).exp())
        })
        .collect()
}

/// Harmonic mean along `axis`. Zero entries contribute zero to the sum of
/// reciprocals rather than diverging, matching `statistical_utilities.hpp`.
pub fn harmonic_mean<F: Float>(x: &Array2<F>, axis: Axis) -> Vec<F> {
    slices(x, axis)
        .into_iter()
        .map(|s| {
            let recip_sum: F = s
                .iter()
                .map(|&v| if v.is_zero() { F::zero() } else { v.recip() })
                .sum();
            if recip_sum.is_zero() {
                F::zero()
            } else {
                F::from(s.len()).unwrap() / recip_sum
            }
        })
        .collect()
}

/// Variance along `axis`, with an optional precomputed mean per slice.
pub fn variance<F: Float>(x: &Array2<F>, axis: Axis, dof: Dof, means: Option<&[F]>) -> Vec<F> {
    let slices = slices(x, axis);
    let means: Vec<F> = match means {
        Some(m) => m.to_vec(),
        None => mean(x, axis),
    };
    slices
        .iter()
        .zip(means.iter())
        .map(|(s, &m)| {
            let ss: F = s.iter().map(|&v| (v - m) * (v - m)).sum();
            ss / dof.divisor(s.len())
        })
        .collect()
}

/// k-th central moment along `axis` (k=2 reproduces [`variance`] with the
/// same `dof`, k=3/4 feed [`skewness`]/[`kurtosis`]).
pub fn moment<F: Float>(x: &Array2<F>, axis: Axis, k: i32, dof: Dof, means: Option<&[F]>) -> Vec<F> {
    let slices = slices(x, axis);
    let means: Vec<F> = match means {
        Some(m) => m.to_vec(),
        None => mean(x, axis),
    };
    slices
        .iter()
        .zip(means.iter())
        .map(|(s, &m)| {
            let ss: F = s.iter().map(|&v| (v - m).powi(k)).sum();
            ss / dof.divisor(s.len())
        })
        .collect()
}

/// Skewness along `axis`: third central moment normalised by the 3/2 power
/// of the (population) variance.
pub fn skewness<F: Float>(x: &Array2<F>, axis: Axis) -> Vec<F> {
    let means = mean(x, axis);
    let m2 = variance(x, axis, Dof::N, Some(&means));
    let m3 = moment(x, axis, 3, Dof::N, Some(&means));
    m3.into_iter()
        .zip(m2.into_iter())
        .map(|(m3, m2)| {
            if m2.is_zero() {
                F::zero()
            } else {
                m3 / m2.powf(F::from(1.5).unwrap())
            }
        })
        .collect()
}

/// Excess-free kurtosis along `axis`: fourth central moment normalised by
/// the square of the (population) variance.
pub fn kurtosis<F: Float>(x: &Array2<F>, axis: Axis) -> Vec<F> {
    let means = mean(x, axis);
    let m2 = variance(x, axis, Dof::N, Some(&means));
    let m4 = moment(x, axis, 4, Dof::N, Some(&means));
    m4.into_iter()
        .zip(m2.into_iter())
        .map(|(m4, m2)| if m2.is_zero() { F::zero() } else { m4 / (m2 * m2) })
        .collect()
}

/// Standardise `x` in place: `x <- (x - shift) / scale`, broadcast along
/// `axis`. A `None` shift defaults to 0, a `None` scale defaults to 1; if
/// both are `None` the column/row/global mean and standard deviation are
/// computed first. Any computed or supplied scale that is exactly zero is
/// replaced by one, so constant columns are left untouched rather than
/// producing `NaN`.
pub fn standardize<F: Float>(
    x: &mut Array2<F>,
    axis: Axis,
    shift: Option<&[F]>,
    scale: Option<&[F]>,
) {
    let need_defaults = shift.is_none() || scale.is_none();
    let (default_shift, default_scale) = if need_defaults {
        let means = mean(x, axis);
        let vars = variance(x, axis, Dof::N, Some(&means));
        let stds: Vec<F> = vars
            .into_iter()
            .map(|v| {
                let s = v.sqrt();
                if s.is_zero() {
                    F::one()
                } else {
                    s
                }
            })
            .collect();
        (means, stds)
    } else {
        (vec![], vec![])
    };
    let shift: Vec<F> = match shift {
        Some(s) => s.to_vec(),
        None => default_shift,
    };
    let scale: Vec<F> = match scale {
        Some(s) => s
            .iter()
            .map(|&v| if v.is_zero() { F::one() } else { v })
            .collect(),
        None => default_scale,
    };

    let nrows = x.nrows();
    let ncols = x.ncols();
    match axis {
        Axis::Column => {
            for j in 0..ncols {
                let (sh, sc) = (shift[j], scale[j]);
                for i in 0..nrows {
                    x[[i, j]] = (x[[i, j]] - sh) / sc;
                }
            }
        }
        Axis::Row => {
            for i in 0..nrows {
                let (sh, sc) = (shift[i], scale[i]);
                for j in 0..ncols {
                    x[[i, j]] = (x[[i, j]] - sh) / sc;
                }
            }
        }
        Axis::All => {
            let (sh, sc) = (shift[0], scale[0]);
            x.mapv_inplace(|v| (v - sh) / sc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn column_mean_and_variance() {
        let x = array![[1.0_f64, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let m = mean(&x, Axis::Column);
        assert_eq!(m, vec![2.0, 4.0]);
        let v = variance(&x, Axis::Column, Dof::N, None);
        assert!((v[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn geometric_mean_zero_entry_is_neg_infinity() {
        let x = array![[0.0_f64, 1.0]];
        let g = geometric_mean(&x, Axis::Row).unwrap();
        assert!(g[0].is_infinite() && g[0] < 0.0);
    }

    #[test]
    fn geometric_mean_negative_entry_errors() {
        let x = array![[-1.0_f64, 1.0]];
        assert!(geometric_mean(&x, Axis::Row).is_err());
    }

    #[test]
    fn standardize_is_idempotent() {
        let mut x = array![[1.0_f64, 5.0], [2.0, 6.0], [3.0, 20.0]];
        standardize(&mut x, Axis::Column, None, None);
        let once = x.clone();
        standardize(&mut x, Axis::Column, None, None);
        for (a, b) in once.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn standardize_constant_column_is_untouched() {
        let mut x = array![[5.0_f64], [5.0], [5.0]];
        standardize(&mut x, Axis::Column, None, None);
        for v in x.iter() {
            assert_eq!(*v, 0.0);
        }
    }
}
