//! Central finite difference approximations of derivatives.
//!
//! Pointwise kernels ship closed-form linearizations (flux Jacobians, Jacobian-vector
//! products). These helpers provide the independent numerical reference they are checked
//! against.
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use qkernels_traits::Real;

/// Evaluation buffers for the symmetric quotient $(f(x^+) - f(x^-)) / 2h$.
struct CentralDifference<T: Real> {
    f_plus: DVector<T>,
    f_minus: DVector<T>,
    half_inverse_step: T,
}

impl<T: Real> CentralDifference<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn new(output_dim: usize, h: T) -> Self {
        Self {
            f_plus: DVector::zeros(output_dim),
            f_minus: DVector::zeros(output_dim),
            half_inverse_step: 0.5 / h,
        }
    }

    fn record_plus(&mut self, f: &mut impl FnMut(DVectorView<T>, DVectorViewMut<T>), x: DVectorView<T>) {
        f(x, DVectorViewMut::from(&mut self.f_plus));
    }

    fn record_minus(&mut self, f: &mut impl FnMut(DVectorView<T>, DVectorViewMut<T>), x: DVectorView<T>) {
        f(x, DVectorViewMut::from(&mut self.f_minus));
    }

    fn quotient_into(&self, mut df: DVectorViewMut<T>) {
        df.copy_from(&self.f_plus);
        df -= &self.f_minus;
        df *= self.half_inverse_step;
    }
}

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with central finite differences.
///
/// The Jacobian matrix is the $m \times n$ matrix whose entries are given by
/// $$ J_{ij} := \frac{\partial f_i}{\partial x_j}.$$
///
/// The parameter `h` determines the step size of the finite difference approximation.
/// The vector `x` is used as scratch space, but its content is restored before returning.
pub fn approximate_jacobian_fd<'a, T>(
    m: usize,
    f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DMatrix<T>
where
    T: Real,
{
    let x = x.into();
    let mut jacobian = DMatrix::zeros(m, x.len());
    approximate_jacobian_fd_into(&mut jacobian, f, x, h);
    jacobian
}

/// Same as [`approximate_jacobian_fd`], but stores the result in the provided output matrix.
///
/// # Panics
///
/// Panics if the number of columns in `jacobian` does not match the length of `x`.
pub fn approximate_jacobian_fd_into<'a, 'b, T>(
    jacobian: impl Into<DMatrixViewMut<'b, T>>,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) where
    T: Real,
{
    let mut jacobian = jacobian.into();
    let mut x = x.into();
    assert_eq!(x.len(), jacobian.ncols(), "Jacobian column count must match input dimension");

    let mut difference = CentralDifference::new(jacobian.nrows(), h);
    for j in 0..x.len() {
        // Only x_j moves, and it is put back bit for bit
        let x_j = x[j];
        x[j] = x_j + h;
        difference.record_plus(&mut f, DVectorView::from(&x));
        x[j] = x_j - h;
        difference.record_minus(&mut f, DVectorView::from(&x));
        x[j] = x_j;
        difference.quotient_into(jacobian.column_mut(j));
    }
}

/// Approximates the directional derivative $J(x) \, v$ of $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with a single central difference along `direction`.
///
/// This is the matrix-free counterpart of [`approximate_jacobian_fd`] and is the natural
/// reference for kernels that return the action of a linearization rather than the matrix.
///
/// # Panics
///
/// Panics if `x` and `direction` have different lengths.
pub fn approximate_directional_derivative_fd<T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: DVectorView<T>,
    direction: DVectorView<T>,
    h: T,
) -> DVector<T>
where
    T: Real,
{
    assert_eq!(x.len(), direction.len(), "Direction must have the same dimension as x");
    let step = direction * h;

    let mut difference = CentralDifference::new(m, h);
    difference.record_plus(&mut f, DVectorView::from(&(&x + &step)));
    difference.record_minus(&mut f, DVectorView::from(&(&x - &step)));

    let mut derivative = DVector::zeros(m);
    difference.quotient_into(DVectorViewMut::from(&mut derivative));
    derivative
}
