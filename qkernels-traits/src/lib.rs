use nalgebra::{convert, try_convert, DimMin, DimName, RealField, U1, U2, U3};

pub use nalgebra;

/// Scalar type accepted by every pointwise kernel.
pub trait Real: RealField + Copy {
    /// Lossy conversion to `f64`, used for diagnostics only.
    fn to_f64_lossy(&self) -> f64 {
        try_convert(*self).unwrap_or(f64::NAN)
    }

    /// Exact conversion from a small count, such as a number of field components.
    fn from_count(count: usize) -> Self {
        convert(count as f64)
    }
}

impl<T: RealField + Copy> Real for T {}

/// A spatial dimension of 1, 2 or 3.
///
/// Used as a trait alias for the bounds needed by dimension-generic geometric routines.
/// The closed-form determinant and adjugate only exist for these dimensions, so the trait
/// is sealed.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> + sealed::Sealed {}

impl SmallDim for U1 {}
impl SmallDim for U2 {}
impl SmallDim for U3 {}

mod sealed {
    pub trait Sealed {}

    impl Sealed for nalgebra::U1 {}
    impl Sealed for nalgebra::U2 {}
    impl Sealed for nalgebra::U3 {}
}

pub mod allocators;
