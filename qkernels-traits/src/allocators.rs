//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// An allocator for the square and vector storage of a single spatial dimension.
pub trait DimAllocator<T: Scalar, D: DimName>:
    Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D>
{
}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D>,
{
}

/// An allocator for a field with `N` components living in `D` spatial dimensions.
///
/// Covers the `N x D` gradient storage and its transpose, along with the
/// per-dimension storage from [`DimAllocator`].
pub trait FieldAllocator<T: Scalar, N: DimName, D: DimName>:
    DimAllocator<T, D> + Allocator<T, N> + Allocator<T, N, D> + Allocator<T, D, N>
{
}

impl<T, N, D> FieldAllocator<T, N, D> for DefaultAllocator
where
    T: Scalar,
    N: DimName,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D> + Allocator<T, N> + Allocator<T, N, D> + Allocator<T, D, N>,
{
}
