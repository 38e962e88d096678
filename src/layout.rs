//! Struct-of-arrays addressing of packed quadrature-point fields.
//!
//! Kernels receive all of their input fields packed into one flat array, and write all of
//! their output fields into another. Each field is located through a per-field base offset,
//! and its components are stored component-major, point-minor:
//!
//! $$ \texttt{array}[\texttt{offset}_f + i + c \, Q] $$
//!
//! for field $f$, quadrature point $i$ and component $c$, where $Q$ is the number of points
//! in the batch. Consecutive points of one component are therefore contiguous, which is
//! what allows a tile of points to be processed without interleaving components.
//!
//! Multi-index fields are flattened with the first index running fastest. In particular,
//! a gradient of an `n`-component field in `d` directions stores $\partial u_c / \partial \xi_j$
//! as component `c + n * j`, so it can be read directly as an `n x d` column-major matrix
//! with [`PointInput::matrix`].
//!
//! The layout is validated once per batch by [`PackedInputs::new`] and [`PackedOutputs::new`].
//! Per-point accessors perform no further layout checks.
use crate::error::LayoutError;
use itertools::Itertools;
use nalgebra::allocator::Allocator;
use nalgebra::base::storage::Storage;
use nalgebra::{DefaultAllocator, Dim, DimName, Matrix, OMatrix, OVector, Scalar};
use qkernels_traits::Real;
use std::marker::PhantomData;

/// Declaration of one logical field of a kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub name: &'static str,
    pub num_components: usize,
}

impl FieldSpec {
    pub const fn new(name: &'static str, num_components: usize) -> Self {
        Self { name, num_components }
    }

    /// The number of array entries occupied by this field in a batch of `num_points` points.
    pub fn extent(&self, num_points: usize) -> Option<usize> {
        self.num_components.checked_mul(num_points)
    }
}

/// Index of component `component` at point `point` of a field starting at `offset`.
#[inline(always)]
pub fn packed_index(offset: usize, num_points: usize, point: usize, component: usize) -> usize {
    offset + point + component * num_points
}

fn validate_layout(
    fields: &[FieldSpec],
    offsets: &[usize],
    len: usize,
    num_points: usize,
    require_disjoint: bool,
) -> Result<(), LayoutError> {
    if fields.len() != offsets.len() {
        return Err(LayoutError::OffsetCount {
            expected: fields.len(),
            actual: offsets.len(),
        });
    }

    for (field, &offset) in fields.iter().zip(offsets) {
        let end = field
            .extent(num_points)
            .and_then(|extent| offset.checked_add(extent));
        match end {
            Some(end) if end <= len => {}
            _ => {
                return Err(LayoutError::FieldOutOfBounds {
                    field: field.name,
                    end,
                    len,
                })
            }
        }
    }

    if require_disjoint {
        // Ranges are known to be in bounds at this point, so the arithmetic cannot overflow
        let overlap = fields
            .iter()
            .zip(offsets)
            .filter(|(field, _)| field.num_components > 0 && num_points > 0)
            .map(|(field, &offset)| (field.name, offset, offset + field.num_components * num_points))
            .tuple_combinations()
            .find(|((_, a_begin, a_end), (_, b_begin, b_end))| a_begin < b_end && b_begin < a_end);
        if let Some(((first, _, _), (second, _, _))) = overlap {
            return Err(LayoutError::OverlappingFields { first, second });
        }
    }

    Ok(())
}

/// Read-only view of the packed input fields of one batch.
///
/// Input fields may alias each other, since they are never written.
#[derive(Debug)]
pub struct PackedInputs<'a, T> {
    data: &'a [T],
    offsets: &'a [usize],
    fields: &'a [FieldSpec],
    num_points: usize,
}

impl<'a, T> Clone for PackedInputs<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for PackedInputs<'a, T> {}

impl<'a, T: Scalar + Copy> PackedInputs<'a, T> {
    pub fn new(
        data: &'a [T],
        offsets: &'a [usize],
        fields: &'a [FieldSpec],
        num_points: usize,
    ) -> Result<Self, LayoutError> {
        validate_layout(fields, offsets, data.len(), num_points, false)?;
        Ok(Self {
            data,
            offsets,
            fields,
            num_points,
        })
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn fields(&self) -> &'a [FieldSpec] {
        self.fields
    }

    /// # Panics
    ///
    /// Panics if `point` is not smaller than the number of points in the batch.
    pub fn at_point(&self, point: usize) -> PointInput<'a, T> {
        assert!(point < self.num_points, "Quadrature point index out of bounds");
        PointInput {
            data: self.data,
            offsets: self.offsets,
            fields: self.fields,
            num_points: self.num_points,
            point,
        }
    }
}

/// The input fields of a batch, restricted to a single quadrature point.
#[derive(Debug)]
pub struct PointInput<'a, T> {
    data: &'a [T],
    offsets: &'a [usize],
    fields: &'a [FieldSpec],
    num_points: usize,
    point: usize,
}

impl<'a, T: Scalar + Copy> PointInput<'a, T> {
    pub fn point_index(&self) -> usize {
        self.point
    }

    pub fn num_components(&self, field: usize) -> usize {
        self.fields[field].num_components
    }

    #[inline]
    pub fn get(&self, field: usize, component: usize) -> T {
        debug_assert!(
            component < self.fields[field].num_components,
            "Component {component} out of range for input field `{}`",
            self.fields[field].name
        );
        self.data[packed_index(self.offsets[field], self.num_points, self.point, component)]
    }

    /// Reads the first (and usually only) component of the given field.
    pub fn scalar(&self, field: usize) -> T {
        self.get(field, 0)
    }

    pub fn vector<N>(&self, field: usize) -> OVector<T, N>
    where
        N: DimName,
        DefaultAllocator: Allocator<T, N>,
    {
        OVector::<T, N>::from_fn(|c, _| self.get(field, c))
    }

    /// Reads a field as an `R x C` matrix whose entry `(r, c)` is stored as component `r + R * c`.
    pub fn matrix<R, C>(&self, field: usize) -> OMatrix<T, R, C>
    where
        R: DimName,
        C: DimName,
        DefaultAllocator: Allocator<T, R, C>,
    {
        OMatrix::<T, R, C>::from_fn(|r, c| self.get(field, r + R::dim() * c))
    }
}

/// Write-only view of the packed output fields of one batch.
///
/// Output fields are required to be pairwise disjoint. Combined with the point-disjoint
/// addressing, this means every entry of the buffer is owned by exactly one
/// (point, field, component) triple, which is what makes concurrent writes from
/// different points sound.
pub struct PackedOutputs<'a, T> {
    ptr: *mut T,
    offsets: &'a [usize],
    fields: &'a [FieldSpec],
    num_points: usize,
    marker: PhantomData<&'a mut [T]>,
}

// SAFETY: Access through `PointOutput` is restricted to the slots of a single point,
// and at most one `PointOutput` exists per point (see `at_point`).
unsafe impl<'a, T: Sync + Send> Sync for PackedOutputs<'a, T> {}
unsafe impl<'a, T: Sync + Send> Send for PackedOutputs<'a, T> {}

impl<'a, T: Scalar + Copy> PackedOutputs<'a, T> {
    pub fn new(
        data: &'a mut [T],
        offsets: &'a [usize],
        fields: &'a [FieldSpec],
        num_points: usize,
    ) -> Result<Self, LayoutError> {
        validate_layout(fields, offsets, data.len(), num_points, true)?;
        Ok(Self {
            ptr: data.as_mut_ptr(),
            offsets,
            fields,
            num_points,
            marker: PhantomData,
        })
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Obtain write access to the output slots of a single point.
    ///
    /// # Safety
    ///
    /// No other `PointOutput` for the same `point` may be alive at the same time.
    ///
    /// # Panics
    ///
    /// Panics if `point` is not smaller than the number of points in the batch.
    pub(crate) unsafe fn at_point(&self, point: usize) -> PointOutput<'_, T> {
        assert!(point < self.num_points, "Quadrature point index out of bounds");
        PointOutput {
            ptr: self.ptr,
            offsets: self.offsets,
            fields: self.fields,
            num_points: self.num_points,
            point,
            marker: PhantomData,
        }
    }
}

/// The output fields of a batch, restricted to a single quadrature point.
pub struct PointOutput<'a, T> {
    ptr: *mut T,
    offsets: &'a [usize],
    fields: &'a [FieldSpec],
    num_points: usize,
    point: usize,
    marker: PhantomData<&'a mut T>,
}

impl<'a, T: Scalar + Copy> PointOutput<'a, T> {
    pub fn point_index(&self) -> usize {
        self.point
    }

    /// # Panics
    ///
    /// Panics if `component` is out of range for the given field.
    #[inline]
    pub fn set(&mut self, field: usize, component: usize, value: T) {
        let spec = &self.fields[field];
        assert!(
            component < spec.num_components,
            "Component {component} out of range for output field `{}`",
            spec.name
        );
        let index = packed_index(self.offsets[field], self.num_points, self.point, component);
        // SAFETY: The layout was validated against the buffer length on construction, and
        // the slot belongs to this point and field only, because fields are disjoint.
        unsafe {
            *self.ptr.add(index) = value;
        }
    }

    pub fn set_vector<N, S>(&mut self, field: usize, values: &Matrix<T, N, nalgebra::U1, S>)
    where
        N: Dim,
        S: Storage<T, N>,
    {
        for (c, &value) in values.iter().enumerate() {
            self.set(field, c, value);
        }
    }

    /// Writes `matrix` so that entry `(r, c)` lands in component `r + nrows * c`.
    pub fn set_matrix<R, C, S>(&mut self, field: usize, matrix: &Matrix<T, R, C, S>)
    where
        R: Dim,
        C: Dim,
        S: Storage<T, R, C>,
    {
        // Matrix iteration is column-major, which is exactly the packed component order
        for (c, &value) in matrix.iter().enumerate() {
            self.set(field, c, value);
        }
    }

    /// Explicitly writes zero into every component of the given field.
    pub fn set_zero(&mut self, field: usize)
    where
        T: Real,
    {
        for c in 0..self.fields[field].num_components {
            self.set(field, c, T::zero());
        }
    }
}
