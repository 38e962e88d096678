//! Spatial dimension selection and per-point geometric factors.
use crate::error::KernelError;
use crate::layout::{FieldSpec, PointInput, PointOutput};
use crate::pointwise::PointwiseKernel;
use crate::tensor::{adjugate, determinant};
use eyre::eyre;
use nalgebra::{DefaultAllocator, OMatrix, U1, U2, U3};
use qkernels_traits::allocators::DimAllocator;
use qkernels_traits::{Real, SmallDim};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// The spatial dimension of a kernel, for elements whose reference and physical
/// dimensions agree.
///
/// Resolved once when a kernel is configured, so that no per-point branching on the
/// dimension takes place.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    One,
    Two,
    Three,
}

impl Dimension {
    /// Resolves the dimension from a reference dimension and a physical (space) dimension.
    pub fn from_dims(dim: usize, space_dim: usize) -> eyre::Result<Self> {
        Self::from_tag(dim + 10 * space_dim)
    }

    /// Resolves the dimension from the combined tag `dim + 10 * space_dim`.
    ///
    /// Only the tags `11`, `22` and `33` are supported.
    pub fn from_tag(tag: usize) -> eyre::Result<Self> {
        match tag {
            11 => Ok(Self::One),
            22 => Ok(Self::Two),
            33 => Ok(Self::Three),
            _ => Err(eyre!(
                "unsupported dimension tag {tag}: reference and physical dimension must agree and lie in 1..=3"
            )),
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    pub fn tag(&self) -> usize {
        11 * self.dim()
    }
}

/// Geometric factors of a quadrature point.
///
/// Stored in the packed `qdata` field as the weighted Jacobian determinant in slot 0,
/// followed by the inverse Jacobian $\frac{\partial \xi}{\partial x}$ in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricFactors<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Quadrature weight times the Jacobian determinant.
    pub weighted_det: T,
    /// Entry `(l, k)` is $\partial \xi_l / \partial x_k$.
    pub dxi_dx: OMatrix<T, D, D>,
}

impl<T, D> GeometricFactors<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn num_components() -> usize {
        1 + D::dim() * D::dim()
    }

    pub fn field_spec(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, Self::num_components())
    }

    pub fn read(input: &PointInput<T>, field: usize) -> Self {
        let d = D::dim();
        Self {
            weighted_det: input.get(field, 0),
            dxi_dx: OMatrix::<T, D, D>::from_fn(|l, k| input.get(field, 1 + l * d + k)),
        }
    }

    pub fn write(&self, output: &mut PointOutput<T>, field: usize) {
        let d = D::dim();
        output.set(field, 0, self.weighted_det);
        for l in 0..d {
            for k in 0..d {
                output.set(field, 1 + l * d + k, self.dxi_dx[(l, k)]);
            }
        }
    }
}

/// Computes the geometric factors consumed by the flux kernels.
///
/// Inputs `dx` (the Jacobian $\frac{\partial x}{\partial \xi}$, entry `(i, j)` stored as component `i + D j`)
/// and `weights`. Output `qdata` holds $w \det J$ followed by $J^{-1}$ in row-major order.
#[derive(Debug)]
pub struct SetupGeometry<D> {
    marker: PhantomData<D>,
}

impl<D> Default for SetupGeometry<D> {
    fn default() -> Self {
        Self { marker: PhantomData }
    }
}

impl<T, D> PointwiseKernel<T> for SetupGeometry<D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn name(&self) -> &'static str {
        "setup_geometry"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("dx", D::dim() * D::dim()), FieldSpec::new("weights", 1)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![GeometricFactors::<T, D>::field_spec("qdata")]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let jacobian = input.matrix::<D, D>(0);
        let weight = input.scalar(1);
        let det = determinant(&jacobian);
        if det == T::zero() || !det.is_finite() {
            return Err(KernelError::SingularJacobian {
                kernel: PointwiseKernel::<T>::name(self),
                point: input.point_index(),
            });
        }

        let factors = GeometricFactors::<T, D> {
            weighted_det: weight * det,
            dxi_dx: adjugate(&jacobian) / det,
        };
        factors.write(output, 0);
        Ok(())
    }
}

/// Creates the geometric setup kernel for the given dimension.
pub fn setup_geometry<T: Real>(dimension: Dimension) -> Box<dyn PointwiseKernel<T>> {
    match dimension {
        Dimension::One => Box::new(SetupGeometry::<U1>::default()),
        Dimension::Two => Box::new(SetupGeometry::<U2>::default()),
        Dimension::Three => Box::new(SetupGeometry::<U3>::default()),
    }
}
