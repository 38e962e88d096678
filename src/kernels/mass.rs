//! Mass operator setup and application.
use crate::context::{ContextReader, KernelContext};
use crate::error::KernelError;
use crate::geometry::Dimension;
use crate::layout::{FieldSpec, PointInput, PointOutput};
use crate::pointwise::PointwiseKernel;
use crate::tensor::determinant;
use nalgebra::{DefaultAllocator, U1, U2, U3};
use qkernels_traits::allocators::DimAllocator;
use qkernels_traits::{Real, SmallDim};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Configuration of the mass setup kernel.
///
/// Context block layout: `dim, space_dim`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassBuildContext {
    pub dimension: Dimension,
}

impl Default for MassBuildContext {
    fn default() -> Self {
        Self {
            dimension: Dimension::Three,
        }
    }
}

impl<T: Real> KernelContext<T> for MassBuildContext {
    const LAYOUT: &'static [&'static str] = &["dim", "space_dim"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("build_mass", block, <Self as KernelContext<T>>::LAYOUT)?;
        let dim = reader.read_count()?;
        let space_dim = reader.read_count()?;
        Ok(Self {
            dimension: Dimension::from_dims(dim, space_dim)?,
        })
    }

    fn to_context_block(&self) -> Vec<T> {
        let d = T::from_count(self.dimension.dim());
        vec![d, d]
    }
}

/// Computes the scalar mass weight $w \det J$ at each quadrature point.
///
/// Inputs `dx` (the Jacobian, `D * D` components) and `weights`. Output `qdata` (1 component).
#[derive(Debug)]
pub struct BuildMass<D> {
    marker: PhantomData<D>,
}

impl<D> Default for BuildMass<D> {
    fn default() -> Self {
        Self { marker: PhantomData }
    }
}

impl<T, D> PointwiseKernel<T> for BuildMass<D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn name(&self) -> &'static str {
        "build_mass"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("dx", D::dim() * D::dim()), FieldSpec::new("weights", 1)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("qdata", 1)]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let jacobian = input.matrix::<D, D>(0);
        output.set(0, 0, determinant(&jacobian) * input.scalar(1));
        Ok(())
    }
}

/// Creates the mass setup kernel for the configured dimension.
pub fn build_mass<T: Real>(context: &MassBuildContext) -> Box<dyn PointwiseKernel<T>> {
    match context.dimension {
        Dimension::One => Box::new(BuildMass::<U1>::default()),
        Dimension::Two => Box::new(BuildMass::<U2>::default()),
        Dimension::Three => Box::new(BuildMass::<U3>::default()),
    }
}

/// Configuration of the mass apply kernel.
///
/// Context block layout: `num_components`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassApplyContext {
    pub num_components: usize,
}

impl Default for MassApplyContext {
    fn default() -> Self {
        Self { num_components: 1 }
    }
}

impl<T: Real> KernelContext<T> for MassApplyContext {
    const LAYOUT: &'static [&'static str] = &["num_components"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("apply_mass", block, <Self as KernelContext<T>>::LAYOUT)?;
        let num_components = reader.read_count()?;
        Ok(Self { num_components })
    }

    fn to_context_block(&self) -> Vec<T> {
        vec![T::from_count(self.num_components)]
    }
}

/// Applies the mass weight, $v = \texttt{qdata} \, u$, componentwise.
///
/// Inputs `u` (`num_components`) and `qdata` (1). Output `v` (`num_components`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApplyMass {
    num_components: usize,
}

impl ApplyMass {
    pub fn new(context: &MassApplyContext) -> Self {
        Self {
            num_components: context.num_components,
        }
    }
}

impl Default for ApplyMass {
    fn default() -> Self {
        Self::new(&MassApplyContext::default())
    }
}

impl<T: Real> PointwiseKernel<T> for ApplyMass {
    fn name(&self) -> &'static str {
        "apply_mass"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("u", self.num_components), FieldSpec::new("qdata", 1)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("v", self.num_components)]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let weight = input.scalar(1);
        for c in 0..self.num_components {
            output.set(0, c, weight * input.get(0, c));
        }
        Ok(())
    }
}
