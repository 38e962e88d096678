//! Diffusion operator setup, application and a manufactured forcing.
use crate::context::{ContextReader, KernelContext};
use crate::error::KernelError;
use crate::geometry::Dimension;
use crate::layout::{FieldSpec, PointInput, PointOutput};
use crate::pointwise::PointwiseKernel;
use crate::tensor::{adjugate, determinant, pack_symmetric_into, packed_symmetric_len, unpack_symmetric};
use nalgebra::{DefaultAllocator, Matrix3, OVector, Vector3, U1, U2, U3};
use numeric_literals::replace_float_literals;
use qkernels_traits::allocators::DimAllocator;
use qkernels_traits::{Real, SmallDim};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Configuration of the diffusion setup and apply kernels.
///
/// Context block layout: `dim, num_components`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusionContext {
    pub dimension: Dimension,
    pub num_components: usize,
}

impl Default for DiffusionContext {
    fn default() -> Self {
        Self {
            dimension: Dimension::Three,
            num_components: 1,
        }
    }
}

impl<T: Real> KernelContext<T> for DiffusionContext {
    const LAYOUT: &'static [&'static str] = &["dim", "num_components"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("diffusion", block, <Self as KernelContext<T>>::LAYOUT)?;
        let dim = reader.read_count()?;
        let num_components = reader.read_count()?;
        Ok(Self {
            dimension: Dimension::from_dims(dim, dim)?,
            num_components,
        })
    }

    fn to_context_block(&self) -> Vec<T> {
        vec![T::from_count(self.dimension.dim()), T::from_count(self.num_components)]
    }
}

/// Computes the packed diffusion weight $\frac{w}{\det J} \operatorname{adj}(J) \operatorname{adj}(J)^T$,
/// which equals $w \det J \, J^{-1} J^{-T}$.
///
/// Inputs `dx` (`D * D`) and `weights`. Output `qdata` with `D (D + 1) / 2` packed components.
#[derive(Debug)]
pub struct SetupDiffusion<D> {
    marker: PhantomData<D>,
}

impl<D> Default for SetupDiffusion<D> {
    fn default() -> Self {
        Self { marker: PhantomData }
    }
}

impl<T, D> PointwiseKernel<T> for SetupDiffusion<D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn name(&self) -> &'static str {
        "setup_diffusion"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("dx", D::dim() * D::dim()), FieldSpec::new("weights", 1)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("qdata", packed_symmetric_len(D::dim()))]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let jacobian = input.matrix::<D, D>(0);
        let det = determinant(&jacobian);
        if det == T::zero() || !det.is_finite() {
            return Err(KernelError::SingularJacobian {
                kernel: PointwiseKernel::<T>::name(self),
                point: input.point_index(),
            });
        }
        let adj = adjugate(&jacobian);
        let qd = (&adj * adj.transpose()) * (input.scalar(1) / det);

        // At most 6 entries
        let mut packed = [T::zero(); 6];
        let packed = &mut packed[..packed_symmetric_len(D::dim())];
        pack_symmetric_into(packed, &qd);
        for (c, &value) in packed.iter().enumerate() {
            output.set(0, c, value);
        }
        Ok(())
    }
}

/// Applies the packed diffusion weight to a gradient,
/// $\texttt{dv}_{c j} = \sum_l \texttt{qd}_{j l} \, \texttt{du}_{c l}$.
///
/// Inputs `du` (`num_components * D`, component `c + num_components * l`) and `qdata`
/// (`D (D + 1) / 2`). Output `dv`, laid out like `du`.
#[derive(Debug)]
pub struct ApplyDiffusion<D> {
    num_components: usize,
    marker: PhantomData<D>,
}

impl<D> ApplyDiffusion<D> {
    pub fn new(num_components: usize) -> Self {
        Self {
            num_components,
            marker: PhantomData,
        }
    }
}

impl<T, D> PointwiseKernel<T> for ApplyDiffusion<D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn name(&self) -> &'static str {
        "apply_diffusion"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("du", self.num_components * D::dim()),
            FieldSpec::new("qdata", packed_symmetric_len(D::dim())),
        ]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("dv", self.num_components * D::dim())]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let n = self.num_components;
        let mut packed = [T::zero(); 6];
        let packed = &mut packed[..packed_symmetric_len(D::dim())];
        for (c, entry) in packed.iter_mut().enumerate() {
            *entry = input.get(1, c);
        }
        let qd = unpack_symmetric::<T, D>(packed);

        for c in 0..n {
            let du = OVector::<T, D>::from_fn(|l, _| input.get(0, c + n * l));
            let dv = &qd * du;
            for (j, &value) in dv.iter().enumerate() {
                output.set(0, c + n * j, value);
            }
        }
        Ok(())
    }
}

/// Creates the diffusion setup kernel for the configured dimension.
pub fn setup_diffusion<T: Real>(context: &DiffusionContext) -> Box<dyn PointwiseKernel<T>> {
    match context.dimension {
        Dimension::One => Box::new(SetupDiffusion::<U1>::default()),
        Dimension::Two => Box::new(SetupDiffusion::<U2>::default()),
        Dimension::Three => Box::new(SetupDiffusion::<U3>::default()),
    }
}

/// Creates the diffusion apply kernel for the configured dimension and component count.
pub fn apply_diffusion<T: Real>(context: &DiffusionContext) -> Box<dyn PointwiseKernel<T>> {
    let n = context.num_components;
    match context.dimension {
        Dimension::One => Box::new(ApplyDiffusion::<U1>::new(n)),
        Dimension::Two => Box::new(ApplyDiffusion::<U2>::new(n)),
        Dimension::Three => Box::new(ApplyDiffusion::<U3>::new(n)),
    }
}

/// Manufactured solution and matching forcing for the three-dimensional Poisson problem.
///
/// The solution is
/// $$ u(x) = \prod_{d=1}^3 \sin\big(\pi (c_d + k_d x_d)\big) $$
/// with wavenumbers $k = (1, 2, 3)$ and phases $c = (0, 1, 2)$. Since $-\Delta u = \pi^2 |k|^2 u$,
/// the forcing integrated against a test function is $w \det J \, \pi^2 |k|^2 u$.
///
/// Inputs `x` (3), `dx` (9) and `weights`. Outputs `true_soln` and `rhs`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ManufacturedDiffusionRhs;

impl ManufacturedDiffusionRhs {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn wavenumbers<T: Real>() -> Vector3<T> {
        Vector3::new(1.0, 2.0, 3.0)
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn phases<T: Real>() -> Vector3<T> {
        Vector3::new(0.0, 1.0, 2.0)
    }

    pub fn solution<T: Real>(x: &Vector3<T>) -> T {
        let k = Self::wavenumbers::<T>();
        let c = Self::phases::<T>();
        (0..3).fold(T::one(), |acc, d| acc * (T::pi() * (c[d] + k[d] * x[d])).sin())
    }
}

impl<T: Real> PointwiseKernel<T> for ManufacturedDiffusionRhs {
    fn name(&self) -> &'static str {
        "manufactured_diffusion_rhs"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("x", 3),
            FieldSpec::new("dx", 9),
            FieldSpec::new("weights", 1),
        ]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("true_soln", 1), FieldSpec::new("rhs", 1)]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let x = input.vector::<U3>(0);
        let jacobian: Matrix3<T> = input.matrix::<U3, U3>(1);
        let rho = input.scalar(2) * determinant(&jacobian);

        let solution = Self::solution(&x);
        let k_squared = Self::wavenumbers::<T>().norm_squared();
        output.set(0, 0, solution);
        output.set(1, 0, rho * T::pi() * T::pi() * k_squared * solution);
        Ok(())
    }
}
