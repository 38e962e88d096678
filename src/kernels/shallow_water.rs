//! Shallow-water equations on a (locally planar) surface.
//!
//! The state is $q = (u_\lambda, u_\theta, h)$: the two velocity components and the fluid
//! height. Time integration is split into an explicit part
//!
//! $$ G(q) = \big( -(u \cdot \nabla) u - f \hat{k} \times u, \; 0 \big) $$
//!
//! and an implicit part
//!
//! $$ F(q) = \big( g \nabla (h + h_s), \; \nabla \cdot ((h + H_0) u) \big), $$
//!
//! where $h_s$ is the terrain height, $H_0$ the reference height and $f$ the Coriolis parameter.
//! Both are evaluated in weak form, with gradient fields of the 3-component state stored as
//! component `c + 3 j` and geometric factors as described by [`GeometricFactors`].
use crate::context::{ContextReader, KernelContext};
use crate::error::KernelError;
use crate::geometry::GeometricFactors;
use crate::layout::{FieldSpec, PointInput, PointOutput};
use crate::pointwise::PointwiseKernel;
use crate::tensor::{physical_gradient, reference_flux};
use nalgebra::{Matrix3x2, Vector2, Vector3, U2, U3};
use numeric_literals::replace_float_literals;
use qkernels_traits::Real;
use serde::{Deserialize, Serialize};

/// Number of state variables.
pub const NUM_STATE: usize = 3;

fn state_fields<T: Real>() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("q", NUM_STATE),
        FieldSpec::new("dq", NUM_STATE * 2),
        GeometricFactors::<T, U2>::field_spec("qdata"),
    ]
}

fn residual_output_fields() -> Vec<FieldSpec> {
    vec![FieldSpec::new("v", NUM_STATE), FieldSpec::new("dv", NUM_STATE * 2)]
}

fn velocity<T: Real>(q: &Vector3<T>) -> Vector2<T> {
    Vector2::new(q[0], q[1])
}

/// Configuration of the shallow-water initial condition.
///
/// Context block layout: `u0, v0, h0`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShallowWaterSetupContext<T> {
    /// Initial longitudinal velocity.
    pub u0: T,
    /// Initial latitudinal velocity.
    pub v0: T,
    /// Initial fluid height.
    pub h0: T,
}

impl<T: Real> Default for ShallowWaterSetupContext<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self {
            u0: 0.0,
            v0: 0.0,
            h0: 10.0,
        }
    }
}

impl<T: Real> KernelContext<T> for ShallowWaterSetupContext<T> {
    const LAYOUT: &'static [&'static str] = &["u0", "v0", "h0"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("shallow_water_setup", block, <Self as KernelContext<T>>::LAYOUT)?;
        Ok(Self {
            u0: reader.read_finite()?,
            v0: reader.read_finite()?,
            h0: reader.read_finite()?,
        })
    }

    fn to_context_block(&self) -> Vec<T> {
        vec![self.u0, self.v0, self.h0]
    }
}

/// Uniform initial state over sinusoidal terrain.
///
/// Input `x` (2). Outputs `q0` (3), `h_s` (terrain height $\sin x + \cos y$),
/// `H_0` (flat reference height, zero) and `coords` (2, echoing `x`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShallowWaterSetup<T> {
    context: ShallowWaterSetupContext<T>,
}

impl<T: Real> ShallowWaterSetup<T> {
    pub fn new(context: ShallowWaterSetupContext<T>) -> Self {
        Self { context }
    }

    pub fn terrain_height(x: &Vector2<T>) -> T {
        x[0].sin() + x[1].cos()
    }
}

impl<T: Real> PointwiseKernel<T> for ShallowWaterSetup<T> {
    fn name(&self) -> &'static str {
        "shallow_water_setup"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("x", 2)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("q0", NUM_STATE),
            FieldSpec::new("h_s", 1),
            FieldSpec::new("H_0", 1),
            FieldSpec::new("coords", 2),
        ]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let x = input.vector::<U2>(0);
        let c = &self.context;
        output.set_vector(0, &Vector3::new(c.u0, c.v0, c.h0));
        output.set(1, 0, Self::terrain_height(&x));
        output.set(2, 0, T::zero());
        output.set_vector(3, &x);
        Ok(())
    }
}

/// Configuration of the explicit shallow-water operator.
///
/// Context block layout: `f`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShallowWaterExplicitContext<T> {
    /// Coriolis parameter.
    pub coriolis: T,
}

impl<T: Real> Default for ShallowWaterExplicitContext<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self { coriolis: 1.0e-4 }
    }
}

impl<T: Real> KernelContext<T> for ShallowWaterExplicitContext<T> {
    const LAYOUT: &'static [&'static str] = &["f"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("shallow_water_explicit", block, <Self as KernelContext<T>>::LAYOUT)?;
        Ok(Self {
            coriolis: reader.read_finite()?,
        })
    }

    fn to_context_block(&self) -> Vec<T> {
        vec![self.coriolis]
    }
}

/// Explicit part of the shallow-water system: advection of momentum and the Coriolis force.
///
/// Inputs `q` (3), `dq` (6), `qdata` (5) and `x` (2). Outputs `v` (3) and `dv` (6).
/// All terms are value-test terms, so `dv` is identically zero.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShallowWaterExplicit<T> {
    context: ShallowWaterExplicitContext<T>,
}

impl<T: Real> ShallowWaterExplicit<T> {
    pub fn new(context: ShallowWaterExplicitContext<T>) -> Self {
        Self { context }
    }
}

impl<T: Real> PointwiseKernel<T> for ShallowWaterExplicit<T> {
    fn name(&self) -> &'static str {
        "shallow_water_explicit"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        let mut fields = state_fields::<T>();
        fields.push(FieldSpec::new("x", 2));
        fields
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        residual_output_fields()
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let q = input.vector::<U3>(0);
        let reference_grad = input.matrix::<U3, U2>(1);
        let geometry = GeometricFactors::<T, U2>::read(input, 2);
        let grad = physical_gradient(&reference_grad, &geometry.dxi_dx);

        let u = velocity(&q);
        let f = self.context.coriolis;
        let wdetj = geometry.weighted_det;
        // (u . grad) u_c is the dot product of u with row c of the velocity gradient
        let advection_0 = u[0] * grad[(0, 0)] + u[1] * grad[(0, 1)];
        let advection_1 = u[0] * grad[(1, 0)] + u[1] * grad[(1, 1)];

        output.set(0, 0, -wdetj * (advection_0 + f * u[1]));
        output.set(0, 1, -wdetj * (advection_1 - f * u[0]));
        output.set(0, 2, T::zero());
        output.set_zero(1);
        Ok(())
    }
}

/// Configuration of the implicit shallow-water operator and its linearization.
///
/// Context block layout: `g`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShallowWaterImplicitContext<T> {
    pub gravity: T,
}

/// The linearization reads the same single-entry block as the implicit operator.
pub type ShallowWaterJacobianContext<T> = ShallowWaterImplicitContext<T>;

impl<T: Real> Default for ShallowWaterImplicitContext<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self { gravity: 9.81 }
    }
}

impl<T: Real> KernelContext<T> for ShallowWaterImplicitContext<T> {
    const LAYOUT: &'static [&'static str] = &["g"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("shallow_water_implicit", block, <Self as KernelContext<T>>::LAYOUT)?;
        Ok(Self {
            gravity: reader.read_finite()?,
        })
    }

    fn to_context_block(&self) -> Vec<T> {
        vec![self.gravity]
    }
}

/// Implicit part of the shallow-water system, integrated by parts.
///
/// Inputs `q` (3), `dq` (6), `qdata` (5), `x` (2), `h_s` (1) and `H_0` (1).
/// Outputs `v` (3, identically zero) and `dv` (6), the pull-back of the physical flux
///
/// $$ \Big( -g (h + h_s) I, \; -(h + H_0) u \Big). $$
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShallowWaterImplicit<T> {
    context: ShallowWaterImplicitContext<T>,
}

impl<T: Real> ShallowWaterImplicit<T> {
    pub fn new(context: ShallowWaterImplicitContext<T>) -> Self {
        Self { context }
    }
}

impl<T: Real> PointwiseKernel<T> for ShallowWaterImplicit<T> {
    fn name(&self) -> &'static str {
        "shallow_water_implicit"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        let mut fields = state_fields::<T>();
        fields.extend([
            FieldSpec::new("x", 2),
            FieldSpec::new("h_s", 1),
            FieldSpec::new("H_0", 1),
        ]);
        fields
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        residual_output_fields()
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let q = input.vector::<U3>(0);
        let geometry = GeometricFactors::<T, U2>::read(input, 2);
        let terrain = input.scalar(4);
        let reference_height = input.scalar(5);

        let u = velocity(&q);
        let h = q[2];
        let g = self.context.gravity;

        let mut flux = Matrix3x2::zeros();
        for m in 0..2 {
            flux[(m, m)] = -g * (h + terrain);
        }
        for k in 0..2 {
            flux[(2, k)] = -(h + reference_height) * u[k];
        }

        output.set_zero(0);
        output.set_matrix(1, &(reference_flux(&flux, &geometry.dxi_dx) * geometry.weighted_det));
        Ok(())
    }
}

/// Action of the linearized implicit shallow-water operator on an increment $\delta q$.
///
/// Inputs `q` (3, the linearization state), `delta_q` (3), `qdata` (5) and `H_0` (1).
/// Callers wiring the older `(q, dq, qdata)` field list must pass the value increment
/// `delta_q` in place of the state gradient `dq`, and add `H_0`.
/// Outputs `v` (3) and `dv` (6), shaped like the residual of [`ShallowWaterImplicit`]:
///
/// $$ \Big( -g \, \delta h \, I, \; -(\delta h \, u + (h + H_0) \, \delta u) \Big). $$
///
/// The value-test output vanishes identically but is always written. Contributions from the
/// time derivative (the shifted mass term) are left to [`ApplyMass`](crate::kernels::mass::ApplyMass).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShallowWaterJacobian<T> {
    context: ShallowWaterJacobianContext<T>,
}

impl<T: Real> ShallowWaterJacobian<T> {
    pub fn new(context: ShallowWaterJacobianContext<T>) -> Self {
        Self { context }
    }
}

impl<T: Real> PointwiseKernel<T> for ShallowWaterJacobian<T> {
    fn name(&self) -> &'static str {
        "shallow_water_jacobian"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("q", NUM_STATE),
            FieldSpec::new("delta_q", NUM_STATE),
            GeometricFactors::<T, U2>::field_spec("qdata"),
            FieldSpec::new("H_0", 1),
        ]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        residual_output_fields()
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let q = input.vector::<U3>(0);
        let delta_q = input.vector::<U3>(1);
        let geometry = GeometricFactors::<T, U2>::read(input, 2);
        let reference_height = input.scalar(3);

        let u = velocity(&q);
        let h = q[2];
        let delta_u = velocity(&delta_q);
        let delta_h = delta_q[2];
        let g = self.context.gravity;

        let mut flux = Matrix3x2::zeros();
        for m in 0..2 {
            flux[(m, m)] = -g * delta_h;
        }
        for k in 0..2 {
            flux[(2, k)] = -(delta_h * u[k] + (h + reference_height) * delta_u[k]);
        }

        output.set_zero(0);
        output.set_matrix(1, &(reference_flux(&flux, &geometry.dxi_dx) * geometry.weighted_det));
        Ok(())
    }
}
