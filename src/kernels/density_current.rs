//! The density current benchmark: a cold bubble dropped into a stratified atmosphere,
//! modelled by the 3D compressible Navier-Stokes equations in conservative form.
//!
//! With state $q = (\rho, U, E)$ the system reads
//!
//! $$
//! \begin{aligned}
//!   \partial_t \rho + \nabla \cdot U &= 0, \\\\
//!   \partial_t U + \nabla \cdot (\rho u \otimes u + P I) + \rho g \hat{z} &= \nabla \cdot F_u, \\\\
//!   \partial_t E + \nabla \cdot ((E + P) u) + \rho g u_z &= \nabla \cdot F_e,
//! \end{aligned}
//! $$
//!
//! with viscous stress $F_u = \mu (\nabla u + \nabla u^T + \lambda (\nabla \cdot u) I)$ and
//! heat flux $F_e = F_u u + k \nabla T$.
use crate::context::{encode_flag, ContextReader, KernelContext};
use crate::error::KernelError;
use crate::geometry::GeometricFactors;
use crate::kernels::compressible::{
    flux_jacobians, inviscid_flux, streamline_upwind_flux, FlowState, StabilizationTau, NUM_CONSERVED,
};
use crate::layout::{FieldSpec, PointInput, PointOutput};
use crate::pointwise::PointwiseKernel;
use crate::tensor::{physical_gradient, reference_flux, SymmetricTensor3};
use nalgebra::{Matrix3, Matrix5x3, Vector3, Vector5, U3, U5};
use numeric_literals::replace_float_literals;
use qkernels_traits::Real;
use serde::{Deserialize, Serialize};

/// Configuration of the density current initial condition.
///
/// Context block layout:
/// `theta0, thetaC, P0, N, cv, cp, Rd, g, rc, lx, ly, lz, periodic_x, periodic_y, periodic_z`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Real + Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct DensityCurrentSetupContext<T: Real> {
    /// Reference potential temperature (K).
    pub theta0: T,
    /// Perturbation of the potential temperature at the bubble center (K).
    pub theta_c: T,
    /// Atmospheric pressure at the ground (Pa).
    pub p0: T,
    /// Brunt-Vaisala frequency (1/s).
    pub brunt_vaisala: T,
    pub cv: T,
    pub cp: T,
    /// Specific gas constant.
    pub rd: T,
    pub gravity: T,
    /// Radius of the bubble.
    pub rc: T,
    pub domain: Vector3<T>,
    /// Faces along periodic directions are not subject to the no-penetration condition.
    pub periodic: [bool; 3],
}

impl<T: Real> Default for DensityCurrentSetupContext<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self {
            theta0: 300.0,
            theta_c: -15.0,
            p0: 1.0e5,
            brunt_vaisala: 0.01,
            cv: 717.0,
            cp: 1004.0,
            rd: 287.0,
            gravity: 9.81,
            rc: 1000.0,
            domain: Vector3::new(8000.0, 8000.0, 4000.0),
            periodic: [false; 3],
        }
    }
}

impl<T: Real> KernelContext<T> for DensityCurrentSetupContext<T> {
    const LAYOUT: &'static [&'static str] = &[
        "theta0",
        "thetaC",
        "P0",
        "N",
        "cv",
        "cp",
        "Rd",
        "g",
        "rc",
        "lx",
        "ly",
        "lz",
        "periodic_x",
        "periodic_y",
        "periodic_z",
    ];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::new("density_current_setup", block, <Self as KernelContext<T>>::LAYOUT)?;
        Ok(Self {
            theta0: reader.read_positive()?,
            theta_c: reader.read_finite()?,
            p0: reader.read_positive()?,
            brunt_vaisala: reader.read_positive()?,
            cv: reader.read_positive()?,
            cp: reader.read_positive()?,
            rd: reader.read_positive()?,
            gravity: reader.read_positive()?,
            rc: reader.read_positive()?,
            domain: Vector3::new(
                reader.read_positive()?,
                reader.read_positive()?,
                reader.read_positive()?,
            ),
            periodic: [reader.read_flag()?, reader.read_flag()?, reader.read_flag()?],
        })
    }

    fn to_context_block(&self) -> Vec<T> {
        let mut block = vec![
            self.theta0,
            self.theta_c,
            self.p0,
            self.brunt_vaisala,
            self.cv,
            self.cp,
            self.rd,
            self.gravity,
            self.rc,
        ];
        block.extend(self.domain.iter().copied());
        block.extend(self.periodic.iter().map(|&flag| encode_flag::<T>(flag)));
        block
    }
}

/// Initial condition of the density current in hydrostatic balance.
///
/// Input `x` (3). Outputs `q0` (5) and `coords` (3), the latter echoing `x`.
///
/// The potential temperature is a stratified background with a cosine-shaped perturbation
/// of radius $r_c$ centered in the domain,
///
/// $$ \theta = \theta_0 e^{N^2 z / g} + \Delta\theta, \quad
///    \Delta\theta = \begin{cases} \frac{\theta_C}{2}(1 + \cos(\pi r / r_c)) & r \leq r_c \\\\
///    0 & \text{otherwise} \end{cases} $$
///
/// and the Exner pressure follows from hydrostatic balance,
/// $\Pi = 1 + \frac{g^2}{c_p \theta_0 N^2}(e^{-N^2 z / g} - 1)$. The fluid starts at rest.
/// Momentum is forced to exactly zero on every face that is not periodic.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DensityCurrentSetup<T: Real> {
    context: DensityCurrentSetupContext<T>,
}

impl<T: Real> DensityCurrentSetup<T> {
    /// Distance below which a point is considered to lie on a domain face.
    pub const BOUNDARY_TOLERANCE: f64 = 1e-14;

    pub fn new(context: DensityCurrentSetupContext<T>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &DensityCurrentSetupContext<T> {
        &self.context
    }

    /// Whether `x` lies on a non-periodic face, where the initial momentum is forced to zero.
    pub fn on_constrained_face(&self, x: &Vector3<T>) -> bool {
        let tol = T::from_f64(Self::BOUNDARY_TOLERANCE).expect("Literal must fit in T");
        (0..3).any(|d| {
            !self.context.periodic[d] && (x[d].abs() < tol || (x[d] - self.context.domain[d]).abs() < tol)
        })
    }

    /// The initial conserved state at `x`, before boundary conditions are applied.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn state(&self, x: &Vector3<T>) -> Vector5<T> {
        let c = &self.context;
        let center = c.domain * 0.5;
        let r = (x - center).norm();
        let z = x[2];
        let n2 = c.brunt_vaisala * c.brunt_vaisala;

        let delta_theta = if r <= c.rc {
            c.theta_c * (1.0 + (T::pi() * r / c.rc).cos()) / 2.0
        } else {
            0.0
        };
        let theta = c.theta0 * (n2 * z / c.gravity).exp() + delta_theta;
        let exner = 1.0 + c.gravity * c.gravity * ((-n2 * z / c.gravity).exp() - 1.0) / (c.cp * c.theta0 * n2);
        let rho = c.p0 * exner.powf(c.cv / c.rd) / (c.rd * theta);

        Vector5::new(rho, 0.0, 0.0, 0.0, rho * (c.cv * theta * exner))
    }
}

impl<T: Real> PointwiseKernel<T> for DensityCurrentSetup<T> {
    fn name(&self) -> &'static str {
        "density_current_setup"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("x", 3)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("q0", NUM_CONSERVED), FieldSpec::new("coords", 3)]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let x = input.vector::<U3>(0);
        let mut q0 = self.state(&x);
        if self.on_constrained_face(&x) {
            q0.fixed_rows_mut::<3>(1).fill(T::zero());
        }
        output.set_vector(0, &q0);
        output.set_vector(1, &x);
        Ok(())
    }
}

/// Stabilization applied by the density current residual.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stabilization {
    None,
    /// Streamline upwind.
    Su,
}

impl Stabilization {
    fn from_code<T: Real>(code: T) -> eyre::Result<Self> {
        if code == T::zero() {
            Ok(Self::None)
        } else if code == T::one() {
            Ok(Self::Su)
        } else {
            Err(eyre::eyre!("unknown stabilization code {code}, expected 0 (none) or 1 (SU)"))
        }
    }

    fn code<T: Real>(&self) -> T {
        match self {
            Self::None => T::zero(),
            Self::Su => T::one(),
        }
    }
}

/// Configuration of the density current residual.
///
/// Context block layout: `lambda, mu, k, cv, cp, g, Rd`, optionally followed by
/// `stabilization` (0 for none, 1 for SU). Without the trailing entry, SU is used.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCurrentContext<T> {
    /// Bulk viscosity coefficient, relative to `mu`.
    pub lambda: T,
    /// Dynamic viscosity.
    pub mu: T,
    /// Thermal conductivity.
    pub k: T,
    pub cv: T,
    pub cp: T,
    pub gravity: T,
    pub rd: T,
    pub stabilization: Stabilization,
}

impl<T: Real> Default for DensityCurrentContext<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self {
            lambda: -2.0 / 3.0,
            mu: 75.0,
            k: 0.02638,
            cv: 717.0,
            cp: 1004.0,
            gravity: 9.81,
            rd: 287.0,
            stabilization: Stabilization::Su,
        }
    }
}

impl<T: Real> DensityCurrentContext<T> {
    /// Ratio of specific heats $\gamma = c_p / c_v$.
    pub fn gamma(&self) -> T {
        self.cp / self.cv
    }
}

impl<T: Real> KernelContext<T> for DensityCurrentContext<T> {
    const LAYOUT: &'static [&'static str] = &["lambda", "mu", "k", "cv", "cp", "g", "Rd", "stabilization"];

    fn from_context_block(block: &[T]) -> eyre::Result<Self> {
        let mut reader = ContextReader::with_optional_tail("density_current", block, <Self as KernelContext<T>>::LAYOUT, 7)?;
        let mut context = Self {
            lambda: reader.read_finite()?,
            mu: reader.read_non_negative()?,
            k: reader.read_non_negative()?,
            cv: reader.read_positive()?,
            cp: reader.read_positive()?,
            gravity: reader.read_finite()?,
            rd: reader.read_positive()?,
            stabilization: Stabilization::Su,
        };
        if let Some(code) = reader.read_optional() {
            context.stabilization = Stabilization::from_code(code)?;
        }
        Ok(context)
    }

    fn to_context_block(&self) -> Vec<T> {
        vec![
            self.lambda,
            self.mu,
            self.k,
            self.cv,
            self.cp,
            self.gravity,
            self.rd,
            self.stabilization.code(),
        ]
    }
}

/// Residual of the density current system, for explicit time integration
/// $\int v \, \partial_t q = \int v \, \texttt{v} + \nabla_\xi v : \texttt{dv}$.
///
/// Inputs `q` (5), `dq` (15, the reference gradient with component `c + 5 j`),
/// `qdata` (10, see [`GeometricFactors`]) and `x` (3).
/// Outputs `v` (5) and `dv` (15, laid out like `dq`).
///
/// The density must be positive at every point, otherwise
/// [`KernelError::NonPhysicalState`] is returned.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DensityCurrent<T> {
    context: DensityCurrentContext<T>,
}

/// Everything the residual computes at one point, before it is written out.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurrentFluxes<T: Real> {
    /// Value-test contribution (gravity source).
    pub source: Vector5<T>,
    /// Advective flux in physical space.
    pub inviscid: Matrix5x3<T>,
    /// Viscous stress and heat flux in physical space.
    pub viscous: Matrix5x3<T>,
    /// Streamline-upwind flux in physical space (zero when stabilization is disabled).
    pub stabilization: Matrix5x3<T>,
}

impl<T: Real> DensityCurrent<T> {
    pub fn new(context: DensityCurrentContext<T>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &DensityCurrentContext<T> {
        &self.context
    }

    /// Computes all physical-space fluxes at a point from the conserved state and its
    /// physical gradient.
    ///
    /// The density is assumed to be positive.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn fluxes(&self, q: &Vector5<T>, grad_q: &Matrix5x3<T>, dxi_dx: &Matrix3<T>) -> DensityCurrentFluxes<T> {
        let ctx = &self.context;
        let gamma = ctx.gamma();
        let state = FlowState::from_conserved(q, gamma);
        let rho = state.density;
        let u = &state.velocity;

        let grad_rho = grad_q.row(0).transpose();
        let grad_energy = grad_q.row(4).transpose();
        let grad_momentum: Matrix3<T> = grad_q.fixed_rows::<3>(1).into_owned();
        // (grad u)_jk = (dU_j/dx_k - u_j drho/dx_k) / rho
        let grad_u = (grad_momentum - u * grad_rho.transpose()) / rho;
        let grad_temperature =
            (grad_energy / rho - grad_rho * (state.total_energy / (rho * rho)) - grad_u.tr_mul(u)) / ctx.cv;

        let divergence = grad_u.trace();
        let stress_full = (grad_u + grad_u.transpose() + Matrix3::identity() * (ctx.lambda * divergence)) * ctx.mu;
        let stress = SymmetricTensor3::from_upper_triangle(&stress_full);
        let heat_flux = stress.mul_vector(u) + grad_temperature * ctx.k;

        let mut viscous = Matrix5x3::zeros();
        for i in 0..3 {
            for m in 0..3 {
                viscous[(1 + m, i)] = stress.get(m, i);
            }
            viscous[(4, i)] = heat_flux[i];
        }

        let stabilization = match ctx.stabilization {
            Stabilization::None => Matrix5x3::zeros(),
            Stabilization::Su => {
                let tau = StabilizationTau::compute(rho, u, dxi_dx, ctx.cv);
                let jacobians = flux_jacobians(&state, gamma);
                streamline_upwind_flux(&jacobians, &tau, grad_q)
            }
        };

        let source = Vector5::new(0.0, 0.0, 0.0, -rho * ctx.gravity, -rho * ctx.gravity * u[2]);

        DensityCurrentFluxes {
            source,
            inviscid: inviscid_flux(&state),
            viscous,
            stabilization,
        }
    }
}

impl<T: Real> PointwiseKernel<T> for DensityCurrent<T> {
    fn name(&self) -> &'static str {
        "density_current"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("q", NUM_CONSERVED),
            FieldSpec::new("dq", NUM_CONSERVED * 3),
            GeometricFactors::<T, U3>::field_spec("qdata"),
            FieldSpec::new("x", 3),
        ]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("v", NUM_CONSERVED), FieldSpec::new("dv", NUM_CONSERVED * 3)]
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        let q = input.vector::<U5>(0);
        let rho = q[0];
        if !(rho > T::zero() && rho.is_finite()) {
            return Err(KernelError::NonPhysicalState {
                kernel: PointwiseKernel::<T>::name(self),
                point: input.point_index(),
                quantity: "density",
                value: rho.to_f64_lossy(),
            });
        }

        let reference_grad_q = input.matrix::<U5, U3>(1);
        let geometry = GeometricFactors::<T, U3>::read(input, 2);
        let grad_q = physical_gradient(&reference_grad_q, &geometry.dxi_dx);

        let fluxes = self.fluxes(&q, &grad_q, &geometry.dxi_dx);
        let total_flux = fluxes.inviscid - fluxes.viscous - fluxes.stabilization;
        let wdetj = geometry.weighted_det;

        output.set_vector(0, &(fluxes.source * wdetj));
        output.set_matrix(1, &(reference_flux(&total_flux, &geometry.dxi_dx) * wdetj));
        Ok(())
    }
}
