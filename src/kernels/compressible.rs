//! Conservative compressible-flow quantities shared by the Navier-Stokes kernels.
//!
//! The conserved state is $q = (\rho, U_1, U_2, U_3, E)$ with momentum density
//! $U = \rho u$ and total energy density $E$, closed by the ideal-gas law
//! $P = (\gamma - 1)(E - \rho |u|^2 / 2)$.
//!
//! Fluxes are stored as `5 x 3` matrices whose column `i` is the flux in direction $x_i$.
use crate::tensor::{ideal_gas_pressure, kinetic_energy, metric};
use nalgebra::{Matrix3, Matrix5, Matrix5x3, Vector3, Vector5};
use numeric_literals::replace_float_literals;
use qkernels_traits::Real;

/// Number of conserved variables.
pub const NUM_CONSERVED: usize = 5;

/// Primitive quantities derived from a conserved state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlowState<T: Real> {
    pub density: T,
    pub velocity: Vector3<T>,
    pub total_energy: T,
    /// Specific kinetic energy $|u|^2 / 2$.
    pub kinetic_energy: T,
    pub pressure: T,
}

impl<T: Real> FlowState<T> {
    /// Derives primitive quantities from `q`.
    ///
    /// Callers are responsible for ensuring that the density is positive.
    pub fn from_conserved(q: &Vector5<T>, gamma: T) -> Self {
        let density = q[0];
        let velocity = Vector3::new(q[1], q[2], q[3]) / density;
        let total_energy = q[4];
        let ke = kinetic_energy(&velocity);
        Self {
            density,
            velocity,
            total_energy,
            kinetic_energy: ke,
            pressure: ideal_gas_pressure(gamma, density, total_energy, ke),
        }
    }

    pub fn momentum(&self) -> Vector3<T> {
        self.velocity * self.density
    }

    /// Specific total enthalpy $H = (E + P) / \rho$.
    pub fn total_enthalpy(&self) -> T {
        (self.total_energy + self.pressure) / self.density
    }
}

/// The inviscid (advective) flux
/// $F_i = (U_i, \; \rho u u_i + P e_i, \; (E + P) u_i)$.
pub fn inviscid_flux<T: Real>(state: &FlowState<T>) -> Matrix5x3<T> {
    let u = &state.velocity;
    let momentum = state.momentum();
    let mut flux = Matrix5x3::zeros();
    for i in 0..3 {
        flux[(0, i)] = momentum[i];
        for m in 0..3 {
            flux[(1 + m, i)] = momentum[m] * u[i];
        }
        flux[(1 + i, i)] += state.pressure;
        flux[(4, i)] = (state.total_energy + state.pressure) * u[i];
    }
    flux
}

/// The flux Jacobians $A_i = \partial F_i / \partial q$ in closed form.
///
/// Entry `(m, n)` of `A[i]` is the derivative of component `m` of the flux in direction `i`
/// with respect to conserved variable `n`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn flux_jacobians<T: Real>(state: &FlowState<T>, gamma: T) -> [Matrix5<T>; 3] {
    let u = &state.velocity;
    let ke = state.kinetic_energy;
    let g1 = gamma - 1.0;
    let enthalpy = state.total_enthalpy();
    let delta = |a: usize, b: usize| if a == b { 1.0 } else { 0.0 };

    let jacobian = |i: usize| {
        let mut a = Matrix5::zeros();
        // Continuity: F_0 = U_i
        a[(0, 1 + i)] = 1.0;
        // Momentum: F_m = U_m U_i / rho + P delta_mi
        for m in 0..3 {
            a[(1 + m, 0)] = -u[m] * u[i] + delta(m, i) * g1 * ke;
            for n in 0..3 {
                a[(1 + m, 1 + n)] = delta(m, n) * u[i] + u[m] * delta(i, n) - delta(m, i) * g1 * u[n];
            }
            a[(1 + m, 4)] = delta(m, i) * g1;
        }
        // Energy: F_4 = (E + P) U_i / rho
        a[(4, 0)] = u[i] * (g1 * ke - enthalpy);
        for n in 0..3 {
            a[(4, 1 + n)] = delta(i, n) * enthalpy - g1 * u[i] * u[n];
        }
        a[(4, 4)] = gamma * u[i];
        a
    };

    [jacobian(0), jacobian(1), jacobian(2)]
}

/// Diagonal streamline-upwind stabilization tensor
/// $\tau = \operatorname{diag}(\tau_C, \tau_M, \tau_M, \tau_M, \tau_E)$.
///
/// With the convective scale $f_1 = \rho \sqrt{u^T g u}$ and metric $g$ from
/// [`metric`](crate::tensor::metric):
///
/// $$ \tau_C = \frac{C_c f_1}{8 \operatorname{tr} g}, \quad \tau_M = \frac{1}{f_1}, \quad
///    \tau_E = \frac{\tau_M}{C_e c_v}. $$
///
/// At rest ($f_1 = 0$) the tensor is defined to be zero, so that the stabilization vanishes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StabilizationTau<T: Real> {
    pub continuity: T,
    pub momentum: T,
    pub energy: T,
}

impl<T: Real> StabilizationTau<T> {
    pub const CONTINUITY_COEFFICIENT: f64 = 1.0;
    pub const ENERGY_COEFFICIENT: f64 = 1.0;

    pub fn zero() -> Self {
        Self {
            continuity: T::zero(),
            momentum: T::zero(),
            energy: T::zero(),
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn compute(density: T, velocity: &Vector3<T>, dxi_dx: &Matrix3<T>, cv: T) -> Self {
        let g = metric(dxi_dx);
        let f1 = density * velocity.dot(&(g * velocity)).sqrt();
        if f1 <= 0.0 || !f1.is_finite() {
            return Self::zero();
        }
        let cc = T::from_f64(Self::CONTINUITY_COEFFICIENT).expect("Literal must fit in T");
        let ce = T::from_f64(Self::ENERGY_COEFFICIENT).expect("Literal must fit in T");
        let momentum = 1.0 / f1;
        Self {
            continuity: cc * f1 / (8.0 * g.trace()),
            momentum,
            energy: momentum / (ce * cv),
        }
    }

    pub fn diagonal(&self) -> Vector5<T> {
        Vector5::new(self.continuity, self.momentum, self.momentum, self.momentum, self.energy)
    }
}

/// The streamline-upwind flux $S_{\cdot i} = A_i^T \tau \sum_j A_j \frac{\partial q}{\partial x_j}$.
///
/// `grad_q` is the physical gradient of the conserved state (column `j` is $\partial q / \partial x_j$).
/// Integrated against test-function gradients, this yields the term
/// $\nabla v : A^T \tau (A \cdot \nabla q)$.
pub fn streamline_upwind_flux<T: Real>(
    jacobians: &[Matrix5<T>; 3],
    tau: &StabilizationTau<T>,
    grad_q: &Matrix5x3<T>,
) -> Matrix5x3<T> {
    let mut strong_residual = Vector5::zeros();
    for (j, a_j) in jacobians.iter().enumerate() {
        strong_residual += a_j * grad_q.column(j);
    }
    let weighted = strong_residual.component_mul(&tau.diagonal());

    let mut flux = Matrix5x3::zeros();
    for (i, a_i) in jacobians.iter().enumerate() {
        flux.set_column(i, &a_i.tr_mul(&weighted));
    }
    flux
}
