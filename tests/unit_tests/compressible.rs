use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Matrix3, Matrix5, Matrix5x3, Vector3, Vector5};
use proptest::prelude::*;
use qkernels::kernels::compressible::{
    flux_jacobians, inviscid_flux, streamline_upwind_flux, FlowState, StabilizationTau,
};
use qkernels::proptest::{conserved_flow_state, gradient_entries, well_conditioned_jacobian3};
use qkernels_calculus::approximate_jacobian_fd;

const CV: f64 = 717.0;
const GAMMA: f64 = 1004.0 / 717.0;

/// Flux Jacobians obtained by differentiating the inviscid flux numerically.
///
/// The conserved variables differ by orders of magnitude, so each one is differentiated
/// in units of its own magnitude.
fn flux_jacobians_fd(q: &Vector5<f64>) -> [Matrix5<f64>; 3] {
    let scales = q.map(|q_j| q_j.abs().max(1.0));
    let jacobian = |i: usize| {
        let flux_column = |s: DVectorView<f64>, mut f: DVectorViewMut<f64>| {
            let q = Vector5::from_fn(|j, _| s[j] * scales[j]);
            let state = FlowState::from_conserved(&q, GAMMA);
            f.copy_from(&inviscid_flux(&state).column(i));
        };
        let mut s = DVector::from_fn(5, |j, _| q[j] / scales[j]);
        let scaled = approximate_jacobian_fd(5, flux_column, &mut s, 1e-5);
        Matrix5::from_fn(|m, j| scaled[(m, j)] / scales[j])
    };
    [jacobian(0), jacobian(1), jacobian(2)]
}

fn assert_relatively_close<const C: usize>(
    actual: &nalgebra::SMatrix<f64, 5, C>,
    expected: &nalgebra::SMatrix<f64, 5, C>,
    rel_tol: f64,
) {
    let scale = expected.amax().max(1.0);
    let error = (actual - expected).amax();
    assert!(
        error <= rel_tol * scale,
        "error {error} exceeds tolerance {} (scale {scale})\nactual: {actual}\nexpected: {expected}",
        rel_tol * scale
    );
}

#[test]
fn flow_state_from_conserved() {
    let q: Vector5<f64> = Vector5::new(2.0, 2.0, 4.0, -2.0, 10.0);
    let state = FlowState::from_conserved(&q, 1.4);
    assert_eq!(state.density, 2.0);
    assert_eq!(state.velocity, Vector3::new(1.0, 2.0, -1.0));
    assert_eq!(state.kinetic_energy, 3.0);
    // (1.4 - 1) * (10 - 2 * 3)
    assert!((state.pressure - 1.6).abs() < 1e-14);
    assert!((state.total_enthalpy() - 5.8).abs() < 1e-14);
    assert_eq!(state.momentum(), Vector3::new(2.0, 4.0, -2.0));
}

#[test]
fn inviscid_flux_at_rest_is_pure_pressure() {
    let q = Vector5::new(1.2, 0.0, 0.0, 0.0, 2.5e5);
    let state = FlowState::from_conserved(&q, GAMMA);
    let flux = inviscid_flux(&state);

    let mut expected = Matrix5x3::zeros();
    for i in 0..3 {
        expected[(1 + i, i)] = state.pressure;
    }
    assert_eq!(flux, expected);
}

#[test]
fn stabilization_tau_for_unit_metric() {
    let tau = StabilizationTau::compute(2.0, &Vector3::new(1.0, 0.0, 0.0), &Matrix3::identity(), CV);
    assert!((tau.continuity - 2.0 / 24.0).abs() < 1e-15);
    assert_eq!(tau.momentum, 0.5);
    assert!((tau.energy - 0.5 / CV).abs() < 1e-15);
    assert_eq!(
        tau.diagonal(),
        Vector5::new(tau.continuity, 0.5, 0.5, 0.5, tau.energy)
    );
}

#[test]
fn stabilization_tau_vanishes_without_convection() {
    let dxi_dx = Matrix3::identity() * 3.0;
    assert_eq!(
        StabilizationTau::compute(1.0, &Vector3::zeros(), &dxi_dx, CV),
        StabilizationTau::zero()
    );
    let nan_velocity = Vector3::new(f64::NAN, 0.0, 0.0);
    assert_eq!(
        StabilizationTau::compute(1.0, &nan_velocity, &dxi_dx, CV),
        StabilizationTau::zero()
    );
}

#[test]
fn streamline_upwind_flux_vanishes_for_uniform_states() {
    let q = Vector5::new(1.0, 10.0, 0.0, -5.0, 2.5e5);
    let state = FlowState::from_conserved(&q, GAMMA);
    let tau = StabilizationTau::compute(state.density, &state.velocity, &Matrix3::identity(), CV);
    let flux = streamline_upwind_flux(&flux_jacobians(&state, GAMMA), &tau, &Matrix5x3::zeros());
    assert_eq!(flux, Matrix5x3::zeros());
}

proptest! {
    #[test]
    fn flux_jacobians_match_finite_differences(q in conserved_flow_state(CV)) {
        let state = FlowState::from_conserved(&q, GAMMA);
        let analytic = flux_jacobians(&state, GAMMA);
        let numerical = flux_jacobians_fd(&q);
        for i in 0..3 {
            assert_relatively_close(&analytic[i], &numerical[i], 1e-6);
        }
    }

    #[test]
    fn flux_jacobians_are_homogeneous_of_degree_one(q in conserved_flow_state(CV)) {
        // Euler's identity for the homogeneous inviscid flux: A_i q = F_i
        let state = FlowState::from_conserved(&q, GAMMA);
        let jacobians = flux_jacobians(&state, GAMMA);
        let flux = inviscid_flux(&state);
        for i in 0..3 {
            let column = flux.column(i).into_owned();
            let scale = column.amax().max(1.0);
            prop_assert!((jacobians[i] * q - column).amax() <= 1e-10 * scale);
        }
    }

    #[test]
    fn streamline_upwind_flux_matches_assembled_formula(
        q in conserved_flow_state(CV),
        dxi_dx in well_conditioned_jacobian3(),
        grad in gradient_entries(15, 1.0),
    ) {
        let state = FlowState::from_conserved(&q, GAMMA);
        let tau = StabilizationTau::compute(state.density, &state.velocity, &dxi_dx, CV);
        // Gradients scaled per variable so that every row contributes
        let grad_q = Matrix5x3::from_column_slice(&grad)
            .component_mul(&Matrix5x3::from_fn(|r, _| q[r].abs().max(1.0)));

        let numerical = flux_jacobians_fd(&q);
        let mut strong_residual = Vector5::zeros();
        for j in 0..3 {
            strong_residual += numerical[j] * grad_q.column(j);
        }
        let weighted = strong_residual.component_mul(&tau.diagonal());
        let expected = Matrix5x3::from_fn(|m, i| numerical[i].column(m).dot(&weighted));

        let actual = streamline_upwind_flux(&flux_jacobians(&state, GAMMA), &tau, &grad_q);
        assert_relatively_close(&actual, &expected, 1e-5);
    }

    #[test]
    fn streamline_upwind_flux_is_linear_in_the_gradient(
        q in conserved_flow_state(CV),
        grad in gradient_entries(15, 1.0),
        alpha in -3.0..3.0,
    ) {
        let state = FlowState::from_conserved(&q, GAMMA);
        let jacobians = flux_jacobians(&state, GAMMA);
        let tau = StabilizationTau::compute(state.density, &state.velocity, &Matrix3::identity(), CV);
        let grad_q = Matrix5x3::from_column_slice(&grad);
        let single = streamline_upwind_flux(&jacobians, &tau, &grad_q);
        let scaled = streamline_upwind_flux(&jacobians, &tau, &(grad_q * alpha));
        assert_matrix_eq!(scaled, single * alpha, comp = abs, tol = 1e-9 * single.amax().max(1.0));
    }
}
