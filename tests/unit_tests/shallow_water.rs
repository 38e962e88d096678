use crate::{evaluate, evaluate_single, packed_matrix, qdata_from_jacobian, PackedBatch};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, DVectorView, DVectorViewMut, Matrix2, Matrix3x2, Vector2, Vector3};
use proptest::prelude::*;
use qkernels::kernels::shallow_water::{
    ShallowWaterExplicit, ShallowWaterExplicitContext, ShallowWaterImplicit, ShallowWaterImplicitContext,
    ShallowWaterJacobian, ShallowWaterSetup, ShallowWaterSetupContext,
};
use qkernels::proptest::{gradient_entries, well_conditioned_jacobian2};
use qkernels_calculus::approximate_directional_derivative_fd;

const GRAVITY: f64 = 9.81;

fn implicit_kernel() -> ShallowWaterImplicit<f64> {
    ShallowWaterImplicit::new(ShallowWaterImplicitContext { gravity: GRAVITY })
}

fn jacobian_kernel() -> ShallowWaterJacobian<f64> {
    ShallowWaterJacobian::new(ShallowWaterImplicitContext { gravity: GRAVITY })
}

#[test]
fn setup_produces_uniform_state_over_sinusoidal_terrain() {
    let setup = ShallowWaterSetup::new(ShallowWaterSetupContext {
        u0: 1.0,
        v0: -0.5,
        h0: 12.0,
    });
    let points = [[0.3, 1.2], [0.0, 0.0], [-2.0, 5.0]];
    let mut inputs = PackedBatch::inputs_for(&setup, points.len());
    for (i, x) in points.iter().enumerate() {
        inputs.set_point(0, i, x);
    }
    let outputs = evaluate(&setup, &inputs);

    for (i, x) in points.iter().enumerate() {
        assert_eq!(outputs.point_values(0, i), vec![1.0, -0.5, 12.0]);
        assert_eq!(outputs.get(1, i, 0), x[0].sin() + x[1].cos());
        assert_eq!(outputs.get(2, i, 0), 0.0);
        assert_eq!(outputs.point_values(3, i), x.to_vec());
    }
    assert_eq!(outputs.get(1, 1, 0), 1.0);
    assert_eq!(
        ShallowWaterSetup::terrain_height(&Vector2::new(0.3, 1.2)),
        outputs.get(1, 0, 0)
    );
}

#[test]
fn explicit_operator_with_identity_geometry() {
    let f = 0.5;
    let kernel = ShallowWaterExplicit::new(ShallowWaterExplicitContext { coriolis: f });
    let (u, v) = (2.0, -1.0);
    #[rustfmt::skip]
    let grad = Matrix3x2::new(
        0.1, 0.2,
        0.3, -0.4,
        5.0, 6.0);
    let weight = 0.25;
    let qdata = qdata_from_jacobian(&Matrix2::identity(), weight);
    let outputs = evaluate_single(&kernel, &[&[u, v, 10.0], &packed_matrix(&grad), &qdata, &[0.0, 0.0]]);

    let expected_0 = -weight * (u * 0.1 + v * 0.2 + f * v);
    let expected_1 = -weight * (u * 0.3 + v * -0.4 - f * u);
    let result = outputs.point_values(0, 0);
    assert_scalar_eq!(result[0], expected_0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(result[1], expected_1, comp = abs, tol = 1e-14);
    assert_eq!(result[2], 0.0);
    assert_eq!(outputs.point_values(1, 0), vec![0.0; 6]);
}

#[test]
fn explicit_coriolis_force_rotates_velocity() {
    // With no velocity gradient only the Coriolis term remains, and it is orthogonal to u
    let kernel = ShallowWaterExplicit::new(ShallowWaterExplicitContext { coriolis: 1e-4 });
    let qdata = qdata_from_jacobian(&Matrix2::identity(), 1.0);
    let u = [3.0, 4.0];
    let outputs = evaluate_single(&kernel, &[&[u[0], u[1], 1.0], &[0.0; 6], &qdata, &[0.0, 0.0]]);
    let v = outputs.point_values(0, 0);
    assert_scalar_eq!(v[0] * u[0] + v[1] * u[1], 0.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(v[0], -1e-4 * 4.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(v[1], 1e-4 * 3.0, comp = abs, tol = 1e-15);
}

#[test]
fn implicit_operator_with_identity_geometry() {
    let kernel = implicit_kernel();
    let (u, v, h) = (1.5, -2.0, 8.0);
    let (terrain, reference_height) = (0.5, 2.0);
    let weight = 2.0;
    let qdata = qdata_from_jacobian(&Matrix2::identity(), weight);
    let outputs = evaluate_single(
        &kernel,
        &[&[u, v, h], &[1.0; 6], &qdata, &[0.0, 0.0], &[terrain], &[reference_height]],
    );

    assert_eq!(outputs.point_values(0, 0), vec![0.0; 3]);
    let dv = Matrix3x2::from_column_slice(&outputs.point_values(1, 0));
    let pressure = -weight * GRAVITY * (h + terrain);
    #[rustfmt::skip]
    let expected = Matrix3x2::new(
        pressure, 0.0,
        0.0, pressure,
        -weight * (h + reference_height) * u, -weight * (h + reference_height) * v);
    assert_matrix_eq!(dv, expected, comp = abs, tol = 1e-12);
}

#[test]
fn jacobian_output_vanishes_without_increment() {
    let kernel = jacobian_kernel();
    let qdata = qdata_from_jacobian(&Matrix2::new(1.0, 0.2, 0.1, 2.0), 0.5);
    let outputs = evaluate_single(&kernel, &[&[1.0, 2.0, 3.0], &[0.0; 3], &qdata, &[1.0]]);
    assert_eq!(outputs.point_values(0, 0), vec![0.0; 3]);
    assert!(outputs.point_values(1, 0).iter().all(|&x| x == 0.0));
}

proptest! {
    #[test]
    fn explicit_operator_uses_physical_gradients(
        jacobian in well_conditioned_jacobian2(),
        state in gradient_entries(3, 5.0),
        reference_grad in gradient_entries(6, 1.0),
    ) {
        let f = 1e-2;
        let kernel = ShallowWaterExplicit::new(ShallowWaterExplicitContext { coriolis: f });
        let qdata = qdata_from_jacobian(&jacobian, 1.0);
        let outputs = evaluate_single(&kernel, &[&state, &reference_grad, &qdata, &[0.0, 0.0]]);

        let dxi_dx = jacobian.try_inverse().unwrap();
        let grad = Matrix3x2::from_column_slice(&reference_grad) * dxi_dx;
        let u = Vector2::new(state[0], state[1]);
        let wdetj = jacobian.determinant();
        let advection = grad.fixed_rows::<2>(0) * u;
        let expected = Vector3::new(
            -wdetj * (advection[0] + f * u[1]),
            -wdetj * (advection[1] - f * u[0]),
            0.0,
        );
        let actual = Vector3::from_column_slice(&outputs.point_values(0, 0));
        assert_matrix_eq!(actual, expected, comp = abs, tol = 1e-10);
    }

    #[test]
    fn jacobian_matches_directional_derivative_of_implicit_operator(
        jacobian in well_conditioned_jacobian2(),
        weight in 0.1..2.0,
        velocity in gradient_entries(2, 3.0),
        height in 1.0..20.0,
        delta_q in gradient_entries(3, 1.0),
        terrain in -1.0..1.0,
        reference_height in 0.0..5.0,
    ) {
        let qdata = qdata_from_jacobian(&jacobian, weight);
        let x = [0.1, 0.2];

        let implicit = implicit_kernel();
        let residual_dv = |q: DVectorView<f64>, mut dv: DVectorViewMut<f64>| {
            let outputs = evaluate_single(
                &implicit,
                &[q.as_slice(), &[0.0; 6], &qdata, &x, &[terrain], &[reference_height]],
            );
            dv.copy_from_slice(&outputs.point_values(1, 0));
        };
        let q = DVector::from_column_slice(&[velocity[0], velocity[1], height]);
        let direction = DVector::from_column_slice(&delta_q);
        let expected = approximate_directional_derivative_fd(
            6,
            residual_dv,
            DVectorView::from(&q),
            DVectorView::from(&direction),
            1e-6,
        );

        let outputs = evaluate_single(
            &jacobian_kernel(),
            &[q.as_slice(), &delta_q, &qdata, &[reference_height]],
        );
        prop_assert_eq!(outputs.point_values(0, 0), vec![0.0; 3]);
        let actual = DVector::from_column_slice(&outputs.point_values(1, 0));
        assert_matrix_eq!(actual, expected, comp = abs, tol = 1e-6 * expected.amax().max(1.0));
    }
}
