//! Strategies for property-based testing of pointwise kernels.
use crate::pointwise::{Execution, PointLoop};
use ::proptest::prelude::*;
use nalgebra::{Matrix2, Matrix3, Vector3, Vector5};

/// Any valid point loop configuration.
pub fn point_loop() -> impl Strategy<Value = PointLoop> {
    let execution = prop_oneof![Just(Execution::Sequential), Just(Execution::Parallel)];
    (1usize..=128, execution).prop_map(|(tile_width, execution)| {
        PointLoop::default()
            .with_tile_width(tile_width)
            .with_execution(execution)
    })
}

/// A diagonally dominant, and hence invertible, 2x2 Jacobian with positive determinant.
pub fn well_conditioned_jacobian2() -> impl Strategy<Value = Matrix2<f64>> {
    let diagonal = 0.5..2.0;
    let off_diagonal = -0.2..0.2;
    ([diagonal.clone(), diagonal], [off_diagonal.clone(), off_diagonal])
        .prop_map(|([a, d], [b, c])| Matrix2::new(a, b, c, d))
}

/// A diagonally dominant, and hence invertible, 3x3 Jacobian with positive determinant.
pub fn well_conditioned_jacobian3() -> impl Strategy<Value = Matrix3<f64>> {
    let diagonal = 0.5..2.0;
    let off_diagonal = -0.2..0.2;
    (
        [diagonal.clone(), diagonal.clone(), diagonal],
        [
            off_diagonal.clone(),
            off_diagonal.clone(),
            off_diagonal.clone(),
            off_diagonal.clone(),
            off_diagonal.clone(),
            off_diagonal,
        ],
    )
        .prop_map(|(d, o)| {
            #[rustfmt::skip]
            let jacobian = Matrix3::new(
                d[0], o[0], o[1],
                o[2], d[1], o[3],
                o[4], o[5], d[2]);
            jacobian
        })
}

/// A conserved compressible-flow state $(\rho, U, E)$ with positive density and positive
/// internal energy, for an ideal gas with the given `cv`.
pub fn conserved_flow_state(cv: f64) -> impl Strategy<Value = Vector5<f64>> {
    let density = 0.5..2.0;
    let velocity = [-50.0..50.0, -50.0..50.0, -50.0..50.0];
    let temperature = 250.0..320.0;
    (density, velocity, temperature).prop_map(move |(rho, [u, v, w], temperature)| {
        let velocity = Vector3::new(u, v, w);
        let energy = rho * (cv * temperature + 0.5 * velocity.norm_squared());
        Vector5::new(rho, rho * u, rho * v, rho * w, energy)
    })
}

/// Entries of a reference gradient, scaled so that the resulting fields vary moderately.
pub fn gradient_entries(len: usize, scale: f64) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-scale..scale, len)
}
