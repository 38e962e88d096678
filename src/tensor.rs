//! Small dense tensor routines shared by the flux kernels.
//!
//! Conventions:
//!
//! - `dxi_dx` denotes the inverse Jacobian of the reference-to-physical map, with entry
//!   `(l, k)` equal to $\partial \xi_l / \partial x_k$.
//! - A gradient of an `N`-component field is an `N x D` matrix with entry `(c, k)` equal to
//!   the derivative of component `c` in direction `k`.
//! - Symmetric tensors are packed row-wise upper triangular, i.e. `(11, 12, 13, 22, 23, 33)`
//!   in three dimensions and `(11, 12, 22)` in two.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Matrix3, OMatrix, OVector, Scalar, Vector3};
use numeric_literals::replace_float_literals;
use qkernels_traits::allocators::{DimAllocator, FieldAllocator};
use qkernels_traits::{Real, SmallDim};
use serde::{Deserialize, Serialize};

/// Maps reference-space derivatives to physical-space derivatives by the chain rule,
///
/// $$ \frac{\partial u_c}{\partial x_k} = \sum_l \frac{\partial u_c}{\partial \xi_l} \frac{\partial \xi_l}{\partial x_k}, $$
///
/// for a field with any number of components.
pub fn physical_gradient<T, N, D>(reference_gradient: &OMatrix<T, N, D>, dxi_dx: &OMatrix<T, D, D>) -> OMatrix<T, N, D>
where
    T: Real,
    N: DimName,
    D: DimName,
    DefaultAllocator: FieldAllocator<T, N, D>,
{
    reference_gradient * dxi_dx
}

/// Pulls a physical flux back to the coefficients of the reference test-function gradients,
///
/// $$ G_{cj} = \sum_k F_{ck} \frac{\partial \xi_j}{\partial x_k}, $$
///
/// so that $F : \nabla_x v = G : \nabla_\xi v$.
pub fn reference_flux<T, N, D>(flux: &OMatrix<T, N, D>, dxi_dx: &OMatrix<T, D, D>) -> OMatrix<T, N, D>
where
    T: Real,
    N: DimName,
    D: DimName,
    DefaultAllocator: FieldAllocator<T, N, D>,
{
    flux * dxi_dx.transpose()
}

/// The metric tensor $g = (\frac{\partial \xi}{\partial x})^T \frac{\partial \xi}{\partial x}$ induced by the inverse Jacobian.
///
/// For a physical vector $u$, $u^T g u$ is the squared length of $u$ measured in
/// reference coordinates.
pub fn metric<T, D>(dxi_dx: &OMatrix<T, D, D>) -> OMatrix<T, D, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    dxi_dx.tr_mul(dxi_dx)
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn kinetic_energy<T, D>(velocity: &OVector<T, D>) -> T
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    0.5 * velocity.norm_squared()
}

/// Ideal-gas pressure $P = (\gamma - 1)(E - \rho \, k_e)$ for total energy density $E$
/// and specific kinetic energy $k_e$.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn ideal_gas_pressure<T: Real>(gamma: T, density: T, total_energy: T, kinetic_energy: T) -> T {
    (gamma - 1.0) * (total_energy - density * kinetic_energy)
}

/// Length of the packed representation of a symmetric `d x d` tensor.
pub const fn packed_symmetric_len(d: usize) -> usize {
    d * (d + 1) / 2
}

/// Position of entry `(i, j)` of a symmetric `d x d` tensor in its packed representation.
///
/// The entry `(j, i)` maps to the same position.
pub const fn packed_symmetric_index(d: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    // Rows 0..i contribute d + (d - 1) + ... + (d - i + 1) entries
    i * d - i * i.saturating_sub(1) / 2 + (j - i)
}

/// Packs the upper triangle of `matrix` into `packed`.
///
/// # Panics
///
/// Panics if `packed` does not have length `D (D + 1) / 2`.
pub fn pack_symmetric_into<T, D>(packed: &mut [T], matrix: &OMatrix<T, D, D>)
where
    T: Scalar + Copy,
    D: DimName,
    DefaultAllocator: Allocator<T, D, D>,
{
    let d = D::dim();
    assert_eq!(packed.len(), packed_symmetric_len(d), "Packed length mismatch");
    for i in 0..d {
        for j in i..d {
            packed[packed_symmetric_index(d, i, j)] = matrix[(i, j)];
        }
    }
}

/// Expands a packed symmetric tensor into a full matrix.
///
/// # Panics
///
/// Panics if `packed` does not have length `D (D + 1) / 2`.
pub fn unpack_symmetric<T, D>(packed: &[T]) -> OMatrix<T, D, D>
where
    T: Scalar + Copy,
    D: DimName,
    DefaultAllocator: Allocator<T, D, D>,
{
    let d = D::dim();
    assert_eq!(packed.len(), packed_symmetric_len(d), "Packed length mismatch");
    OMatrix::<T, D, D>::from_fn(|i, j| packed[packed_symmetric_index(d, i, j)])
}

/// A symmetric 3x3 tensor stored in packed form `(11, 12, 13, 22, 23, 33)`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetricTensor3<T> {
    packed: [T; 6],
}

impl<T: Real> SymmetricTensor3<T> {
    /// Row `i`, column `j` of the tensor lives at `packed[INDEX_MAP[i][j]]`.
    pub const INDEX_MAP: [[usize; 3]; 3] = [[0, 1, 2], [1, 3, 4], [2, 4, 5]];

    pub fn from_packed(packed: [T; 6]) -> Self {
        Self { packed }
    }

    /// Packs the upper triangle of `matrix`. The lower triangle is not read.
    pub fn from_upper_triangle(matrix: &Matrix3<T>) -> Self {
        let m = matrix;
        Self {
            packed: [m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 1)], m[(1, 2)], m[(2, 2)]],
        }
    }

    pub fn packed(&self) -> &[T; 6] {
        &self.packed
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        self.packed[Self::INDEX_MAP[i][j]]
    }

    pub fn to_matrix(&self) -> Matrix3<T> {
        Matrix3::from_fn(|i, j| self.get(i, j))
    }

    pub fn mul_vector(&self, v: &Vector3<T>) -> Vector3<T> {
        Vector3::from_fn(|i, _| (0..3).fold(T::zero(), |acc, j| acc + self.get(i, j) * v[j]))
    }
}

/// Adjugate (transposed cofactor matrix) of a matrix of dimension 1, 2 or 3.
///
/// Satisfies $\operatorname{adj}(A) A = \det(A) I$ without dividing by the determinant.
pub fn adjugate<T, D>(matrix: &OMatrix<T, D, D>) -> OMatrix<T, D, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let m = matrix;
    match D::dim() {
        1 => OMatrix::<T, D, D>::identity(),
        2 => OMatrix::<T, D, D>::from_fn(|i, j| {
            // adj(A)_ij = (-1)^(i+j) A_(1-j)(1-i)
            let value = m[(1 - j, 1 - i)];
            if i == j {
                value
            } else {
                -value
            }
        }),
        3 => OMatrix::<T, D, D>::from_fn(|i, j| {
            // The cyclic index choice absorbs the cofactor sign
            let (r1, r2) = ((j + 1) % 3, (j + 2) % 3);
            let (c1, c2) = ((i + 1) % 3, (i + 2) % 3);
            m[(r1, c1)] * m[(r2, c2)] - m[(r1, c2)] * m[(r2, c1)]
        }),
        _ => unreachable!("SmallDim is sealed to dimensions 1 to 3"),
    }
}

/// Determinant of a matrix of dimension 1, 2 or 3 using the closed-form expansions.
pub fn determinant<T, D>(matrix: &OMatrix<T, D, D>) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let m = matrix;
    match D::dim() {
        1 => m[(0, 0)],
        2 => m[(0, 0)] * m[(1, 1)] - m[(1, 0)] * m[(0, 1)],
        3 => {
            m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
                - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
                + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
        }
        _ => unreachable!("SmallDim is sealed to dimensions 1 to 3"),
    }
}
