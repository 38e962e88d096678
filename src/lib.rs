//! Pointwise kernels evaluated at the quadrature points of a finite element discretization.
//!
//! A kernel reads interpolated field values, reference-space gradients and geometric factors
//! at each quadrature point of a batch, and writes the contributions that the surrounding
//! finite element framework integrates against test-function values and gradients. Mesh,
//! basis and assembly machinery live outside this crate.
//!
//! - [`layout`] describes how fields are packed into flat buffers.
//! - [`pointwise`] defines the kernel contract and the tiled (optionally parallel) point loop.
//! - [`context`] binds positional context blocks to named configurations.
//! - [`tensor`] and [`geometry`] hold the shared small tensor algebra.
//! - [`kernels`] contains the physics: mass and diffusion operators, the compressible
//!   density current and the shallow-water equations.
pub mod context;
pub mod error;
pub mod geometry;
pub mod kernels;
pub mod layout;
pub mod pointwise;
pub mod tensor;

pub mod allocators {
    pub use qkernels_traits::allocators::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use qkernels_traits::{Real, SmallDim};
