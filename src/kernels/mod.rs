//! The pointwise physics kernels.
//!
//! Every kernel implements [`PointwiseKernel`](crate::pointwise::PointwiseKernel) and is
//! configured through an explicit context struct that can also be bound from a positional
//! context block via [`KernelContext`](crate::context::KernelContext).
pub mod compressible;
pub mod density_current;
pub mod diffusion;
pub mod mass;
pub mod shallow_water;
