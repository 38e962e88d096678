//! The pointwise kernel contract and the tiled loop that drives it.
use crate::error::KernelError;
use crate::layout::{FieldSpec, PackedInputs, PackedOutputs, PointInput, PointOutput};
use log::{debug, trace};
use qkernels_traits::Real;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How the points of a batch are scheduled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Execution {
    Sequential,
    /// Tiles of points are distributed over the global `rayon` thread pool.
    Parallel,
}

/// Executes a per-point body once for every quadrature point of a batch.
///
/// Points are grouped into tiles of `tile_width` consecutive indices. The tile width is a
/// scheduling hint only: since no point may observe another point's writes, results do not
/// depend on it, nor on the execution policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointLoop {
    tile_width: usize,
    execution: Execution,
}

impl Default for PointLoop {
    fn default() -> Self {
        Self {
            tile_width: 64,
            execution: Execution::Parallel,
        }
    }
}

impl PointLoop {
    pub fn sequential() -> Self {
        Self::default().with_execution(Execution::Sequential)
    }

    pub fn parallel() -> Self {
        Self::default().with_execution(Execution::Parallel)
    }

    /// Sets the tile width. A width of zero is treated as one.
    pub fn with_tile_width(self, tile_width: usize) -> Self {
        Self {
            tile_width: tile_width.max(1),
            ..self
        }
    }

    pub fn with_execution(self, execution: Execution) -> Self {
        Self { execution, ..self }
    }

    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    pub fn num_tiles(&self, num_points: usize) -> usize {
        num_points / self.tile_width + usize::from(num_points % self.tile_width != 0)
    }

    fn tile_range(&self, tile: usize, num_points: usize) -> Range<usize> {
        let begin = tile * self.tile_width;
        let end = usize::min(begin.saturating_add(self.tile_width), num_points);
        begin..end
    }

    /// Calls `f(i)` once for every `i` in `0 .. num_points`.
    ///
    /// Stops at the first error and returns it. In parallel mode other tiles may still be
    /// in flight when the error is observed, so which error is returned when several
    /// points fail is unspecified.
    pub fn try_for_each_point<E, F>(&self, num_points: usize, f: F) -> Result<(), E>
    where
        E: Send,
        F: Fn(usize) -> Result<(), E> + Sync + Send,
    {
        let num_tiles = self.num_tiles(num_points);
        trace!(
            "Scheduling {} points in {} tiles of width {} ({:?})",
            num_points,
            num_tiles,
            self.tile_width,
            self.execution
        );
        let run_tile = |tile: usize| -> Result<(), E> {
            for i in self.tile_range(tile, num_points) {
                f(i)?;
            }
            Ok(())
        };
        match self.execution {
            Execution::Sequential => (0..num_tiles).try_for_each(run_tile),
            Execution::Parallel => (0..num_tiles).into_par_iter().try_for_each(run_tile),
        }
    }
}

/// A pure function evaluated independently at every quadrature point.
///
/// Implementors declare their packed input and output fields and evaluate a single point.
/// The batch entry point [`apply`](Self::apply) validates the field layout once and then
/// drives [`evaluate_point`](Self::evaluate_point) through a [`PointLoop`].
///
/// Kernels carry their (immutable) context as regular struct fields, and must not hold
/// any state that changes between points or between batches.
pub trait PointwiseKernel<T: Real>: Sync {
    fn name(&self) -> &'static str;

    fn input_fields(&self) -> Vec<FieldSpec>;

    fn output_fields(&self) -> Vec<FieldSpec>;

    /// Evaluates the kernel at the point that `input` and `output` are bound to.
    ///
    /// Must write every component of every output field.
    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError>;

    /// Evaluates the kernel at all `num_points` points of a batch.
    ///
    /// `input_offsets` and `output_offsets` hold the base offset of each declared field
    /// in `input` and `output`, respectively. On error, the contents of `output` are
    /// unspecified.
    fn apply(
        &self,
        point_loop: &PointLoop,
        num_points: usize,
        input_offsets: &[usize],
        output_offsets: &[usize],
        input: &[T],
        output: &mut [T],
    ) -> Result<(), KernelError> {
        let input_fields = self.input_fields();
        let output_fields = self.output_fields();
        let inputs = PackedInputs::new(input, input_offsets, &input_fields, num_points)?;
        let outputs = PackedOutputs::new(output, output_offsets, &output_fields, num_points)?;

        debug!(
            "Applying kernel `{}` to {} points ({:?}, tile width {})",
            self.name(),
            num_points,
            point_loop.execution(),
            point_loop.tile_width()
        );

        point_loop.try_for_each_point(num_points, |i| {
            let point_input = inputs.at_point(i);
            // SAFETY: The loop visits every point exactly once, so this is the only
            // output accessor for point i.
            let mut point_output = unsafe { outputs.at_point(i) };
            self.evaluate_point(&point_input, &mut point_output)
        })
    }
}

impl<T: Real, K: PointwiseKernel<T> + ?Sized> PointwiseKernel<T> for Box<K> {
    fn name(&self) -> &'static str {
        K::name(self)
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        K::input_fields(self)
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        K::output_fields(self)
    }

    fn evaluate_point(&self, input: &PointInput<T>, output: &mut PointOutput<T>) -> Result<(), KernelError> {
        K::evaluate_point(self, input, output)
    }

    fn apply(
        &self,
        point_loop: &PointLoop,
        num_points: usize,
        input_offsets: &[usize],
        output_offsets: &[usize],
        input: &[T],
        output: &mut [T],
    ) -> Result<(), KernelError> {
        K::apply(self, point_loop, num_points, input_offsets, output_offsets, input, output)
    }
}

/// Offsets for fields packed back to back, in declaration order, for a batch of `num_points`.
///
/// Returns the offsets together with the total buffer length.
pub fn contiguous_offsets(fields: &[FieldSpec], num_points: usize) -> (Vec<usize>, usize) {
    let mut offset = 0;
    let offsets = fields
        .iter()
        .map(|field| {
            let begin = offset;
            offset += field.num_components * num_points;
            begin
        })
        .collect();
    (offsets, offset)
}
