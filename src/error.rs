//! Error types reported by pointwise kernels.
use std::fmt;
use std::fmt::{Display, Formatter};

/// A packed field layout that was rejected before any point was evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutError {
    /// The offset table does not have one entry per declared field.
    OffsetCount { expected: usize, actual: usize },
    /// A field extends past the end of the flat buffer.
    FieldOutOfBounds {
        field: &'static str,
        /// One past the last element the field would occupy, or `None` on overflow.
        end: Option<usize>,
        len: usize,
    },
    /// Two output fields share storage, so points could not be written independently.
    OverlappingFields { first: &'static str, second: &'static str },
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffsetCount { expected, actual } => {
                write!(f, "expected {expected} field offsets, but got {actual}")
            }
            Self::FieldOutOfBounds { field, end, len } => match end {
                Some(end) => write!(
                    f,
                    "field `{field}` ends at index {end}, but the buffer only has {len} entries"
                ),
                None => write!(f, "extent of field `{field}` overflows the buffer index range"),
            },
            Self::OverlappingFields { first, second } => {
                write!(f, "output fields `{first}` and `{second}` overlap")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// The failure status of a kernel batch evaluation.
///
/// When a kernel returns an error, the contents of its output buffer are unspecified.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum KernelError {
    Layout(LayoutError),
    /// A physical-validity precondition did not hold at the given quadrature point.
    NonPhysicalState {
        kernel: &'static str,
        point: usize,
        quantity: &'static str,
        value: f64,
    },
    /// The reference-to-physical map is singular at the given quadrature point.
    SingularJacobian { kernel: &'static str, point: usize },
}

impl Display for KernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(err) => write!(f, "invalid field layout: {err}"),
            Self::NonPhysicalState {
                kernel,
                point,
                quantity,
                value,
            } => write!(
                f,
                "kernel `{kernel}` encountered non-physical {quantity} = {value} at quadrature point {point}"
            ),
            Self::SingularJacobian { kernel, point } => {
                write!(f, "kernel `{kernel}` encountered a singular Jacobian at quadrature point {point}")
            }
        }
    }
}

impl std::error::Error for KernelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LayoutError> for KernelError {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}
