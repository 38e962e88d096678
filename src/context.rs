//! Binding of positional context blocks to named kernel configurations.
//!
//! Kernels are configured through named structs. For callers that still ship
//! a flat block of scalars, each configuration type documents its positional layout through
//! [`KernelContext::LAYOUT`] and can be read from (and written to) such a block.
use eyre::eyre;
use log::warn;
use qkernels_traits::Real;

/// A kernel configuration that can be bound from a positional context block.
pub trait KernelContext<T: Real>: Sized {
    /// Names of the scalars in the block, in the order they are read.
    const LAYOUT: &'static [&'static str];

    /// Reads the configuration from `block`, validating its length and contents.
    fn from_context_block(block: &[T]) -> eyre::Result<Self>;

    /// Writes the configuration in the order given by [`LAYOUT`](Self::LAYOUT).
    fn to_context_block(&self) -> Vec<T>;
}

/// Sequential reader over a positional context block.
///
/// The block must hold at least the scalars named in the layout. Trailing entries are
/// permitted only when the layout marks them as optional.
#[derive(Debug)]
pub struct ContextReader<'a, T> {
    kernel: &'static str,
    block: &'a [T],
    layout: &'static [&'static str],
    required: usize,
    position: usize,
}

impl<'a, T: Real> ContextReader<'a, T> {
    /// Creates a reader that requires every entry of `layout` to be present.
    pub fn new(kernel: &'static str, block: &'a [T], layout: &'static [&'static str]) -> eyre::Result<Self> {
        Self::with_optional_tail(kernel, block, layout, layout.len())
    }

    /// Creates a reader for which only the first `required` entries of `layout` must be present.
    pub fn with_optional_tail(
        kernel: &'static str,
        block: &'a [T],
        layout: &'static [&'static str],
        required: usize,
    ) -> eyre::Result<Self> {
        debug_assert!(required <= layout.len());
        if block.len() < required {
            return Err(eyre!(
                "context block for `{}` has {} entries, but at least {} are required ({})",
                kernel,
                block.len(),
                required,
                layout[..required].join(", ")
            ));
        }
        if block.len() > layout.len() {
            warn!(
                "Context block for `{}` has {} entries, but only {} are declared. Ignoring the remainder.",
                kernel,
                block.len(),
                layout.len()
            );
        }
        Ok(Self {
            kernel,
            block,
            layout,
            required,
            position: 0,
        })
    }

    fn current_name(&self) -> &'static str {
        self.layout.get(self.position).copied().unwrap_or("<undeclared>")
    }

    /// Reads the next required scalar.
    pub fn read(&mut self) -> eyre::Result<T> {
        if self.position >= self.required {
            return Err(eyre!(
                "attempted to read undeclared required entry {} of context block for `{}`",
                self.position,
                self.kernel
            ));
        }
        let value = self.block[self.position];
        self.position += 1;
        Ok(value)
    }

    /// Reads the next required scalar and checks that it is finite and strictly positive.
    pub fn read_positive(&mut self) -> eyre::Result<T> {
        let name = self.current_name();
        let value = self.read()?;
        if value.is_finite() && value > T::zero() {
            Ok(value)
        } else {
            Err(eyre!(
                "context entry `{}` for `{}` must be positive and finite, got {}",
                name,
                self.kernel,
                value
            ))
        }
    }

    /// Reads the next required scalar and checks that it is finite and non-negative.
    pub fn read_non_negative(&mut self) -> eyre::Result<T> {
        let name = self.current_name();
        let value = self.read()?;
        if value.is_finite() && value >= T::zero() {
            Ok(value)
        } else {
            Err(eyre!(
                "context entry `{}` for `{}` must be non-negative and finite, got {}",
                name,
                self.kernel,
                value
            ))
        }
    }

    /// Reads the next required scalar and checks that it is finite.
    pub fn read_finite(&mut self) -> eyre::Result<T> {
        let name = self.current_name();
        let value = self.read()?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(eyre!("context entry `{}` for `{}` must be finite, got {}", name, self.kernel, value))
        }
    }

    /// Reads a flag. Any non-zero value is `true`.
    pub fn read_flag(&mut self) -> eyre::Result<bool> {
        Ok(self.read()? != T::zero())
    }

    /// Reads a non-negative integer count.
    pub fn read_count(&mut self) -> eyre::Result<usize> {
        let name = self.current_name();
        let value = self.read()?;
        decode_count(value).ok_or_else(|| {
            eyre!(
                "context entry `{}` for `{}` must be a non-negative integer, got {}",
                name,
                self.kernel,
                value
            )
        })
    }

    /// Reads the next optional scalar, if the block provides it.
    pub fn read_optional(&mut self) -> Option<T> {
        if self.position < self.layout.len() && self.position < self.block.len() {
            let value = self.block[self.position];
            self.position += 1;
            Some(value)
        } else {
            None
        }
    }
}

fn decode_count<T: Real>(value: T) -> Option<usize> {
    let value = value.to_f64_lossy();
    let is_count = value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64;
    is_count.then(|| value as usize)
}

/// Encodes a flag the way [`ContextReader::read_flag`] decodes it.
pub fn encode_flag<T: Real>(flag: bool) -> T {
    if flag {
        T::one()
    } else {
        T::zero()
    }
}
