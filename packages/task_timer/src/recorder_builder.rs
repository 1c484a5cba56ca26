use std::num::NonZero;

use crate::pal::PlatformFacade;
use crate::{DEFAULT_BLOCK_SIZE, Recorder};

/// Configures and creates a [`Recorder`].
///
/// Obtained via [`Recorder::builder()`].
#[derive(Debug)]
#[must_use]
pub struct RecorderBuilder {
    sample_block_size: NonZero<usize>,
}

impl RecorderBuilder {
    pub(crate) fn new() -> Self {
        Self {
            sample_block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Sets how many samples each block of a task's sample series holds.
    ///
    /// Larger blocks mean fewer allocations for tasks with many cycles, at the cost of more
    /// memory for tasks with few. Defaults to [`DEFAULT_BLOCK_SIZE`].
    pub fn sample_block_size(mut self, block_size: NonZero<usize>) -> Self {
        self.sample_block_size = block_size;
        self
    }

    /// Creates the recorder.
    #[must_use]
    pub fn build(self) -> Recorder {
        Recorder::from_parts(self.sample_block_size, PlatformFacade::real())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn defaults_to_default_block_size() {
        let builder = Recorder::builder();

        assert_eq!(builder.sample_block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn sample_block_size_is_applied() {
        let builder = Recorder::builder().sample_block_size(nz!(3));

        assert_eq!(builder.sample_block_size.get(), 3);

        let recorder = builder.build();
        assert!(recorder.is_empty());
    }
}
