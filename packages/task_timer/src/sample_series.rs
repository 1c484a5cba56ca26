//! Append-only block-allocated sample storage.

use std::any::type_name;
use std::fmt;
use std::iter::FusedIterator;
use std::num::NonZero;

use new_zealand::nz;
use num_traits::PrimInt;

use crate::{Error, Result, Statistics};

/// Number of samples stored in each block of a [`SampleSeries`] unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: NonZero<usize> = nz!(4096);

/// An append-only sequence of numeric samples, such as elapsed nanoseconds.
///
/// The samples are stored in fixed-size blocks that are allocated as the series grows. Growing
/// the series never moves existing samples, which keeps appends cheap even with hundreds of
/// millions of samples, while positional access remains O(1).
///
/// The series remembers whether it is sorted. Any mutation forgets this and the next order
/// statistic request sorts the samples again, in place.
///
/// # Examples
///
/// ```
/// use task_timer::SampleSeries;
///
/// let mut series = SampleSeries::<u64>::new();
/// series.add(604);
/// series.add(454);
/// series.add(504);
///
/// let statistics = series.statistics().unwrap();
/// assert_eq!(statistics.min(), 454);
/// assert_eq!(statistics.median(), 504);
/// ```
#[derive(Clone)]
pub struct SampleSeries<T = u64> {
    blocks: Vec<Box<[T]>>,

    // Number of samples written. Everything in the blocks at or beyond this position
    // is unused capacity.
    len: usize,

    block_size: NonZero<usize>,

    // True if the samples are known to be in ascending order.
    sorted: bool,
}

impl<T> SampleSeries<T>
where
    T: PrimInt,
{
    /// Creates an empty series using the [default block size][DEFAULT_BLOCK_SIZE].
    #[must_use]
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Creates an empty series that allocates storage `block_size` samples at a time.
    ///
    /// No memory is allocated until the first sample is added.
    #[must_use]
    pub fn with_block_size(block_size: NonZero<usize>) -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
            block_size,
            // An empty series is trivially sorted.
            sorted: true,
        }
    }

    /// The number of samples per storage block.
    #[must_use]
    pub fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    /// The number of samples in the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the series contains no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the samples are known to be in ascending order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Appends a sample to the end of the series.
    pub fn add(&mut self, value: T) {
        let (block_index, _) = self.locate(self.len);

        if block_index == self.blocks.len() {
            self.blocks
                .push(vec![T::zero(); self.block_size.get()].into_boxed_slice());
        }

        *self
            .slot_mut(self.len)
            .expect("the block containing the next slot was allocated above") = value;

        self.len = self
            .len
            .checked_add(1)
            .expect("sample count overflows usize - this indicates an unrealistic scenario");
        self.sorted = false;
    }

    /// Returns the sample at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is not less than [`len()`](Self::len).
    pub fn get(&self, index: usize) -> Result<T> {
        self.slot(index).copied().ok_or(Error::IndexOutOfRange {
            index,
            len: self.len,
        })
    }

    /// Replaces the sample at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is not less than [`len()`](Self::len).
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.len;

        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }

        let slot = self
            .slot_mut(index)
            .expect("every position below len is in an allocated block");

        *slot = value;
        self.sorted = false;

        Ok(())
    }

    /// Iterates over the samples in their current order.
    ///
    /// Every call starts a new pass from the first sample.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            series: self,
            position: 0,
        }
    }

    /// Appends every sample of `other`, in the order `other` iterates them.
    pub fn extend_from(&mut self, other: &Self) {
        self.extend(other);
    }

    /// Sorts the samples in ascending order, in place.
    ///
    /// Does nothing if the series has not been modified since it was last sorted.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }

        let mut flat = self.iter().collect::<Vec<_>>();
        flat.sort_unstable();

        for (block, chunk) in self
            .blocks
            .iter_mut()
            .zip(flat.chunks(self.block_size.get()))
        {
            block
                .get_mut(..chunk.len())
                .expect("chunks are never longer than a block")
                .copy_from_slice(chunk);
        }

        self.sorted = true;
    }

    /// The exact sum of all samples.
    ///
    /// # Panics
    ///
    /// Panics if a sample does not fit into `i128` or the sum overflows `i128`, which
    /// cannot happen with realistic timing data.
    #[must_use]
    pub fn sum(&self) -> i128 {
        self.iter().fold(0_i128, |sum, value| {
            sum.checked_add(to_wide(value))
                .expect("sample sum overflows i128 - this indicates an unrealistic scenario")
        })
    }

    /// Sorts the series if needed and returns a statistics snapshot over it.
    ///
    /// Returns `None` if the series is empty, to distinguish "no data" from a measured zero.
    pub fn statistics(&mut self) -> Option<Statistics<'_, T>> {
        self.sort();
        Statistics::from_sorted(self)
    }

    #[expect(
        clippy::integer_division,
        clippy::arithmetic_side_effects,
        reason = "block size is non-zero and we want exactly the quotient and remainder"
    )]
    fn locate(&self, index: usize) -> (usize, usize) {
        let block_size = self.block_size.get();
        (index / block_size, index % block_size)
    }

    fn slot(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        let (block_index, offset) = self.locate(index);
        self.blocks
            .get(block_index)
            .and_then(|block| block.get(offset))
    }

    // Unlike `slot()`, this ignores the length and addresses any allocated slot,
    // which is how `add()` writes the slot just past the end.
    fn slot_mut(&mut self, index: usize) -> Option<&mut T> {
        let (block_index, offset) = self.locate(index);
        self.blocks
            .get_mut(block_index)
            .and_then(|block| block.get_mut(offset))
    }
}

/// Converts a sample into the wide integer type used for exact accumulation.
pub(crate) fn to_wide<T>(value: T) -> i128
where
    T: PrimInt,
{
    value
        .to_i128()
        .expect("sample does not fit in i128 - this indicates an unrealistic scenario")
}

impl<T> Default for SampleSeries<T>
where
    T: PrimInt,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SampleSeries<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("len", &self.len)
            .field("block_size", &self.block_size)
            .field("blocks", &self.blocks.len())
            .field("sorted", &self.sorted)
            .finish()
    }
}

impl<T> PartialEq for SampleSeries<T>
where
    T: PrimInt,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T> Eq for SampleSeries<T> where T: PrimInt {}

impl<T> Extend<T> for SampleSeries<T>
where
    T: PrimInt,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<'a, T> Extend<&'a T> for SampleSeries<T>
where
    T: PrimInt + 'a,
{
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl<T> FromIterator<T> for SampleSeries<T>
where
    T: PrimInt,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut series = Self::new();
        series.extend(iter);
        series
    }
}

impl<'a, T> IntoIterator for &'a SampleSeries<T>
where
    T: PrimInt,
{
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the samples of a [`SampleSeries`], created by [`SampleSeries::iter()`].
#[derive(Clone, Debug)]
pub struct Iter<'a, T> {
    series: &'a SampleSeries<T>,
    position: usize,
}

impl<T> Iterator for Iter<'_, T>
where
    T: PrimInt,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let value = self.series.slot(self.position).copied()?;

        self.position = self
            .position
            .checked_add(1)
            .expect("guarded by slot() returning Some for positions below len");

        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.series.len.saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> where T: PrimInt {}

impl<T> FusedIterator for Iter<'_, T> where T: PrimInt {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SampleSeries<u64>: Send, Sync, Clone);

    #[test]
    fn new_series_is_empty_and_unallocated() {
        let series = SampleSeries::<u64>::new();

        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
        assert_eq!(series.block_size(), DEFAULT_BLOCK_SIZE);
        assert!(series.blocks.is_empty());
        assert_eq!(series.iter().count(), 0);
    }

    #[test]
    fn add_allocates_blocks_lazily() {
        let mut series = SampleSeries::<u64>::with_block_size(nz!(3));

        series.add(1);
        assert_eq!(series.blocks.len(), 1);

        series.add(2);
        series.add(3);
        assert_eq!(series.blocks.len(), 1);

        series.add(4);
        assert_eq!(series.blocks.len(), 2);
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn get_reads_across_block_boundaries() {
        let mut series = SampleSeries::<u64>::with_block_size(nz!(2));
        series.extend([10, 20, 30, 40, 50]);

        for (index, expected) in [10, 20, 30, 40, 50].into_iter().enumerate() {
            assert_eq!(series.get(index).unwrap(), expected);
        }
    }

    #[test]
    fn get_out_of_range_fails() {
        let mut series = SampleSeries::<u64>::with_block_size(nz!(4));
        series.add(1);

        // Slot 1 is allocated but not written, so it must still be out of range.
        assert!(matches!(
            series.get(1),
            Err(Error::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(matches!(
            series.get(100),
            Err(Error::IndexOutOfRange { index: 100, len: 1 })
        ));
    }

    #[test]
    fn set_replaces_value_and_clears_sorted_flag() {
        let mut series = SampleSeries::<u64>::new();
        series.extend([1, 2, 3]);
        series.sort();
        assert!(series.is_sorted());

        series.set(0, 9).unwrap();

        assert_eq!(series.get(0).unwrap(), 9);
        assert!(!series.is_sorted());
    }

    #[test]
    fn set_out_of_range_fails_without_mutation() {
        let mut series = SampleSeries::<u64>::with_block_size(nz!(4));
        series.add(5);
        series.sort();

        assert!(matches!(
            series.set(1, 7),
            Err(Error::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert_eq!(series.len(), 1);
        assert!(series.is_sorted());
    }

    #[test]
    fn sort_orders_samples_across_blocks() {
        let mut series = SampleSeries::<u64>::with_block_size(nz!(2));
        series.extend([604, 454, 566, 499, 504]);

        series.sort();

        assert!(series.is_sorted());
        assert_eq!(
            series.iter().collect::<Vec<_>>(),
            vec![454, 499, 504, 566, 604]
        );
    }

    #[test]
    fn add_after_sort_clears_sorted_flag() {
        let mut series = SampleSeries::<u64>::new();
        series.extend([3, 1]);
        series.sort();

        series.add(2);
        assert!(!series.is_sorted());

        series.sort();
        assert_eq!(series.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn iteration_is_restartable() {
        let series = [1_u64, 2, 3].into_iter().collect::<SampleSeries<_>>();

        let first = series.iter().collect::<Vec<_>>();
        let second = (&series).into_iter().collect::<Vec<_>>();

        assert_eq!(first, second);
        assert_eq!(series.iter().len(), 3);
    }

    #[test]
    fn extend_from_appends_in_order() {
        let mut left = [1_u64, 2].into_iter().collect::<SampleSeries<_>>();
        let right = [3_u64, 4, 5].into_iter().collect::<SampleSeries<_>>();

        left.extend_from(&right);

        assert_eq!(left.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(right.len(), 3);
    }

    #[test]
    fn sum_is_exact() {
        let series = [u64::MAX, u64::MAX, 2].into_iter().collect::<SampleSeries<_>>();

        assert_eq!(series.sum(), i128::from(u64::MAX) * 2 + 2);
    }

    #[test]
    fn works_with_signed_units() {
        let mut series = [5_i32, -3, 0].into_iter().collect::<SampleSeries<_>>();

        series.sort();

        assert_eq!(series.iter().collect::<Vec<_>>(), vec![-3, 0, 5]);
        assert_eq!(series.sum(), 2);
    }

    #[test]
    fn statistics_of_empty_series_is_absent() {
        let mut series = SampleSeries::<u64>::new();

        assert!(series.statistics().is_none());
    }

    #[test]
    fn equality_ignores_block_layout() {
        let mut small_blocks = SampleSeries::<u64>::with_block_size(nz!(1));
        small_blocks.extend([1, 2, 3]);

        let large_blocks = [1_u64, 2, 3].into_iter().collect::<SampleSeries<_>>();

        assert_eq!(small_blocks, large_blocks);
    }

    #[test]
    fn debug_output_does_not_dump_samples() {
        let series = [123_456_u64].into_iter().collect::<SampleSeries<_>>();

        let debug = format!("{series:?}");

        assert!(debug.contains("len: 1"));
        assert!(!debug.contains("123456"));
    }
}
