//! Order statistics over sorted sample series.

use num_traits::PrimInt;

use crate::sample_series::to_wide;
use crate::{Error, Result, SampleSeries};

/// A statistics snapshot over a non-empty, sorted [`SampleSeries`].
///
/// Obtained from [`SampleSeries::statistics()`] or from a task in a [`Report`][crate::Report].
/// Every value is computed on demand from the exact samples; nothing is estimated.
///
/// Rounding policy: values that are not naturally in the sample unit (the average and the
/// median of an even number of samples) are rounded half-up, i.e. an exact `.5` rounds
/// towards positive infinity.
///
/// # Examples
///
/// ```
/// use task_timer::SampleSeries;
///
/// let mut series = (1..=100_u64).collect::<SampleSeries<_>>();
/// let statistics = series.statistics().unwrap();
///
/// assert_eq!(statistics.percentile(90.0).unwrap(), 90);
/// assert_eq!(statistics.average(), 51); // 50.5 rounds up
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Statistics<'a, T = u64> {
    // Guaranteed sorted and non-empty.
    samples: &'a SampleSeries<T>,
}

impl<'a, T> Statistics<'a, T>
where
    T: PrimInt,
{
    /// Returns `None` for an empty series.
    pub(crate) fn from_sorted(samples: &'a SampleSeries<T>) -> Option<Self> {
        debug_assert!(samples.is_sorted(), "statistics require a sorted series");

        if samples.is_empty() {
            None
        } else {
            Some(Self { samples })
        }
    }

    /// The number of samples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// The smallest sample.
    #[must_use]
    pub fn min(&self) -> T {
        self.at(0)
    }

    /// The largest sample.
    #[must_use]
    pub fn max(&self) -> T {
        self.at(self.last_index())
    }

    /// The exact sum of all samples.
    #[must_use]
    pub fn sum(&self) -> i128 {
        self.samples.sum()
    }

    /// The arithmetic mean of the samples, rounded half-up to the sample unit.
    ///
    /// The sum is accumulated exactly, so the result does not drift with large sample counts.
    #[must_use]
    pub fn average(&self) -> T {
        from_wide(divide_half_up(self.sum(), self.wide_count()))
    }

    /// The median of the samples.
    ///
    /// For an even number of samples this is the mean of the two middle samples,
    /// rounded half-up to the sample unit (e.g. `[1, 2, 3, 4]` has a median of 3).
    #[must_use]
    #[expect(
        clippy::integer_division,
        reason = "truncating division is exactly how the middle position is defined"
    )]
    pub fn median(&self) -> T {
        let count = self.count();
        let middle = count / 2;

        if count % 2 == 1 {
            return self.at(middle);
        }

        let lower = to_wide(self.at(middle.checked_sub(1).expect(
            "an even count in a non-empty series is at least 2, so middle is at least 1",
        )));
        let upper = to_wide(self.at(middle));

        let pair_sum = lower
            .checked_add(upper)
            .expect("two samples that fit in the unit type cannot overflow i128");

        from_wide(divide_half_up(pair_sum, 2))
    }

    /// The nearest-rank percentile: the smallest sample such that at least `percentile`
    /// percent of the samples are less than or equal to it.
    ///
    /// The rank is `ceil(percentile / 100 * count)`, computed exactly from the binary value of
    /// `percentile`, so `percentile(90.0)` of 100 samples is the 90th sample. Decimal fractions
    /// that have no exact binary representation are used as the nearest `f64` they parse to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPercentile`] if `percentile` is not in `(0, 100]`.
    pub fn percentile(&self, percentile: f64) -> Result<T> {
        if !percentile.is_finite() || percentile <= 0.0 || percentile > 100.0 {
            return Err(Error::InvalidPercentile { percentile });
        }

        // percentile == mantissa * 2^exponent
        let (mantissa, exponent) = decompose_positive(percentile);

        let count = u128::try_from(self.count()).expect("usize always fits in u128");

        // Below 2^53 * 2^64, so this never overflows.
        let numerator = u128::from(mantissa)
            .checked_mul(count)
            .expect("a 53-bit mantissa times a usize count always fits in u128");

        // ceil(mantissa * 2^exponent * count / 100)
        let rank = match u32::try_from(exponent) {
            Ok(shift) => numerator
                .checked_shl(shift)
                .map(|scaled| scaled.div_ceil(100))
                .expect("percentiles up to 100 have tiny exponents, so the shift cannot overflow"),
            Err(_) => {
                let shift = exponent.unsigned_abs();

                // The numerator is below 2^117, so a larger divisor only leaves a fraction.
                if shift > MAX_EXACT_DIVISOR_SHIFT {
                    1
                } else {
                    numerator.div_ceil(
                        100_u128
                            .checked_shl(shift)
                            .expect("100 * 2^120 fits in u128"),
                    )
                }
            }
        };

        let rank = usize::try_from(rank.clamp(1, count))
            .expect("rank never exceeds the sample count, which is a usize");

        Ok(self.at(rank.checked_sub(1).expect("rank is at least 1")))
    }

    /// The population standard deviation of the samples (divided by the count, not count - 1).
    ///
    /// Deviations are measured from the exact mean, so only the final accumulation and the
    /// square root are subject to floating point rounding.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "the result is a floating point value by definition"
    )]
    pub fn standard_deviation(&self) -> f64 {
        let count = self.wide_count();
        let sum = self.sum();
        let count_f = count as f64;

        // (x - mean) == (count * x - sum) / count, where the numerator is exact.
        let squared_deviations = self
            .samples
            .iter()
            .map(|value| {
                let scaled_deviation = to_wide(value)
                    .checked_mul(count)
                    .and_then(|scaled| scaled.checked_sub(sum))
                    .expect("deviation overflows i128 - this indicates an unrealistic scenario");

                let deviation = scaled_deviation as f64 / count_f;
                deviation * deviation
            })
            .sum::<f64>();

        (squared_deviations / count_f).sqrt()
    }

    /// Combines the samples behind two snapshots into a new series.
    ///
    /// Statistics are never combined algebraically. Call
    /// [`statistics()`][SampleSeries::statistics] on the result to obtain the combined snapshot,
    /// which keeps the median and percentiles exact.
    #[must_use]
    pub fn merge(&self, other: &Statistics<'_, T>) -> SampleSeries<T> {
        let mut merged = SampleSeries::with_block_size(self.samples.block_size());
        merged.extend_from(self.samples);
        merged.extend_from(other.samples);
        merged
    }

    fn at(&self, index: usize) -> T {
        self.samples
            .get(index)
            .expect("statistics only index positions within the non-empty series")
    }

    fn last_index(&self) -> usize {
        self.count()
            .checked_sub(1)
            .expect("statistics are only created for non-empty series")
    }

    fn wide_count(&self) -> i128 {
        i128::try_from(self.count()).expect("usize always fits in i128")
    }
}

/// Largest shift for which `100 << shift` still fits in `u128`.
const MAX_EXACT_DIVISOR_SHIFT: u32 = 120;

/// Splits a positive finite `f64` into `mantissa * 2^exponent` without losing precision.
fn decompose_positive(value: f64) -> (u64, i32) {
    const FRACTION_BITS: u32 = 52;
    const IMPLICIT_BIT: u64 = 1 << FRACTION_BITS;
    const FRACTION_MASK: u64 = IMPLICIT_BIT - 1;
    const EXPONENT_MASK: u64 = 0x7ff;
    // Exponent bias plus the fraction width.
    const EXPONENT_OFFSET: i32 = 1075;

    debug_assert!(value.is_finite() && value > 0.0);

    let bits = value.to_bits();
    let fraction = bits & FRACTION_MASK;
    let biased_exponent = i32::try_from(bits.wrapping_shr(FRACTION_BITS) & EXPONENT_MASK)
        .expect("an 11-bit exponent always fits in i32");

    if biased_exponent == 0 {
        // Subnormal: no implicit leading bit and the minimum exponent.
        (fraction, 1_i32.wrapping_sub(EXPONENT_OFFSET))
    } else {
        (
            fraction | IMPLICIT_BIT,
            biased_exponent.wrapping_sub(EXPONENT_OFFSET),
        )
    }
}

/// Divides and rounds half-up (an exact half rounds towards positive infinity).
///
/// `denominator` must be positive.
fn divide_half_up(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);

    // floor((2n + d) / 2d) == floor(n/d + 1/2)
    numerator
        .checked_mul(2)
        .and_then(|doubled| doubled.checked_add(denominator))
        .and_then(|shifted| {
            let doubled_denominator = denominator.checked_mul(2)?;
            shifted.checked_div_euclid(doubled_denominator)
        })
        .expect("rounding overflows i128 - this indicates an unrealistic scenario")
}

fn from_wide<T>(value: i128) -> T
where
    T: PrimInt,
{
    use num_traits::NumCast;

    <T as NumCast>::from(value)
        .expect("a rounded mean lies between two samples, so it always fits in the sample unit")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn series<T: PrimInt>(values: &[T]) -> SampleSeries<T> {
        values.iter().copied().collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn odd_count_fixture() {
        let mut samples = series(&[454_u64, 499, 504, 566, 604]);
        let statistics = samples.statistics().unwrap();

        assert_eq!(statistics.count(), 5);
        assert_eq!(statistics.min(), 454);
        assert_eq!(statistics.max(), 604);
        assert_eq!(statistics.median(), 504);
        // 525.4 rounds to 525.
        assert_eq!(statistics.average(), 525);
        assert_eq!(statistics.sum(), 2627);
    }

    #[test]
    fn unsorted_input_is_sorted_before_querying() {
        let mut samples = series(&[604_u64, 454, 566, 499, 504]);
        let statistics = samples.statistics().unwrap();

        assert_eq!(statistics.min(), 454);
        assert_eq!(statistics.max(), 604);
        assert_eq!(statistics.median(), 504);
    }

    #[test]
    fn even_count_median_rounds_half_up() {
        let mut samples = series(&[1_u64, 2, 3, 4]);
        let statistics = samples.statistics().unwrap();

        assert_eq!(statistics.median(), 3);
        assert_eq!(statistics.average(), 3);
    }

    #[test]
    fn even_count_median_without_remainder() {
        let mut samples = series(&[10_u64, 20, 40, 100]);

        assert_eq!(samples.statistics().unwrap().median(), 30);
    }

    #[test]
    fn average_rounds_down_below_half() {
        let mut samples = series(&[1_u64, 1, 2]);

        // 1.333 rounds to 1.
        assert_eq!(samples.statistics().unwrap().average(), 1);
    }

    #[test]
    fn signed_half_rounds_towards_positive_infinity() {
        let mut samples = series(&[-3_i64, -2]);
        let statistics = samples.statistics().unwrap();

        // -2.5 rounds to -2.
        assert_eq!(statistics.average(), -2);
        assert_eq!(statistics.median(), -2);
    }

    #[test]
    fn average_of_huge_samples_does_not_overflow() {
        let mut samples = series(&[u64::MAX, u64::MAX, u64::MAX - 2]);

        assert_eq!(samples.statistics().unwrap().average(), u64::MAX - 1);
    }

    #[test]
    fn single_sample() {
        let mut samples = series(&[42_u64]);
        let statistics = samples.statistics().unwrap();

        assert_eq!(statistics.min(), 42);
        assert_eq!(statistics.max(), 42);
        assert_eq!(statistics.median(), 42);
        assert_eq!(statistics.average(), 42);
        assert_eq!(statistics.percentile(1.0).unwrap(), 42);
        assert_eq!(statistics.percentile(100.0).unwrap(), 42);
        assert_close(statistics.standard_deviation(), 0.0);
    }

    #[test]
    fn nearest_rank_percentiles() {
        let mut samples = (1..=100_u64).collect::<SampleSeries<_>>();
        let statistics = samples.statistics().unwrap();

        assert_eq!(statistics.percentile(90.0).unwrap(), 90);
        assert_eq!(statistics.percentile(50.0).unwrap(), 50);
        assert_eq!(statistics.percentile(99.0).unwrap(), 99);
        assert_eq!(statistics.percentile(100.0).unwrap(), 100);
        // ceil(0.5) = 1
        assert_eq!(statistics.percentile(0.5).unwrap(), 1);
        // ceil(90.1) = 91
        assert_eq!(statistics.percentile(90.1).unwrap(), 91);
    }

    #[test]
    fn nearest_rank_uses_ceiling() {
        let mut samples = series(&[15_u64, 20, 35, 40, 50]);
        let statistics = samples.statistics().unwrap();

        // ceil(0.3 * 5) = 2
        assert_eq!(statistics.percentile(30.0).unwrap(), 20);
        // ceil(0.4 * 5) = 2
        assert_eq!(statistics.percentile(40.0).unwrap(), 20);
        // ceil(0.5 * 5) = 3
        assert_eq!(statistics.percentile(50.0).unwrap(), 35);
    }

    #[test]
    fn fractional_percentile_on_large_series() {
        let mut samples = (1..=1000_u64).collect::<SampleSeries<_>>();

        assert_eq!(samples.statistics().unwrap().percentile(99.5).unwrap(), 995);
    }

    #[test]
    fn percentile_rank_is_not_rounded_to_thousandths() {
        let mut samples = series(&[1_u64, 2, 3]);

        // ceil(1.000002) = 2
        assert_eq!(
            samples.statistics().unwrap().percentile(33.333_4).unwrap(),
            2
        );

        let mut samples = (1..=100_000_u64).collect::<SampleSeries<_>>();

        // ceil(50000.4) = 50001
        assert_eq!(
            samples.statistics().unwrap().percentile(50.000_4).unwrap(),
            50_001
        );
    }

    #[test]
    fn percentile_uses_exact_binary_value() {
        let mut samples = (1..=1000_u64).collect::<SampleSeries<_>>();

        // The nearest f64 to 99.9 is slightly above it, so the rank is just above 999.
        assert_eq!(samples.statistics().unwrap().percentile(99.9).unwrap(), 1000);
    }

    #[test]
    fn subnormal_percentile_selects_first_sample() {
        let mut samples = series(&[7_u64, 8, 9]);
        let statistics = samples.statistics().unwrap();

        assert_eq!(statistics.percentile(f64::from_bits(1)).unwrap(), 7);
        assert_eq!(statistics.percentile(f64::MIN_POSITIVE).unwrap(), 7);
    }

    #[test]
    fn decompose_positive_is_exact() {
        assert_eq!(decompose_positive(1.0), (1 << 52, -52));
        assert_eq!(decompose_positive(100.0), (100 << 46, -46));
        assert_eq!(decompose_positive(f64::from_bits(1)), (1, -1074));
    }

    #[test]
    fn tiny_percentile_selects_first_sample() {
        let mut samples = series(&[7_u64, 8, 9]);

        assert_eq!(
            samples.statistics().unwrap().percentile(0.000_1).unwrap(),
            7
        );
    }

    #[test]
    fn invalid_percentiles_are_rejected() {
        let mut samples = series(&[1_u64, 2, 3]);
        let statistics = samples.statistics().unwrap();

        for percentile in [0.0, -5.0, 100.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                statistics.percentile(percentile),
                Err(Error::InvalidPercentile { .. })
            ));
        }
    }

    #[test]
    fn population_standard_deviation() {
        let mut samples = series(&[2_u64, 4, 4, 4, 5, 5, 7, 9]);

        assert_close(samples.statistics().unwrap().standard_deviation(), 2.0);
    }

    #[test]
    fn standard_deviation_with_fractional_mean() {
        let mut samples = series(&[1_u64, 2]);

        assert_close(samples.statistics().unwrap().standard_deviation(), 0.5);
    }

    #[test]
    fn standard_deviation_of_constant_large_values_is_zero() {
        let mut samples = series(&[u64::MAX / 4; 1000]);

        assert_close(samples.statistics().unwrap().standard_deviation(), 0.0);
    }

    #[test]
    fn merge_concatenates_samples() {
        let mut left = series(&[1_u64, 5]);
        let mut right = series(&[3_u64, 10, 2]);

        let left_statistics = left.statistics().unwrap();
        let right_statistics = right.statistics().unwrap();

        let mut merged = left_statistics.merge(&right_statistics);
        let merged_statistics = merged.statistics().unwrap();

        assert_eq!(merged_statistics.count(), 5);
        assert_eq!(merged_statistics.min(), 1);
        assert_eq!(merged_statistics.max(), 10);
        assert_eq!(merged_statistics.median(), 3);
    }

    #[test]
    fn divide_half_up_rules() {
        assert_eq!(divide_half_up(5, 2), 3);
        assert_eq!(divide_half_up(4, 2), 2);
        assert_eq!(divide_half_up(-5, 2), -2);
        assert_eq!(divide_half_up(-7, 2), -3);
        assert_eq!(divide_half_up(2627, 5), 525);
        assert_eq!(divide_half_up(0, 3), 0);
    }
}
