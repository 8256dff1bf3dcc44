//! Bucket ranges
//!
//! The hash space is split into `total` equal buckets; a range accepts the
//! `count` contiguous buckets starting at `start`, wrapping past `total - 1`
//! back to bucket 0.

use crate::error::FilterError;
use serde::{Deserialize, Serialize};

/// Validated `start`/`count`/`total` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct BucketRange {
    start: u64,
    count: u64,
    total: u64,
}

impl BucketRange {
    /// Create a range from raw filter integers
    ///
    /// # Errors
    /// [`FilterError::InvalidRange`] unless `total > 0`, `0 <= count <= total`
    /// and `0 <= start < total`.
    #[allow(clippy::cast_sign_loss)]
    pub fn new(start: i64, count: i64, total: i64) -> Result<Self, FilterError> {
        if total <= 0 {
            return Err(FilterError::invalid_range(format!(
                "total must be positive, got {total}"
            )));
        }
        if count < 0 {
            return Err(FilterError::invalid_range(format!(
                "count must be non-negative, got {count}"
            )));
        }
        if count > total {
            return Err(FilterError::invalid_range(format!(
                "count {count} exceeds total {total}"
            )));
        }
        if start < 0 || start >= total {
            return Err(FilterError::invalid_range(format!(
                "start {start} outside 0..{total}"
            )));
        }

        Ok(Self {
            start: start as u64,
            count: count as u64,
            total: total as u64,
        })
    }

    /// Build from already-validated unsigned parts
    #[inline]
    pub(crate) fn from_parts(start: u64, count: u64, total: u64) -> Self {
        debug_assert!(total > 0 && count <= total && start < total);
        Self {
            start,
            count,
            total,
        }
    }

    /// First accepted bucket
    #[inline]
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of accepted buckets
    #[inline]
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of buckets in the hash space
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Check whether `bucket` (already reduced modulo `total`) is accepted
    #[inline]
    #[must_use]
    pub fn contains(&self, bucket: u64) -> bool {
        let offset = (bucket % self.total + self.total - self.start) % self.total;
        offset < self.count
    }

    /// Fraction of the hash space accepted
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn share(&self) -> f64 {
        self.count as f64 / self.total as f64
    }

    /// Check if no bucket is accepted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Deserialize)]
struct RawRange {
    start: i64,
    count: i64,
    total: i64,
}

impl TryFrom<RawRange> for BucketRange {
    type Error = FilterError;

    fn try_from(raw: RawRange) -> Result<Self, FilterError> {
        Self::new(raw.start, raw.count, raw.total)
    }
}

/// Express a sampling rate as an integer range over `precision` buckets
///
/// The count is `round(rate * precision)`, starting at bucket 0.
///
/// # Errors
/// [`FilterError::InvalidRange`] if `rate` is not a finite number in
/// `[0, 1]` or `precision` is zero.
pub fn rate_to_range(rate: f64, precision: u64) -> Result<BucketRange, FilterError> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(FilterError::invalid_range(format!(
            "rate must be within [0, 1], got {rate}"
        )));
    }
    if precision == 0 {
        return Err(FilterError::invalid_range("rate precision must be positive"));
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let count = ((rate * precision as f64).round() as u64).min(precision);

    Ok(BucketRange::from_parts(0, count, precision))
}
