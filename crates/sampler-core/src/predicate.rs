//! Bucket predicate seam
//!
//! The hash behind a sample filter belongs to the host platform. The engine
//! only consumes its accept/reject answer through [`BucketPredicate`], so the
//! real primitive and deterministic test doubles are interchangeable.

use crate::error::PredicateError;
use sampler_filter::BucketRange;

/// Host-provided bucketing primitive
///
/// Must be pure: the same arguments always give the same answer. Calls may
/// cross a privileged boundary and are therefore asynchronous and fallible.
#[async_trait::async_trait]
pub trait BucketPredicate: Send + Sync {
    /// Check whether `inputs` hash into the `count` buckets from `start` out of `total`
    async fn is_in_bucket(
        &self,
        inputs: &[String],
        start: u64,
        count: u64,
        total: u64,
    ) -> Result<bool, PredicateError>;
}

/// Adapter turning a synchronous closure into a [`BucketPredicate`]
pub struct FnPredicate<F> {
    f: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&[String], BucketRange) -> bool + Send + Sync,
{
    /// Wrap a closure receiving the inputs and the range
    #[inline]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPredicate").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<F> BucketPredicate for FnPredicate<F>
where
    F: Fn(&[String], BucketRange) -> bool + Send + Sync,
{
    async fn is_in_bucket(
        &self,
        inputs: &[String],
        start: u64,
        count: u64,
        total: u64,
    ) -> Result<bool, PredicateError> {
        let range = BucketRange::new(to_signed(start)?, to_signed(count)?, to_signed(total)?)
            .map_err(|e| PredicateError::new(e.to_string()))?;
        Ok((self.f)(inputs, range))
    }
}

fn to_signed(value: u64) -> Result<i64, PredicateError> {
    i64::try_from(value).map_err(|_| PredicateError::new(format!("{value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_predicate_forwards_arguments() {
        let predicate = FnPredicate::new(|inputs: &[String], range: BucketRange| {
            inputs.len() == 2 && range.start() == 1 && range.count() == 2 && range.total() == 3
        });

        let inputs = vec!["a".to_string(), "b".to_string()];
        assert!(predicate.is_in_bucket(&inputs, 1, 2, 3).await.unwrap());
        assert!(!predicate.is_in_bucket(&inputs, 0, 2, 3).await.unwrap());
    }

    #[tokio::test]
    async fn fn_predicate_rejects_invalid_range() {
        let predicate = FnPredicate::new(|_: &[String], _: BucketRange| true);
        let err = predicate.is_in_bucket(&[], 0, 5, 0).await.unwrap_err();
        assert!(err.message().contains("total must be positive"));
    }
}
