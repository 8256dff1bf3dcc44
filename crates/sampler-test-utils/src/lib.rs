//! Testing utilities for the sampler workspace
//!
//! Deterministic bucket predicates, filter fixtures and tracing setup.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sampler_core::{
    BucketPredicate, CancelHandle, FnPredicate, PredicateError, SampleSearcher, SearchConfig,
};
use sampler_filter::{Branch, BucketRange, SampleFilter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable 64-bit hash of `input`: the first eight bytes of its BLAKE3 digest
pub fn stable_hash(input: &str) -> u64 {
    let digest = blake3::hash(input.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Check whether `bucket` falls in `count` buckets from `start`, wrapping at `total`
pub fn bucket_in_range(bucket: u64, start: u64, count: u64, total: u64) -> bool {
    if total == 0 {
        return false;
    }
    let offset = (bucket % total + total - start % total) % total;
    offset < count
}

/// Pure hash-based predicate standing in for the platform primitive
///
/// Inputs are joined with `,`, hashed with [`stable_hash`] and reduced
/// modulo `total`.
#[derive(Debug, Default)]
pub struct HashBucketPredicate;

impl HashBucketPredicate {
    pub fn bucket(inputs: &[String], total: u64) -> u64 {
        stable_hash(&inputs.join(",")) % total.max(1)
    }
}

#[async_trait]
impl BucketPredicate for HashBucketPredicate {
    async fn is_in_bucket(
        &self,
        inputs: &[String],
        start: u64,
        count: u64,
        total: u64,
    ) -> Result<bool, PredicateError> {
        if total == 0 {
            return Err(PredicateError::new("total must be positive"));
        }
        Ok(bucket_in_range(Self::bucket(inputs, total), start, count, total))
    }
}

/// Wrapper recording every call made to an inner predicate
///
/// Can be armed to cancel a search from inside its Nth call, which lands the
/// cancellation exactly at a predicate suspension point.
pub struct CountingPredicate<P> {
    inner: P,
    calls: AtomicU64,
    seen: Mutex<Vec<Vec<String>>>,
    cancel_at: Mutex<Option<(u64, CancelHandle)>>,
}

impl<P: BucketPredicate> CountingPredicate<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
            seen: Mutex::new(Vec::new()),
            cancel_at: Mutex::new(None),
        }
    }

    /// Number of calls so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inputs of every call, in call order
    pub fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().clone()
    }

    /// First input of every call, in call order
    pub fn identifiers(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|inputs| inputs.first().cloned())
            .collect()
    }

    /// Cancel `handle` during call number `call` (1-based)
    pub fn cancel_on_call(&self, call: u64, handle: CancelHandle) {
        *self.cancel_at.lock() = Some((call, handle));
    }
}

impl<P> std::fmt::Debug for CountingPredicate<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingPredicate")
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: BucketPredicate> BucketPredicate for CountingPredicate<P> {
    async fn is_in_bucket(
        &self,
        inputs: &[String],
        start: u64,
        count: u64,
        total: u64,
    ) -> Result<bool, PredicateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().push(inputs.to_vec());

        let trigger = self
            .cancel_at
            .lock()
            .as_ref()
            .filter(|(at, _)| *at == call)
            .map(|(_, handle)| handle.clone());
        if let Some(handle) = trigger {
            handle.cancel();
        }

        self.inner.is_in_bucket(inputs, start, count, total).await
    }
}

/// Predicate that always fails
#[derive(Debug, Clone)]
pub struct FailingPredicate {
    pub message: String,
}

impl FailingPredicate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl BucketPredicate for FailingPredicate {
    async fn is_in_bucket(
        &self,
        _inputs: &[String],
        _start: u64,
        _count: u64,
        _total: u64,
    ) -> Result<bool, PredicateError> {
        Err(PredicateError::new(self.message.clone()))
    }
}

/// Predicate whose calls never complete
#[derive(Debug, Default)]
pub struct PendingPredicate;

#[async_trait]
impl BucketPredicate for PendingPredicate {
    async fn is_in_bucket(
        &self,
        _inputs: &[String],
        _start: u64,
        _count: u64,
        _total: u64,
    ) -> Result<bool, PredicateError> {
        std::future::pending().await
    }
}

/// Predicate accepting every call
pub fn accept_all() -> impl BucketPredicate {
    FnPredicate::new(|_: &[String], _: BucketRange| true)
}

/// Predicate rejecting every call
pub fn reject_all() -> impl BucketPredicate {
    FnPredicate::new(|_: &[String], _: BucketRange| false)
}

/// Predicate accepting unless the first input contains `needle`
pub fn reject_containing(needle: &'static str) -> impl BucketPredicate {
    FnPredicate::new(move |inputs: &[String], _: BucketRange| {
        inputs.first().is_some_and(|id| !id.contains(needle))
    })
}

/// `bucketSample` over `[normandy.userId, 'global-v2']`, 100 of 10000 buckets
pub fn global_v2_filter() -> SampleFilter {
    SampleFilter::bucket(["normandy.userId", "'global-v2'"], 0, 100, 10_000)
}

/// Three equally weighted branches: alpha, beta, gamma
pub fn three_branches() -> Vec<Branch> {
    vec![
        Branch::new("alpha", 1.0),
        Branch::new("beta", 1.0),
        Branch::new("gamma", 1.0),
    ]
}

/// Searcher over `predicate` with default configuration
pub fn searcher<P: BucketPredicate + 'static>(predicate: Arc<P>) -> SampleSearcher {
    SampleSearcher::new(predicate)
}

/// Searcher over `predicate` with `config`
pub fn searcher_with<P: BucketPredicate + 'static>(
    predicate: Arc<P>,
    config: SearchConfig,
) -> SampleSearcher {
    match SampleSearcher::with_config(predicate, config) {
        Ok(searcher) => searcher,
        Err(e) => panic!("invalid test config: {e}"),
    }
}

/// Install a test-friendly tracing subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic() {
        assert_eq!(stable_hash("test-userId-0"), stable_hash("test-userId-0"));
        assert_ne!(stable_hash("test-userId-0"), stable_hash("test-userId-1"));
    }

    #[test]
    fn bucket_range_wraps() {
        assert!(bucket_in_range(9, 8, 4, 10));
        assert!(bucket_in_range(1, 8, 4, 10));
        assert!(!bucket_in_range(2, 8, 4, 10));
        assert!(!bucket_in_range(0, 0, 0, 10));
    }

    #[tokio::test]
    async fn counting_records_and_cancels() {
        let (_token, handle) = sampler_core::cancellation_pair();
        let counting = CountingPredicate::new(accept_all());
        counting.cancel_on_call(2, handle.clone());

        let inputs = vec!["a".to_string()];
        counting.is_in_bucket(&inputs, 0, 1, 1).await.unwrap();
        assert!(!handle.is_cancelled());
        counting.is_in_bucket(&inputs, 0, 1, 1).await.unwrap();
        assert!(handle.is_cancelled());

        assert_eq!(counting.calls(), 2);
        assert_eq!(counting.identifiers(), vec!["a", "a"]);
    }
}
