//! Single-filter search
//!
//! Rejection sampling over generated candidates:
//! 1. Validate the filter (no predicate call on failure)
//! 2. Size the trial budget from the filter's range
//! 3. Try candidates in index order, returning the first accepted one
//!
//! Candidates are tried strictly sequentially; the first accepted candidate
//! in index order is always the one reported.

use crate::branch_stream::{BranchRun, BranchStream, TokenDeriver};
use crate::cancel::{cancellation_pair, CancellationToken};
use crate::config::SearchConfig;
use crate::error::{ConfigError, SearchError};
use crate::generator::{Candidate, CandidateGenerator};
use crate::predicate::BucketPredicate;
use sampler_filter::{Branch, BucketRange, ResolvedSample, SampleFilter};
use std::sync::Arc;

/// Search engine bound to one bucket predicate
///
/// Cheap to clone; every search it starts builds fresh, independent state.
#[derive(Clone)]
pub struct SampleSearcher {
    predicate: Arc<dyn BucketPredicate>,
    config: SearchConfig,
}

impl std::fmt::Debug for SampleSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSearcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SampleSearcher {
    /// Create a searcher with default configuration
    #[must_use]
    pub fn new(predicate: Arc<dyn BucketPredicate>) -> Self {
        Self {
            predicate,
            config: SearchConfig::default(),
        }
    }

    /// Create a searcher with custom configuration
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn with_config(
        predicate: Arc<dyn BucketPredicate>,
        config: SearchConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { predicate, config })
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Validate a filter into its searchable form
    ///
    /// # Errors
    /// [`SearchError::Filter`] for malformed tokens or ranges.
    pub fn resolve(&self, filter: &SampleFilter) -> Result<ResolvedSample, SearchError> {
        let resolved = filter.resolve(self.config.rate_precision)?;

        if let SampleFilter::StableSample(stable) = filter {
            if stable.rate > 0.0 && resolved.range().is_empty() {
                tracing::warn!(
                    "Rate {} rounds to zero at precision {}; no identifier can match",
                    stable.rate,
                    self.config.rate_precision
                );
            }
        }
        if !resolved.references_identifier() {
            tracing::warn!(
                "{} filter has no normandy.userId input; every candidate hashes the same",
                filter.type_name()
            );
        }

        Ok(resolved)
    }

    /// Find an identifier accepted by `filter`
    ///
    /// # Errors
    /// - [`SearchError::Filter`] before any trial
    /// - [`SearchError::NoMatchingIdentifier`] once the budget is spent
    /// - [`SearchError::Predicate`] if the predicate fails
    pub async fn find_test_identifier(&self, filter: &SampleFilter) -> Result<String, SearchError> {
        self.find(filter).await.map(|c| c.identifier)
    }

    /// Find the first accepted candidate, with its trial index
    ///
    /// # Errors
    /// As [`SampleSearcher::find_test_identifier`].
    pub async fn find(&self, filter: &SampleFilter) -> Result<Candidate, SearchError> {
        let (token, _handle) = cancellation_pair();
        self.find_cancellable(filter, &token).await
    }

    /// Find the first accepted candidate, stopping early on cancellation
    ///
    /// # Errors
    /// As [`SampleSearcher::find`], plus [`SearchError::Cancelled`].
    pub async fn find_cancellable(
        &self,
        filter: &SampleFilter,
        cancel: &CancellationToken,
    ) -> Result<Candidate, SearchError> {
        let sample = self.resolve(filter)?;
        tracing::info!(
            "Searching {} filter: {} trials allowed",
            filter.type_name(),
            self.config.trial_budget(sample.range())
        );

        let found = self
            .probe(&sample, sample.range(), CandidateGenerator::new(), cancel)
            .await?;
        tracing::info!("Found {} at trial {}", found.identifier, found.index);
        Ok(found)
    }

    /// Stream per-branch identifiers with the default token derivation
    ///
    /// See [`SampleSearcher::stream_with_deriver`].
    #[must_use]
    pub fn stream_branch_identifiers(
        &self,
        filter: Option<SampleFilter>,
        branches: Vec<Branch>,
    ) -> BranchStream {
        self.stream_with_deriver(filter, branches, crate::branch_stream::default_deriver())
    }

    /// Stream per-branch identifiers
    ///
    /// Nothing runs until the stream is polled. Dropping the stream or calling
    /// [`BranchStream::cancel`] stops all further predicate calls.
    #[must_use]
    pub fn stream_with_deriver(
        &self,
        filter: Option<SampleFilter>,
        branches: Vec<Branch>,
        deriver: Arc<dyn TokenDeriver>,
    ) -> BranchStream {
        self.stream_generation(filter, branches, deriver, 0)
    }

    pub(crate) fn stream_generation(
        &self,
        filter: Option<SampleFilter>,
        branches: Vec<Branch>,
        deriver: Arc<dyn TokenDeriver>,
        generation: u64,
    ) -> BranchStream {
        let (token, handle) = cancellation_pair();
        let run = BranchRun::new(self.clone(), filter, branches, deriver, token, generation);
        BranchStream::new(run, handle, generation)
    }

    /// Try `candidates` in order against `range` until one is accepted
    ///
    /// At most `trial_budget(range)` candidates are tried. Each predicate call
    /// is a suspension point and races the cancellation token.
    pub(crate) async fn probe<I>(
        &self,
        sample: &ResolvedSample,
        range: BucketRange,
        candidates: I,
        cancel: &CancellationToken,
    ) -> Result<Candidate, SearchError>
    where
        I: IntoIterator<Item = Candidate>,
    {
        let budget = self.config.trial_budget(range);
        let limit = usize::try_from(budget).unwrap_or(usize::MAX);

        for candidate in candidates.into_iter().take(limit) {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }

            let inputs = sample.inputs_for(&candidate.identifier);
            let accepted = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SearchError::Cancelled),
                result = self.predicate.is_in_bucket(
                    &inputs,
                    range.start(),
                    range.count(),
                    range.total(),
                ) => result?,
            };
            tracing::trace!("Trial {} ({}): {}", candidate.index, candidate.identifier, accepted);

            if accepted {
                return Ok(candidate);
            }
        }

        tracing::warn!(
            "No identifier accepted by bucket {}+{}/{} after {} trials",
            range.start(),
            range.count(),
            range.total(),
            budget
        );
        Err(SearchError::NoMatchingIdentifier { trials: budget })
    }
}
