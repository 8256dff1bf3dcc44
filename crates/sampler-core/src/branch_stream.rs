//! Branch search stream
//!
//! Resolves one identifier per experiment branch and reports progress as a
//! stream of [`SearchSnapshot`]s:
//!
//! 1. `Searching` with every branch unresolved, before any predicate call
//! 2. One snapshot per resolved branch, in branch order
//! 3. A terminal snapshot: `Resolved`, or `Failed` with the partial mapping
//!
//! With no filter or no branches the stream yields a single `Idle` snapshot.
//! A cancelled stream yields nothing further.

use crate::cancel::{CancelHandle, CancellationToken};
use crate::error::SearchError;
use crate::generator::Candidate;
use crate::search::SampleSearcher;
use crate::state_machine::{validate_transition, SearchPhase};
use futures::stream::{BoxStream, Stream, StreamExt};
use indexmap::IndexMap;
use sampler_filter::{Branch, BucketRange, ResolvedSample, SampleFilter};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Derives per-branch trial tokens from the base identifier
pub trait TokenDeriver: Send + Sync {
    /// Token for trial `trial` of `branch`
    fn derive(&self, base: &str, branch: &Branch, trial: u64) -> String;
}

/// Any `Fn(&str) -> String` is a deriver: its output gets the branch suffix
/// `-<slug>` on trial 0 and `-<slug>-<trial>` afterwards.
impl<F> TokenDeriver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn derive(&self, base: &str, branch: &Branch, trial: u64) -> String {
        let root = self(base);
        if trial == 0 {
            format!("{root}-{}", branch.slug)
        } else {
            format!("{root}-{}-{trial}", branch.slug)
        }
    }
}

fn base_identifier(base: &str) -> String {
    base.to_owned()
}

/// Deriver using the base identifier itself as the root
#[must_use]
pub fn default_deriver() -> Arc<dyn TokenDeriver> {
    Arc::new(base_identifier as fn(&str) -> String)
}

/// Status carried by a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    /// Inputs incomplete, nothing searched
    Idle,
    /// Branches still being resolved
    Searching,
    /// Every branch resolved
    Resolved,
    /// Terminated; resolved branches are kept
    Failed(SearchError),
}

impl SearchStatus {
    /// Lifecycle phase of this status
    #[inline]
    #[must_use]
    pub fn phase(&self) -> SearchPhase {
        match self {
            SearchStatus::Idle => SearchPhase::Idle,
            SearchStatus::Searching => SearchPhase::Searching,
            SearchStatus::Resolved => SearchPhase::Resolved,
            SearchStatus::Failed(_) => SearchPhase::Failed,
        }
    }

    /// Error, if failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&SearchError> {
        match self {
            SearchStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Progress of a branch search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSnapshot {
    /// Search generation that produced this snapshot
    pub generation: u64,
    /// Branch slug to identifier, `None` while unresolved
    pub branches: IndexMap<String, Option<String>>,
    /// Current status
    pub status: SearchStatus,
}

impl SearchSnapshot {
    /// Identifier resolved for `slug`
    #[inline]
    #[must_use]
    pub fn identifier(&self, slug: &str) -> Option<&str> {
        self.branches.get(slug).and_then(Option::as_deref)
    }

    /// Number of resolved branches
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.branches.values().filter(|v| v.is_some()).count()
    }

    /// Check if no further snapshot follows
    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self.status, SearchStatus::Searching)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Base,
    Branch(usize),
    Done,
}

/// State of one branch search invocation
pub(crate) struct BranchRun {
    searcher: SampleSearcher,
    filter: Option<SampleFilter>,
    branches: Vec<Branch>,
    deriver: Arc<dyn TokenDeriver>,
    cancel: CancellationToken,
    generation: u64,
    stage: Stage,
    phase: SearchPhase,
    sample: Option<ResolvedSample>,
    ranges: Vec<BucketRange>,
    base: Option<String>,
    resolved: IndexMap<String, Option<String>>,
    failure: Option<SearchError>,
}

impl BranchRun {
    pub(crate) fn new(
        searcher: SampleSearcher,
        filter: Option<SampleFilter>,
        branches: Vec<Branch>,
        deriver: Arc<dyn TokenDeriver>,
        cancel: CancellationToken,
        generation: u64,
    ) -> Self {
        let resolved = branches.iter().map(|b| (b.slug.clone(), None)).collect();
        Self {
            searcher,
            filter,
            branches,
            deriver,
            cancel,
            generation,
            stage: Stage::Start,
            phase: SearchPhase::Idle,
            sample: None,
            ranges: Vec::new(),
            base: None,
            resolved,
            failure: None,
        }
    }

    /// Advance to the next snapshot, or `None` when finished or cancelled
    async fn step(&mut self) -> Option<SearchSnapshot> {
        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }

            match self.stage {
                Stage::Start => return self.start(),
                Stage::Base => {
                    let Some(sample) = self.sample.as_ref() else {
                        return self.cancelled();
                    };
                    let found = self
                        .searcher
                        .probe(sample, sample.range(), crate::CandidateGenerator::new(), &self.cancel)
                        .await;

                    match found {
                        Ok(base) => {
                            tracing::debug!("Base identifier {} at trial {}", base.identifier, base.index);
                            self.base = Some(base.identifier);
                            self.stage = Stage::Branch(0);
                        }
                        Err(e) => return self.fail(e),
                    }
                }
                Stage::Branch(i) if i < self.branches.len() => {
                    match self.resolve_branch(i).await {
                        Ok(candidate) => {
                            tracing::debug!(
                                "Branch {} resolved to {} at trial {}",
                                self.branches[i].slug,
                                candidate.identifier,
                                candidate.index
                            );
                            self.resolved[i] = Some(candidate.identifier);
                            self.stage = Stage::Branch(i + 1);
                            if i + 1 < self.branches.len() {
                                return self.emit(SearchStatus::Searching);
                            }
                            return self.finish();
                        }
                        Err(SearchError::NoMatchingIdentifier { trials }) => {
                            tracing::warn!(
                                "Branch {} unresolved after {} trials",
                                self.branches[i].slug,
                                trials
                            );
                            self.failure
                                .get_or_insert(SearchError::NoMatchingIdentifier { trials });
                            self.stage = Stage::Branch(i + 1);
                        }
                        Err(e) => return self.fail(e),
                    }
                }
                Stage::Branch(_) => return self.finish(),
                Stage::Done => return None,
            }
        }
    }

    fn start(&mut self) -> Option<SearchSnapshot> {
        let Some(filter) = self.filter.as_ref() else {
            tracing::debug!("No sample filter; search idle");
            self.stage = Stage::Done;
            return self.emit(SearchStatus::Idle);
        };
        if self.branches.is_empty() {
            tracing::debug!("No branches; search idle");
            self.stage = Stage::Done;
            return self.emit(SearchStatus::Idle);
        }

        let prepared = self.searcher.resolve(filter).and_then(|sample| {
            let ranges = sample.branch_ranges(&self.branches)?;
            Ok((sample, ranges))
        });

        match prepared {
            Ok((sample, ranges)) => {
                tracing::info!(
                    "Searching {} branches of {} filter (generation {})",
                    self.branches.len(),
                    filter.type_name(),
                    self.generation
                );
                self.sample = Some(sample);
                self.ranges = ranges;
                self.stage = Stage::Base;
                self.emit(SearchStatus::Searching)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn resolve_branch(&self, i: usize) -> Result<Candidate, SearchError> {
        let (Some(sample), Some(base)) = (self.sample.as_ref(), self.base.clone()) else {
            return Err(SearchError::Cancelled);
        };
        let branch = self.branches[i].clone();
        let deriver = Arc::clone(&self.deriver);
        let taken: HashSet<String> = self.resolved.values().flatten().cloned().collect();

        let candidates = (0..u64::MAX)
            .map(move |trial| Candidate::new(trial, deriver.derive(&base, &branch, trial)))
            .filter(move |c| !taken.contains(&c.identifier));

        self.searcher
            .probe(sample, self.ranges[i], candidates, &self.cancel)
            .await
    }

    fn finish(&mut self) -> Option<SearchSnapshot> {
        self.stage = Stage::Done;
        match self.failure.take() {
            Some(e) => {
                tracing::warn!(
                    "Branch search failed with {}/{} branches resolved",
                    self.resolved.values().filter(|v| v.is_some()).count(),
                    self.branches.len()
                );
                self.emit(SearchStatus::Failed(e))
            }
            None => {
                tracing::info!("All {} branches resolved", self.branches.len());
                self.emit(SearchStatus::Resolved)
            }
        }
    }

    fn fail(&mut self, error: SearchError) -> Option<SearchSnapshot> {
        if error.is_cancelled() {
            return self.cancelled();
        }
        tracing::warn!("Branch search failed: {}", error);
        self.stage = Stage::Done;
        self.emit(SearchStatus::Failed(error))
    }

    fn cancelled(&mut self) -> Option<SearchSnapshot> {
        self.stage = Stage::Done;
        if !self.phase.is_terminal() {
            tracing::debug!("Branch search generation {} cancelled", self.generation);
            self.transition(SearchPhase::Cancelled);
        }
        None
    }

    /// Snapshot of the current mapping; nothing once cancelled
    fn emit(&mut self, status: SearchStatus) -> Option<SearchSnapshot> {
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        self.transition(status.phase());
        Some(SearchSnapshot {
            generation: self.generation,
            branches: self.resolved.clone(),
            status,
        })
    }

    fn transition(&mut self, to: SearchPhase) {
        if self.phase == to {
            return;
        }
        if let Err(e) = validate_transition(self.phase, to) {
            debug_assert!(false, "{e}");
            tracing::error!("{}", e);
            return;
        }
        self.phase = to;
    }
}

/// Lazy, cancellable stream of [`SearchSnapshot`]s
pub struct BranchStream {
    inner: BoxStream<'static, SearchSnapshot>,
    handle: CancelHandle,
    generation: u64,
}

impl BranchStream {
    pub(crate) fn new(run: BranchRun, handle: CancelHandle, generation: u64) -> Self {
        let inner = futures::stream::unfold(run, |mut run| async move {
            let snapshot = run.step().await?;
            Some((snapshot, run))
        })
        .boxed();

        Self {
            inner,
            handle,
            generation,
        }
    }

    /// Stop the search; no predicate call or snapshot follows
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Handle that cancels this stream from elsewhere
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Check if cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Generation of the search behind this stream
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drain the stream, returning the last snapshot
    pub async fn last(mut self) -> Option<SearchSnapshot> {
        let mut last = None;
        while let Some(snapshot) = self.inner.next().await {
            last = Some(snapshot);
        }
        last
    }
}

impl std::fmt::Debug for BranchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchStream")
            .field("generation", &self.generation)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for BranchStream {
    type Item = SearchSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SearchSnapshot>> {
        self.inner.poll_next_unpin(cx)
    }
}
