//! Latest-wins search slot
//!
//! A caller whose inputs change (a filter edited, a branch added) starts a new
//! branch search through the slot. The previous stream is cancelled first, so
//! at most one search per slot makes predicate calls at any time, and every
//! snapshot carries the generation that produced it.

use crate::branch_stream::{default_deriver, BranchStream, TokenDeriver};
use crate::cancel::CancelHandle;
use crate::search::SampleSearcher;
use sampler_filter::{Branch, SampleFilter};
use std::sync::Arc;

/// Owner of the current branch search
#[derive(Debug)]
pub struct SearchSlot {
    searcher: SampleSearcher,
    generation: u64,
    active: Option<CancelHandle>,
}

impl SearchSlot {
    /// Create an empty slot
    #[must_use]
    pub fn new(searcher: SampleSearcher) -> Self {
        Self {
            searcher,
            generation: 0,
            active: None,
        }
    }

    /// Supersede the current search with a new one
    pub fn start(&mut self, filter: Option<SampleFilter>, branches: Vec<Branch>) -> BranchStream {
        self.start_with_deriver(filter, branches, default_deriver())
    }

    /// Supersede the current search, deriving branch tokens with `deriver`
    pub fn start_with_deriver(
        &mut self,
        filter: Option<SampleFilter>,
        branches: Vec<Branch>,
        deriver: Arc<dyn TokenDeriver>,
    ) -> BranchStream {
        self.cancel();
        self.generation += 1;
        tracing::debug!("Starting search generation {}", self.generation);

        let stream = self
            .searcher
            .stream_generation(filter, branches, deriver, self.generation);
        self.active = Some(stream.cancel_handle());
        stream
    }

    /// Cancel the current search, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.active.take() {
            if !handle.is_cancelled() {
                tracing::debug!("Cancelling search generation {}", self.generation);
            }
            handle.cancel();
        }
    }

    /// Generation of the most recent search; 0 before the first
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Searcher behind this slot
    #[inline]
    #[must_use]
    pub fn searcher(&self) -> &SampleSearcher {
        &self.searcher
    }
}

impl Drop for SearchSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
