//! Sampler Core - test identifier search
//!
//! Finds synthetic user identifiers that a hash-bucketed sample filter
//! accepts:
//! - Generates deterministic candidates (`test-userId-0`, `test-userId-1`, ...)
//! - Asks a [`BucketPredicate`] whether each candidate's inputs land in range
//! - Bounds every search by a trial budget sized from the filter
//! - Resolves one identifier per experiment branch as a cancellable stream
//!
//! # Example
//!
//! ```rust,ignore
//! use sampler_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(predicate: Arc<dyn BucketPredicate>) -> Result<(), SearchError> {
//! let searcher = SampleSearcher::new(predicate);
//! let filter = SampleFilter::bucket(["normandy.userId", "'global-v2'"], 0, 100, 10_000);
//!
//! let identifier = searcher.find_test_identifier(&filter).await?;
//! println!("{identifier} is in the sample");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod branch_stream;
pub mod cancel;
pub mod config;
pub mod error;
pub mod generator;
pub mod predicate;
pub mod search;
pub mod slot;
pub mod state_machine;

pub use branch_stream::{default_deriver, BranchStream, SearchSnapshot, SearchStatus, TokenDeriver};
pub use cancel::{cancellation_pair, CancelHandle, CancellationToken};
pub use config::SearchConfig;
pub use error::{ConfigError, PredicateError, SearchError, TransitionError};
pub use generator::{Candidate, CandidateGenerator, CANDIDATE_PREFIX};
pub use predicate::{BucketPredicate, FnPredicate};
pub use search::SampleSearcher;
pub use slot::SearchSlot;
pub use state_machine::{allowed_transitions, validate_transition, SearchPhase};

pub use sampler_filter::{
    select_sample_filter, Branch, BucketRange, FilterError, FilterObject, ResolvedSample,
    SampleFilter, Token,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for searching sample filters
    pub use crate::{
        Branch, BranchStream, BucketPredicate, BucketRange, SampleFilter, SampleSearcher,
        SearchConfig, SearchError, SearchSlot, SearchSnapshot, SearchStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
