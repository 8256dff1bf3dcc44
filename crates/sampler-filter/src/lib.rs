//! Sampler Filter Model
//!
//! Data model for hash-bucketed sample filters and experiment branches.
//!
//! # Core Concepts
//!
//! - [`SampleFilter`]: `bucketSample`, `namespaceSample` or `stableSample`
//! - [`Token`]: a filter input, either `normandy.userId` or a quoted constant
//! - [`BucketRange`]: validated `start`/`count`/`total`
//! - [`ResolvedSample`]: parsed tokens plus range, ready for searching
//! - [`Branch`]: weighted share of a sample
//!
//! # Example
//!
//! ```rust
//! use sampler_filter::SampleFilter;
//!
//! let filter = SampleFilter::bucket(["normandy.userId", "'global-v2'"], 0, 100, 10_000);
//! let resolved = filter.resolve(10_000).unwrap();
//!
//! assert_eq!(resolved.inputs_for("test-userId-0"), vec!["test-userId-0", "global-v2"]);
//! ```

#![warn(unreachable_pub)]

mod branch;
mod error;
mod filter;
mod range;
mod token;

pub use branch::{partition, validate_branches, Branch};
pub use error::FilterError;
pub use filter::{
    select_sample_filter, BucketSample, FilterObject, NamespaceSample, ResolvedSample,
    SampleFilter, StableSample,
};
pub use range::{rate_to_range, BucketRange};
pub use token::{Quote, Token, USER_ID_SENTINEL};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
