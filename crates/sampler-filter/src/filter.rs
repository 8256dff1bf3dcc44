//! Sample filters
//!
//! Three sample filter shapes are understood, all serialized with a `type`
//! tag and camelCase names:
//!
//! ```json
//! { "type": "bucketSample", "input": ["normandy.userId", "'global-v2'"], "start": 0, "count": 100, "total": 10000 }
//! { "type": "namespaceSample", "namespace": "global-v2", "start": 0, "count": 100, "total": 10000 }
//! { "type": "stableSample", "input": ["normandy.userId"], "rate": 0.01 }
//! ```
//!
//! Validation turns any of them into a [`ResolvedSample`]: parsed tokens plus
//! one [`BucketRange`].

use crate::branch::{partition, Branch};
use crate::error::FilterError;
use crate::range::{rate_to_range, BucketRange};
use crate::token::Token;
use serde::{Deserialize, Serialize};

/// Hash `input` and accept `count` buckets out of `total` from `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSample {
    /// Raw input tokens
    pub input: Vec<String>,
    /// First accepted bucket
    pub start: i64,
    /// Number of accepted buckets
    pub count: i64,
    /// Buckets in the hash space
    pub total: i64,
}

/// Bucket sample over `[normandy.userId, '<namespace>']`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSample {
    /// Namespace string hashed with the identifier
    pub namespace: String,
    /// First accepted bucket
    pub start: i64,
    /// Number of accepted buckets
    pub count: i64,
    /// Buckets in the hash space
    pub total: i64,
}

/// Accept a `rate` fraction of the hash of `input`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableSample {
    /// Raw input tokens
    pub input: Vec<String>,
    /// Accepted fraction in `[0, 1]`
    pub rate: f64,
}

/// One of the sample filter variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SampleFilter {
    /// `bucketSample`
    BucketSample(BucketSample),
    /// `namespaceSample`
    NamespaceSample(NamespaceSample),
    /// `stableSample`
    StableSample(StableSample),
}

impl SampleFilter {
    /// Convenience constructor for a bucket sample
    #[must_use]
    pub fn bucket<S: Into<String>>(
        input: impl IntoIterator<Item = S>,
        start: i64,
        count: i64,
        total: i64,
    ) -> Self {
        Self::BucketSample(BucketSample {
            input: input.into_iter().map(Into::into).collect(),
            start,
            count,
            total,
        })
    }

    /// Convenience constructor for a namespace sample
    #[must_use]
    pub fn namespace(namespace: impl Into<String>, start: i64, count: i64, total: i64) -> Self {
        Self::NamespaceSample(NamespaceSample {
            namespace: namespace.into(),
            start,
            count,
            total,
        })
    }

    /// Convenience constructor for a stable sample
    #[must_use]
    pub fn stable<S: Into<String>>(input: impl IntoIterator<Item = S>, rate: f64) -> Self {
        Self::StableSample(StableSample {
            input: input.into_iter().map(Into::into).collect(),
            rate,
        })
    }

    /// Platform type tag
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SampleFilter::BucketSample(_) => "bucketSample",
            SampleFilter::NamespaceSample(_) => "namespaceSample",
            SampleFilter::StableSample(_) => "stableSample",
        }
    }

    /// Validate and normalize
    ///
    /// Tokens are checked before numeric parameters. `rate_precision` is the
    /// bucket count used to express a stable sample's rate.
    ///
    /// # Errors
    /// - [`FilterError::InvalidTokenFormat`] for a malformed input token
    /// - [`FilterError::InvalidRange`] for bad numeric parameters
    pub fn resolve(&self, rate_precision: u64) -> Result<ResolvedSample, FilterError> {
        match self {
            SampleFilter::BucketSample(f) => {
                let inputs = Token::parse_all(&f.input)?;
                let range = BucketRange::new(f.start, f.count, f.total)?;
                Ok(ResolvedSample::new(inputs, range))
            }
            SampleFilter::NamespaceSample(f) => {
                if f.namespace.is_empty() {
                    return Err(FilterError::invalid_range("namespace must not be empty"));
                }
                let inputs = vec![Token::UserId, Token::literal(f.namespace.clone())];
                let range = BucketRange::new(f.start, f.count, f.total)?;
                Ok(ResolvedSample::new(inputs, range))
            }
            SampleFilter::StableSample(f) => {
                let inputs = Token::parse_all(&f.input)?;
                let range = rate_to_range(f.rate, rate_precision)?;
                Ok(ResolvedSample::new(inputs, range))
            }
        }
    }
}

/// Any filter object attached to a recipe
///
/// Non-sample filters (channel, locale, version, ...) deserialize as
/// [`FilterObject::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterObject {
    /// `bucketSample`
    BucketSample(BucketSample),
    /// `namespaceSample`
    NamespaceSample(NamespaceSample),
    /// `stableSample`
    StableSample(StableSample),
    /// Any other filter type
    #[serde(other)]
    Other,
}

impl FilterObject {
    /// The sample filter carried by this object, if any
    #[must_use]
    pub fn as_sample(&self) -> Option<SampleFilter> {
        match self {
            FilterObject::BucketSample(f) => Some(SampleFilter::BucketSample(f.clone())),
            FilterObject::NamespaceSample(f) => Some(SampleFilter::NamespaceSample(f.clone())),
            FilterObject::StableSample(f) => Some(SampleFilter::StableSample(f.clone())),
            FilterObject::Other => None,
        }
    }
}

impl From<SampleFilter> for FilterObject {
    fn from(filter: SampleFilter) -> Self {
        match filter {
            SampleFilter::BucketSample(f) => FilterObject::BucketSample(f),
            SampleFilter::NamespaceSample(f) => FilterObject::NamespaceSample(f),
            SampleFilter::StableSample(f) => FilterObject::StableSample(f),
        }
    }
}

/// Isolate the single sample filter of a recipe
///
/// # Errors
/// [`FilterError::AmbiguousSampleFilter`] if more than one is present.
pub fn select_sample_filter(objects: &[FilterObject]) -> Result<Option<SampleFilter>, FilterError> {
    let mut samples = objects.iter().filter_map(FilterObject::as_sample);
    let first = samples.next();
    let extra = samples.count();

    if extra > 0 {
        return Err(FilterError::AmbiguousSampleFilter { found: extra + 1 });
    }
    Ok(first)
}

/// Validated sample: parsed inputs and the accepted range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSample {
    inputs: Vec<Token>,
    range: BucketRange,
}

impl ResolvedSample {
    /// Create from parsed parts
    #[inline]
    #[must_use]
    pub fn new(inputs: Vec<Token>, range: BucketRange) -> Self {
        Self { inputs, range }
    }

    /// Parsed input tokens
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[Token] {
        &self.inputs
    }

    /// Accepted range
    #[inline]
    #[must_use]
    pub fn range(&self) -> BucketRange {
        self.range
    }

    /// Check whether any input is the identifier sentinel
    ///
    /// Without one, every candidate hashes identically.
    #[inline]
    #[must_use]
    pub fn references_identifier(&self) -> bool {
        self.inputs.iter().any(Token::is_user_id)
    }

    /// Predicate inputs with `identifier` substituted for the sentinel
    #[must_use]
    pub fn inputs_for(&self, identifier: &str) -> Vec<String> {
        self.inputs
            .iter()
            .map(|t| t.resolve(identifier).to_string())
            .collect()
    }

    /// Per-branch sub-ranges of this sample's range
    ///
    /// # Errors
    /// See [`partition`].
    pub fn branch_ranges(&self, branches: &[Branch]) -> Result<Vec<BucketRange>, FilterError> {
        partition(self.range, branches)
    }
}
