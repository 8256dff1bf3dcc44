//! Error types for the filter model
//!
//! Every variant here is detected before a single predicate call is made.

/// Filter validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Input token is neither the identifier sentinel nor a quoted constant
    #[error("invalid token format: {token:?} is neither normandy.userId nor a quoted constant")]
    InvalidTokenFormat {
        /// The offending raw token
        token: String,
    },

    /// Numeric parameters violate basic invariants
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// More than one sample filter where at most one is allowed
    #[error("ambiguous sample filter: found {found} sample filters, expected at most one")]
    AmbiguousSampleFilter {
        /// Number of sample filters found
        found: usize,
    },

    /// Two branches share a slug
    #[error("duplicate branch slug: {slug}")]
    DuplicateBranchSlug {
        /// The repeated slug
        slug: String,
    },
}

impl FilterError {
    /// Create an invalid range error
    #[inline]
    pub fn invalid_range(reason: impl Into<String>) -> Self {
        Self::InvalidRange(reason.into())
    }
}
