//! Error types for sampler core
//!
//! Provides error handling for:
//! - Filter validation failures (wrapped from the filter model)
//! - Trial budget exhaustion
//! - Failures of the external bucket predicate
//! - Cancellation
//! - Configuration problems

use crate::state_machine::SearchPhase;
use sampler_filter::FilterError;

/// Main search error type
///
/// Every variant is terminal for the search that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Filter or branch list rejected before any trial
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Trial budget exhausted without an accepted candidate
    #[error("no matching identifier found after {trials} trials")]
    NoMatchingIdentifier {
        /// Candidates tried
        trials: u64,
    },

    /// The bucket predicate itself failed
    #[error(transparent)]
    Predicate(#[from] PredicateError),

    /// Cancelled at a suspension point
    #[error("search cancelled")]
    Cancelled,
}

impl SearchError {
    /// Check if the filter or branches were rejected before searching
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Filter(_))
    }

    /// Check if this should be reported to whoever started the search
    ///
    /// Everything except cancellation, which the consumer asked for.
    #[inline]
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !self.is_cancelled()
    }

    /// Check if this should be shown as "no matching client found"
    #[inline]
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatchingIdentifier { .. })
    }

    /// Check if this is a cancellation rather than a failure
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure reported by a [`BucketPredicate`](crate::BucketPredicate)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bucket predicate failed: {message}")]
pub struct PredicateError {
    message: String,
}

impl PredicateError {
    /// Create a predicate error
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Failure description
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of its allowed range
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// TOML could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// File could not be read
    #[error("failed to read configuration: {0}")]
    Io(String),
}

/// Illegal search phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal search transition {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Current phase
    pub from: SearchPhase,
    /// Requested phase
    pub to: SearchPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_errors_are_transparent() {
        let err = SearchError::from(FilterError::InvalidTokenFormat {
            token: "foo".to_string(),
        });
        assert!(err.is_validation());
        assert!(err.to_string().starts_with("invalid token format"));
    }

    #[test]
    fn no_match_display() {
        let err = SearchError::NoMatchingIdentifier { trials: 1000 };
        assert!(err.is_no_match());
        assert_eq!(err.to_string(), "no matching identifier found after 1000 trials");
    }

    #[test]
    fn predicate_error_display() {
        let err = SearchError::from(PredicateError::new("privileged call rejected"));
        assert_eq!(err.to_string(), "bucket predicate failed: privileged call rejected");
        assert!(!err.is_validation());
        assert!(!err.is_cancelled());
        assert!(err.is_user_visible());
        assert!(!SearchError::Cancelled.is_user_visible());
    }

    #[test]
    fn transition_error_display() {
        let err = TransitionError {
            from: SearchPhase::Resolved,
            to: SearchPhase::Searching,
        };
        assert!(err.to_string().contains("Resolved -> Searching"));
    }
}
