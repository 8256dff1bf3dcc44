//! Search configuration
//!
//! ```toml
//! trial_multiplier = 10.0
//! max_trials = 1_000_000
//! rate_precision = 10_000
//! ```

use crate::error::ConfigError;
use sampler_filter::BucketRange;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Safety margin over the expected number of trials per hit
    pub trial_multiplier: f64,
    /// Hard cap on trials per search, regardless of the filter
    pub max_trials: Option<u64>,
    /// Buckets used to express a stable sample's rate
    pub rate_precision: u64,
}

impl SearchConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With trial multiplier
    #[inline]
    #[must_use]
    pub fn with_trial_multiplier(mut self, multiplier: f64) -> Self {
        self.trial_multiplier = multiplier;
        self
    }

    /// With a hard trial cap
    #[inline]
    #[must_use]
    pub fn with_max_trials(mut self, max: u64) -> Self {
        self.max_trials = Some(max);
        self
    }

    /// With rate precision
    #[inline]
    #[must_use]
    pub fn with_rate_precision(mut self, precision: u64) -> Self {
        self.rate_precision = precision;
        self
    }

    /// Check values are usable
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for a non-positive multiplier, a zero cap or
    /// a zero precision.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.trial_multiplier.is_finite() || self.trial_multiplier <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trial_multiplier must be a positive number, got {}",
                self.trial_multiplier
            )));
        }
        if self.max_trials == Some(0) {
            return Err(ConfigError::Invalid("max_trials must be positive".to_string()));
        }
        if self.rate_precision == 0 {
            return Err(ConfigError::Invalid("rate_precision must be positive".to_string()));
        }
        Ok(())
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`SearchConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Trials allowed for a range: `ceil(total * multiplier / max(count, 1))`
    ///
    /// Always at least one, and never above `max_trials`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn trial_budget(&self, range: BucketRange) -> u64 {
        let per_hit = range.total() as f64 * self.trial_multiplier;
        let budget = (per_hit / range.count().max(1) as f64).ceil();
        let budget = if budget >= u64::MAX as f64 {
            u64::MAX
        } else {
            (budget as u64).max(1)
        };

        match self.max_trials {
            Some(cap) => budget.min(cap),
            None => budget,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            trial_multiplier: 10.0,
            max_trials: None,
            rate_precision: 10_000,
        }
    }
}
