//! Experiment branches
//!
//! Branches split an already-selected sample into weighted shares. Each
//! branch is mapped onto its own contiguous slice of the parent range so that
//! a branch hit is always a sample hit as well.

use crate::error::FilterError;
use crate::range::BucketRange;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Weighted sub-population of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Unique branch name
    pub slug: String,
    /// Relative weight
    pub ratio: f64,
}

impl Branch {
    /// Create a new branch
    #[inline]
    #[must_use]
    pub fn new(slug: impl Into<String>, ratio: f64) -> Self {
        Self {
            slug: slug.into(),
            ratio,
        }
    }
}

/// Check slugs are non-empty and unique and ratios are positive
///
/// # Errors
/// - [`FilterError::DuplicateBranchSlug`] on the first repeated slug
/// - [`FilterError::InvalidRange`] on an empty slug or a bad ratio
pub fn validate_branches(branches: &[Branch]) -> Result<(), FilterError> {
    let mut seen = HashSet::with_capacity(branches.len());

    for branch in branches {
        if branch.slug.is_empty() {
            return Err(FilterError::invalid_range("branch slug must not be empty"));
        }
        if !branch.ratio.is_finite() || branch.ratio <= 0.0 {
            return Err(FilterError::invalid_range(format!(
                "branch {} ratio must be a positive number, got {}",
                branch.slug, branch.ratio
            )));
        }
        if !seen.insert(branch.slug.as_str()) {
            return Err(FilterError::DuplicateBranchSlug {
                slug: branch.slug.clone(),
            });
        }
    }

    Ok(())
}

/// Split `parent` into one contiguous range per branch, proportional to ratio
///
/// Boundaries are `floor(count * cumulative / sum)`; the last branch always
/// ends at the parent's end. All ranges share the parent's `total`.
///
/// # Errors
/// Anything [`validate_branches`] rejects.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn partition(parent: BucketRange, branches: &[Branch]) -> Result<Vec<BucketRange>, FilterError> {
    validate_branches(branches)?;

    let weight: f64 = branches.iter().map(|b| b.ratio).sum();
    let count = parent.count();
    let total = parent.total();

    let mut ranges = Vec::with_capacity(branches.len());
    let mut cumulative = 0.0;
    let mut lower = 0u64;

    for (i, branch) in branches.iter().enumerate() {
        cumulative += branch.ratio;
        let upper = if i + 1 == branches.len() {
            count
        } else {
            ((count as f64 * cumulative / weight).floor() as u64).clamp(lower, count)
        };

        let start = (parent.start() + lower) % total;
        ranges.push(BucketRange::from_parts(start, upper - lower, total));
        lower = upper;
    }

    Ok(ranges)
}
