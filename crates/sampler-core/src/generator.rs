//! Synthetic candidate identifiers
//!
//! Candidates are `test-userId-0`, `test-userId-1`, ... The mapping from
//! index to identifier never changes, so "trial 42 succeeded" means the same
//! thing in every process.

/// Prefix of every generated identifier
pub const CANDIDATE_PREFIX: &str = "test-userId-";

/// One trial: its index and the identifier tried
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// Trial index, starting at 0
    pub index: u64,
    /// Identifier substituted for the sentinel
    pub identifier: String,
}

impl Candidate {
    /// Generated candidate for index `n`
    #[inline]
    #[must_use]
    pub fn at(index: u64) -> Self {
        Self {
            index,
            identifier: format!("{CANDIDATE_PREFIX}{index}"),
        }
    }

    /// Candidate with an explicit identifier
    #[inline]
    #[must_use]
    pub fn new(index: u64, identifier: impl Into<String>) -> Self {
        Self {
            index,
            identifier: identifier.into(),
        }
    }
}

/// Restartable sequence of generated candidates
///
/// Each search owns its own generator; iteration state is never shared.
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    next: u64,
}

impl CandidateGenerator {
    /// Generator starting at index 0
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator starting at index `n`
    #[inline]
    #[must_use]
    pub fn starting_at(n: u64) -> Self {
        Self { next: n }
    }

    /// Index of the next candidate
    #[inline]
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next
    }
}

impl Iterator for CandidateGenerator {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        let candidate = Candidate::at(self.next);
        self.next = self.next.checked_add(1)?;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
