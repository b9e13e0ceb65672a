use std::fmt;

use pipeline::{CandidatePairs, MatchInput, Matcher, RecordPair, StageError};

/// Keeps the pairs a closure accepts.
pub struct PredicateMatcher<F> {
    name: String,
    predicate: F,
}

impl<F> PredicateMatcher<F>
where
    F: Fn(&RecordPair) -> bool + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl PredicateMatcher<fn(&RecordPair) -> bool> {
    /// Accepts every pair it is given.
    pub fn accept_all() -> Self {
        Self {
            name: "AcceptAll".into(),
            predicate: |_| true,
        }
    }
}

impl<F> Matcher for PredicateMatcher<F>
where
    F: Fn(&RecordPair) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn match_pairs(&self, input: MatchInput) -> Result<CandidatePairs, StageError> {
        Ok(input
            .into_pairs()
            .into_iter()
            .filter(|pair| (self.predicate)(pair))
            .collect())
    }
}

impl<F> fmt::Debug for PredicateMatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
