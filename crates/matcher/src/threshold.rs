use pipeline::{CandidatePairs, MatchInput, Matcher, RecordPair, SharedContext, StageError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use similarity::SimilarityFeature;

/// Keeps pairs whose similarity on `field` is at least `threshold`.
///
/// Pairs where either record lacks the field are dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdMatcher {
    pub field: usize,
    pub threshold: f64,
    pub feature: SimilarityFeature,
    #[serde(skip)]
    context: SharedContext,
}

impl ThresholdMatcher {
    pub fn new(field: usize, threshold: f64, feature: SimilarityFeature) -> Self {
        Self {
            field,
            threshold,
            feature,
            context: SharedContext::default(),
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    fn accepts(&self, pair: &RecordPair) -> bool {
        match (pair.left.field(self.field), pair.right.field(self.field)) {
            (Some(a), Some(b)) => self.feature.score(a, b) >= self.threshold,
            _ => false,
        }
    }
}

impl Matcher for ThresholdMatcher {
    fn name(&self) -> String {
        format!(
            "ThresholdMatcher({}, field={}, t={})",
            self.feature.name(),
            self.field,
            self.threshold
        )
    }

    fn match_pairs(&self, input: MatchInput) -> Result<CandidatePairs, StageError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(StageError::InvalidInput(format!(
                "threshold must be within [0.0, 1.0], got {}",
                self.threshold
            )));
        }
        let pairs: Vec<RecordPair> = input
            .into_pairs()
            .into_vec()
            .into_par_iter()
            .filter(|pair| self.accepts(pair))
            .collect();
        Ok(CandidatePairs::new(pairs))
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.context = ctx.clone();
    }
}
