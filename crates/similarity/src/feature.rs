use serde::{Deserialize, Serialize};
use tokenize::Tokenizer;

use crate::edit::normalized_edit_similarity;
use crate::metric::SimilarityMetric;

/// A configured pairwise similarity function.
///
/// Cheap to clone; a join or matcher owns one and mutates it in place when
/// the pipeline reconfigures similarity or tokenization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SimilarityFeature {
    metric: SimilarityMetric,
    tokenizer: Tokenizer,
}

impl SimilarityFeature {
    pub fn new(metric: SimilarityMetric, tokenizer: Tokenizer) -> Self {
        Self { metric, tokenizer }
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    pub fn set_metric(&mut self, metric: SimilarityMetric) {
        self.metric = metric;
    }

    pub fn set_tokenizer(&mut self, tokenizer: Tokenizer) {
        self.tokenizer = tokenizer;
    }

    /// Builder-style variant of [`set_tokenizer`](Self::set_tokenizer).
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Score two field values in `[0.0, 1.0]`.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        if !self.metric.is_set_based() {
            return normalized_edit_similarity(a, b);
        }
        let sa = self.tokenizer.token_set(a);
        let sb = self.tokenizer.token_set(b);
        self.metric.score_sets(&sa, &sb)
    }

    /// Stable identifier, e.g. `Jaccard(WhiteSpace)`.
    pub fn name(&self) -> String {
        format!("{}({})", self.metric, self.tokenizer)
    }
}
