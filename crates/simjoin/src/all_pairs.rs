use std::time::Instant;

use pipeline::{
    CandidatePairs, JoinVariant, Record, RecordPair, SharedContext, SimilarityJoin, StageError,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use similarity::{SimilarityError, SimilarityFeature};
use tracing::debug;

use crate::error::{validate_threshold, JoinError};
use crate::pairs::{finish, is_self_join, make_pair, should_compare};

/// Scores every pair on one field and keeps those at or above `threshold`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllPairsJoin {
    field: usize,
    threshold: f64,
    feature: SimilarityFeature,
    #[serde(skip)]
    context: SharedContext,
}

impl AllPairsJoin {
    pub fn new(field: usize, threshold: f64, feature: SimilarityFeature) -> Result<Self, JoinError> {
        validate_threshold(threshold)?;
        Ok(Self {
            field,
            threshold,
            feature,
            context: SharedContext::default(),
        })
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }
}

impl SimilarityJoin for AllPairsJoin {
    fn name(&self) -> String {
        format!("AllPairsJoin(field={}, t={})", self.field, self.threshold)
    }

    fn variant(&self) -> JoinVariant {
        JoinVariant::AllPairs
    }

    fn join(
        &self,
        left: &[Record],
        right: &[Record],
        asymmetric: bool,
    ) -> Result<CandidatePairs, StageError> {
        let start = Instant::now();
        let self_join = is_self_join(left, right);
        let field = self.field;

        let pairs: Vec<RecordPair> = left
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, a)| {
                right.iter().enumerate().filter_map(move |(j, b)| {
                    if !should_compare(a, b, i, j, self_join, asymmetric) {
                        return None;
                    }
                    let (va, vb) = (a.field(field)?, b.field(field)?);
                    (self.feature.score(va, vb) >= self.threshold)
                        .then(|| make_pair(a, b, asymmetric))
                })
            })
            .collect();

        let out = finish(pairs);
        debug!(
            left = left.len(),
            right = right.len(),
            candidates = out.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "all_pairs_join"
        );
        Ok(out)
    }

    fn similarity_feature(&self) -> &SimilarityFeature {
        &self.feature
    }

    fn similarity_feature_mut(&mut self) -> &mut SimilarityFeature {
        &mut self.feature
    }

    fn set_similarity_featurizer(&mut self, name: &str) -> Result<(), SimilarityError> {
        self.feature.set_metric(name.parse()?);
        Ok(())
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.context = ctx.clone();
    }
}
