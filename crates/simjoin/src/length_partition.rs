use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use pipeline::{
    CandidatePairs, JoinVariant, Record, RecordPair, SharedContext, SimilarityJoin, StageError,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use similarity::{SimilarityError, SimilarityFeature, SimilarityMetric, Tokenizer};
use tracing::debug;

use crate::error::{validate_threshold, JoinError};
use crate::pairs::{finish, is_self_join, make_pair, should_compare};

/// Jaccard join that only compares records whose token-set sizes can reach
/// the threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LengthPartitionJoin {
    field: usize,
    threshold: f64,
    feature: SimilarityFeature,
    #[serde(skip)]
    context: SharedContext,
}

type TokenSets = Vec<Option<BTreeSet<String>>>;

impl LengthPartitionJoin {
    pub fn new(field: usize, threshold: f64, tokenizer: Tokenizer) -> Result<Self, JoinError> {
        validate_threshold(threshold)?;
        Ok(Self {
            field,
            threshold,
            feature: SimilarityFeature::new(SimilarityMetric::Jaccard, tokenizer),
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

    fn token_sets(&self, records: &[Record]) -> TokenSets {
        let tokenizer = self.feature.tokenizer();
        records
            .par_iter()
            .map(|r| r.field(self.field).map(|v| tokenizer.token_set(v)))
            .collect()
    }

    /// Jaccard upper bound from set sizes alone.
    fn sizes_compatible(&self, a: usize, b: usize) -> bool {
        let (lo, hi) = (a.min(b), a.max(b));
        if hi == 0 {
            return true;
        }
        lo as f64 / hi as f64 >= self.threshold
    }
}

fn partition(sets: &TokenSets) -> BTreeMap<usize, Vec<usize>> {
    let mut parts: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, set) in sets.iter().enumerate() {
        if let Some(set) = set {
            parts.entry(set.len()).or_default().push(idx);
        }
    }
    parts
}

impl SimilarityJoin for LengthPartitionJoin {
    fn name(&self) -> String {
        format!("LengthPartitionJoin(field={}, t={})", self.field, self.threshold)
    }

    fn variant(&self) -> JoinVariant {
        JoinVariant::LengthPartition
    }

    fn join(
        &self,
        left: &[Record],
        right: &[Record],
        asymmetric: bool,
    ) -> Result<CandidatePairs, StageError> {
        let start = Instant::now();
        let self_join = is_self_join(left, right);
        let left_sets = self.token_sets(left);
        let right_sets = if self_join {
            left_sets.clone()
        } else {
            self.token_sets(right)
        };
        let right_parts = partition(&right_sets);

        let pairs: Vec<RecordPair> = left
            .par_iter()
            .enumerate()
            .filter_map(|(i, a)| left_sets[i].as_ref().map(|set| (i, a, set)))
            .flat_map_iter(|(i, a, set_a)| {
                let right_sets = &right_sets;
                right_parts
                    .iter()
                    .filter(move |(size, _)| self.sizes_compatible(set_a.len(), **size))
                    .flat_map(|(_, idxs)| idxs.iter().copied())
                    .filter_map(move |j| {
                        let b = &right[j];
                        if !should_compare(a, b, i, j, self_join, asymmetric) {
                            return None;
                        }
                        let set_b = right_sets[j].as_ref()?;
                        (SimilarityMetric::Jaccard.score_sets(set_a, set_b) >= self.threshold)
                            .then(|| make_pair(a, b, asymmetric))
                    })
            })
            .collect();

        let out = finish(pairs);
        debug!(
            left = left.len(),
            right = right.len(),
            partitions = right_parts.len(),
            candidates = out.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "length_partition_join"
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
        let metric: SimilarityMetric = name.parse()?;
        if metric != SimilarityMetric::Jaccard {
            return Err(SimilarityError::UnsupportedMetric {
                metric: metric.to_string(),
                context: "length-partition join".into(),
            });
        }
        Ok(())
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.context = ctx.clone();
    }
}
