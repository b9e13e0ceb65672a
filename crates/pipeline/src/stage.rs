//! Capability interfaces the pipeline drives.
//!
//! Concrete blockers, joins and matchers live in their own crates; the
//! pipeline only ever sees these traits.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use similarity::{SimilarityError, SimilarityFeature};

use crate::error::StageError;
use crate::model::{Block, CandidatePairs, MatchInput, Record, SharedContext};

/// Handler for pairs an asynchronous matcher discovers after it has returned.
pub type MatchCallback = Arc<dyn Fn(CandidatePairs) + Send + Sync>;

/// Partitions records into blocks of likely matches.
pub trait Blocker: Send + Sync {
    /// Identifier used in pipeline descriptions.
    fn name(&self) -> String;

    fn block(&self, records: &[Record]) -> Result<Vec<Block>, StageError>;

    fn update_context(&mut self, _ctx: &SharedContext) {}
}

/// Implementation family of a similarity join.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JoinVariant {
    /// Compares every pair.
    AllPairs,
    /// Partitions by token-set length; its similarity function is fixed.
    LengthPartition,
}

impl fmt::Display for JoinVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinVariant::AllPairs => f.write_str("all_pairs"),
            JoinVariant::LengthPartition => f.write_str("length_partition"),
        }
    }
}

/// Produces candidate pairs directly, folding in a first matching decision.
pub trait SimilarityJoin: Send + Sync {
    fn name(&self) -> String;

    fn variant(&self) -> JoinVariant;

    /// Join `left` against `right`. With `asymmetric == false` pairs are
    /// unordered: no record is paired with itself and each pair appears once.
    fn join(
        &self,
        left: &[Record],
        right: &[Record],
        asymmetric: bool,
    ) -> Result<CandidatePairs, StageError>;

    fn similarity_feature(&self) -> &SimilarityFeature;

    fn similarity_feature_mut(&mut self) -> &mut SimilarityFeature;

    /// Replace the similarity function by metric name.
    fn set_similarity_featurizer(&mut self, name: &str) -> Result<(), SimilarityError>;

    fn update_context(&mut self, _ctx: &SharedContext) {}
}

/// A refinement stage of the matcher chain.
pub trait Matcher: Send + Sync {
    fn name(&self) -> String;

    /// Refine `input` into matching pairs. Only the first stage of a
    /// blocker-based pipeline ever sees [`MatchInput::Blocks`].
    fn match_pairs(&self, input: MatchInput) -> Result<CandidatePairs, StageError>;

    fn update_context(&mut self, _ctx: &SharedContext) {}

    /// Whether this stage keeps producing matches after `match_pairs` returns.
    fn is_asynchronous(&self) -> bool {
        false
    }

    /// Install the late-match handler. Synchronous matchers ignore it.
    fn set_on_receive_new_matches(&mut self, _callback: MatchCallback) {}

    fn on_receive_new_matches(&self) -> Option<&MatchCallback> {
        None
    }
}
