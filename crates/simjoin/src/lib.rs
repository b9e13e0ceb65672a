//! Similarity joins.
//!
//! A similarity join generates candidate pairs and makes a first match
//! decision in the same step: only pairs whose similarity on the join field
//! reaches the threshold come out.
//!
//! - [`AllPairsJoin`] scores every pair with any [`SimilarityFeature`].
//! - [`LengthPartitionJoin`] is Jaccard-only. It buckets records by token-set
//!   size and skips bucket pairs that cannot reach the threshold, since
//!   `J(A, B) <= min(|A|, |B|) / max(|A|, |B|)`.
//!
//! Both compare data-parallel with rayon and return pairs sorted by identity,
//! so output does not depend on thread scheduling. Records missing the join
//! field never join.
//!
//! [`SimilarityFeature`]: similarity::SimilarityFeature

mod all_pairs;
mod error;
mod length_partition;
mod pairs;

pub use crate::all_pairs::AllPairsJoin;
pub use crate::error::JoinError;
pub use crate::length_partition::LengthPartitionJoin;
