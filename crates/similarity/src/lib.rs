//! # erflow similarity features
//!
//! A [`SimilarityFeature`] scores a pair of field values in `[0.0, 1.0]`
//! using a [`SimilarityMetric`] and a [`Tokenizer`]. Both halves are
//! replaceable by name at runtime; similarity joins and rule-based matchers
//! hold a feature and delegate every comparison to it.
//!
//! ## Metrics
//!
//! - `Jaccard`, `Dice`, `Cosine`, `Overlap`: set overlap over the token sets
//!   produced by the configured tokenizer.
//! - `EditDistance`: normalized Levenshtein similarity over characters. It
//!   ignores the tokenizer.
//!
//! ```
//! use similarity::{SimilarityFeature, SimilarityMetric};
//! use tokenize::Tokenizer;
//!
//! let feature = SimilarityFeature::new(SimilarityMetric::Jaccard, Tokenizer::WhiteSpace);
//! assert_eq!(feature.score("acme corp", "acme corp"), 1.0);
//! assert_eq!(feature.name(), "Jaccard(WhiteSpace)");
//! ```

mod edit;
mod error;
mod feature;
mod metric;

pub use crate::edit::{levenshtein, normalized_edit_similarity};
pub use crate::error::SimilarityError;
pub use crate::feature::SimilarityFeature;
pub use crate::metric::SimilarityMetric;
pub use tokenize::Tokenizer;
