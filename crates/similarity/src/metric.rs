use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::edit::normalized_edit_similarity;
use crate::error::SimilarityError;

/// Identifier for the similarity function used by a feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SimilarityMetric {
    /// `|A ∩ B| / |A ∪ B|`
    #[default]
    Jaccard,
    /// `|A ∩ B| / sqrt(|A| |B|)`
    Cosine,
    /// `2 |A ∩ B| / (|A| + |B|)`
    Dice,
    /// `|A ∩ B| / min(|A|, |B|)`
    Overlap,
    /// Normalized Levenshtein similarity over the raw strings.
    EditDistance,
}

impl SimilarityMetric {
    pub const ALL: [SimilarityMetric; 5] = [
        SimilarityMetric::Jaccard,
        SimilarityMetric::Cosine,
        SimilarityMetric::Dice,
        SimilarityMetric::Overlap,
        SimilarityMetric::EditDistance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SimilarityMetric::Jaccard => "Jaccard",
            SimilarityMetric::Cosine => "Cosine",
            SimilarityMetric::Dice => "Dice",
            SimilarityMetric::Overlap => "Overlap",
            SimilarityMetric::EditDistance => "EditDistance",
        }
    }

    /// True when the metric compares token sets rather than raw strings.
    pub fn is_set_based(&self) -> bool {
        !matches!(self, SimilarityMetric::EditDistance)
    }

    /// Score two token sets. Two empty sets are identical; one empty set
    /// shares nothing with the other.
    pub fn score_sets(&self, a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let inter = a.intersection(b).count() as f64;
        let (la, lb) = (a.len() as f64, b.len() as f64);
        match self {
            SimilarityMetric::Jaccard => inter / (la + lb - inter),
            SimilarityMetric::Cosine => inter / (la * lb).sqrt(),
            SimilarityMetric::Dice => 2.0 * inter / (la + lb),
            SimilarityMetric::Overlap => inter / la.min(lb),
            SimilarityMetric::EditDistance => {
                let joined_a = a.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
                let joined_b = b.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
                normalized_edit_similarity(&joined_a, &joined_b)
            }
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimilarityMetric {
    type Err = SimilarityError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SimilarityMetric::ALL
            .into_iter()
            .find(|metric| metric.name() == name)
            .ok_or_else(|| SimilarityError::UnknownMetric(name.to_string()))
    }
}
