//! Records and the collections that flow between pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An opaque tuple of field values plus a stable identifier.
///
/// The pipeline never reads `fields`; only generators and matchers do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Record {
    pub fn new<I, S>(id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Field value at `idx`, if present.
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

/// An ordered pair of records considered jointly by a matcher.
///
/// Identity is exactly the two constituent records, in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordPair {
    pub left: Record,
    pub right: Record,
}

impl RecordPair {
    pub fn new(left: Record, right: Record) -> Self {
        Self { left, right }
    }

    /// Pair with the lower record id on the left. Used wherever pairs are
    /// unordered (self-joins, intra-block expansion).
    pub fn unordered(a: Record, b: Record) -> Self {
        if b.id < a.id {
            Self::new(b, a)
        } else {
            Self::new(a, b)
        }
    }

    pub fn ids(&self) -> (&str, &str) {
        (self.left.id.as_str(), self.right.id.as_str())
    }
}

/// Records a blocker grouped as mutually comparable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub key: String,
    pub records: Vec<Record>,
}

impl Block {
    pub fn new(key: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            key: key.into(),
            records,
        }
    }

    /// Every unordered pair of distinct records in the block, in block order.
    pub fn pairs(&self) -> impl Iterator<Item = RecordPair> + '_ {
        self.records.iter().enumerate().flat_map(move |(i, a)| {
            self.records[i + 1..]
                .iter()
                .filter(move |b| b.id != a.id)
                .map(move |b| RecordPair::unordered(a.clone(), b.clone()))
        })
    }
}

/// The working collection threaded through the matcher chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CandidatePairs {
    pairs: Vec<RecordPair>,
}

impl CandidatePairs {
    pub fn new(pairs: Vec<RecordPair>) -> Self {
        Self { pairs }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordPair> {
        self.pairs.iter()
    }

    pub fn as_slice(&self) -> &[RecordPair] {
        &self.pairs
    }

    pub fn into_vec(self) -> Vec<RecordPair> {
        self.pairs
    }

    pub fn push(&mut self, pair: RecordPair) {
        self.pairs.push(pair);
    }

    /// True when a pair with these ids (in this order) is present.
    pub fn contains_ids(&self, left: &str, right: &str) -> bool {
        self.pairs.iter().any(|p| p.ids() == (left, right))
    }

    /// `(left_id, right_id)` of every pair, in collection order.
    pub fn id_pairs(&self) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .map(|p| (p.left.id.clone(), p.right.id.clone()))
            .collect()
    }
}

impl FromIterator<RecordPair> for CandidatePairs {
    fn from_iter<T: IntoIterator<Item = RecordPair>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for CandidatePairs {
    type Item = RecordPair;
    type IntoIter = std::vec::IntoIter<RecordPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidatePairs {
    type Item = &'a RecordPair;
    type IntoIter = std::slice::Iter<'a, RecordPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl Extend<RecordPair> for CandidatePairs {
    fn extend<T: IntoIterator<Item = RecordPair>>(&mut self, iter: T) {
        self.pairs.extend(iter);
    }
}

/// What a matcher receives: blocks from a blocker (first stage only) or the
/// pair collection produced by the previous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchInput {
    Blocks(Vec<Block>),
    Pairs(CandidatePairs),
}

impl MatchInput {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchInput::Blocks(_) => "blocks",
            MatchInput::Pairs(_) => "pairs",
        }
    }

    /// Flatten into pairs. Blocks expand to every unordered intra-block pair;
    /// pairs pass through untouched.
    pub fn into_pairs(self) -> CandidatePairs {
        match self {
            MatchInput::Blocks(blocks) => blocks.iter().flat_map(Block::pairs).collect(),
            MatchInput::Pairs(pairs) => pairs,
        }
    }
}

/// Opaque context values broadcast to every component that accepts them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SharedContext(Vec<JsonValue>);

impl SharedContext {
    pub fn new(values: Vec<JsonValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[JsonValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<JsonValue>> for SharedContext {
    fn from(values: Vec<JsonValue>) -> Self {
        Self(values)
    }
}
