//! Key-based blocking.
//!
//! [`KeyBlocker`] groups records that share a blocking key derived from one
//! field. Only records inside the same block are ever compared by the
//! matcher chain, so the key should be cheap and high-recall: a normalized
//! surname prefix, a postcode, a year of birth.

use std::collections::BTreeMap;

use pipeline::{Block, Blocker, Record, SharedContext, StageError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Blocks records on the (optionally lowercased, optionally truncated) value
/// of one field.
///
/// Records without a usable key land in a singleton block keyed by their id,
/// so nothing is silently dropped. Blocks come out in ascending key order and
/// keep input order inside each block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyBlocker {
    /// Index of the field the key is derived from.
    pub field: usize,
    /// Keep only the first `prefix_len` chars of the key.
    #[serde(default)]
    pub prefix_len: Option<usize>,
    /// Lowercase the key before grouping.
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    #[serde(skip)]
    context: SharedContext,
}

fn default_lowercase() -> bool {
    true
}

impl KeyBlocker {
    pub fn new(field: usize) -> Self {
        Self {
            field,
            prefix_len: None,
            lowercase: default_lowercase(),
            context: SharedContext::default(),
        }
    }

    pub fn with_prefix_len(mut self, prefix_len: usize) -> Self {
        self.prefix_len = Some(prefix_len);
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    /// Last context broadcast by the owning pipeline.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Blocking key for `record`, or `None` when the field is missing or
    /// blank.
    pub fn key_for(&self, record: &Record) -> Option<String> {
        let raw = record.field(self.field)?.trim();
        if raw.is_empty() {
            return None;
        }
        let key: String = match self.prefix_len {
            Some(n) => raw.chars().take(n).collect(),
            None => raw.to_string(),
        };
        Some(if self.lowercase { key.to_lowercase() } else { key })
    }
}

impl Blocker for KeyBlocker {
    fn name(&self) -> String {
        match self.prefix_len {
            Some(n) => format!("KeyBlocker(field={}, prefix={n})", self.field),
            None => format!("KeyBlocker(field={})", self.field),
        }
    }

    fn block(&self, records: &[Record]) -> Result<Vec<Block>, StageError> {
        let mut keyed: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        let mut unkeyed: Vec<Block> = Vec::new();

        for record in records {
            match self.key_for(record) {
                Some(key) => keyed.entry(key).or_default().push(record.clone()),
                None => unkeyed.push(Block::new(
                    format!("#{}", record.id),
                    vec![record.clone()],
                )),
            }
        }

        let mut blocks: Vec<Block> = keyed
            .into_iter()
            .map(|(key, records)| Block::new(key, records))
            .collect();
        debug!(
            keyed = blocks.len(),
            unkeyed = unkeyed.len(),
            "blocking_complete"
        );
        blocks.extend(unkeyed);
        Ok(blocks)
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.context = ctx.clone();
    }
}
