use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unicode_categories::UnicodeCategories;

use crate::error::TokenizeError;
use crate::token::{split_tokens, Token};

/// Closed set of tokenization strategies, selectable by name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Tokenizer {
    /// Split on Unicode whitespace only.
    #[default]
    WhiteSpace,
    /// Split on Unicode whitespace and punctuation; punctuation is dropped.
    WhiteSpaceAndPunc,
}

impl Tokenizer {
    /// Every strategy, in declaration order.
    pub const ALL: [Tokenizer; 2] = [Tokenizer::WhiteSpace, Tokenizer::WhiteSpaceAndPunc];

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Tokenizer::WhiteSpace => "WhiteSpace",
            Tokenizer::WhiteSpaceAndPunc => "WhiteSpaceAndPunc",
        }
    }

    /// Tokenize `text` with byte offsets.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        match self {
            Tokenizer::WhiteSpace => split_tokens(text, char::is_whitespace),
            Tokenizer::WhiteSpaceAndPunc => {
                split_tokens(text, |ch| ch.is_whitespace() || ch.is_punctuation())
            }
        }
    }

    /// Distinct token texts, ordered. This is the view set-based similarity
    /// metrics compare.
    pub fn token_set(&self, text: &str) -> BTreeSet<String> {
        self.tokenize(text).into_iter().map(|t| t.text).collect()
    }
}

impl fmt::Display for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tokenizer {
    type Err = TokenizeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Tokenizer::ALL
            .into_iter()
            .find(|tok| tok.name() == name)
            .ok_or_else(|| TokenizeError::UnknownTokenizer(name.to_string()))
    }
}
