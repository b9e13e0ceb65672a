//! Tokenizer strategies for erflow similarity features.
//!
//! Similarity features never split text themselves; they ask a [`Tokenizer`]
//! for tokens. The set of strategies is closed and selected by name, which is
//! what lets a running pipeline swap tokenization without rebuilding its
//! similarity join.
//!
//! ## Strategies
//!
//! - `WhiteSpace` splits on Unicode whitespace and keeps punctuation attached
//!   to the surrounding token.
//! - `WhiteSpaceAndPunc` additionally splits on (and drops) punctuation.
//!
//! ## Example
//!
//! ```
//! use tokenize::Tokenizer;
//!
//! let tok: Tokenizer = "WhiteSpaceAndPunc".parse().unwrap();
//! let texts: Vec<String> = tok.tokenize("Acme, Inc.").into_iter().map(|t| t.text).collect();
//! assert_eq!(texts, vec!["Acme", "Inc"]);
//! ```
//!
//! Tokenization is a pure function of `(text, tokenizer)`: no locale, no I/O.

mod error;
mod token;
mod tokenizer;

pub use crate::error::TokenizeError;
pub use crate::token::{split_tokens, Token};
pub use crate::tokenizer::Tokenizer;
