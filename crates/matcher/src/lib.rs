//! # erflow matchers
//!
//! Reference implementations of the [`pipeline::Matcher`] capability.
//!
//! - [`ThresholdMatcher`]: rule-based; keeps pairs whose similarity on one
//!   field reaches a threshold.
//! - [`PredicateMatcher`]: keeps pairs accepted by an arbitrary closure.
//! - [`DeferredMatcher`]: runs any matcher in the background on a tokio
//!   blocking task and reports its result through the pipeline's late-match
//!   callback.
//!
//! Every matcher accepts both blocks and pairs: blocks expand into their
//! unordered intra-block pairs first (see [`pipeline::MatchInput::into_pairs`]).

mod deferred;
mod predicate;
mod threshold;

pub use crate::deferred::{match_callback_channel, DeferredMatcher};
pub use crate::predicate::PredicateMatcher;
pub use crate::threshold::ThresholdMatcher;
