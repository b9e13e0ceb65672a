//! # erflow pipeline core
//!
//! ## Purpose
//!
//! Given one collection of records, produce the pairs judged to refer to the
//! same real-world entity. The work is split into two phases:
//!
//! 1. **Generation**: exactly one generator runs once. A [`Blocker`]
//!    partitions records into [`Block`]s; a [`SimilarityJoin`] self-joins the
//!    records into [`CandidatePairs`] directly.
//! 2. **Matching**: the matcher chain is folded left to right. The first
//!    stage receives the generator's output (blocks or pairs); every later
//!    stage receives the pairs returned by the one before it.
//!
//! The generator is a sum type ([`Generator`]), so a pipeline can never hold
//! both a blocker and a join, or neither.
//!
//! ## Reconfiguration
//!
//! Between runs a pipeline can grow its chain ([`Pipeline::add_matcher`]),
//! broadcast a new [`SharedContext`] ([`Pipeline::update_context`]), and
//! swap the join's similarity metric or tokenizer by name
//! ([`Pipeline::change_similarity`], [`Pipeline::change_tokenization`]).
//!
//! ## Asynchronous matchers
//!
//! The last matcher may be asynchronous: it returns its synchronous share of
//! the result and keeps working in the background, later handing extra pairs
//! to the callback registered with [`Pipeline::set_on_receive_new_matches`].
//! The pipeline never waits on, cancels, or times out that work.
//!
//! ## Observability
//!
//! Runs are traced with `tracing` (span `pipeline.run`, events
//! `generation_complete`, `matching_complete`, `stage_failure`). Attach a
//! [`PipelineMetrics`] sink with [`Pipeline::with_metrics`] to receive
//! timings and counts.
//!
//! ## Errors
//!
//! [`PipelineError::Configuration`] for invalid setups or reconfiguration
//! requests, [`PipelineError::Stage`] for any generator or matcher failure.

mod error;
mod metrics;
mod model;
mod pipeline;
mod stage;

pub use crate::error::{PipelineError, StageError};
pub use crate::metrics::{GenerationStrategy, PipelineMetrics};
pub use crate::model::{Block, CandidatePairs, MatchInput, Record, RecordPair, SharedContext};
pub use crate::pipeline::{Generator, Pipeline, OUTPUT_STAGE};
pub use crate::stage::{Blocker, JoinVariant, MatchCallback, Matcher, SimilarityJoin};

#[cfg(test)]
mod tests;
