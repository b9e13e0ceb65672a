//! Workspace umbrella crate for erflow, an entity-resolution pipeline.
//!
//! This crate re-exports the stage crates so callers can build and run a
//! pipeline from one dependency, and adds YAML configuration
//! ([`ErflowConfig`], [`build_pipeline`]) plus an optional bridge to the
//! `metrics` facade (feature `metrics`).
//!
//! ```no_run
//! use erflow::{build_pipeline, ErflowConfig, Record};
//!
//! let config = ErflowConfig::from_file("pipeline.yaml")?;
//! let pipeline = build_pipeline(&config)?;
//! let records = vec![
//!     Record::new("a", ["acme corp"]),
//!     Record::new("b", ["acme corporation"]),
//! ];
//! let matches = pipeline.run_pipeline(&records)?;
//! println!("{} matches", matches.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
#[cfg(feature = "metrics")]
pub mod metrics;

pub use blocking::KeyBlocker;
pub use matcher::{match_callback_channel, DeferredMatcher, PredicateMatcher, ThresholdMatcher};
pub use pipeline::{
    Block, Blocker, CandidatePairs, GenerationStrategy, Generator, JoinVariant, MatchCallback,
    MatchInput, Matcher, Pipeline, PipelineError, PipelineMetrics, Record, RecordPair,
    SharedContext, SimilarityJoin, StageError, OUTPUT_STAGE,
};
pub use similarity::{
    levenshtein, normalized_edit_similarity, SimilarityError, SimilarityFeature, SimilarityMetric,
};
pub use simjoin::{AllPairsJoin, JoinError, LengthPartitionJoin};
pub use tokenize::{Token, TokenizeError, Tokenizer};

pub use crate::config::{
    build_pipeline, BlockingYamlConfig, ConfigLoadError, ErflowConfig, GeneratorYamlConfig,
    JoinVariantYaml, JoinYamlConfig, MatcherYamlConfig, ThresholdYamlConfig,
};
#[cfg(feature = "metrics")]
pub use crate::metrics::MetricsRecorder;
