//! YAML configuration for erflow pipelines.
//!
//! A single file names the table, the shared context, the candidate
//! generator and the matcher chain. [`ErflowConfig::from_file`] parses and
//! validates it; [`build_pipeline`] turns it into a runnable [`Pipeline`].
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "customer dedup"
//! table: customers
//! context:
//!   - { source: crm }
//!
//! generator:
//!   type: join
//!   variant: all_pairs
//!   field: 0
//!   threshold: 0.5
//!   metric: Jaccard
//!   tokenizer: WhiteSpace
//!
//! matchers:
//!   - type: threshold
//!     field: 1
//!     threshold: 0.8
//!     metric: Dice
//!     tokenizer: WhiteSpaceAndPunc
//!   - type: threshold
//!     field: 2
//!     threshold: 0.9
//!     metric: EditDistance
//!     deferred: true
//! ```
//!
//! Metric and tokenizer names are parsed by the same [`FromStr`]
//! implementations that back [`Pipeline::change_similarity`] and
//! [`Pipeline::change_tokenization`].

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use blocking::KeyBlocker;
use matcher::{DeferredMatcher, PredicateMatcher, ThresholdMatcher};
use pipeline::{Blocker, Matcher, Pipeline, SharedContext, SimilarityJoin};
use serde::{Deserialize, Serialize};
use similarity::{SimilarityFeature, SimilarityMetric};
use simjoin::{AllPairsJoin, LengthPartitionJoin};
use thiserror::Error;
use tokenize::Tokenizer;
use tracing::{info, warn};

/// Errors that can occur when loading or building from a configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration for one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ErflowConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Table the pipeline operates on
    #[serde(default)]
    pub table: String,

    /// Initial shared context broadcast to every component
    #[serde(default)]
    pub context: Vec<serde_json::Value>,

    pub generator: GeneratorYamlConfig,

    /// Matcher chain, in execution order
    #[serde(default)]
    pub matchers: Vec<MatcherYamlConfig>,
}

impl ErflowConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: ErflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        if self.table.trim().is_empty() {
            return Err(ConfigLoadError::MissingField("table".into()));
        }

        self.generator.validate()?;

        let last = self.matchers.len().saturating_sub(1);
        for (idx, matcher) in self.matchers.iter().enumerate() {
            matcher.validate()?;
            if matcher.is_deferred() && idx != last {
                return Err(ConfigLoadError::Validation(format!(
                    "matcher {idx}: only the last matcher may be deferred"
                )));
            }
        }

        if self.matchers.is_empty() && matches!(self.generator, GeneratorYamlConfig::Blocking(_)) {
            return Err(ConfigLoadError::Validation(
                "a blocking generator needs at least one matcher".into(),
            ));
        }

        Ok(())
    }

    pub fn shared_context(&self) -> SharedContext {
        SharedContext::new(self.context.clone())
    }
}

/// Candidate generator section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorYamlConfig {
    Blocking(BlockingYamlConfig),
    Join(JoinYamlConfig),
}

impl GeneratorYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self {
            GeneratorYamlConfig::Blocking(_) => Ok(()),
            GeneratorYamlConfig::Join(cfg) => cfg.validate(),
        }
    }
}

/// Key blocking: records sharing a (prefix of a) field value form a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingYamlConfig {
    pub field: usize,

    /// Leading characters of the field used as the key; 0 keys on the whole value
    #[serde(default)]
    pub prefix_len: usize,

    #[serde(default = "true_value")]
    pub lowercase: bool,
}

impl BlockingYamlConfig {
    fn build(&self) -> KeyBlocker {
        let blocker = KeyBlocker::new(self.field).with_lowercase(self.lowercase);
        match self.prefix_len {
            0 => blocker,
            n => blocker.with_prefix_len(n),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinVariantYaml {
    #[default]
    AllPairs,
    LengthPartition,
}

/// Similarity self-join over one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinYamlConfig {
    #[serde(default)]
    pub variant: JoinVariantYaml,

    pub field: usize,

    pub threshold: f64,

    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

impl JoinYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        validate_threshold("join", self.threshold)?;
        let feature = parse_feature(&self.metric, &self.tokenizer)?;
        if feature.metric() == SimilarityMetric::EditDistance {
            return Err(ConfigLoadError::Validation(
                "similarity joins do not support the EditDistance metric".into(),
            ));
        }
        if self.variant == JoinVariantYaml::LengthPartition
            && feature.metric() != SimilarityMetric::Jaccard
        {
            return Err(ConfigLoadError::Validation(format!(
                "length_partition join requires the Jaccard metric, got {}",
                self.metric
            )));
        }
        Ok(())
    }

    fn build(&self) -> Result<Box<dyn SimilarityJoin>, ConfigLoadError> {
        let feature = parse_feature(&self.metric, &self.tokenizer)?;
        let join: Box<dyn SimilarityJoin> = match self.variant {
            JoinVariantYaml::AllPairs => Box::new(
                AllPairsJoin::new(self.field, self.threshold, feature)
                    .map_err(|err| ConfigLoadError::Validation(err.to_string()))?,
            ),
            JoinVariantYaml::LengthPartition => Box::new(
                LengthPartitionJoin::new(self.field, self.threshold, feature.tokenizer())
                    .map_err(|err| ConfigLoadError::Validation(err.to_string()))?,
            ),
        };
        Ok(join)
    }
}

/// One entry of the matcher chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherYamlConfig {
    Threshold(ThresholdYamlConfig),
    /// Passes every candidate through unchanged.
    AcceptAll,
}

impl MatcherYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self {
            MatcherYamlConfig::Threshold(cfg) => cfg.validate(),
            MatcherYamlConfig::AcceptAll => Ok(()),
        }
    }

    fn is_deferred(&self) -> bool {
        matches!(self, MatcherYamlConfig::Threshold(cfg) if cfg.deferred)
    }

    fn build(&self) -> Result<Box<dyn Matcher>, ConfigLoadError> {
        match self {
            MatcherYamlConfig::Threshold(cfg) => cfg.build(),
            MatcherYamlConfig::AcceptAll => Ok(Box::new(PredicateMatcher::accept_all())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdYamlConfig {
    pub field: usize,

    pub threshold: f64,

    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// Run in the background and deliver matches through the pipeline callback
    #[serde(default)]
    pub deferred: bool,
}

impl ThresholdYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        validate_threshold("matcher", self.threshold)?;
        parse_feature(&self.metric, &self.tokenizer)?;
        Ok(())
    }

    fn build(&self) -> Result<Box<dyn Matcher>, ConfigLoadError> {
        let feature = parse_feature(&self.metric, &self.tokenizer)?;
        let inner: Box<dyn Matcher> =
            Box::new(ThresholdMatcher::new(self.field, self.threshold, feature));
        if !self.deferred {
            return Ok(inner);
        }
        let deferred = DeferredMatcher::new(inner).map_err(|err| {
            warn!(error = %err, "deferred_matcher_without_runtime");
            ConfigLoadError::Validation(
                "deferred matchers must be built inside a tokio runtime".into(),
            )
        })?;
        Ok(Box::new(deferred))
    }
}

/// Build a runnable pipeline from a validated configuration.
///
/// Deferred matchers capture the current tokio runtime, so a configuration
/// containing one must be built from inside a runtime.
pub fn build_pipeline(config: &ErflowConfig) -> Result<Pipeline, ConfigLoadError> {
    let start = Instant::now();
    config.validate()?;

    let matchers = config
        .matchers
        .iter()
        .map(MatcherYamlConfig::build)
        .collect::<Result<Vec<_>, _>>()?;

    let pipeline = match &config.generator {
        GeneratorYamlConfig::Blocking(cfg) => {
            let blocker: Box<dyn Blocker> = Box::new(cfg.build());
            Pipeline::with_blocker(config.shared_context(), &config.table, blocker, matchers)
        }
        GeneratorYamlConfig::Join(cfg) => {
            Pipeline::with_join(config.shared_context(), &config.table, cfg.build()?, matchers)
        }
    };
    info!(
        table = %config.table,
        stages = %pipeline,
        elapsed_micros = start.elapsed().as_micros(),
        "pipeline_built"
    );
    Ok(pipeline)
}

fn parse_feature(metric: &str, tokenizer: &str) -> Result<SimilarityFeature, ConfigLoadError> {
    let metric = SimilarityMetric::from_str(metric)
        .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
    let tokenizer = Tokenizer::from_str(tokenizer)
        .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
    Ok(SimilarityFeature::new(metric, tokenizer))
}

fn validate_threshold(what: &str, threshold: f64) -> Result<(), ConfigLoadError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigLoadError::Validation(format!(
            "{what} threshold must be within [0.0, 1.0], got {threshold}"
        )))
    }
}

fn true_value() -> bool {
    true
}
fn default_metric() -> String {
    SimilarityMetric::Jaccard.name().to_string()
}
fn default_tokenizer() -> String {
    Tokenizer::default().name().to_string()
}
