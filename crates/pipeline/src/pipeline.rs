use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use similarity::SimilarityMetric;
use tokenize::Tokenizer;
use tracing::{debug, info, warn, Level};

use crate::error::PipelineError;
use crate::metrics::{GenerationStrategy, PipelineMetrics};
use crate::model::{CandidatePairs, MatchInput, Record, SharedContext};
use crate::stage::{Blocker, JoinVariant, MatchCallback, Matcher, SimilarityJoin};

/// Label of the final stage in [`Pipeline::describe`].
pub const OUTPUT_STAGE: &str = "CandidatePairs";

/// The candidate-generation strategy. Exactly one per pipeline.
pub enum Generator {
    Blocking(Box<dyn Blocker>),
    Join(Box<dyn SimilarityJoin>),
}

impl Generator {
    fn strategy(&self) -> GenerationStrategy {
        match self {
            Generator::Blocking(_) => GenerationStrategy::Blocking,
            Generator::Join(_) => GenerationStrategy::Join,
        }
    }

    fn describe(&self) -> String {
        match self {
            Generator::Blocking(blocker) => blocker.name(),
            Generator::Join(join) => {
                format!("{}+{}", join.name(), join.similarity_feature().name())
            }
        }
    }
}

/// Entity-resolution pipeline: one candidate generator followed by an ordered
/// matcher chain.
///
/// Configuration is mutated only through `&mut self`, so reconfiguring while a
/// `run_pipeline` call is in flight is ruled out by the borrow checker.
pub struct Pipeline {
    table_name: String,
    generator: Generator,
    matchers: Vec<Box<dyn Matcher>>,
    context: SharedContext,
    callback: Option<MatchCallback>,
    metrics: Option<Arc<dyn PipelineMetrics>>,
}

impl Pipeline {
    /// Pipeline that generates candidates by blocking.
    pub fn with_blocker(
        context: SharedContext,
        table_name: impl Into<String>,
        blocker: Box<dyn Blocker>,
        matchers: Vec<Box<dyn Matcher>>,
    ) -> Self {
        Self::from_generator(context, table_name, Generator::Blocking(blocker), matchers)
    }

    /// Pipeline that generates candidates with a similarity self-join.
    pub fn with_join(
        context: SharedContext,
        table_name: impl Into<String>,
        join: Box<dyn SimilarityJoin>,
        matchers: Vec<Box<dyn Matcher>>,
    ) -> Self {
        Self::from_generator(context, table_name, Generator::Join(join), matchers)
    }

    /// The initial context is broadcast to every component, exactly as
    /// [`update_context`](Self::update_context) would.
    pub fn from_generator(
        context: SharedContext,
        table_name: impl Into<String>,
        generator: Generator,
        matchers: Vec<Box<dyn Matcher>>,
    ) -> Self {
        let mut pipeline = Self {
            table_name: table_name.into(),
            generator,
            matchers,
            context: SharedContext::default(),
            callback: None,
            metrics: None,
        };
        pipeline.update_context(context);
        pipeline
    }

    /// Attach an observability sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn set_metrics(&mut self, metrics: Option<Arc<dyn PipelineMetrics>>) {
        self.metrics = metrics;
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn blocker(&self) -> Option<&dyn Blocker> {
        match &self.generator {
            Generator::Blocking(blocker) => Some(blocker.as_ref()),
            Generator::Join(_) => None,
        }
    }

    pub fn join(&self) -> Option<&dyn SimilarityJoin> {
        match &self.generator {
            Generator::Join(join) => Some(join.as_ref()),
            Generator::Blocking(_) => None,
        }
    }

    pub fn join_mut(&mut self) -> Option<&mut (dyn SimilarityJoin + 'static)> {
        match &mut self.generator {
            Generator::Join(join) => Some(join.as_mut()),
            Generator::Blocking(_) => None,
        }
    }

    pub fn matchers(&self) -> &[Box<dyn Matcher>] {
        &self.matchers
    }

    /// Whether a late-match callback is currently wired.
    pub fn has_async_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Generate candidates, then fold the matcher chain over them.
    ///
    /// Issues at most one generation call and exactly one call per matcher,
    /// sequentially. The first failure is returned; nothing is retried.
    pub fn run_pipeline(&self, records: &[Record]) -> Result<CandidatePairs, PipelineError> {
        let span = tracing::span!(
            Level::INFO,
            "pipeline.run",
            table = %self.table_name,
            record_count = records.len()
        );
        let _guard = span.enter();

        if self.matchers.is_empty() && matches!(self.generator, Generator::Blocking(_)) {
            warn!("blocks_without_matchers");
            return Err(PipelineError::configuration(
                "blocker-based pipeline needs at least one matcher: blocks are not pairs",
            ));
        }

        let generated = self.generate(records)?;
        self.match_all(generated)
    }

    fn generate(&self, records: &[Record]) -> Result<MatchInput, PipelineError> {
        let start = Instant::now();
        let strategy = self.generator.strategy();
        let (stage, result) = match &self.generator {
            Generator::Blocking(blocker) => {
                (blocker.name(), blocker.block(records).map(MatchInput::Blocks))
            }
            Generator::Join(join) => (
                join.name(),
                join.join(records, records, false).map(MatchInput::Pairs),
            ),
        };
        let elapsed = start.elapsed();

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    stage = %stage,
                    error = %err,
                    elapsed_micros = elapsed.as_micros(),
                    "stage_failure"
                );
                return Err(PipelineError::Stage { stage, source: err });
            }
        };

        let output_count = match &output {
            MatchInput::Blocks(blocks) => blocks.len(),
            MatchInput::Pairs(pairs) => pairs.len(),
        };
        match &output {
            MatchInput::Blocks(_) => info!(
                strategy = %strategy,
                elapsed_micros = elapsed.as_micros(),
                block_count = output_count,
                "generation_complete"
            ),
            MatchInput::Pairs(_) => info!(
                strategy = %strategy,
                elapsed_micros = elapsed.as_micros(),
                candidate_count = output_count,
                "generation_complete"
            ),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_generation(strategy, elapsed, output_count);
        }

        Ok(output)
    }

    fn match_all(&self, generated: MatchInput) -> Result<CandidatePairs, PipelineError> {
        let start = Instant::now();
        let mut current = generated;

        for matcher in &self.matchers {
            let stage = matcher.name();
            let stage_start = Instant::now();
            let result = matcher.match_pairs(current);
            let stage_elapsed = stage_start.elapsed();

            match result {
                Ok(pairs) => {
                    debug!(
                        stage = %stage,
                        pair_count = pairs.len(),
                        elapsed_micros = stage_elapsed.as_micros(),
                        "stage_complete"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_stage(&stage, stage_elapsed, Ok(pairs.len()));
                    }
                    current = MatchInput::Pairs(pairs);
                }
                Err(err) => {
                    warn!(
                        stage = %stage,
                        error = %err,
                        elapsed_micros = stage_elapsed.as_micros(),
                        "stage_failure"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_stage(&stage, stage_elapsed, Err(&err));
                    }
                    return Err(PipelineError::Stage { stage, source: err });
                }
            }
        }

        let pairs = match current {
            MatchInput::Pairs(pairs) => pairs,
            // Guarded in run_pipeline; unreachable with a non-empty chain.
            MatchInput::Blocks(_) => {
                return Err(PipelineError::configuration(
                    "matching produced blocks instead of pairs",
                ))
            }
        };

        let elapsed = start.elapsed();
        info!(
            stages = self.matchers.len(),
            elapsed_micros = elapsed.as_micros(),
            pair_count = pairs.len(),
            "matching_complete"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_matching(elapsed, self.matchers.len(), pairs.len());
        }

        Ok(pairs)
    }

    /// Append `matcher` to the end of the chain.
    ///
    /// The current shared context is not re-broadcast; call
    /// [`update_context`](Self::update_context) if the new stage needs it.
    ///
    /// A registered late-match callback follows the last stage: it is wired
    /// onto `matcher` when that matcher is asynchronous and dropped otherwise.
    pub fn add_matcher(&mut self, mut matcher: Box<dyn Matcher>) {
        debug!(stage = %matcher.name(), position = self.matchers.len(), "matcher_added");
        if let Some(callback) = self.callback.take() {
            if matcher.is_asynchronous() {
                matcher.set_on_receive_new_matches(Arc::clone(&callback));
                self.callback = Some(callback);
            } else {
                warn!(
                    stage = %matcher.name(),
                    "async_callback_dropped: new last matcher is synchronous"
                );
            }
        }
        self.matchers.push(matcher);
    }

    /// Broadcast `context` to the generator and then to every matcher in
    /// chain order.
    pub fn update_context(&mut self, context: SharedContext) {
        match &mut self.generator {
            Generator::Blocking(blocker) => blocker.update_context(&context),
            Generator::Join(join) => join.update_context(&context),
        }
        for matcher in &mut self.matchers {
            matcher.update_context(&context);
        }
        debug!(values = context.len(), "context_updated");
        self.context = context;
    }

    /// Wire `callback` to the last matcher, if that matcher is asynchronous.
    ///
    /// On a synchronous (or missing) last stage this logs a diagnostic and
    /// leaves no callback registered. Registering again replaces the
    /// previous callback.
    pub fn set_on_receive_new_matches(&mut self, callback: MatchCallback) {
        match self.matchers.last_mut() {
            Some(last) if last.is_asynchronous() => {
                debug!(stage = %last.name(), "async_callback_registered");
                last.set_on_receive_new_matches(Arc::clone(&callback));
                self.callback = Some(callback);
            }
            Some(last) => {
                warn!(
                    stage = %last.name(),
                    "async_callback_ignored: last matcher is synchronous"
                );
                self.callback = None;
            }
            None => {
                warn!("async_callback_ignored: matcher chain is empty");
                self.callback = None;
            }
        }
    }

    /// Swap the similarity function of the configured join.
    pub fn change_similarity(&mut self, name: &str) -> Result<(), PipelineError> {
        if name == SimilarityMetric::EditDistance.name() {
            return Err(PipelineError::configuration(
                "edit distance similarity cannot be set on a join; canonicalize edit-distance joins separately",
            ));
        }
        let join = self.require_join()?;
        if join.variant() == JoinVariant::LengthPartition {
            return Err(PipelineError::configuration(format!(
                "similarity of a length-partition join ({}) cannot be changed; canonicalize it separately",
                join.name()
            )));
        }
        join.set_similarity_featurizer(name)
            .map_err(|err| PipelineError::configuration(err.to_string()))?;
        debug!(similarity = %join.similarity_feature().name(), "similarity_changed");
        Ok(())
    }

    /// Swap the tokenizer of the configured join's similarity feature.
    pub fn change_tokenization(&mut self, name: &str) -> Result<(), PipelineError> {
        let join = self.require_join()?;
        let tokenizer: Tokenizer = name
            .parse()
            .map_err(|err: tokenize::TokenizeError| PipelineError::configuration(err.to_string()))?;
        join.similarity_feature_mut().set_tokenizer(tokenizer);
        debug!(similarity = %join.similarity_feature().name(), "tokenization_changed");
        Ok(())
    }

    fn require_join(&mut self) -> Result<&mut (dyn SimilarityJoin + 'static), PipelineError> {
        self.join_mut().ok_or_else(|| {
            PipelineError::configuration("no similarity join configured; pipeline uses blocking")
        })
    }

    /// Stage names in execution order: generator, each matcher, then the
    /// pair-collection output.
    pub fn describe(&self) -> Vec<String> {
        let mut stages = Vec::with_capacity(self.matchers.len() + 2);
        stages.push(self.generator.describe());
        stages.extend(self.matchers.iter().map(|m| m.name()));
        stages.push(OUTPUT_STAGE.to_string());
        stages
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table_name, self.describe().join(" -> "))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("table_name", &self.table_name)
            .field("stages", &self.describe())
            .field("context", &self.context)
            .field("has_async_callback", &self.callback.is_some())
            .finish()
    }
}
