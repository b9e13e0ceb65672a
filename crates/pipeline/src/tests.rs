use super::*;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::json;
use similarity::{SimilarityError, SimilarityFeature, SimilarityMetric};
use tokenize::Tokenizer;

type Log = Arc<Mutex<Vec<String>>>;

fn rec(id: &str) -> Record {
    Record::new(id, [id.to_lowercase()])
}

fn records(ids: &[&str]) -> Vec<Record> {
    ids.iter().map(|id| rec(id)).collect()
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Blocks by a fixed assignment of record id -> block key.
struct FixedBlocker {
    assignment: Vec<(&'static str, &'static str)>,
    log: Log,
}

impl Blocker for FixedBlocker {
    fn name(&self) -> String {
        "FixedBlocker".into()
    }

    fn block(&self, records: &[Record]) -> Result<Vec<Block>, StageError> {
        self.log.lock().unwrap().push("block".into());
        let mut blocks: Vec<Block> = Vec::new();
        for record in records {
            let key = self
                .assignment
                .iter()
                .find(|(id, _)| *id == record.id)
                .map(|(_, key)| *key)
                .ok_or_else(|| StageError::InvalidInput(format!("unassigned {}", record.id)))?;
            match blocks.iter_mut().find(|b| b.key == key) {
                Some(block) => block.records.push(record.clone()),
                None => blocks.push(Block::new(key, vec![record.clone()])),
            }
        }
        Ok(blocks)
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.log.lock().unwrap().push(format!("ctx:blocker:{}", ctx.len()));
    }
}

/// Passes every unordered pair whose similarity clears `threshold`.
struct FakeJoin {
    variant: JoinVariant,
    feature: SimilarityFeature,
    threshold: f64,
    log: Log,
}

impl FakeJoin {
    fn passing_all(log: Log) -> Self {
        Self {
            variant: JoinVariant::AllPairs,
            feature: SimilarityFeature::default(),
            threshold: 0.0,
            log,
        }
    }
}

impl SimilarityJoin for FakeJoin {
    fn name(&self) -> String {
        "FakeJoin".into()
    }

    fn variant(&self) -> JoinVariant {
        self.variant
    }

    fn join(
        &self,
        left: &[Record],
        right: &[Record],
        asymmetric: bool,
    ) -> Result<CandidatePairs, StageError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("join:{}x{}:{asymmetric}", left.len(), right.len()));
        let mut out = CandidatePairs::empty();
        for (i, a) in left.iter().enumerate() {
            for b in &right[i + 1..] {
                let score = self.feature.score(&a.fields[0], &b.fields[0]);
                if score >= self.threshold {
                    out.push(RecordPair::unordered(a.clone(), b.clone()));
                }
            }
        }
        Ok(out)
    }

    fn similarity_feature(&self) -> &SimilarityFeature {
        &self.feature
    }

    fn similarity_feature_mut(&mut self) -> &mut SimilarityFeature {
        &mut self.feature
    }

    fn set_similarity_featurizer(&mut self, name: &str) -> Result<(), SimilarityError> {
        self.feature.set_metric(name.parse()?);
        Ok(())
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.log.lock().unwrap().push(format!("ctx:join:{}", ctx.len()));
    }
}

struct FailingJoin;

impl SimilarityJoin for FailingJoin {
    fn name(&self) -> String {
        "FailingJoin".into()
    }

    fn variant(&self) -> JoinVariant {
        JoinVariant::AllPairs
    }

    fn join(&self, _: &[Record], _: &[Record], _: bool) -> Result<CandidatePairs, StageError> {
        Err(StageError::Failed("join exploded".into()))
    }

    fn similarity_feature(&self) -> &SimilarityFeature {
        unreachable!("not used by these tests")
    }

    fn similarity_feature_mut(&mut self) -> &mut SimilarityFeature {
        unreachable!("not used by these tests")
    }

    fn set_similarity_featurizer(&mut self, _: &str) -> Result<(), SimilarityError> {
        Ok(())
    }
}

/// Records every invocation; keeps pairs accepted by `keep`.
struct RecordingMatcher {
    name: &'static str,
    log: Log,
    keep: fn(&RecordPair) -> bool,
    fail: bool,
}

impl RecordingMatcher {
    fn new(name: &'static str, log: Log) -> Self {
        Self {
            name,
            log,
            keep: |_| true,
            fail: false,
        }
    }

    fn failing(name: &'static str, log: Log) -> Self {
        Self {
            fail: true,
            ..Self::new(name, log)
        }
    }
}

impl Matcher for RecordingMatcher {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn match_pairs(&self, input: MatchInput) -> Result<CandidatePairs, StageError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, input.kind()));
        if self.fail {
            return Err(StageError::Failed(format!("{} refused", self.name)));
        }
        Ok(input.into_pairs().into_iter().filter(|p| (self.keep)(p)).collect())
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        self.log
            .lock()
            .unwrap()
            .push(format!("ctx:{}:{}", self.name, ctx.len()));
    }
}

/// Asynchronous stage that only stores its callback.
#[derive(Default)]
struct AsyncStub {
    callback: Option<MatchCallback>,
}

impl Matcher for AsyncStub {
    fn name(&self) -> String {
        "AsyncStub".into()
    }

    fn match_pairs(&self, _input: MatchInput) -> Result<CandidatePairs, StageError> {
        Ok(CandidatePairs::empty())
    }

    fn is_asynchronous(&self) -> bool {
        true
    }

    fn set_on_receive_new_matches(&mut self, callback: MatchCallback) {
        self.callback = Some(callback);
    }

    fn on_receive_new_matches(&self) -> Option<&MatchCallback> {
        self.callback.as_ref()
    }
}

fn abc_blocker(log: Log) -> Box<dyn Blocker> {
    Box::new(FixedBlocker {
        assignment: vec![("A", "ab"), ("B", "ab"), ("C", "c")],
        log,
    })
}

#[test]
fn blocker_construction_fills_only_the_blocker_slot() {
    let log = Log::default();
    let pipeline = Pipeline::with_blocker(SharedContext::default(), "people", abc_blocker(log), vec![]);
    assert!(pipeline.blocker().is_some());
    assert!(pipeline.join().is_none());
    assert_eq!(pipeline.table_name(), "people");
}

#[test]
fn join_construction_fills_only_the_join_slot() {
    let log = Log::default();
    let pipeline = Pipeline::with_join(
        SharedContext::default(),
        "people",
        Box::new(FakeJoin::passing_all(log)),
        vec![],
    );
    assert!(pipeline.join().is_some());
    assert!(pipeline.blocker().is_none());
}

#[test]
fn blocks_with_empty_chain_fail_before_generation() {
    let log = Log::default();
    let pipeline =
        Pipeline::with_blocker(SharedContext::default(), "t", abc_blocker(log.clone()), vec![]);
    for input in [records(&[]), records(&["A", "B", "C"])] {
        let err = pipeline.run_pipeline(&input).expect_err("degenerate pipeline");
        assert!(err.is_configuration(), "unexpected error: {err}");
    }
    assert!(entries(&log).iter().all(|e| e != "block"));
}

#[test]
fn join_with_empty_chain_returns_join_output_unchanged() {
    let log = Log::default();
    let join = FakeJoin::passing_all(log.clone());
    let input = records(&["A", "B"]);
    let direct = join.join(&input, &input, false).unwrap();

    let pipeline = Pipeline::with_join(SharedContext::default(), "t", Box::new(join), vec![]);
    let out = pipeline.run_pipeline(&input).expect("run succeeds");

    assert_eq!(out, direct);
    assert_eq!(out.id_pairs(), vec![("A".into(), "B".into())]);
    assert!(entries(&log).contains(&"join:2x2:false".to_string()));
}

#[test]
fn blocker_and_single_matcher_end_to_end() {
    let log = Log::default();
    let pipeline = Pipeline::with_blocker(
        SharedContext::default(),
        "t",
        abc_blocker(log.clone()),
        vec![Box::new(RecordingMatcher::new("any", log.clone()))],
    );
    log.lock().unwrap().clear();

    let out = pipeline.run_pipeline(&records(&["A", "B", "C"])).unwrap();

    assert_eq!(out.id_pairs(), vec![("A".into(), "B".into())]);
    assert_eq!(entries(&log), vec!["block", "any:blocks"]);
}

#[test]
fn chain_runs_each_matcher_once_in_order() {
    let log = Log::default();
    let matchers: Vec<Box<dyn Matcher>> = vec![
        Box::new(RecordingMatcher::new("first", log.clone())),
        Box::new(RecordingMatcher::new("second", log.clone())),
        Box::new(RecordingMatcher::new("third", log.clone())),
    ];
    let pipeline =
        Pipeline::with_blocker(SharedContext::default(), "t", abc_blocker(log.clone()), matchers);
    log.lock().unwrap().clear();

    pipeline.run_pipeline(&records(&["A", "B", "C"])).unwrap();

    assert_eq!(
        entries(&log),
        vec!["block", "first:blocks", "second:pairs", "third:pairs"]
    );
}

#[test]
fn swapping_matchers_keeps_invocation_count() {
    let log = Log::default();
    let strict = RecordingMatcher {
        keep: |p| p.left.id == "A",
        ..RecordingMatcher::new("strict", log.clone())
    };
    let pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(log.clone())),
        vec![Box::new(RecordingMatcher::new("loose", log.clone())), Box::new(strict)],
    );
    let out = pipeline.run_pipeline(&records(&["A", "B", "C"])).unwrap();
    assert_eq!(out.len(), 2);

    let calls = entries(&log)
        .into_iter()
        .filter(|e| e.starts_with("loose:") || e.starts_with("strict:"))
        .collect::<Vec<_>>();
    assert_eq!(calls, vec!["loose:pairs", "strict:pairs"]);
}

#[test]
fn matcher_failure_stops_the_fold() {
    let log = Log::default();
    let matchers: Vec<Box<dyn Matcher>> = vec![
        Box::new(RecordingMatcher::failing("broken", log.clone())),
        Box::new(RecordingMatcher::new("after", log.clone())),
    ];
    let pipeline =
        Pipeline::with_blocker(SharedContext::default(), "t", abc_blocker(log.clone()), matchers);

    let err = pipeline.run_pipeline(&records(&["A", "B"])).unwrap_err();

    match err {
        PipelineError::Stage { stage, source } => {
            assert_eq!(stage, "broken");
            assert_eq!(source, StageError::Failed("broken refused".into()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!entries(&log).iter().any(|e| e.starts_with("after:")));
}

#[test]
fn generator_failure_propagates_without_matching() {
    let log = Log::default();
    let pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FailingJoin),
        vec![Box::new(RecordingMatcher::new("m", log.clone()))],
    );
    let err = pipeline.run_pipeline(&records(&["A"])).unwrap_err();
    assert!(matches!(err, PipelineError::Stage { ref stage, .. } if stage == "FailingJoin"));
    assert!(entries(&log).iter().all(|e| !e.starts_with("m:")));

    let log = Log::default();
    let pipeline = Pipeline::with_blocker(
        SharedContext::default(),
        "t",
        abc_blocker(log.clone()),
        vec![Box::new(RecordingMatcher::new("m", log.clone()))],
    );
    let err = pipeline.run_pipeline(&records(&["Z"])).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Stage { source: StageError::InvalidInput(_), .. }
    ));
}

#[test]
fn context_is_broadcast_to_generator_then_chain() {
    let log = Log::default();
    let mut pipeline = Pipeline::with_blocker(
        SharedContext::default(),
        "t",
        abc_blocker(log.clone()),
        vec![
            Box::new(RecordingMatcher::new("m1", log.clone())),
            Box::new(RecordingMatcher::new("m2", log.clone())),
        ],
    );
    log.lock().unwrap().clear();

    let ctx = SharedContext::new(vec![json!({"run": 7}), json!("eu-west")]);
    pipeline.update_context(ctx.clone());

    assert_eq!(entries(&log), vec!["ctx:blocker:2", "ctx:m1:2", "ctx:m2:2"]);
    assert_eq!(pipeline.context(), &ctx);
}

#[test]
fn construction_broadcasts_initial_context() {
    let log = Log::default();
    let _pipeline = Pipeline::with_join(
        SharedContext::new(vec![json!(1)]),
        "t",
        Box::new(FakeJoin::passing_all(log.clone())),
        vec![Box::new(RecordingMatcher::new("m", log.clone()))],
    );
    assert_eq!(entries(&log), vec!["ctx:join:1", "ctx:m:1"]);
}

#[test]
fn add_matcher_appends_to_description() {
    let log = Log::default();
    let mut pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(log.clone())),
        vec![Box::new(RecordingMatcher::new("m1", log.clone()))],
    );
    pipeline.add_matcher(Box::new(RecordingMatcher::new("m2", log.clone())));
    pipeline.add_matcher(Box::new(RecordingMatcher::new("m3", log)));

    assert_eq!(
        pipeline.describe(),
        vec!["FakeJoin+Jaccard(WhiteSpace)", "m1", "m2", "m3", OUTPUT_STAGE]
    );
    assert_eq!(
        pipeline.to_string(),
        "t: FakeJoin+Jaccard(WhiteSpace) -> m1 -> m2 -> m3 -> CandidatePairs"
    );
}

#[test]
fn edit_distance_is_always_rejected() {
    let log = Log::default();
    let mut join_pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(log.clone())),
        vec![],
    );
    let mut block_pipeline =
        Pipeline::with_blocker(SharedContext::default(), "t", abc_blocker(log), vec![]);

    for pipeline in [&mut join_pipeline, &mut block_pipeline] {
        let err = pipeline.change_similarity("EditDistance").unwrap_err();
        match err {
            PipelineError::Configuration(msg) => assert!(msg.contains("edit distance")),
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(
        join_pipeline.join().unwrap().similarity_feature().metric(),
        SimilarityMetric::Jaccard
    );
}

#[test]
fn length_partition_join_rejects_similarity_change() {
    let log = Log::default();
    let join = FakeJoin {
        variant: JoinVariant::LengthPartition,
        ..FakeJoin::passing_all(log)
    };
    let mut pipeline = Pipeline::with_join(SharedContext::default(), "t", Box::new(join), vec![]);

    let err = pipeline.change_similarity("Cosine").unwrap_err();
    match err {
        PipelineError::Configuration(msg) => assert!(msg.contains("length-partition")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn change_similarity_delegates_to_join() {
    let log = Log::default();
    let mut pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(log)),
        vec![],
    );
    pipeline.change_similarity("Cosine").unwrap();
    assert_eq!(
        pipeline.join().unwrap().similarity_feature().metric(),
        SimilarityMetric::Cosine
    );

    let err = pipeline.change_similarity("Hamming").unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn similarity_and_tokenization_require_a_join() {
    let log = Log::default();
    let mut pipeline =
        Pipeline::with_blocker(SharedContext::default(), "t", abc_blocker(log), vec![]);
    assert!(pipeline.change_similarity("Cosine").unwrap_err().is_configuration());
    assert!(pipeline.change_tokenization("WhiteSpace").unwrap_err().is_configuration());
}

#[test]
fn change_tokenization_accepts_only_known_names() {
    let log = Log::default();
    let join = FakeJoin {
        feature: SimilarityFeature::new(SimilarityMetric::Jaccard, Tokenizer::WhiteSpaceAndPunc),
        ..FakeJoin::passing_all(log)
    };
    let mut pipeline = Pipeline::with_join(SharedContext::default(), "t", Box::new(join), vec![]);

    let err = pipeline.change_tokenization("Unknown").unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(
        pipeline.join().unwrap().similarity_feature().tokenizer(),
        Tokenizer::WhiteSpaceAndPunc
    );

    pipeline.change_tokenization("WhiteSpace").unwrap();
    assert_eq!(
        pipeline.join().unwrap().similarity_feature().tokenizer(),
        Tokenizer::WhiteSpace
    );
}

#[test]
fn tokenization_change_affects_later_runs() {
    let log = Log::default();
    let join = FakeJoin {
        threshold: 1.0,
        ..FakeJoin::passing_all(log)
    };
    let mut pipeline = Pipeline::with_join(SharedContext::default(), "t", Box::new(join), vec![]);
    let input = vec![Record::new("1", ["acme, inc"]), Record::new("2", ["acme inc"])];

    assert!(pipeline.run_pipeline(&input).unwrap().is_empty());
    pipeline.change_tokenization("WhiteSpaceAndPunc").unwrap();
    assert_eq!(pipeline.run_pipeline(&input).unwrap().len(), 1);
}

#[test]
fn async_callback_wires_only_asynchronous_last_stage() {
    let log = Log::default();
    let mut pipeline = Pipeline::with_blocker(
        SharedContext::default(),
        "t",
        abc_blocker(log.clone()),
        vec![
            Box::new(RecordingMatcher::new("sync", log.clone())),
            Box::new(AsyncStub::default()),
        ],
    );
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    pipeline.set_on_receive_new_matches(Arc::new(move |pairs: CandidatePairs| {
        sink.lock().unwrap().push(pairs.len());
    }));

    assert!(pipeline.has_async_callback());
    let last = pipeline.matchers().last().unwrap();
    let callback = last.on_receive_new_matches().expect("callback wired");
    callback(CandidatePairs::new(vec![RecordPair::new(rec("A"), rec("B"))]));
    assert_eq!(*received.lock().unwrap(), vec![1]);
}

#[test]
fn async_callback_on_synchronous_last_stage_is_ignored() {
    let log = Log::default();
    let mut pipeline = Pipeline::with_blocker(
        SharedContext::default(),
        "t",
        abc_blocker(log.clone()),
        vec![
            Box::new(AsyncStub::default()),
            Box::new(RecordingMatcher::new("sync", log)),
        ],
    );
    pipeline.set_on_receive_new_matches(Arc::new(|_: CandidatePairs| {}));

    assert!(!pipeline.has_async_callback());
    assert!(pipeline
        .matchers()
        .iter()
        .all(|m| m.on_receive_new_matches().is_none()));
}

#[test]
fn async_callback_reregistration_replaces_previous() {
    let mut pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(Log::default())),
        vec![Box::new(AsyncStub::default())],
    );
    let hits = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&hits);
    let second = Arc::clone(&hits);
    pipeline.set_on_receive_new_matches(Arc::new(move |_: CandidatePairs| first.lock().unwrap().push("first")));
    pipeline.set_on_receive_new_matches(Arc::new(move |_: CandidatePairs| second.lock().unwrap().push("second")));

    let callback = pipeline.matchers()[0].on_receive_new_matches().unwrap();
    callback(CandidatePairs::empty());
    assert_eq!(*hits.lock().unwrap(), vec!["second"]);
}

#[test]
fn appending_sync_matcher_drops_async_callback() {
    let log = Log::default();
    let mut pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(log.clone())),
        vec![Box::new(AsyncStub::default())],
    );
    pipeline.set_on_receive_new_matches(Arc::new(|_: CandidatePairs| {}));
    assert!(pipeline.has_async_callback());

    pipeline.add_matcher(Box::new(RecordingMatcher::new("sync", log)));
    assert!(!pipeline.has_async_callback());
    assert!(pipeline.matchers()[1].on_receive_new_matches().is_none());

    pipeline.set_on_receive_new_matches(Arc::new(|_: CandidatePairs| {}));
    assert!(!pipeline.has_async_callback());
}

#[test]
fn appending_async_matcher_carries_callback_over() {
    let mut pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(Log::default())),
        vec![Box::new(AsyncStub::default())],
    );
    let hits = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&hits);
    pipeline.set_on_receive_new_matches(Arc::new(move |_: CandidatePairs| {
        *counter.lock().unwrap() += 1;
    }));

    pipeline.add_matcher(Box::new(AsyncStub::default()));
    assert!(pipeline.has_async_callback());

    let callback = pipeline.matchers()[1].on_receive_new_matches().unwrap();
    callback(CandidatePairs::empty());
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[derive(Default)]
struct CountingMetrics {
    events: Arc<RwLock<Vec<String>>>,
}

impl CountingMetrics {
    fn snapshot(&self) -> Vec<String> {
        self.events.read().unwrap().clone()
    }
}

impl PipelineMetrics for CountingMetrics {
    fn record_generation(&self, strategy: GenerationStrategy, _latency: Duration, count: usize) {
        self.events
            .write()
            .unwrap()
            .push(format!("generation:{strategy}:{count}"));
    }

    fn record_stage(&self, stage: &str, _latency: Duration, result: Result<usize, &StageError>) {
        let label = match result {
            Ok(n) => format!("stage:{stage}:ok:{n}"),
            Err(_) => format!("stage:{stage}:err"),
        };
        self.events.write().unwrap().push(label);
    }

    fn record_matching(&self, _latency: Duration, stage_count: usize, pair_count: usize) {
        self.events
            .write()
            .unwrap()
            .push(format!("matching:{stage_count}:{pair_count}"));
    }
}

#[test]
fn metrics_sink_observes_each_phase() {
    let log = Log::default();
    let metrics = Arc::new(CountingMetrics::default());
    let pipeline = Pipeline::with_join(
        SharedContext::default(),
        "t",
        Box::new(FakeJoin::passing_all(log.clone())),
        vec![Box::new(RecordingMatcher::new("m", log))],
    )
    .with_metrics(metrics.clone());

    pipeline.run_pipeline(&records(&["A", "B", "C"])).unwrap();

    assert_eq!(
        metrics.snapshot(),
        vec!["generation:join:3", "stage:m:ok:3", "matching:1:3"]
    );
}

#[test]
fn metrics_sink_sees_stage_failure_but_no_matching_summary() {
    let log = Log::default();
    let metrics = Arc::new(CountingMetrics::default());
    let mut pipeline = Pipeline::with_blocker(
        SharedContext::default(),
        "t",
        abc_blocker(log.clone()),
        vec![Box::new(RecordingMatcher::failing("bad", log))],
    );
    pipeline.set_metrics(Some(metrics.clone()));

    assert!(pipeline.run_pipeline(&records(&["A", "B"])).is_err());
    assert_eq!(metrics.snapshot(), vec!["generation:blocking:1", "stage:bad:err"]);
}
