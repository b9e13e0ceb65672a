use std::sync::{Arc, RwLock};

use pipeline::{CandidatePairs, MatchCallback, MatchInput, Matcher, SharedContext, StageError};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runs an inner matcher in the background and reports its pairs late.
///
/// `match_pairs` returns an empty synchronous contribution straight away and
/// hands the real work to a tokio blocking task. When that task finishes, the
/// callback registered at the time of the call receives the pairs. Background
/// failures are logged here and never reach the pipeline.
pub struct DeferredMatcher {
    inner: Arc<RwLock<Box<dyn Matcher>>>,
    handle: Handle,
    callback: Option<MatchCallback>,
}

impl DeferredMatcher {
    /// Wrap `inner`, spawning on the runtime the caller is currently inside.
    pub fn new(inner: Box<dyn Matcher>) -> Result<Self, TryCurrentError> {
        Ok(Self::with_handle(inner, Handle::try_current()?))
    }

    pub fn with_handle(inner: Box<dyn Matcher>, handle: Handle) -> Self {
        Self {
            inner: Arc::new(RwLock::new(inner)),
            handle,
            callback: None,
        }
    }

    fn inner_name(&self) -> String {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.name()
    }
}

impl Matcher for DeferredMatcher {
    fn name(&self) -> String {
        format!("Deferred({})", self.inner_name())
    }

    fn match_pairs(&self, input: MatchInput) -> Result<CandidatePairs, StageError> {
        let inner = Arc::clone(&self.inner);
        let callback = self.callback.clone();
        let stage = self.name();
        debug!(stage = %stage, input = input.kind(), "deferred_stage_spawned");

        self.handle.spawn_blocking(move || {
            let result = {
                let guard = inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.match_pairs(input)
            };
            match (result, callback) {
                (Ok(pairs), Some(callback)) => {
                    info!(stage = %stage, pair_count = pairs.len(), "deferred_matches_delivered");
                    callback(pairs);
                }
                (Ok(pairs), None) => {
                    warn!(
                        stage = %stage,
                        pair_count = pairs.len(),
                        "deferred_matches_dropped: no callback registered"
                    );
                }
                (Err(err), _) => {
                    warn!(stage = %stage, error = %err, "deferred_stage_failure");
                }
            }
        });

        Ok(CandidatePairs::empty())
    }

    fn update_context(&mut self, ctx: &SharedContext) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.update_context(ctx);
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

/// A callback that forwards late matches into an unbounded channel.
///
/// Register the callback on a pipeline and await the receiver.
pub fn match_callback_channel() -> (MatchCallback, mpsc::UnboundedReceiver<CandidatePairs>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: MatchCallback = Arc::new(move |pairs: CandidatePairs| {
        if tx.send(pairs).is_err() {
            debug!("late_matches_receiver_closed");
        }
    });
    (callback, rx)
}
