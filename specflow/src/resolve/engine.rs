//! Fixed-point resolution of pipeline specs.

use crate::core::{normalize_schedule, PipelineId, PipelineSpec};
use crate::dirty::DirtyEvaluator;
use crate::errors::SpecError;
use crate::events::{types, EventSink, NoOpEventSink};
use crate::executors::{normalize_executors, ExecutorResolver, ScriptExecutorResolver};
use crate::hashing::{HashCalculator, HashOutcome};
use crate::registry::StatusRegistry;
use crate::validation::{SchemaValidator, Validator};
use serde::Serialize;
use serde_json::json;
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counters describing one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Passes that examined at least one spec.
    pub passes: usize,
    /// Specs emitted so far.
    pub emitted: usize,
    /// Specs whose cache hash was computed.
    pub resolved: usize,
    /// Specs emitted carrying at least one error.
    pub failed: usize,
    /// Specs given up on because a dependency never resolved.
    pub unresolvable: usize,
}

/// Resolves discovered specs into hashed, dirty-flagged specs.
///
/// The engine itself is stateless; every call to [`resolve`](Self::resolve)
/// starts a run with its own memo table and deferred set.
pub struct ResolutionEngine {
    validator: Arc<dyn Validator>,
    executors: Arc<dyn ExecutorResolver>,
    registry: Arc<dyn StatusRegistry>,
    dirty: DirtyEvaluator,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("validator", &self.validator)
            .field("executors", &self.executors)
            .finish_non_exhaustive()
    }
}

impl ResolutionEngine {
    /// Creates an engine backed by `registry`, with the schema validator,
    /// the script executor resolver and no event sink.
    #[must_use]
    pub fn new(registry: Arc<dyn StatusRegistry>) -> Self {
        Self {
            validator: Arc::new(SchemaValidator::new()),
            executors: Arc::new(ScriptExecutorResolver::new()),
            dirty: DirtyEvaluator::new(Arc::clone(&registry)),
            registry,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Replaces the executor resolver.
    #[must_use]
    pub fn with_executor_resolver(mut self, executors: impl ExecutorResolver + 'static) -> Self {
        self.executors = Arc::new(executors);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the registry the engine reads from and reports failures to.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn StatusRegistry> {
        &self.registry
    }

    /// Starts resolving `specs`.
    ///
    /// The returned iterator yields every input spec exactly once, in the
    /// pass where it either resolves or is proven unresolvable. Input is
    /// pulled lazily during the first pass.
    pub fn resolve<I>(&self, specs: I) -> Resolution<'_, I::IntoIter>
    where
        I: IntoIterator<Item = PipelineSpec>,
    {
        Resolution {
            engine: self,
            run_id: Uuid::now_v7(),
            calculator: HashCalculator::new(),
            stage: Stage::Discover(specs.into_iter()),
            deferred: Vec::new(),
            progressed: false,
            pass_len: 0,
            started: false,
            stats: ResolutionStats::default(),
        }
    }
}

/// A spec waiting for a hash attempt.
#[derive(Debug)]
struct Pending {
    spec: PipelineSpec,
    /// Error count when the engine first saw the spec.
    initial_errors: usize,
    /// The dependency whose hash was missing at the last attempt.
    missing: Option<PipelineId>,
}

enum Stage<I> {
    Discover(I),
    Retry(std::vec::IntoIter<Pending>),
    Finalize(std::vec::IntoIter<Pending>),
    Done,
}

enum Step {
    Fresh(PipelineSpec),
    Retry(Pending),
    Unresolvable(Pending),
}

/// One resolution run, consumed as an iterator of final specs.
pub struct Resolution<'e, I> {
    engine: &'e ResolutionEngine,
    run_id: Uuid,
    calculator: HashCalculator,
    stage: Stage<I>,
    deferred: Vec<Pending>,
    progressed: bool,
    pass_len: usize,
    started: bool,
    stats: ResolutionStats,
}

impl<I> std::fmt::Debug for Resolution<'_, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("run_id", &self.run_id)
            .field("stats", &self.stats)
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

impl<I> Resolution<'_, I>
where
    I: Iterator<Item = PipelineSpec>,
{
    /// Returns the id of this run, as reported in events.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    /// Returns the memoized cache hash of `pipeline_id` in this run.
    #[must_use]
    pub fn cache_hash(&self, pipeline_id: &str) -> Option<&str> {
        self.calculator.get(pipeline_id)
    }

    fn event(&self, event_type: &str, mut data: serde_json::Value) {
        if let serde_json::Value::Object(map) = &mut data {
            map.insert("run_id".to_string(), json!(self.run_id.to_string()));
        }
        self.engine.sink.emit(event_type, Some(data));
    }

    /// First sight of a spec: validate, normalize, then try to hash.
    fn admit(&mut self, mut spec: PipelineSpec) -> Option<PipelineSpec> {
        let initial_errors = spec.errors.len();
        let valid = match spec.body.as_ref() {
            Some(body) => self.engine.validator.validate(body, &mut spec.errors),
            None => false,
        };

        if valid {
            normalize_executors(&mut spec, &*self.engine.executors);
            normalize_schedule(&mut spec);
        }

        let pending = Pending {
            spec,
            initial_errors,
            missing: None,
        };
        if valid {
            self.attempt(pending)
        } else {
            Some(self.finish(pending, true))
        }
    }

    fn attempt(&mut self, mut pending: Pending) -> Option<PipelineSpec> {
        match self.calculator.calculate_hash(&pending.spec) {
            HashOutcome::Resolved(hash) => {
                pending.spec.set_cache_hash(hash);
                self.progressed = true;
                self.stats.resolved += 1;
                pending.spec.dirty = self.engine.dirty.evaluate(&pending.spec);
                Some(self.finish(pending, true))
            }
            HashOutcome::Deferred { missing } => {
                debug!(pipeline_id = %pending.spec.pipeline_id, missing = %missing, "deferring spec");
                self.event(
                    types::SPEC_DEFERRED,
                    json!({"pipeline_id": pending.spec.pipeline_id, "missing": missing}),
                );
                pending.missing = Some(missing);
                self.deferred.push(pending);
                None
            }
        }
    }

    fn give_up(&mut self, mut pending: Pending) -> PipelineSpec {
        let missing = pending.missing.take().unwrap_or_default();
        warn!(pipeline_id = %pending.spec.pipeline_id, missing = %missing, "dependency never resolved");
        self.event(
            types::SPEC_UNRESOLVABLE,
            json!({"pipeline_id": pending.spec.pipeline_id, "missing": missing}),
        );
        let error = SpecError::missing_dependency(missing).with_context("pipeline", pending.spec.pipeline_id.clone());
        pending.spec.push_error(error);
        self.stats.unresolvable += 1;
        self.finish(pending, false)
    }

    /// Emits a final spec, registering it first if it failed in this run.
    fn finish(&mut self, pending: Pending, register_failure: bool) -> PipelineSpec {
        let spec = pending.spec;
        self.stats.emitted += 1;

        if spec.is_valid() {
            self.event(
                types::SPEC_RESOLVED,
                json!({"pipeline_id": spec.pipeline_id, "cache_hash": spec.cache_hash(), "dirty": spec.dirty}),
            );
            return spec;
        }

        self.stats.failed += 1;
        let errors: Vec<_> = spec.errors.iter().map(SpecError::to_json).collect();
        self.event(types::SPEC_FAILED, json!({"pipeline_id": spec.pipeline_id, "errors": errors}));

        if register_failure && spec.errors.len() > pending.initial_errors {
            if let Err(e) = self.engine.registry.register(&spec) {
                warn!(pipeline_id = %spec.pipeline_id, error = %e, "failed to register failed spec");
            }
        }
        spec
    }

    /// Decides what follows a drained pass.
    fn end_pass(&mut self) {
        if matches!(self.stage, Stage::Finalize(_)) {
            self.complete();
            return;
        }

        if self.pass_len > 0 {
            self.stats.passes += 1;
            self.event(
                types::PASS_COMPLETED,
                json!({
                    "pass": self.stats.passes,
                    "progressed": self.progressed,
                    "deferred": self.deferred.len(),
                }),
            );
            debug!(
                pass = self.stats.passes,
                progressed = self.progressed,
                deferred = self.deferred.len(),
                "pass completed"
            );
        }

        let deferred = std::mem::take(&mut self.deferred);
        let progressed = std::mem::replace(&mut self.progressed, false);
        self.pass_len = 0;

        if deferred.is_empty() {
            self.complete();
        } else if progressed {
            self.stage = Stage::Retry(deferred.into_iter());
        } else {
            self.stage = Stage::Finalize(deferred.into_iter());
        }
    }

    fn complete(&mut self) {
        self.stage = Stage::Done;
        info!(
            run_id = %self.run_id,
            passes = self.stats.passes,
            emitted = self.stats.emitted,
            resolved = self.stats.resolved,
            failed = self.stats.failed,
            unresolvable = self.stats.unresolvable,
            "resolution completed"
        );
        self.event(
            types::RESOLUTION_COMPLETED,
            json!({
                "passes": self.stats.passes,
                "emitted": self.stats.emitted,
                "resolved": self.stats.resolved,
                "failed": self.stats.failed,
                "unresolvable": self.stats.unresolvable,
            }),
        );
    }
}

impl<I> Iterator for Resolution<'_, I>
where
    I: Iterator<Item = PipelineSpec>,
{
    type Item = PipelineSpec;

    fn next(&mut self) -> Option<PipelineSpec> {
        if !self.started {
            self.started = true;
            debug!(run_id = %self.run_id, "resolution started");
            self.event(types::RESOLUTION_STARTED, json!({}));
        }

        loop {
            let step = match &mut self.stage {
                Stage::Discover(input) => input.next().map(Step::Fresh),
                Stage::Retry(pending) => pending.next().map(Step::Retry),
                Stage::Finalize(pending) => pending.next().map(Step::Unresolvable),
                Stage::Done => return None,
            };

            match step {
                Some(Step::Fresh(spec)) => {
                    self.pass_len += 1;
                    if let Some(spec) = self.admit(spec) {
                        return Some(spec);
                    }
                }
                Some(Step::Retry(pending)) => {
                    self.pass_len += 1;
                    if let Some(spec) = self.attempt(pending) {
                        return Some(spec);
                    }
                }
                Some(Step::Unresolvable(pending)) => return Some(self.give_up(pending)),
                None => self.end_pass(),
            }
        }
    }
}

impl<I> FusedIterator for Resolution<'_, I> where I: Iterator<Item = PipelineSpec> {}
