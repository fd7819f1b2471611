//! Deterministic XCCDF policy-evaluation core.
//!
//! This crate resolves a tailored Benchmark — selection, CPE
//! applicability, Value bindings, Check Chooser precedence, complex-check
//! reduction, multi-check fan-out — into a `TestResult`, then reduces that
//! `TestResult` into a `Score` under one of four scoring systems.
//!
//! Module layout:
//! - [`model`] — the Benchmark item arena, Profile, Check, Rule/Group/Value,
//!   RuleResult and TestResult.
//! - [`registry`] — the checking-engine registry (`CheckEngine` trait).
//! - [`binding`] — Value Binding Builder ("last match wins" resolution).
//! - [`selection`] — Selection Resolver (inherited parent selection).
//! - [`cpe`] — CPE applicability resolution with session caching.
//! - [`chooser`] — Check Chooser precedence.
//! - [`evaluate`] — Check Evaluator (simple fallback, complex fold,
//!   multi-check fan-out).
//! - [`runner`] — Rule Runner state machine.
//! - [`score`] — Score Engine.
//! - [`error`] — the `PolicyError` taxonomy.
//!
//! Observability: a process-global [`PolicyObserver`] may be installed via
//! [`set_observer`] to watch every RuleResult as it's produced, alongside
//! an in-process [`PolicyMetrics`] counter registry and an [`AuditSink`]
//! that records one [`AuditRecord`] per Rule evaluated — the same
//! three-hook shape used elsewhere in this workspace for deterministic,
//! fail-closed evaluation engines.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod binding;
pub mod chooser;
pub mod cpe;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod registry;
pub mod runner;
pub mod score;
pub mod selection;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::{debug, info, instrument};
use xccdf_core::ids::ItemId;

use crate::cpe::CpeResolver;
use crate::error::PolicyError;
use crate::model::{Benchmark, Profile, RuleResult, TestResult};
use crate::registry::EngineRegistry;
use crate::runner::RuleRunner;
use crate::score::{score as compute_score, ScoringSystem};

/// Observer invoked once per Rule as a Policy run produces its result.
///
/// Install an implementation via [`set_observer`] to receive a callback
/// for every `RuleResult`; implementations must be cheap and
/// non-blocking. Primarily intended for tests and in-process metrics.
///
/// # Example
/// ```
/// struct Capture;
/// impl xccdf_policy::PolicyObserver for Capture {
///     fn on_rule_result(&self, result: &xccdf_policy::model::RuleResult) {
///         let _ = &result.result;
///     }
/// }
/// xccdf_policy::set_observer(Some(Box::new(Capture)));
/// xccdf_policy::set_observer(None);
/// ```
pub trait PolicyObserver: Send + Sync {
    /// Called once per Rule, in Benchmark pre-order, as its result is
    /// produced.
    fn on_rule_result(&self, result: &RuleResult);
}

static OBSERVER: OnceLock<RwLock<Option<Arc<dyn PolicyObserver>>>> = OnceLock::new();

/// Install or clear the global policy observer used by this crate.
pub fn set_observer(observer: Option<Box<dyn PolicyObserver>>) {
    let cell = OBSERVER.get_or_init(|| RwLock::new(None));
    let mut w = cell.write().expect("observer write lock poisoned");
    *w = observer.map(Arc::from);
}

/// In-process counters for Rule outcomes, keyed by `{idref, result}`.
///
/// Low-cardinality by construction; intended for tests and local
/// observability, not persisted across process restarts.
#[derive(Default)]
pub struct PolicyMetrics {
    inner: Mutex<HashMap<String, u64>>,
}

impl PolicyMetrics {
    /// Read the current count for a given `(idref, result)` pair.
    pub fn rule_result_counter(&self, idref: &str, result: &str) -> u64 {
        let key = format!("{idref}:{result}");
        self.inner.lock().expect("metrics lock poisoned").get(&key).copied().unwrap_or(0)
    }

    fn inc(&self, idref: &str, result: &str) {
        let mut g = self.inner.lock().expect("metrics lock poisoned");
        *g.entry(format!("{idref}:{result}")).or_insert(0) += 1;
    }
}

static METRICS: OnceLock<PolicyMetrics> = OnceLock::new();

/// Access the global policy metrics registry.
pub fn policy_metrics() -> &'static PolicyMetrics {
    METRICS.get_or_init(PolicyMetrics::default)
}

/// One captured Rule evaluation, recorded for later inspection.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// The Rule's document id.
    pub idref: String,
    /// The result produced.
    pub result: String,
}

/// Handle for draining captured audit records. Cheap to clone; thread-safe.
#[derive(Clone)]
pub struct AuditSink {
    inner: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditSink {
    /// Drain and return all captured audit records.
    pub fn drain(&self) -> Vec<AuditRecord> {
        let mut g = self.inner.lock().expect("audit lock poisoned");
        std::mem::take(&mut *g)
    }
}

static AUDIT: OnceLock<AuditSink> = OnceLock::new();

/// Install (or retrieve) the process-global audit sink.
pub fn install_audit_sink() -> AuditSink {
    if let Some(s) = AUDIT.get() {
        return s.clone();
    }
    let sink = AuditSink { inner: Arc::new(Mutex::new(Vec::new())) };
    let _ = AUDIT.set(sink.clone());
    sink
}

/// Fold a hook's abort into either a partial `TestResult` or a fatal
/// error, per the cancellation policy (§5): any `HookAbort` code other
/// than `-1` unwinds the run without rescinding already-produced
/// results, while `-1` discards `test_result` and surfaces the error.
fn abort_outcome(err: PolicyError, test_result: TestResult) -> Result<TestResult, PolicyError> {
    match err {
        PolicyError::HookAbort(-1) => Err(err),
        PolicyError::HookAbort(_) => Ok(test_result),
        other => Err(other),
    }
}

fn notify(result: &RuleResult) {
    let result_str = result.result.to_string();
    policy_metrics().inc(&result.idref, &result_str);

    if let Some(lock) = OBSERVER.get() {
        if let Ok(r) = lock.read() {
            if let Some(obs) = r.as_ref() {
                obs.on_rule_result(result);
            }
        }
    }

    if let Some(sink) = AUDIT.get() {
        let mut g = sink.inner.lock().expect("audit lock poisoned");
        g.push(AuditRecord { idref: result.idref.clone(), result: result_str });
    }
}

/// A hook fired once before the first Rule is evaluated, and once after
/// the last, with the power to abort a run (§4.2.1).
///
/// These are dedicated callback slots rather than engine-registry
/// entries because they fire once per run, not once per check.
pub trait RunHooks: Send + Sync {
    /// Called once before evaluation begins, before any Rule is
    /// evaluated. A non-`HookAbort` error, or `HookAbort(-1)`, is fatal
    /// and surfaces from `Policy::evaluate` directly; any other
    /// `HookAbort` code instead yields an empty `TestResult` (§5
    /// cancellation policy).
    fn on_start(&self) -> Result<(), PolicyError> {
        Ok(())
    }

    /// Called once after every Rule has a result, with the full
    /// `TestResult` available for inspection.
    ///
    /// A non-`HookAbort` error, or a [`PolicyError::HookAbort`] carrying
    /// code `-1`, is fatal: `Policy::evaluate` discards the `TestResult`
    /// and surfaces the error. Any other `HookAbort` code unwinds the run
    /// but `Policy::evaluate` still returns the already-computed
    /// `TestResult`, in whatever partial or complete state it reached
    /// (§5 cancellation policy).
    fn on_output(&self, _result: &TestResult) -> Result<(), PolicyError> {
        Ok(())
    }
}

/// A no-op [`RunHooks`] implementation, the default when a [`Policy`]
/// is built without one.
pub struct NoHooks;
impl RunHooks for NoHooks {}

/// Ties a Benchmark, an optional tailoring Profile, a checking-engine
/// registry, and an optional CPE resolver together into one evaluable
/// unit (§3 "PolicyModel").
pub struct PolicyModel<'a> {
    /// The Benchmark being evaluated.
    pub benchmark: &'a Benchmark,
    /// The tailoring Profile in effect, if any.
    pub profile: Option<&'a Profile>,
    /// Registered checking engines.
    pub registry: &'a EngineRegistry,
    /// CPE applicability resolver, if platform checks are in use.
    pub cpe: Option<&'a CpeResolver>,
    /// Default content href used when a Check's content-ref is itself a
    /// bare platform CPE name with no href prefix.
    pub default_href: &'a str,
    /// Start/output hooks; defaults to [`NoHooks`].
    pub hooks: &'a dyn RunHooks,
}

/// Runs a full evaluation over a [`PolicyModel`], producing a
/// [`TestResult`] and, on request, a [`crate::score::Score`].
pub struct Policy<'a> {
    model: PolicyModel<'a>,
}

impl<'a> Policy<'a> {
    /// Wrap a [`PolicyModel`] for evaluation.
    #[must_use]
    pub fn new(model: PolicyModel<'a>) -> Self {
        Self { model }
    }

    /// Evaluate every Rule in the Benchmark in pre-order, honoring
    /// selection, CPE applicability, Value bindings, and the Check
    /// Chooser, and notify [`PolicyObserver`]/metrics/audit for each.
    ///
    /// `now_ms` supplies the wall-clock timestamp for the produced
    /// `TestResult` and each `RuleResult`; the core has no I/O of its own
    /// and never reads the system clock.
    #[instrument(skip(self, now_ms))]
    pub fn evaluate(&self, now_ms: u64) -> Result<TestResult, PolicyError> {
        let profile_id = self.model.profile.map(|p| p.id.as_str()).unwrap_or("default-profile");
        let id = if self.model.benchmark.schema_v1_2_or_later() {
            format!("xccdf_org.open-scap_testresult_{profile_id}")
        } else {
            format!("OSCAP-Test-{profile_id}")
        };

        let mut test_result =
            TestResult { id, start_ms: now_ms, end_ms: now_ms, rule_results: Vec::new(), score: None };

        if let Err(err) = self.model.hooks.on_start() {
            return abort_outcome(err, test_result);
        }

        let selection = selection::resolve(self.model.benchmark, self.model.profile);

        for (id, rule) in self.model.benchmark.rules() {
            let selected = selection.is_selected(id);
            debug!(rule = %rule.id, selected, "evaluating rule");

            let runner = RuleRunner::new(
                self.model.benchmark,
                self.model.registry,
                self.model.cpe,
                self.model.profile,
                rule,
                selected,
                self.model.default_href,
            );
            let mut result = runner.run()?;
            result.timestamp_ms = now_ms;
            notify(&result);
            test_result.rule_results.push(result);
        }

        info!(rules = test_result.rule_results.len(), "evaluation complete");
        if let Err(err) = self.model.hooks.on_output(&test_result) {
            return abort_outcome(err, test_result);
        }
        Ok(test_result)
    }

    /// Compute a [`crate::score::Score`] for `test_result` under
    /// `system`, returning a copy with `score` populated.
    pub fn score(
        &self,
        mut test_result: TestResult,
        system: ScoringSystem,
    ) -> TestResult {
        let s = compute_score(
            self.model.benchmark,
            &test_result.rule_results,
            ItemId::ROOT,
            system,
        );
        test_result.score = Some(s);
        test_result
    }
}
