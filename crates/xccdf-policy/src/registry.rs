//! The checking-engine registry (§4.2): maps a Check's `system` URI to the
//! engine that evaluates it, and carries the reserved start/output hooks.

use std::collections::HashMap;

use xccdf_core::result::ResultKind;

use crate::error::PolicyError;
use crate::model::{Check, CheckExport, CheckImport};

/// Result of a `NamesForHref` query, used during multi-check fan-out
/// (§4.7) to ask an engine which definition names a piece of content
/// actually contains.
#[derive(Debug, Clone, Default)]
pub struct EngineQueryResult {
    /// Definition names found at the queried href, in the engine's own
    /// order.
    pub names: Vec<String>,
}

/// A query an engine may answer beyond plain `eval` (§4.2).
#[derive(Debug, Clone)]
pub enum EngineQuery<'a> {
    /// List every definition name at `href`.
    NamesForHref {
        /// Content location to inspect.
        href: &'a str,
    },
}

/// A checking-engine implementation registered under one or more system
/// URIs.
///
/// `eval` is the only required operation; `query` defaults to "I don't
/// support queries" so engines that never participate in multi-check
/// fan-out (§4.7) need not implement it.
pub trait CheckEngine: Send + Sync {
    /// Evaluate one content reference, given its resolved export values
    /// and mutable import slots.
    fn eval(
        &self,
        content_ref_href: &str,
        definition_name: Option<&str>,
        exports: &[CheckExport],
        exported_values: &HashMap<String, String>,
        imports: &mut [CheckImport],
    ) -> Result<ResultKind, PolicyError>;

    /// Answer an [`EngineQuery`]; the default implementation reports the
    /// query as unsupported by returning an empty result, which callers
    /// treat as "no names found" (§4.7: empty expansion is not an error).
    fn query(&self, _query: EngineQuery<'_>) -> EngineQueryResult {
        EngineQueryResult::default()
    }
}

/// Maps checking-engine system URIs to registered [`CheckEngine`]s, plus
/// the two reserved evaluation hooks (§4.2, §4.2.1).
///
/// The reserved start/output hook URIs from the original format are
/// intentionally not engine-map entries: they are dedicated callback
/// slots on [`crate::PolicyModel`] instead, since they fire once per run
/// rather than once per check.
#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Vec<Box<dyn CheckEngine>>>,
}

impl EngineRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { engines: HashMap::new() }
    }

    /// Register an engine under `system`. Multiple engines per system URI
    /// are permitted; a later call for the same URI appends rather than
    /// replacing, and engines are tried in registration order during
    /// `eval` (§4.2).
    pub fn register(&mut self, system: impl Into<String>, engine: Box<dyn CheckEngine>) {
        self.engines.entry(system.into()).or_default().push(engine);
    }

    /// The first engine registered for `system`, if any. Used by
    /// multi-check fan-out (`evaluate::evaluate_multi_check`), which
    /// queries a single engine for definition names rather than trying
    /// each registered engine in turn.
    #[must_use]
    pub fn get(&self, system: &str) -> Option<&dyn CheckEngine> {
        self.engines.get(system).and_then(|v| v.first()).map(AsRef::as_ref)
    }

    /// True when at least one engine is registered for `system`.
    #[must_use]
    pub fn is_registered(&self, system: &str) -> bool {
        self.engines.get(system).is_some_and(|v| !v.is_empty())
    }

    /// Run a [`Check`]'s own `system`/content, trying each engine
    /// registered for that URI in registration order. A `NotChecked`
    /// result from one engine signals "try the next engine" (§4.2,
    /// §4.7); if every registered engine returns `NotChecked`, the final
    /// value is `NotChecked`. Returns [`PolicyError::UnknownEngine`] only
    /// when no engine at all is registered for the system; the Check
    /// Chooser (`chooser`) is expected to have already filtered
    /// candidates down to registered systems, so this path should only
    /// be hit for a lone, unregistered simple check.
    pub fn eval(
        &self,
        check: &Check,
        href: &str,
        name: Option<&str>,
        exported_values: &HashMap<String, String>,
        imports: &mut [CheckImport],
    ) -> Result<ResultKind, PolicyError> {
        let engines = self
            .engines
            .get(&check.system)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PolicyError::UnknownEngine(check.system.clone()))?;

        for engine in engines {
            match engine.eval(href, name, &check.exports, exported_values, imports)? {
                ResultKind::NotChecked => continue,
                other => return Ok(other),
            }
        }
        Ok(ResultKind::NotChecked)
    }
}
