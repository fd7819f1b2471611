//! Error taxonomy for the policy-evaluation core (§7).

use thiserror::Error;

/// Errors the core can raise while resolving bindings, choosing checks,
/// evaluating CPE applicability, or scoring a Benchmark tree.
///
/// Most of these never reach a caller: the Rule Runner (`runner`) catches
/// [`PolicyError::ValueMissing`] and [`PolicyError::ValueInstanceMissing`]
/// and folds them into an `Unknown` `RuleResult` instead (§7 propagation
/// policy), and an unregistered engine at chooser time yields `NotChecked`
/// rather than an error. What's left — [`PolicyError::HookAbort`],
/// [`PolicyError::UnknownScoringSystem`], and [`PolicyError::Internal`] —
/// are the ones that do surface to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A Check export referenced a Value id absent from the Benchmark.
    #[error("export references unknown value id '{0}'")]
    ValueMissing(String),

    /// A Value's effective selector did not resolve to any instance.
    #[error("value '{value_id}' has no instance matching selector '{selector}'")]
    ValueInstanceMissing {
        /// The Value's id.
        value_id: String,
        /// The selector that failed to resolve.
        selector: String,
    },

    /// No engine is registered for a check's system URI.
    #[error("no checking engine registered for system '{0}'")]
    UnknownEngine(String),

    /// CPE/OVAL content referenced by a platform check could not be loaded.
    #[error("content at '{0}' could not be loaded")]
    ContentUnloadable(String),

    /// A scoring system URI is not one of the four defined systems.
    #[error("unknown scoring system '{0}'")]
    UnknownScoringSystem(String),

    /// A start or output hook requested that evaluation stop.
    #[error("evaluation aborted by hook with code {0}")]
    HookAbort(i32),

    /// An invariant the core relies on was violated; this should never fire.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}
