//! Check Chooser (§4.6): picks which of a Rule's checks to evaluate.

use crate::model::Check;
use crate::registry::EngineRegistry;

/// Pick the Check to evaluate for a Rule, given the Profile-refined
/// `selector` (if any).
///
/// Precedence, per §4.6:
/// 1. Complex checks take priority over simple checks: if
///    `complex_checks` is non-empty, the first one is chosen outright —
///    selectors and engine registration only disambiguate among simple
///    checks.
/// 2. Among simple checks, enumerate those whose own `selector` equals
///    `selector`. If `selector` is `Some` and that enumeration is empty,
///    fall back to simple checks with no selector at all (`selector ==
///    None`) rather than leaving the candidate set empty.
/// 3. Among that candidate set, retain the *last* one whose system URI
///    has a registered engine.
/// 4. If nothing is registered, `None` — callers produce `NotChecked`.
#[must_use]
pub fn choose<'a>(
    registry: &EngineRegistry,
    complex_checks: &'a [Check],
    simple_checks: &'a [Check],
    selector: Option<&str>,
) -> Option<&'a Check> {
    if let Some(first) = complex_checks.first() {
        return Some(first);
    }

    let mut candidates: Vec<&Check> =
        simple_checks.iter().filter(|c| c.selector.as_deref() == selector).collect();
    if selector.is_some() && candidates.is_empty() {
        candidates = simple_checks.iter().filter(|c| c.selector.is_none()).collect();
    }

    candidates.into_iter().rev().find(|c| registry.is_registered(&c.system))
}
