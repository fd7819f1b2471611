//! Check Evaluator (§4.7): turns a chosen [`Check`] into a [`ResultKind`],
//! handling simple content-ref fallback, complex-check folding, and
//! multi-check fan-out.

use std::collections::HashMap;

use xccdf_core::result::{fold, negate, ResultKind};

use crate::error::PolicyError;
use crate::model::{Check, CheckImport, ContentRef};
use crate::registry::{EngineQuery, EngineRegistry};

/// One terminal outcome produced by evaluating a Check: the result and the
/// pinned content-ref/name that produced it, ready to attach to a
/// `RuleResult` (§9).
#[derive(Debug, Clone)]
pub struct EvaluatedCheck {
    /// The outcome.
    pub result: xccdf_core::result::ResultKind,
    /// A fresh clone of the Check, with `pinned_content_ref`/`pinned_name`
    /// set to whichever alternative actually produced `result`.
    pub check: Check,
}

/// Evaluate `check`, which may be simple or complex, against `registry`.
///
/// For a simple check, each [`ContentRef`] is tried in document order
/// until one yields a terminal result — anything other than
/// [`PolicyError::ContentUnloadable`] or a literal
/// `Ok(ResultKind::NotChecked)` — and that ref is pinned onto the
/// returned clone (§4.7 fallback). If every ref yields `NotChecked`, the
/// final result is `NotChecked`, pinned to the last ref tried.
///
/// For a complex check, every child is evaluated recursively and the
/// results are combined with [`fold`] under the check's operator, then
/// negated exactly once if `negate` is set.
///
/// Multi-check fan-out (`multi_check: true` on a simple check with no
/// explicit `name`) is handled by [`evaluate_multi_check`], not here:
/// this function assumes a single terminal outcome per check.
pub fn evaluate(
    registry: &EngineRegistry,
    check: &Check,
    exported_values: &HashMap<String, String>,
) -> Result<EvaluatedCheck, PolicyError> {
    if let Some(op) = check.operator {
        let mut results = Vec::with_capacity(check.children.len());
        let mut pinned_children = Vec::with_capacity(check.children.len());
        for child in &check.children {
            let evaluated = evaluate(registry, child, exported_values)?;
            results.push(evaluated.result);
            pinned_children.push(evaluated.check);
        }
        let mut folded = fold(op, &results);
        if check.negate {
            folded = negate(folded);
        }
        let mut pinned = check.clone();
        pinned.children = pinned_children;
        return Ok(EvaluatedCheck { result: folded, check: pinned });
    }

    evaluate_simple(registry, check, exported_values)
}

fn evaluate_simple(
    registry: &EngineRegistry,
    check: &Check,
    exported_values: &HashMap<String, String>,
) -> Result<EvaluatedCheck, PolicyError> {
    let mut last_err: Option<PolicyError> = None;
    let mut last_not_checked: Option<EvaluatedCheck> = None;

    for content_ref in &check.content_refs {
        let mut imports: Vec<CheckImport> = check.imports.clone();
        match registry.eval(
            check,
            &content_ref.href,
            content_ref.name.as_deref(),
            exported_values,
            &mut imports,
        ) {
            Ok(ResultKind::NotChecked) => {
                let mut pinned = check.clone();
                pinned.imports = imports;
                pinned.pinned_content_ref = Some(content_ref.clone());
                pinned.pinned_name = content_ref.name.clone();
                last_not_checked = Some(EvaluatedCheck { result: ResultKind::NotChecked, check: pinned });
                continue;
            }
            Ok(result) => {
                let result = if check.negate { negate(result) } else { result };
                let mut pinned = check.clone();
                pinned.imports = imports;
                pinned.pinned_content_ref = Some(content_ref.clone());
                pinned.pinned_name = content_ref.name.clone();
                return Ok(EvaluatedCheck { result, check: pinned });
            }
            Err(PolicyError::ContentUnloadable(href)) => {
                last_err = Some(PolicyError::ContentUnloadable(href));
                continue;
            }
            Err(other) => return Err(other),
        }
    }

    if let Some(not_checked) = last_not_checked {
        return Ok(not_checked);
    }
    Err(last_err.unwrap_or_else(|| PolicyError::UnknownEngine(check.system.clone())))
}

/// Expand a multi-check simple check into one [`EvaluatedCheck`] per
/// definition name the engine reports for `href`, by issuing a
/// [`EngineQuery::NamesForHref`] query before evaluating (§4.7).
///
/// An empty query result (no names found) is not an error: it yields an
/// empty `Vec`, and the Rule Runner treats a Rule whose only checks
/// expanded to nothing as `NotChecked` rather than failing the run.
pub fn evaluate_multi_check(
    registry: &EngineRegistry,
    check: &Check,
    href: &str,
    exported_values: &HashMap<String, String>,
) -> Result<Vec<EvaluatedCheck>, PolicyError> {
    let engine = registry
        .get(&check.system)
        .ok_or_else(|| PolicyError::UnknownEngine(check.system.clone()))?;
    let names = engine.query(EngineQuery::NamesForHref { href }).names;

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut imports: Vec<CheckImport> = check.imports.clone();
        let result = engine.eval(href, Some(&name), &check.exports, exported_values, &mut imports)?;
        let result = if check.negate { negate(result) } else { result };
        let mut pinned = check.clone();
        pinned.imports = imports;
        pinned.pinned_content_ref = Some(ContentRef { href: href.to_string(), name: Some(name.clone()) });
        pinned.pinned_name = Some(name);
        out.push(EvaluatedCheck { result, check: pinned });
    }
    Ok(out)
}
