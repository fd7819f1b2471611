//! Value Binding Builder (§4.3): resolves the effective selector and
//! operator for a Value under a Profile, and substitutes its literal text
//! into a Check's exports.

use std::collections::HashMap;

use crate::error::PolicyError;
use crate::model::{Benchmark, Profile, ValueOperator};

/// The fully resolved state of one Value under a Profile: the instance
/// text that was selected, any explicit setvalue override alongside it,
/// and the operator in effect.
#[derive(Debug, Clone)]
pub struct ResolvedValue {
    /// The literal text of the matched instance.
    pub text: String,
    /// An explicit setvalue for this Value id, carried separately from
    /// `text` rather than replacing it (§4.3 step 4: a setvalue "does
    /// not replace the resolved value").
    pub setvalue_override: Option<String>,
    /// The effective operator (refine-value override, else the Value's
    /// own declared default).
    pub operator: ValueOperator,
}

/// Resolve every exported Value for one Rule's checks against `profile`.
///
/// Resolution order per Value, matching the precedence in §4.3:
/// 1. A refine-value's selector, else the unselected default instance.
/// 2. A refine-value's operator override, else the Value's own default.
/// 3. `text` is always the matched instance's own literal value; it is
///    never substituted by a setvalue.
/// 4. A setvalue for the same Value id is carried alongside `text` as
///    `setvalue_override`, a separate, non-destructive override an
///    engine may apply on top of the resolved value.
///
/// "Last match wins": when a Profile lists more than one refine-value or
/// setvalue for the same Value id, the last one in document order is
/// authoritative — callers must resolve this with a linear scan over the
/// full ordered list, never a hash lookup that discards earlier entries
/// before the fold completes.
pub fn resolve_value(
    benchmark: &Benchmark,
    profile: Option<&Profile>,
    value_id: &str,
) -> Result<ResolvedValue, PolicyError> {
    let value = benchmark
        .value_by_id(value_id)
        .ok_or_else(|| PolicyError::ValueMissing(value_id.to_string()))?;

    let refine = profile.and_then(|p| p.refine_value_for(value_id));
    let operator = refine.and_then(|r| r.operator).unwrap_or(value.operator);
    let selector = refine.and_then(|r| r.selector.as_deref());

    let instance = value.instance(selector).ok_or_else(|| PolicyError::ValueInstanceMissing {
        value_id: value_id.to_string(),
        selector: selector.unwrap_or("<default>").to_string(),
    })?;
    let setvalue_override = profile.and_then(|p| p.setvalue_for(value_id)).map(str::to_string);

    Ok(ResolvedValue { text: instance.value.clone(), setvalue_override, operator })
}

/// Resolve every `value_id` in `ids`, returning a map from Value id to its
/// resolved literal text, suitable for passing to a [`crate::registry::CheckEngine`]
/// as `exported_values`.
///
/// Stops at the first unresolvable Value and returns its error; the Rule
/// Runner is responsible for catching `ValueMissing`/`ValueInstanceMissing`
/// and folding them into an `Unknown` `RuleResult` (§7).
pub fn resolve_exports(
    benchmark: &Benchmark,
    profile: Option<&Profile>,
    ids: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<HashMap<String, String>, PolicyError> {
    let mut out = HashMap::new();
    for id in ids {
        let id = id.as_ref();
        let resolved = resolve_value(benchmark, profile, id)?;
        out.insert(id.to_string(), resolved.text);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Profile, RefineValue, ValueInstance, ValueItem, ValueType};

    fn value_with(instances: Vec<ValueInstance>) -> ValueItem {
        ValueItem {
            id: "val1".to_string(),
            value_type: ValueType::String,
            operator: ValueOperator::Equals,
            instances,
        }
    }

    fn benchmark_with_value(value: ValueItem) -> Benchmark {
        let mut builder = Benchmark::builder();
        builder.add_value(xccdf_core::ids::ItemId::ROOT, value);
        builder.build()
    }

    #[test]
    fn default_instance_selected_without_profile() {
        let bench = benchmark_with_value(value_with(vec![
            ValueInstance { selector: None, value: "default".to_string() },
            ValueInstance { selector: Some("strict".to_string()), value: "strict-val".to_string() },
        ]));
        let resolved = resolve_value(&bench, None, "val1").unwrap();
        assert_eq!(resolved.text, "default");
    }

    #[test]
    fn refine_value_selector_picks_named_instance() {
        let bench = benchmark_with_value(value_with(vec![
            ValueInstance { selector: None, value: "default".to_string() },
            ValueInstance { selector: Some("strict".to_string()), value: "strict-val".to_string() },
        ]));
        let profile = Profile {
            id: "p1".to_string(),
            refine_values: vec![RefineValue {
                value_id: "val1".to_string(),
                selector: Some("strict".to_string()),
                operator: None,
            }],
            ..Profile::default()
        };
        let resolved = resolve_value(&bench, Some(&profile), "val1").unwrap();
        assert_eq!(resolved.text, "strict-val");
    }

    #[test]
    fn last_refine_value_wins_over_earlier_ones() {
        let bench = benchmark_with_value(value_with(vec![
            ValueInstance { selector: None, value: "default".to_string() },
            ValueInstance { selector: Some("a".to_string()), value: "a-val".to_string() },
            ValueInstance { selector: Some("b".to_string()), value: "b-val".to_string() },
        ]));
        let profile = Profile {
            id: "p1".to_string(),
            refine_values: vec![
                RefineValue { value_id: "val1".to_string(), selector: Some("a".to_string()), operator: None },
                RefineValue { value_id: "val1".to_string(), selector: Some("b".to_string()), operator: None },
            ],
            ..Profile::default()
        };
        let resolved = resolve_value(&bench, Some(&profile), "val1").unwrap();
        assert_eq!(resolved.text, "b-val");
    }

    #[test]
    fn setvalue_does_not_replace_resolved_instance_text() {
        let bench = benchmark_with_value(value_with(vec![ValueInstance {
            selector: None,
            value: "default".to_string(),
        }]));
        let profile = Profile {
            id: "p1".to_string(),
            setvalues: vec![("val1".to_string(), "overridden".to_string())],
            ..Profile::default()
        };
        let resolved = resolve_value(&bench, Some(&profile), "val1").unwrap();
        assert_eq!(resolved.text, "default");
        assert_eq!(resolved.setvalue_override.as_deref(), Some("overridden"));
    }

    #[test]
    fn no_setvalue_leaves_override_absent() {
        let bench = benchmark_with_value(value_with(vec![ValueInstance {
            selector: None,
            value: "default".to_string(),
        }]));
        let resolved = resolve_value(&bench, None, "val1").unwrap();
        assert!(resolved.setvalue_override.is_none());
    }

    #[test]
    fn missing_value_id_is_an_error() {
        let bench = benchmark_with_value(value_with(vec![]));
        let err = resolve_value(&bench, None, "does-not-exist").unwrap_err();
        assert_eq!(err, PolicyError::ValueMissing("does-not-exist".to_string()));
    }

    #[test]
    fn unmatched_selector_is_an_error() {
        let bench = benchmark_with_value(value_with(vec![ValueInstance {
            selector: None,
            value: "default".to_string(),
        }]));
        let profile = Profile {
            id: "p1".to_string(),
            refine_values: vec![RefineValue {
                value_id: "val1".to_string(),
                selector: Some("missing".to_string()),
                operator: None,
            }],
            ..Profile::default()
        };
        let err = resolve_value(&bench, Some(&profile), "val1").unwrap_err();
        assert!(matches!(err, PolicyError::ValueInstanceMissing { .. }));
    }
}
