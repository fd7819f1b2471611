//! Rule Runner (§4.8): drives one Rule from selection through a terminal
//! [`RuleResult`] as an explicit state machine, so a caller embedding this
//! core in an event loop can step it incrementally instead of blocking.

use std::collections::HashMap;

use xccdf_core::result::ResultKind;

use crate::binding::resolve_exports;
use crate::chooser;
use crate::cpe::CpeResolver;
use crate::error::PolicyError;
use crate::evaluate::{evaluate, evaluate_multi_check};
use crate::model::{Benchmark, Profile, Rule, RuleResult};
use crate::registry::EngineRegistry;

/// Where a [`RuleRunner`] is in its evaluation (§4.8 Rust encoding).
///
/// Every state but [`RunnerState::Done`] advances exactly one step per
/// [`RuleRunner::step`] call; callers loop until `Done`.
#[derive(Debug, Clone)]
pub enum RunnerState {
    /// Check whether the Rule is selected.
    CheckSelection,
    /// Check whether the Rule's platform applies.
    CheckApplicability,
    /// Resolve Value bindings for the chosen check's exports.
    ResolveBindings,
    /// Pick which check to run via the Check Chooser.
    ChooseCheck,
    /// Run the chosen check (simple content-ref fallback, complex fold, or
    /// multi-check fan-out).
    Evaluate,
    /// Terminal: the Rule has a result.
    Done(Box<RuleResult>),
}

/// Drives a single Rule through [`RunnerState`] transitions.
pub struct RuleRunner<'a> {
    benchmark: &'a Benchmark,
    registry: &'a EngineRegistry,
    cpe: Option<&'a CpeResolver>,
    profile: Option<&'a Profile>,
    rule: &'a Rule,
    selected: bool,
    default_href: &'a str,
    state: RunnerState,
    chosen_selector: Option<String>,
}

impl<'a> RuleRunner<'a> {
    /// Start a runner for `rule`. `selected` is the Rule's resolved
    /// selection state from the Selection Resolver (`selection`); it is
    /// supplied rather than recomputed so a caller driving many Rules can
    /// compute selection once for the whole tree.
    #[must_use]
    pub fn new(
        benchmark: &'a Benchmark,
        registry: &'a EngineRegistry,
        cpe: Option<&'a CpeResolver>,
        profile: Option<&'a Profile>,
        rule: &'a Rule,
        selected: bool,
        default_href: &'a str,
    ) -> Self {
        let chosen_selector = profile
            .and_then(|p| p.refine_rule_for(&rule.id))
            .and_then(|r| r.selector.clone());
        Self {
            benchmark,
            registry,
            cpe,
            profile,
            rule,
            selected,
            default_href,
            state: RunnerState::CheckSelection,
            chosen_selector,
        }
    }

    /// Current state, for callers that want to observe progress between
    /// steps.
    #[must_use]
    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    /// Advance by exactly one state. Calling `step` again after `Done` is
    /// a no-op returning the same result.
    pub fn step(&mut self) -> Result<(), PolicyError> {
        self.state = match std::mem::replace(&mut self.state, RunnerState::CheckSelection) {
            RunnerState::CheckSelection => {
                if self.selected {
                    RunnerState::CheckApplicability
                } else {
                    RunnerState::Done(Box::new(self.terminal(ResultKind::NotSelected, None, None)))
                }
            }
            RunnerState::CheckApplicability => match self.cpe {
                Some(cpe) => match cpe.any_platform_applies(self.default_href, &self.rule.platforms) {
                    Ok(true) => RunnerState::ResolveBindings,
                    Ok(false) => {
                        RunnerState::Done(Box::new(self.terminal(ResultKind::NotApplicable, None, None)))
                    }
                    Err(PolicyError::ContentUnloadable(href)) => {
                        let msg = format!("content unloadable: {href}");
                        RunnerState::Done(Box::new(self.terminal(ResultKind::Unknown, None, Some(msg))))
                    }
                    Err(other) => return Err(other),
                },
                None if self.rule.platforms.is_empty() => RunnerState::ResolveBindings,
                None => RunnerState::Done(Box::new(self.terminal(ResultKind::NotApplicable, None, None))),
            },
            RunnerState::ResolveBindings => RunnerState::ChooseCheck,
            RunnerState::ChooseCheck => {
                let chosen = chooser::choose(
                    self.registry,
                    &self.rule.complex_checks,
                    &self.rule.checks,
                    self.chosen_selector.as_deref(),
                );
                match chosen {
                    Some(_) => RunnerState::Evaluate,
                    None => RunnerState::Done(Box::new(self.terminal(ResultKind::NotChecked, None, None))),
                }
            }
            RunnerState::Evaluate => {
                let chosen = chooser::choose(
                    self.registry,
                    &self.rule.complex_checks,
                    &self.rule.checks,
                    self.chosen_selector.as_deref(),
                )
                .expect("ChooseCheck would have gone to Done otherwise");

                let export_ids: Vec<String> =
                    chosen.exports.iter().map(|e| e.value_id.clone()).collect();

                match self.run_check(chosen, &export_ids) {
                    Ok((result, check)) => {
                        RunnerState::Done(Box::new(self.terminal(result, Some(check), None)))
                    }
                    Err(PolicyError::ValueMissing(_) | PolicyError::ValueInstanceMissing { .. }) => {
                        let msg = "unresolved value binding".to_string();
                        RunnerState::Done(Box::new(self.terminal(ResultKind::Unknown, None, Some(msg))))
                    }
                    Err(PolicyError::ContentUnloadable(href)) => {
                        let msg = format!("content unloadable: {href}");
                        RunnerState::Done(Box::new(self.terminal(ResultKind::Unknown, None, Some(msg))))
                    }
                    Err(other) => return Err(other),
                }
            }
            done @ RunnerState::Done(_) => done,
        };
        Ok(())
    }

    fn run_check(
        &self,
        chosen: &crate::model::Check,
        export_ids: &[String],
    ) -> Result<(ResultKind, crate::model::Check), PolicyError> {
        let exported_values: HashMap<String, String> =
            resolve_exports(self.benchmark, self.profile, export_ids)?;

        if chosen.multi_check && !chosen.is_complex() {
            let href = chosen
                .content_refs
                .first()
                .map(|c| c.href.as_str())
                .unwrap_or(self.default_href);
            let expanded = evaluate_multi_check(self.registry, chosen, href, &exported_values)?;
            if expanded.is_empty() {
                return Ok((ResultKind::NotChecked, chosen.clone()));
            }
            let results: Vec<ResultKind> = expanded.iter().map(|e| e.result).collect();
            let folded = xccdf_core::result::fold(xccdf_core::result::BoolOp::And, &results);
            return Ok((folded, expanded[0].check.clone()));
        }

        let evaluated = evaluate(self.registry, chosen, &exported_values)?;
        Ok((evaluated.result, evaluated.check))
    }

    /// Run to completion, returning the terminal [`RuleResult`].
    pub fn run(mut self) -> Result<RuleResult, PolicyError> {
        loop {
            self.step()?;
            if let RunnerState::Done(result) = &self.state {
                return Ok((**result).clone());
            }
        }
    }

    fn terminal(
        &self,
        result: ResultKind,
        check: Option<crate::model::Check>,
        message: Option<String>,
    ) -> RuleResult {
        let refine = self.profile.and_then(|p| p.refine_rule_for(&self.rule.id));
        RuleResult {
            idref: self.rule.id.clone(),
            result,
            weight: refine.and_then(|r| r.weight).unwrap_or(self.rule.weight),
            version: self.rule.version.clone(),
            severity: refine.and_then(|r| r.severity.clone()).or_else(|| self.rule.severity.clone()),
            role: refine.and_then(|r| r.role.clone()).or_else(|| self.rule.role.clone()),
            timestamp_ms: 0,
            fixes: self.rule.fix_text.clone().into_iter().collect(),
            idents: self.rule.idents.clone(),
            check,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Check, CheckExport, CheckImport};
    use crate::registry::CheckEngine;
    use xccdf_core::ids::ItemId;

    struct AlwaysPass;
    impl CheckEngine for AlwaysPass {
        fn eval(
            &self,
            _href: &str,
            _name: Option<&str>,
            _exports: &[CheckExport],
            _exported_values: &HashMap<String, String>,
            _imports: &mut [CheckImport],
        ) -> Result<ResultKind, PolicyError> {
            Ok(ResultKind::Pass)
        }
    }

    fn rule_with_check(id: &str, default_selected: bool, check: Check) -> Rule {
        Rule {
            id: id.to_string(),
            weight: 1.0,
            platforms: Vec::new(),
            checks: vec![check],
            complex_checks: Vec::new(),
            fix_text: None,
            idents: Vec::new(),
            default_selected,
            severity: None,
            role: None,
            version: None,
        }
    }

    fn simple_check() -> Check {
        Check {
            system: "engine".to_string(),
            selector: None,
            negate: false,
            multi_check: false,
            operator: None,
            children: Vec::new(),
            content_refs: vec![crate::model::ContentRef { href: "x.xml".to_string(), name: None }],
            exports: Vec::new(),
            imports: Vec::new(),
            pinned_content_ref: None,
            pinned_name: None,
        }
    }

    #[test]
    fn deselected_rule_yields_not_selected_without_evaluating() {
        let mut builder = Benchmark::builder();
        builder.add_rule(ItemId::ROOT, rule_with_check("r1", true, simple_check()));
        let bench = builder.build();
        let (_, rule) = bench.rule_by_id("r1").unwrap();

        let registry = EngineRegistry::new();
        let runner = RuleRunner::new(&bench, &registry, None, None, rule, false, "x.xml");
        let result = runner.run().unwrap();
        assert_eq!(result.result, ResultKind::NotSelected);
    }

    #[test]
    fn selected_rule_with_registered_engine_passes() {
        let mut builder = Benchmark::builder();
        builder.add_rule(ItemId::ROOT, rule_with_check("r1", true, simple_check()));
        let bench = builder.build();
        let (_, rule) = bench.rule_by_id("r1").unwrap();

        let mut registry = EngineRegistry::new();
        registry.register("engine", Box::new(AlwaysPass));
        let runner = RuleRunner::new(&bench, &registry, None, None, rule, true, "x.xml");
        let result = runner.run().unwrap();
        assert_eq!(result.result, ResultKind::Pass);
    }

    #[test]
    fn unregistered_engine_yields_not_checked() {
        let mut builder = Benchmark::builder();
        builder.add_rule(ItemId::ROOT, rule_with_check("r1", true, simple_check()));
        let bench = builder.build();
        let (_, rule) = bench.rule_by_id("r1").unwrap();

        let registry = EngineRegistry::new();
        let runner = RuleRunner::new(&bench, &registry, None, None, rule, true, "x.xml");
        let result = runner.run().unwrap();
        assert_eq!(result.result, ResultKind::NotChecked);
    }

    struct FailingLoader;
    impl crate::cpe::CpeContentLoader for FailingLoader {
        fn load(&self, href: &str) -> Result<Box<dyn crate::cpe::CpeSession>, PolicyError> {
            Err(PolicyError::ContentUnloadable(href.to_string()))
        }
    }

    #[test]
    fn unloadable_platform_content_yields_unknown_not_a_fatal_error() {
        let mut rule = rule_with_check("r1", true, simple_check());
        rule.platforms = vec!["cpe:/o:linux".to_string()];
        let mut builder = Benchmark::builder();
        builder.add_rule(ItemId::ROOT, rule);
        let bench = builder.build();
        let (_, rule) = bench.rule_by_id("r1").unwrap();

        let mut registry = EngineRegistry::new();
        registry.register("engine", Box::new(AlwaysPass));
        let cpe = CpeResolver::new(Box::new(FailingLoader));
        let runner = RuleRunner::new(&bench, &registry, Some(&cpe), None, rule, true, "x.xml");
        let result = runner.run().unwrap();
        assert_eq!(result.result, ResultKind::Unknown);
    }
}
