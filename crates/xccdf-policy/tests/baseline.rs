//! End-to-end scenarios covering a full Policy evaluation pass: trivial
//! pass, a deselected group, a complex AND with an Error operand, and
//! multi-check fan-out.

use std::collections::HashMap;

use xccdf_core::ids::ItemId;
use xccdf_core::result::{BoolOp, ResultKind};
use xccdf_policy::error::PolicyError;
use xccdf_policy::model::{
    Benchmark, Check, CheckExport, CheckImport, ContentRef, Group, Rule,
};
use xccdf_policy::registry::{CheckEngine, EngineQuery, EngineQueryResult, EngineRegistry};
use xccdf_policy::score::ScoringSystem;
use xccdf_policy::{NoHooks, Policy, PolicyModel};

struct ScriptedEngine {
    scripted: HashMap<String, ResultKind>,
    names: Vec<String>,
}

impl CheckEngine for ScriptedEngine {
    fn eval(
        &self,
        href: &str,
        name: Option<&str>,
        _exports: &[CheckExport],
        _exported_values: &HashMap<String, String>,
        _imports: &mut [CheckImport],
    ) -> Result<ResultKind, PolicyError> {
        let key = match name {
            Some(n) => format!("{href}#{n}"),
            None => href.to_string(),
        };
        self.scripted.get(&key).copied().ok_or_else(|| PolicyError::ContentUnloadable(key))
    }

    fn query(&self, _query: EngineQuery<'_>) -> EngineQueryResult {
        EngineQueryResult { names: self.names.clone() }
    }
}

fn leaf_check(href: &str) -> Check {
    Check {
        system: "scripted".to_string(),
        selector: None,
        negate: false,
        multi_check: false,
        operator: None,
        children: Vec::new(),
        content_refs: vec![ContentRef { href: href.to_string(), name: None }],
        exports: Vec::new(),
        imports: Vec::new(),
        pinned_content_ref: None,
        pinned_name: None,
    }
}

fn rule_with_checks(id: &str, checks: Vec<Check>, complex: Vec<Check>) -> Rule {
    Rule {
        id: id.to_string(),
        weight: 1.0,
        platforms: Vec::new(),
        checks,
        complex_checks: complex,
        fix_text: None,
        idents: Vec::new(),
        default_selected: true,
        severity: None,
        role: None,
        version: None,
    }
}

#[test]
fn trivial_pass() {
    let mut builder = Benchmark::builder();
    builder.add_rule(ItemId::ROOT, rule_with_checks("r1", vec![leaf_check("good.xml")], Vec::new()));
    let bench = builder.build();

    let mut scripted = HashMap::new();
    scripted.insert("good.xml".to_string(), ResultKind::Pass);
    let mut registry = EngineRegistry::new();
    registry.register("scripted", Box::new(ScriptedEngine { scripted, names: Vec::new() }));

    let hooks = NoHooks;
    let policy = Policy::new(PolicyModel {
        benchmark: &bench,
        profile: None,
        registry: &registry,
        cpe: None,
        default_href: "good.xml",
        hooks: &hooks,
    });

    let result = policy.evaluate(0).unwrap();
    assert_eq!(result.rule_results.len(), 1);
    assert_eq!(result.rule_results[0].result, ResultKind::Pass);
}

#[test]
fn deselected_group_propagates_to_child_rule() {
    let mut builder = Benchmark::builder();
    let group = builder.add_group(
        ItemId::ROOT,
        Group { id: "g1".to_string(), weight: 1.0, platforms: Vec::new(), default_selected: false, children: Vec::new() },
    );
    builder.add_rule(group, rule_with_checks("r1", vec![leaf_check("good.xml")], Vec::new()));
    let bench = builder.build();

    let registry = EngineRegistry::new();
    let hooks = NoHooks;
    let policy = Policy::new(PolicyModel {
        benchmark: &bench,
        profile: None,
        registry: &registry,
        cpe: None,
        default_href: "good.xml",
        hooks: &hooks,
    });

    let result = policy.evaluate(0).unwrap();
    assert_eq!(result.rule_results[0].result, ResultKind::NotSelected);
}

#[test]
fn complex_and_with_error_operand_stays_error() {
    let mut builder = Benchmark::builder();
    let complex = Check {
        operator: Some(BoolOp::And),
        children: vec![leaf_check("pass.xml"), leaf_check("error.xml")],
        ..leaf_check("unused")
    };
    builder.add_rule(ItemId::ROOT, rule_with_checks("r1", Vec::new(), vec![complex]));
    let bench = builder.build();

    let mut scripted = HashMap::new();
    scripted.insert("pass.xml".to_string(), ResultKind::Pass);
    scripted.insert("error.xml".to_string(), ResultKind::Error);
    let mut registry = EngineRegistry::new();
    registry.register("scripted", Box::new(ScriptedEngine { scripted, names: Vec::new() }));

    let hooks = NoHooks;
    let policy = Policy::new(PolicyModel {
        benchmark: &bench,
        profile: None,
        registry: &registry,
        cpe: None,
        default_href: "pass.xml",
        hooks: &hooks,
    });

    let result = policy.evaluate(0).unwrap();
    assert_eq!(result.rule_results[0].result, ResultKind::Error);
}

#[test]
fn content_ref_fallback_skips_unloadable_refs() {
    let mut builder = Benchmark::builder();
    let mut check = leaf_check("missing.xml");
    check.content_refs.push(ContentRef { href: "good.xml".to_string(), name: None });
    builder.add_rule(ItemId::ROOT, rule_with_checks("r1", vec![check], Vec::new()));
    let bench = builder.build();

    let mut scripted = HashMap::new();
    scripted.insert("good.xml".to_string(), ResultKind::Pass);
    let mut registry = EngineRegistry::new();
    registry.register("scripted", Box::new(ScriptedEngine { scripted, names: Vec::new() }));

    let hooks = NoHooks;
    let policy = Policy::new(PolicyModel {
        benchmark: &bench,
        profile: None,
        registry: &registry,
        cpe: None,
        default_href: "good.xml",
        hooks: &hooks,
    });

    let result = policy.evaluate(0).unwrap();
    assert_eq!(result.rule_results[0].result, ResultKind::Pass);
    assert_eq!(
        result.rule_results[0].check.as_ref().unwrap().pinned_content_ref.as_ref().unwrap().href,
        "good.xml"
    );
}

#[test]
fn multi_check_fans_out_over_definition_names() {
    let mut builder = Benchmark::builder();
    let mut check = leaf_check("content.xml");
    check.multi_check = true;
    check.content_refs = vec![ContentRef { href: "content.xml".to_string(), name: None }];
    builder.add_rule(ItemId::ROOT, rule_with_checks("r1", vec![check], Vec::new()));
    let bench = builder.build();

    let mut scripted = HashMap::new();
    scripted.insert("content.xml#def1".to_string(), ResultKind::Pass);
    scripted.insert("content.xml#def2".to_string(), ResultKind::Pass);
    let mut registry = EngineRegistry::new();
    registry.register(
        "scripted",
        Box::new(ScriptedEngine { scripted, names: vec!["def1".to_string(), "def2".to_string()] }),
    );

    let hooks = NoHooks;
    let policy = Policy::new(PolicyModel {
        benchmark: &bench,
        profile: None,
        registry: &registry,
        cpe: None,
        default_href: "content.xml",
        hooks: &hooks,
    });

    let result = policy.evaluate(0).unwrap();
    assert_eq!(result.rule_results[0].result, ResultKind::Pass);
}

#[test]
fn scoring_reflects_evaluated_results() {
    let mut builder = Benchmark::builder();
    builder.add_rule(ItemId::ROOT, rule_with_checks("r1", vec![leaf_check("good.xml")], Vec::new()));
    builder.add_rule(ItemId::ROOT, rule_with_checks("r2", vec![leaf_check("bad.xml")], Vec::new()));
    let bench = builder.build();

    let mut scripted = HashMap::new();
    scripted.insert("good.xml".to_string(), ResultKind::Pass);
    scripted.insert("bad.xml".to_string(), ResultKind::Fail);
    let mut registry = EngineRegistry::new();
    registry.register("scripted", Box::new(ScriptedEngine { scripted, names: Vec::new() }));

    let hooks = NoHooks;
    let policy = Policy::new(PolicyModel {
        benchmark: &bench,
        profile: None,
        registry: &registry,
        cpe: None,
        default_href: "good.xml",
        hooks: &hooks,
    });

    let result = policy.evaluate(0).unwrap();
    let scored = policy.score(result, ScoringSystem::Default);
    let score = scored.score.unwrap();
    assert!((score.value - 50.0).abs() < 1e-9);
}
