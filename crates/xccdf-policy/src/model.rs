//! The Benchmark data model: an arena of items addressed by [`ItemId`],
//! plus the Profile, Check, RuleResult, and TestResult types built around
//! it (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xccdf_core::ids::{IdAllocator, ItemId};
use xccdf_core::result::{BoolOp, ResultKind};

/// Declared type of a Value's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// A string.
    String,
    /// A number.
    Number,
    /// A boolean.
    Boolean,
}

/// Comparison operator carried by a Value or a refine-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueOperator {
    /// `=`
    Equals,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
    /// Regex match.
    PatternMatch,
}

/// One keyed instance of a Value (§3: "value instances keyed by an
/// optional selector string").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueInstance {
    /// `None` is the default, unselected instance.
    pub selector: Option<String>,
    /// The literal value text.
    pub value: String,
}

/// A Value item: a named, typed, multi-instance parameter Checks can bind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueItem {
    /// Document id, unique within the Benchmark.
    pub id: String,
    /// Declared type.
    pub value_type: ValueType,
    /// Default comparison operator, overridable by a refine-value.
    pub operator: ValueOperator,
    /// Ordered instances; document order matters for "first instance"
    /// lookups performed by substitution (§4.10).
    pub instances: Vec<ValueInstance>,
}

impl ValueItem {
    /// The instance matching `selector`, or the unselected default instance
    /// when `selector` is `None`.
    #[must_use]
    pub fn instance(&self, selector: Option<&str>) -> Option<&ValueInstance> {
        self.instances.iter().find(|inst| inst.selector.as_deref() == selector)
    }
}

/// A single content alternative a simple Check may dispatch to (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRef {
    /// Location of the checking-engine content (e.g. an OVAL definitions
    /// file), resolved relative to the Benchmark unless absolute.
    pub href: String,
    /// Definition name within that content; `None` for multi-check
    /// expansion candidates (§4.7).
    pub name: Option<String>,
}

/// Binds a Check export name to the Value id it resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckExport {
    /// The Value id being exported.
    pub value_id: String,
    /// The name the checking engine sees.
    pub export_name: String,
}

/// A named slot a checking engine may fill in with data captured during
/// evaluation (§4.2: "allowed to mutate the supplied check-imports
/// sequence").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckImport {
    /// The import name the engine recognizes.
    pub name: String,
    /// Engine-captured value, if any; `None` until an `eval` call fills it.
    pub captured: Option<String>,
}

/// A Check: either a simple leaf dispatched to a single checking-engine
/// system, or a complex node combining child Checks with a boolean
/// operator (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    /// Checking-engine system URI (e.g. an OVAL namespace). Ignored for
    /// complex checks.
    pub system: String,
    /// Selector used by the Check Chooser (§4.6) to pick among simple
    /// checks sharing a Rule.
    pub selector: Option<String>,
    /// Negate the combined/evaluated result exactly once at this root.
    pub negate: bool,
    /// Multi-check fan-out flag (§4.7); meaningful only for simple checks.
    pub multi_check: bool,
    /// `Some` marks this node as complex: children are folded with the
    /// given operator. `None` marks a simple check.
    pub operator: Option<BoolOp>,
    /// Child checks, evaluated in order, for a complex check.
    pub children: Vec<Check>,
    /// Content alternatives, tried in order, for a simple check.
    pub content_refs: Vec<ContentRef>,
    /// Value exports passed to the checking engine for a simple check.
    pub exports: Vec<CheckExport>,
    /// Import slots a checking engine may fill in for a simple check.
    pub imports: Vec<CheckImport>,
    /// Filled in on the clone attached to a `RuleResult`: the content-ref
    /// that actually produced the terminal result (§4.7, §9 open question).
    pub pinned_content_ref: Option<ContentRef>,
    /// Filled in on the clone attached to a `RuleResult` during multi-check
    /// fan-out: the definition name this particular RuleResult covers.
    pub pinned_name: Option<String>,
}

impl Check {
    /// True when this node is a complex check (has an operator).
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.operator.is_some()
    }
}

/// A Rule item: the unit of evaluation and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Document id.
    pub id: String,
    /// Scoring weight, non-negative, default 1.0.
    pub weight: f64,
    /// Platform references (§4.5); empty means unconditionally applicable.
    pub platforms: Vec<String>,
    /// Simple checks, in document order.
    pub checks: Vec<Check>,
    /// Complex checks, in document order.
    pub complex_checks: Vec<Check>,
    /// Remediation text, opaque to this core.
    pub fix_text: Option<String>,
    /// Identifiers carried through to the RuleResult.
    pub idents: Vec<String>,
    /// Selection state absent an overriding Profile select.
    pub default_selected: bool,
    /// Default severity, overridable by a refine-rule.
    pub severity: Option<String>,
    /// Default role, overridable by a refine-rule.
    pub role: Option<String>,
    /// Version string carried through to the RuleResult.
    pub version: Option<String>,
}

/// A Group item: a container that propagates selection and applicability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Document id.
    pub id: String,
    /// Scoring weight of this Group node.
    pub weight: f64,
    /// Platform references (§4.5).
    pub platforms: Vec<String>,
    /// Selection state absent an overriding Profile select.
    pub default_selected: bool,
    /// Children, in document order.
    pub children: Vec<ItemId>,
}

/// The tagged variant distinguishing Benchmark item kinds (§9: "do not use
/// inheritance").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ItemKind {
    /// The Benchmark root; exactly one exists, at [`ItemId::ROOT`].
    Benchmark {
        /// Document id of the Benchmark itself.
        id: String,
        /// Top-level children, in document order.
        children: Vec<ItemId>,
        /// True when the source schema version is 1.2 or later (§6).
        schema_v1_2_or_later: bool,
    },
    /// A Group.
    Group(Group),
    /// A Rule.
    Rule(Rule),
    /// A Value.
    Value(ValueItem),
}

/// One arena slot: an item plus its parent back-index (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemNode {
    /// This item's id.
    pub id: ItemId,
    /// `None` only for the Benchmark root.
    pub parent: Option<ItemId>,
    /// The item payload.
    pub kind: ItemKind,
}

/// A Profile directive overriding a Rule's weight, severity, role, or
/// simple-check selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineRule {
    /// The Rule id this directive targets.
    pub rule_id: String,
    /// Weight override.
    pub weight: Option<f64>,
    /// Severity override.
    pub severity: Option<String>,
    /// Role override.
    pub role: Option<String>,
    /// Simple-check selector override (§4.6).
    pub selector: Option<String>,
}

/// A Profile directive overriding a Value's selector or operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineValue {
    /// The Value id this directive targets.
    pub value_id: String,
    /// Selector override.
    pub selector: Option<String>,
    /// Operator override.
    pub operator: Option<ValueOperator>,
}

/// A Profile: a named tailoring of a Benchmark.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    /// Document id.
    pub id: String,
    /// `item-id -> bool`, in document order (order matters only in that
    /// later inserts for the same id should replace earlier ones, as
    /// Profiles are assembled once before use).
    pub selects: HashMap<String, bool>,
    /// `(value-id, literal)` pairs in document order; "last match wins"
    /// (§4.3) requires the linear, order-preserving representation.
    pub setvalues: Vec<(String, String)>,
    /// Refine-rule directives in document order.
    pub refine_rules: Vec<RefineRule>,
    /// Refine-value directives in document order.
    pub refine_values: Vec<RefineValue>,
}

impl Profile {
    /// The last refine-rule targeting `rule_id`, if any ("last match
    /// wins", §4.3/§9).
    #[must_use]
    pub fn refine_rule_for(&self, rule_id: &str) -> Option<&RefineRule> {
        self.refine_rules.iter().rev().find(|r| r.rule_id == rule_id)
    }

    /// The last refine-value targeting `value_id`, if any.
    #[must_use]
    pub fn refine_value_for(&self, value_id: &str) -> Option<&RefineValue> {
        self.refine_values.iter().rev().find(|r| r.value_id == value_id)
    }

    /// The last setvalue targeting `value_id`, if any.
    #[must_use]
    pub fn setvalue_for(&self, value_id: &str) -> Option<&str> {
        self.setvalues.iter().rev().find(|(id, _)| id == value_id).map(|(_, v)| v.as_str())
    }
}

/// The immutable Benchmark arena (§3, §9).
#[derive(Debug, Clone)]
pub struct Benchmark {
    items: Vec<ItemNode>,
    profiles: Vec<Profile>,
}

impl Benchmark {
    /// Begin constructing a Benchmark. The root item is inserted
    /// immediately at [`ItemId::ROOT`].
    #[must_use]
    pub fn builder() -> BenchmarkBuilder {
        BenchmarkBuilder::new()
    }

    /// Look up an item by id.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&ItemNode> {
        self.items.get(id.0 as usize)
    }

    /// The Benchmark root node.
    #[must_use]
    pub fn root(&self) -> &ItemNode {
        self.item(ItemId::ROOT).expect("benchmark always has a root")
    }

    /// Iterate every item in the arena, in document (id) order.
    pub fn items(&self) -> impl Iterator<Item = &ItemNode> {
        self.items.iter()
    }

    /// Iterate every Rule in the arena, in document order.
    pub fn rules(&self) -> impl Iterator<Item = (ItemId, &Rule)> {
        self.items.iter().filter_map(|node| match &node.kind {
            ItemKind::Rule(r) => Some((node.id, r)),
            _ => None,
        })
    }

    /// Find a Rule by its document id.
    #[must_use]
    pub fn rule_by_id(&self, rule_id: &str) -> Option<(ItemId, &Rule)> {
        self.rules().find(|(_, r)| r.id == rule_id)
    }

    /// Find a Value by its document id.
    #[must_use]
    pub fn value_by_id(&self, value_id: &str) -> Option<&ValueItem> {
        self.items.iter().find_map(|node| match &node.kind {
            ItemKind::Value(v) if v.id == value_id => Some(v),
            _ => None,
        })
    }

    /// Profiles declared on this Benchmark, in document order.
    #[must_use]
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Look up a Profile by id.
    #[must_use]
    pub fn profile_by_id(&self, profile_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == profile_id)
    }

    /// True when the source document declared schema version 1.2 or later.
    #[must_use]
    pub fn schema_v1_2_or_later(&self) -> bool {
        match &self.root().kind {
            ItemKind::Benchmark { schema_v1_2_or_later, .. } => *schema_v1_2_or_later,
            _ => unreachable!("root is always ItemKind::Benchmark"),
        }
    }
}

/// Incrementally builds a [`Benchmark`] arena.
pub struct BenchmarkBuilder {
    alloc: IdAllocator,
    items: Vec<ItemNode>,
    profiles: Vec<Profile>,
}

impl Default for BenchmarkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkBuilder {
    /// Start a new builder; inserts the Benchmark root at `ItemId::ROOT`.
    #[must_use]
    pub fn new() -> Self {
        let alloc = IdAllocator::new();
        let root_id = alloc.next();
        let items = vec![ItemNode {
            id: root_id,
            parent: None,
            kind: ItemKind::Benchmark {
                id: "benchmark".to_string(),
                children: Vec::new(),
                schema_v1_2_or_later: true,
            },
        }];
        Self { alloc, items, profiles: Vec::new() }
    }

    /// Override the Benchmark root's own document id.
    #[must_use]
    pub fn benchmark_id(mut self, id: impl Into<String>) -> Self {
        if let ItemKind::Benchmark { id: slot, .. } = &mut self.items[0].kind {
            *slot = id.into();
        }
        self
    }

    /// Declare whether the source schema is 1.2 or later (§6).
    #[must_use]
    pub fn schema_v1_2_or_later(mut self, v: bool) -> Self {
        if let ItemKind::Benchmark { schema_v1_2_or_later, .. } = &mut self.items[0].kind {
            *schema_v1_2_or_later = v;
        }
        self
    }

    fn register_child(&mut self, parent: ItemId, child: ItemId) {
        let node = self
            .items
            .get_mut(parent.0 as usize)
            .expect("parent id must already exist in the arena");
        match &mut node.kind {
            ItemKind::Benchmark { children, .. } | ItemKind::Group(Group { children, .. }) => {
                children.push(child);
            }
            ItemKind::Rule(_) | ItemKind::Value(_) => {
                panic!("item {parent} cannot own children");
            }
        }
    }

    /// Add a Group under `parent`, returning its freshly minted id.
    pub fn add_group(&mut self, parent: ItemId, group: Group) -> ItemId {
        let id = self.alloc.next();
        self.items.push(ItemNode { id, parent: Some(parent), kind: ItemKind::Group(group) });
        self.register_child(parent, id);
        id
    }

    /// Add a Rule under `parent`, returning its freshly minted id.
    pub fn add_rule(&mut self, parent: ItemId, rule: Rule) -> ItemId {
        let id = self.alloc.next();
        self.items.push(ItemNode { id, parent: Some(parent), kind: ItemKind::Rule(rule) });
        self.register_child(parent, id);
        id
    }

    /// Add a Value under `parent`, returning its freshly minted id.
    pub fn add_value(&mut self, parent: ItemId, value: ValueItem) -> ItemId {
        let id = self.alloc.next();
        self.items.push(ItemNode { id, parent: Some(parent), kind: ItemKind::Value(value) });
        self.register_child(parent, id);
        id
    }

    /// Register a Profile on the Benchmark being built.
    #[must_use]
    pub fn add_profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Finish construction.
    #[must_use]
    pub fn build(self) -> Benchmark {
        Benchmark { items: self.items, profiles: self.profiles }
    }
}

/// Result of evaluating a single Rule (§3).
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    /// The Rule's document id.
    pub idref: String,
    /// The outcome.
    pub result: ResultKind,
    /// Effective weight at evaluation time (post-tailoring).
    pub weight: f64,
    /// Rule version, carried through.
    pub version: Option<String>,
    /// Effective severity at evaluation time.
    pub severity: Option<String>,
    /// Effective role at evaluation time.
    pub role: Option<String>,
    /// Milliseconds since the UNIX epoch when this result was produced.
    pub timestamp_ms: u64,
    /// Fix text carried through from the Rule, if any.
    pub fixes: Vec<String>,
    /// Identifiers carried through from the Rule.
    pub idents: Vec<String>,
    /// The Check actually evaluated, with its content-ref/name pinned; this
    /// is always a fresh clone owned by this `RuleResult` (§9 open
    /// question, resolved).
    pub check: Option<Check>,
    /// Human-readable explanation, set on `Unknown`/`NotChecked` results
    /// and on rule-matched decisions.
    pub message: Option<String>,
}

/// The outcome of one Policy evaluation (§3).
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Id formatted per §6.
    pub id: String,
    /// Milliseconds since the UNIX epoch when evaluation started.
    pub start_ms: u64,
    /// Milliseconds since the UNIX epoch when evaluation ended.
    pub end_ms: u64,
    /// RuleResults in Benchmark pre-order (§5 ordering guarantee).
    pub rule_results: Vec<RuleResult>,
    /// Populated by a subsequent `score` call; `None` until then.
    pub score: Option<crate::score::Score>,
}
