//! Score Engine (§4.9): reduces a tree of `RuleResult`s into a single
//! score under one of four scoring systems, via an iterative post-order
//! walk over the Benchmark item arena.

use std::collections::HashMap;

use serde::Serialize;
use xccdf_core::ids::ItemId;

use crate::error::PolicyError;
use crate::model::{Benchmark, ItemKind, RuleResult};

/// One of the four scoring systems a Benchmark may request (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringSystem {
    /// Weighted, renormalized per Group before folding into its parent.
    Default,
    /// Weighted, as a single unnormalized sum over the whole subtree.
    Flat,
    /// Unweighted count of passing Rules over applicable Rules.
    FlatUnweighted,
    /// Raw weighted sum with no normalization.
    Absolute,
}

impl ScoringSystem {
    /// Parse a scoring-system URI into a [`ScoringSystem`], or
    /// [`PolicyError::UnknownScoringSystem`] if it names none of the four
    /// defined systems.
    pub fn from_uri(uri: &str) -> Result<Self, PolicyError> {
        match uri {
            "urn:xccdf:scoring:default" => Ok(ScoringSystem::Default),
            "urn:xccdf:scoring:flat" => Ok(ScoringSystem::Flat),
            "urn:xccdf:scoring:flat-unweighted" => Ok(ScoringSystem::FlatUnweighted),
            "urn:xccdf:scoring:absolute" => Ok(ScoringSystem::Absolute),
            other => Err(PolicyError::UnknownScoringSystem(other.to_string())),
        }
    }
}

/// A computed score over one subtree (§3).
#[derive(Debug, Clone, Serialize)]
pub struct Score {
    /// The system used to compute this score.
    #[serde(skip)]
    pub system: ScoringSystem,
    /// The achieved score.
    pub value: f64,
    /// The maximum possible score under this system; `Absolute` reports
    /// the same value as `value`'s own weighted sum with no ceiling.
    pub max: f64,
}

/// Node-local accumulator built bottom-up during the post-order walk.
#[derive(Debug, Clone, Copy, Default)]
struct Accum {
    /// Sum of `weight * pass_fraction` over contributing leaves/subtrees.
    achieved: f64,
    /// Sum of `weight` over contributing leaves/subtrees.
    possible: f64,
}

/// Compute a [`Score`] for the subtree rooted at `root` (typically
/// [`ItemId::ROOT`]), given the `RuleResult`s produced by a run, under
/// `system`.
///
/// The walk is iterative rather than recursive (§4.9): Benchmark trees can
/// be deep, and a recursive post-order walk would risk stack exhaustion
/// on pathological input. An explicit work-stack accumulates each node's
/// children before folding the node itself, the standard
/// "push twice" technique for an iterative post-order traversal.
pub fn score(
    benchmark: &Benchmark,
    results: &[RuleResult],
    root: ItemId,
    system: ScoringSystem,
) -> Score {
    let by_idref: HashMap<&str, &RuleResult> =
        results.iter().map(|r| (r.idref.as_str(), r)).collect();

    let accum = match system {
        ScoringSystem::Default => walk_flat(benchmark, root, &by_idref),
        ScoringSystem::Absolute => walk_weighted(benchmark, root, &by_idref),
        ScoringSystem::Flat => walk_weighted(benchmark, root, &by_idref),
        ScoringSystem::FlatUnweighted => walk_flat_unweighted(benchmark, root, &by_idref),
    };

    let (value, max) = match system {
        ScoringSystem::Default => {
            if accum.possible > 0.0 {
                (100.0 * accum.achieved / accum.possible, 100.0)
            } else {
                (0.0, 0.0)
            }
        }
        ScoringSystem::Flat | ScoringSystem::FlatUnweighted => {
            if accum.possible > 0.0 {
                (100.0 * accum.achieved / accum.possible, 100.0)
            } else {
                (0.0, 0.0)
            }
        }
        ScoringSystem::Absolute => (accum.achieved, accum.possible),
    };

    Score { system, value, max }
}

/// Shared iterative skeleton: visit every item once in a manufactured
/// post-order, handing each node's already-folded children to `fold_node`
/// to produce that node's own [`Accum`].
fn iterative_post_order(
    benchmark: &Benchmark,
    root: ItemId,
    mut fold_node: impl FnMut(ItemId, &[Accum]) -> Accum,
) -> Accum {
    enum Frame {
        Enter(ItemId),
        Exit(ItemId),
    }

    let mut stack = vec![Frame::Enter(root)];
    let mut child_results: HashMap<ItemId, Vec<Accum>> = HashMap::new();
    let mut node_accum: HashMap<ItemId, Accum> = HashMap::new();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id) => {
                stack.push(Frame::Exit(id));
                let node = benchmark.item(id).expect("score walk only visits live ids");
                let children: &[ItemId] = match &node.kind {
                    ItemKind::Benchmark { children, .. } => children,
                    ItemKind::Group(g) => &g.children,
                    ItemKind::Rule(_) | ItemKind::Value(_) => &[],
                };
                for &child in children.iter().rev() {
                    stack.push(Frame::Enter(child));
                }
            }
            Frame::Exit(id) => {
                let children_accum = child_results.remove(&id).unwrap_or_default();
                let accum = fold_node(id, &children_accum);
                if let Some(node) = benchmark.item(id) {
                    if let Some(parent) = node.parent {
                        child_results.entry(parent).or_default().push(accum);
                    }
                }
                node_accum.insert(id, accum);
            }
        }
    }

    node_accum.remove(&root).unwrap_or_default()
}

fn leaf_accum(by_idref: &HashMap<&str, &RuleResult>, rule_id: &str, weight: f64) -> Option<Accum> {
    let result = by_idref.get(rule_id)?;
    if result.result.is_skip() {
        return None;
    }
    let fraction = if result.result.is_passing() { 1.0 } else { 0.0 };
    Some(Accum { achieved: weight * fraction, possible: weight })
}

/// `flat`/`absolute`: a pure, unnormalized sum over the whole subtree — a
/// Group's own weight never renormalizes its children (§4.9).
fn walk_weighted(benchmark: &Benchmark, root: ItemId, by_idref: &HashMap<&str, &RuleResult>) -> Accum {
    iterative_post_order(benchmark, root, |id, children| {
        let node = benchmark.item(id).expect("live id");
        match &node.kind {
            ItemKind::Rule(r) => leaf_accum(by_idref, &r.id, r.weight).unwrap_or_default(),
            ItemKind::Group(_) | ItemKind::Benchmark { .. } => children.iter().fold(Accum::default(), |acc, c| {
                Accum { achieved: acc.achieved + c.achieved, possible: acc.possible + c.possible }
            }),
            ItemKind::Value(_) => Accum::default(),
        }
    })
}

fn walk_flat(benchmark: &Benchmark, root: ItemId, by_idref: &HashMap<&str, &RuleResult>) -> Accum {
    // `default` scoring renormalizes per-Group before summing into the
    // parent, so a Group with few applicable Rules doesn't get diluted
    // by a sibling Group with many (§4.9).
    iterative_post_order(benchmark, root, |id, children| {
        let node = benchmark.item(id).expect("live id");
        match &node.kind {
            ItemKind::Rule(r) => leaf_accum(by_idref, &r.id, r.weight).unwrap_or_default(),
            ItemKind::Group(g) => {
                let raw = children.iter().fold(Accum::default(), |acc, c| {
                    Accum { achieved: acc.achieved + c.achieved, possible: acc.possible + c.possible }
                });
                if raw.possible > 0.0 {
                    Accum { achieved: g.weight * raw.achieved / raw.possible, possible: g.weight }
                } else {
                    Accum::default()
                }
            }
            ItemKind::Benchmark { .. } => children.iter().fold(Accum::default(), |acc, c| {
                Accum { achieved: acc.achieved + c.achieved, possible: acc.possible + c.possible }
            }),
            ItemKind::Value(_) => Accum::default(),
        }
    })
}

fn walk_flat_unweighted(
    benchmark: &Benchmark,
    root: ItemId,
    by_idref: &HashMap<&str, &RuleResult>,
) -> Accum {
    iterative_post_order(benchmark, root, |id, children| {
        let node = benchmark.item(id).expect("live id");
        match &node.kind {
            ItemKind::Rule(r) => leaf_accum(by_idref, &r.id, 1.0).unwrap_or_default(),
            ItemKind::Group(_) | ItemKind::Benchmark { .. } => children.iter().fold(Accum::default(), |acc, c| {
                Accum { achieved: acc.achieved + c.achieved, possible: acc.possible + c.possible }
            }),
            ItemKind::Value(_) => Accum::default(),
        }
    })
}
