//! Selection Resolver (§4.4): computes the effective selected/deselected
//! state of every Rule and Group under a Profile.

use std::collections::HashMap;

use xccdf_core::ids::ItemId;

use crate::model::{Benchmark, ItemKind, Profile};

/// Effective selection state for every item in a Benchmark, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SelectionMap {
    selected: HashMap<ItemId, bool>,
}

impl SelectionMap {
    /// Whether `id` is selected; `false` for an id never visited by
    /// [`resolve`] (there is no such id in a well-formed Benchmark).
    #[must_use]
    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selected.get(&id).copied().unwrap_or(false)
    }
}

/// Walk the Benchmark depth-first from the root, computing each item's
/// selection state.
///
/// A Group or Rule's own `default-selected` flag is the baseline; a
/// Profile `select` directive for that item's id overrides it. The
/// resolved state is then inherited down the tree: a Rule or Group whose
/// parent resolved to deselected is deselected regardless of its own
/// flag or a Profile select naming it directly (§4.4 — "inherited
/// parent_selected wins over a child's own directive once the parent is
/// already deselected").
#[must_use]
pub fn resolve(benchmark: &Benchmark, profile: Option<&Profile>) -> SelectionMap {
    let mut map = SelectionMap::default();
    walk(benchmark, profile, ItemId::ROOT, true, &mut map);
    map
}

fn walk(
    benchmark: &Benchmark,
    profile: Option<&Profile>,
    id: ItemId,
    parent_selected: bool,
    map: &mut SelectionMap,
) {
    let node = benchmark.item(id).expect("selection walk only visits live ids");

    let (own_default, doc_id, children): (bool, Option<&str>, &[ItemId]) = match &node.kind {
        ItemKind::Benchmark { children, .. } => (true, None, children),
        ItemKind::Group(g) => (g.default_selected, Some(g.id.as_str()), g.children.as_slice()),
        ItemKind::Rule(r) => (r.default_selected, Some(r.id.as_str()), &[]),
        ItemKind::Value(_) => return,
    };

    let own_resolved = doc_id
        .and_then(|doc_id| profile.and_then(|p| p.selects.get(doc_id)))
        .copied()
        .unwrap_or(own_default);

    let resolved = parent_selected && own_resolved;
    map.selected.insert(id, resolved);

    for &child in children {
        walk(benchmark, profile, child, resolved, map);
    }
}
