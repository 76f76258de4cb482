//! Keyed single-level child reconciliation.

use slotmap::SlotMap;

use crate::component::Children;
use crate::diagnostics::{self, Diagnostic};
use crate::element::{ElementKind, Key};
use crate::fiber::{EffectTag, Fiber, FiberId, SlotKey};
use crate::hash::map::{HashMap, HashSet};

pub(crate) struct ReconcileCx<'a> {
    pub(crate) fibers: &'a mut SlotMap<FiberId, Fiber>,
    pub(crate) deletions: &'a mut Vec<FiberId>,
    pub(crate) diagnostics: &'a mut Vec<Diagnostic>,
    pub(crate) warn_missing_keys: bool,
}

/// Matches `children` against the previous generation's children of `wip`
/// and links the resulting fibers under it.
///
/// Matched fibers keep their host node and hooks and are tagged `Update`, or
/// `Placement` when they moved ahead of an already placed sibling. Unclaimed
/// old fibers are tagged `Delete` and queued in `deletions`, in old order.
pub(crate) fn reconcile_children(cx: &mut ReconcileCx<'_>, wip: FiberId, children: &Children) {
    let elements = children.elements();
    let old_first = cx.fibers[wip]
        .alternate
        .and_then(|alternate| cx.fibers[alternate].child);

    let mut existing: HashMap<SlotKey, FiberId> = HashMap::default();
    let mut old_order = Vec::new();
    let mut cursor = old_first;
    let mut index = 0;
    while let Some(old) = cursor {
        let fiber = &mut cx.fibers[old];
        fiber.index = index;
        existing.insert(fiber.slot.clone(), old);
        old_order.push(old);
        cursor = fiber.sibling;
        index += 1;
    }

    if cx.warn_missing_keys && children.dynamic {
        warn_missing_keys(cx, children);
    }

    let mut seen_keys: HashSet<&Key> = HashSet::default();
    let mut reported: HashSet<&Key> = HashSet::default();
    let mut last_placed = 0;
    let mut previous: Option<FiberId> = None;
    cx.fibers[wip].child = None;

    for (position, element) in elements.iter().enumerate() {
        let slot = match &element.key {
            Some(key) if seen_keys.insert(key) => SlotKey::Explicit(key.clone()),
            Some(key) => {
                if reported.insert(key) {
                    diagnostics::report(
                        cx.diagnostics,
                        Diagnostic::DuplicateKey { key: key.clone() },
                    );
                }
                SlotKey::Position(position)
            }
            None => SlotKey::Position(position),
        };

        let matched = existing
            .get(&slot)
            .copied()
            .filter(|&old| cx.fibers[old].matches(element));

        let mut fiber = match matched {
            Some(old) => {
                existing.remove(&slot);
                let old_fiber = &cx.fibers[old];
                let old_index = old_fiber.index;
                let mut fiber = Fiber::adopt(old, old_fiber, element, slot);
                if old_index < last_placed {
                    fiber.effect = EffectTag::Placement;
                } else {
                    last_placed = old_index;
                }
                fiber
            }
            None => Fiber::from_element(element, slot),
        };
        fiber.parent = Some(wip);
        fiber.index = position;
        let id = cx.fibers.insert(fiber);

        match previous {
            Some(prev) => cx.fibers[prev].sibling = Some(id),
            None => cx.fibers[wip].child = Some(id),
        }
        previous = Some(id);
    }

    for old in old_order {
        let fiber = &mut cx.fibers[old];
        if existing.get(&fiber.slot) == Some(&old) {
            fiber.effect = EffectTag::Delete;
            cx.deletions.push(old);
        }
    }
}

fn warn_missing_keys(cx: &mut ReconcileCx<'_>, children: &Children) {
    let mut components = children.elements().iter().filter_map(|element| match &element.kind {
        ElementKind::Component(component) => Some((component, element.key.is_some())),
        _ => None,
    });
    let Some(first) = components.next() else {
        return;
    };
    let mut unkeyed = (!first.1).then_some(first.0);
    let mut count = 1;
    for (component, keyed) in components {
        count += 1;
        if !keyed && unkeyed.is_none() {
            unkeyed = Some(component);
        }
    }
    if let (true, Some(component)) = (count >= 2, unkeyed) {
        diagnostics::report(
            cx.diagnostics,
            Diagnostic::MissingKey {
                component: component.name().to_string(),
            },
        );
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
