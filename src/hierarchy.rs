use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::domain::WorkItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayItem {
    pub item: WorkItem,
    pub depth: usize,
}

type ChildrenByParent = HashMap<String, Vec<String>>;

/// Orders items parent-first with children indented below them.
///
/// Items whose parent is unknown are roots. Parent cycles are broken at the
/// first revisit, so every item appears exactly once.
pub fn layout_items(items: Vec<WorkItem>) -> Vec<DisplayItem> {
    let by_id: HashMap<String, WorkItem> = items
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();
    if by_id.is_empty() {
        return Vec::new();
    }

    let mut children_by_parent: ChildrenByParent = HashMap::new();
    let mut child_ids: HashSet<&str> = HashSet::new();
    for item in by_id.values() {
        let Some(parent) = item.parent_id.as_deref() else {
            continue;
        };
        if parent == item.id || !by_id.contains_key(parent) {
            continue;
        }
        children_by_parent
            .entry(parent.to_string())
            .or_default()
            .push(item.id.clone());
        child_ids.insert(item.id.as_str());
    }
    for children in children_by_parent.values_mut() {
        children.sort_by(|left, right| compare_item_id(left, right, &by_id));
    }

    let mut roots: Vec<String> = by_id
        .keys()
        .filter(|id| !child_ids.contains(id.as_str()))
        .cloned()
        .collect();
    roots.sort_by(|left, right| compare_item_id(left, right, &by_id));

    let mut visited: HashSet<String> = HashSet::new();
    let mut ordered = Vec::new();
    for root in roots {
        append_pre_order(&root, 0, &by_id, &children_by_parent, &mut visited, &mut ordered);
    }

    // Members of a pure parent cycle have no root above them.
    let mut remaining: Vec<String> = by_id
        .keys()
        .filter(|id| !visited.contains(*id))
        .cloned()
        .collect();
    remaining.sort_by(|left, right| compare_item_id(left, right, &by_id));
    for id in remaining {
        append_pre_order(&id, 0, &by_id, &children_by_parent, &mut visited, &mut ordered);
    }

    ordered
}

/// Same sibling ordering as [`layout_items`], without nesting.
pub fn flat_items(mut items: Vec<WorkItem>) -> Vec<DisplayItem> {
    items.sort_by(compare_items);
    items
        .into_iter()
        .map(|item| DisplayItem { item, depth: 0 })
        .collect()
}

fn append_pre_order(
    id: &str,
    depth: usize,
    by_id: &HashMap<String, WorkItem>,
    children_by_parent: &ChildrenByParent,
    visited: &mut HashSet<String>,
    ordered: &mut Vec<DisplayItem>,
) {
    let Some(item) = by_id.get(id) else {
        return;
    };
    if !visited.insert(id.to_string()) {
        return;
    }
    ordered.push(DisplayItem {
        item: item.clone(),
        depth,
    });

    if let Some(children) = children_by_parent.get(id) {
        for child in children {
            append_pre_order(child, depth + 1, by_id, children_by_parent, visited, ordered);
        }
    }
}

fn compare_item_id(left: &str, right: &str, by_id: &HashMap<String, WorkItem>) -> Ordering {
    match (by_id.get(left), by_id.get(right)) {
        (Some(l), Some(r)) => compare_items(l, r),
        _ => left.cmp(right),
    }
}

/// Live items before tombstones, then by priority, then oldest first.
fn compare_items(left: &WorkItem, right: &WorkItem) -> Ordering {
    left.is_tombstone()
        .cmp(&right.is_tombstone())
        .then_with(|| left.priority.rank().cmp(&right.priority.rank()))
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}
