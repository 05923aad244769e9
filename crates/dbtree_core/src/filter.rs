//! Search over a partially loaded forest.
//!
//! Only loaded children take part in the search. An unloaded branch has no
//! known content, so it can only be retained through its own name.

use crate::{NodeId, TreeNode};

/// Returns the normalized needle, or `None` when the query is blank.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Case-insensitive substring match of a node name against a normalized needle.
pub fn name_matches(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(needle)
}

/// Prunes `forest` to the nodes matching `query` and their ancestors.
///
/// A node is kept if its name contains the query, or if one of its loaded
/// descendants is kept. Kept nodes keep their relative order and only their
/// kept children. A blank query returns the forest unchanged.
pub fn filter_forest(forest: &[TreeNode], query: &str) -> Vec<TreeNode> {
    let Some(needle) = normalize_query(query) else {
        return forest.to_vec();
    };

    forest
        .iter()
        .filter_map(|node| filter_node(node, &needle))
        .collect()
}

fn filter_node(node: &TreeNode, needle: &str) -> Option<TreeNode> {
    let kept_children: Vec<TreeNode> = if node.is_loaded() {
        node.children()
            .iter()
            .filter_map(|child| filter_node(child, needle))
            .collect()
    } else {
        Vec::new()
    };

    if !name_matches(&node.name, needle) && kept_children.is_empty() {
        return None;
    }

    Some(TreeNode {
        id: node.id.clone(),
        name: node.name.clone(),
        kind: node.kind,
        has_children: node.has_children,
        load_state: node.load_state,
        metadata: node.metadata.clone(),
        children: node.children.as_ref().map(|_| kept_children),
    })
}

/// Ids of every node in `forest`, following loaded children only.
pub fn collect_ids(forest: &[TreeNode]) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let mut stack: Vec<&TreeNode> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        ids.push(node.id.clone());
        if node.is_loaded() {
            stack.extend(node.children().iter().rev());
        }
    }

    ids
}
