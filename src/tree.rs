//! Forest view of the hierarchy
//!
//! Pure derivation from the store's children index. Rebuilt on every call;
//! nothing is cached, so the result can never be stale.

use std::collections::HashSet;

use crate::model::{Element, TreeNode};
use crate::store::ElementStore;

/// Build the rooted forest from the `parent` relation.
///
/// Roots are elements without a parent. Elements whose ancestor chain never
/// reaches a root (dangling parent, or a parent loop in loaded data) are not
/// reachable and are left out.
pub fn build_forest(store: &ElementStore) -> Vec<TreeNode> {
    store
        .children(None)
        .into_iter()
        .map(|root| build_subtree(store, root))
        .collect()
}

/// Tree rooted at `id`, or `None` if it does not exist
pub fn build_tree_at(store: &ElementStore, id: &str) -> Option<TreeNode> {
    store.get(id).map(|root| build_subtree(store, root))
}

// Explicit stack so deep hierarchies cannot overflow the call stack.
// Each frame holds a node under construction and the children still to visit.
fn build_subtree(store: &ElementStore, root: &Element) -> TreeNode {
    struct Frame<'a> {
        node: TreeNode,
        pending: std::vec::IntoIter<&'a Element>,
    }

    let mut stack = vec![Frame {
        node: TreeNode::leaf(root.clone()),
        pending: store.children(Some(&root.id)).into_iter(),
    }];

    // Guards against parent loops when building below an element that sits on one
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(root.id.as_str());

    let mut built = None;
    while let Some(frame) = stack.last_mut() {
        if let Some(child) = frame.pending.next() {
            if !visited.insert(child.id.as_str()) {
                continue;
            }
            stack.push(Frame {
                node: TreeNode::leaf(child.clone()),
                pending: store.children(Some(&child.id)).into_iter(),
            });
            continue;
        }
        if let Some(done) = stack.pop() {
            match stack.last_mut() {
                Some(parent) => parent.node.children.push(done.node),
                None => built = Some(done.node),
            }
        }
    }
    built.unwrap_or_else(|| TreeNode::leaf(root.clone()))
}

/// Pre-order walk of a forest as `(depth, element)` pairs
pub fn flatten(forest: &[TreeNode]) -> Vec<(usize, &Element)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &TreeNode)> = forest.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        out.push((depth, &node.element));
        stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
    }
    out
}

/// Render a forest as an indented outline, one element per line
pub fn render_outline(forest: &[TreeNode]) -> String {
    let mut out = String::new();
    for (depth, el) in flatten(forest) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("[{}] {} ({})\n", el.kind.short_tag(), el.title, el.id));
    }
    out
}
