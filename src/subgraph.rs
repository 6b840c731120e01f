//! Reachable flow subgraph for the diagram view
//!
//! Starting from a chosen element, follows `next`, `next_ok` and `next_ko`
//! edges. The flow relation may loop, so the walk keeps a visited set.

use serde::Serialize;
use std::collections::HashSet;

use crate::model::Element;
use crate::store::ElementStore;

/// Which flow field an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Next,
    Ok,
    Ko,
}

impl EdgeKind {
    /// Edge label shown on the diagram; plain edges have none
    pub fn label(&self) -> Option<&'static str> {
        match self {
            EdgeKind::Next => None,
            EdgeKind::Ok => Some("OK"),
            EdgeKind::Ko => Some("KO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl FlowEdge {
    fn new(source: &str, target: &str, kind: EdgeKind) -> Self {
        let id = match kind {
            EdgeKind::Next => format!("{}-{}", source, target),
            EdgeKind::Ok => format!("{}-ok-{}", source, target),
            EdgeKind::Ko => format!("{}-ko-{}", source, target),
        };
        Self {
            id,
            source: source.to_string(),
            target: target.to_string(),
            kind,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        self.kind.label()
    }
}

/// Elements reachable from a root plus the edges among them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    pub root: Option<String>,
    /// Discovery order, root first
    pub nodes: Vec<Element>,
    pub edges: Vec<FlowEdge>,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&Element> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Flow edges out of `element`, in `next`, OK, KO order
fn outgoing(element: &Element) -> impl Iterator<Item = (&str, EdgeKind)> {
    element
        .next
        .iter()
        .map(|t| (t.as_str(), EdgeKind::Next))
        .chain(element.next_ok.as_deref().map(|t| (t, EdgeKind::Ok)))
        .chain(element.next_ko.as_deref().map(|t| (t, EdgeKind::Ko)))
}

/// Depth-first extraction of everything reachable from `root_id`.
///
/// Targets that do not exist are skipped. An unknown root gives an empty
/// subgraph. Edges are kept only when both ends were reached.
pub fn extract(store: &ElementStore, root_id: &str) -> Subgraph {
    let root = match store.get(root_id) {
        Some(root) => root,
        None => return Subgraph::default(),
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut reached: Vec<&Element> = Vec::new();
    let mut stack: Vec<&Element> = vec![root];

    while let Some(element) = stack.pop() {
        if !visited.insert(element.id.as_str()) {
            continue;
        }
        reached.push(element);

        // Reverse so the first successor is explored first
        let successors: Vec<&Element> = outgoing(element)
            .filter_map(|(target, _)| store.get(target))
            .collect();
        stack.extend(successors.into_iter().rev());
    }

    let mut edges = Vec::new();
    for element in &reached {
        for (target, kind) in outgoing(element) {
            if visited.contains(target) {
                edges.push(FlowEdge::new(&element.id, target, kind));
            }
        }
    }

    Subgraph {
        root: Some(root.id.clone()),
        nodes: reached.into_iter().cloned().collect(),
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementType, ElementsData};

    fn node(kind: ElementType, id: &str) -> Element {
        Element::new(kind, id).with_id(id)
    }

    fn store(elements: Vec<Element>) -> ElementStore {
        ElementStore::in_memory(ElementsData::new(elements))
    }

    fn ids(sub: &Subgraph) -> Vec<&str> {
        sub.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_verification_branches() {
        let store = store(vec![
            node(ElementType::Verification, "V").with_branches(Some("X"), Some("Y")),
            node(ElementType::Action, "X"),
            node(ElementType::Action, "Y"),
        ]);
        let sub = extract(&store, "V");

        assert_eq!(ids(&sub), vec!["V", "X", "Y"]);
        assert_eq!(sub.edges.len(), 2);
        assert_eq!(sub.edges[0].label(), Some("OK"));
        assert_eq!(sub.edges[0].target, "X");
        assert_eq!(sub.edges[1].label(), Some("KO"));
        assert_eq!(sub.edges[1].id, "V-ko-Y");
    }

    #[test]
    fn test_self_loop_terminates() {
        let store = store(vec![node(ElementType::State, "x").with_next(["x"])]);
        let sub = extract(&store, "x");
        assert_eq!(ids(&sub), vec!["x"]);
        assert_eq!(sub.edges.len(), 1);
        assert_eq!(sub.edges[0].kind, EdgeKind::Next);
    }

    #[test]
    fn test_cycle_visits_each_once() {
        let store = store(vec![
            node(ElementType::State, "a").with_next(["b"]),
            node(ElementType::Action, "b").with_next(["c"]),
            node(ElementType::Action, "c").with_next(["a", "b"]),
        ]);
        let sub = extract(&store, "b");
        assert_eq!(ids(&sub), vec!["b", "c", "a"]);
        assert_eq!(sub.edges.len(), 4);
    }

    #[test]
    fn test_unreached_and_unknown_targets_dropped() {
        let mut stray = node(ElementType::State, "s").with_next(["t"]);
        stray.next.push("ghost".to_string());
        let store = store(vec![
            stray,
            node(ElementType::Action, "t"),
            node(ElementType::Action, "u").with_next(["s"]),
        ]);
        let sub = extract(&store, "s");
        assert_eq!(ids(&sub), vec!["s", "t"]);
        assert_eq!(sub.edges.len(), 1);
        assert!(!sub.contains("u"));
    }

    #[test]
    fn test_unknown_root_is_empty() {
        let store = store(vec![node(ElementType::State, "s")]);
        let sub = extract(&store, "nope");
        assert!(sub.is_empty());
        assert!(sub.edges.is_empty());
        assert_eq!(sub.root, None);
    }

    #[test]
    fn test_hierarchy_is_not_followed() {
        let store = store(vec![
            node(ElementType::Category, "cat"),
            node(ElementType::Problem, "p").with_parent("cat"),
        ]);
        assert_eq!(ids(&extract(&store, "cat")), vec!["cat"]);
    }
}
