//! Arena of elements indexed by id, with an incrementally maintained
//! parent → children index.
//!
//! Iteration order is insertion order. Every child list is kept sorted by
//! insertion sequence, so siblings come out in the same relative order as a
//! scan of the whole collection would give.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{Element, ElementsData};

/// A reference that points at no existing element
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DanglingReference {
    pub element: String,
    pub field: &'static str,
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct ElementIndex {
    elements: HashMap<String, Element>,
    seq: HashMap<String, u64>,
    order: BTreeMap<u64, String>,
    children: HashMap<Option<String>, Vec<String>>,
    next_seq: u64,
}

impl ElementIndex {
    /// Build an index from persisted data without validating references.
    ///
    /// Elements with an empty id or a duplicate id are dropped (first one
    /// wins). Returns the index and the number of dropped elements.
    pub fn from_data_lenient(data: ElementsData) -> (Self, usize) {
        let mut index = Self::default();
        let mut dropped = 0;
        for mut element in data.elements {
            element.normalize();
            if element.id.is_empty() || index.contains(&element.id) {
                dropped += 1;
                continue;
            }
            index.insert(element);
        }
        (index, dropped)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    /// Elements in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.order.values().filter_map(|id| self.elements.get(id))
    }

    /// Ids of the direct children of `parent` (`None` = roots), in collection order
    pub fn child_ids(&self, parent: Option<&str>) -> &[String] {
        self.children
            .get(&parent.map(str::to_string))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert(&mut self, element: Element) {
        let id = element.id.clone();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.seq.insert(id.clone(), seq);
        self.order.insert(seq, id.clone());
        // New elements always carry the highest sequence number
        self.children
            .entry(element.parent.clone())
            .or_default()
            .push(id.clone());
        self.elements.insert(id, element);
    }

    /// Replace an element in place, moving it in the children index if its parent changed
    pub fn replace(&mut self, element: Element) {
        let old_parent = match self.elements.get(&element.id) {
            Some(existing) => existing.parent.clone(),
            None => return self.insert(element),
        };
        if old_parent != element.parent {
            self.relink(&element.id, &old_parent, element.parent.clone());
        }
        self.elements.insert(element.id.clone(), element);
    }

    /// Change the parent of `id`, keeping the children index in sync
    pub fn set_parent(&mut self, id: &str, parent: Option<String>) {
        let old_parent = match self.elements.get(id) {
            Some(el) => el.parent.clone(),
            None => return,
        };
        if old_parent == parent {
            return;
        }
        self.relink(id, &old_parent, parent.clone());
        if let Some(el) = self.elements.get_mut(id) {
            el.parent = parent;
        }
    }

    fn relink(&mut self, id: &str, old_parent: &Option<String>, new_parent: Option<String>) {
        if let Some(siblings) = self.children.get_mut(old_parent) {
            siblings.retain(|c| c != id);
            if siblings.is_empty() {
                self.children.remove(old_parent);
            }
        }

        let seq = self.seq.get(id).copied().unwrap_or(u64::MAX);
        let seqs = &self.seq;
        let list = self.children.entry(new_parent).or_default();
        let pos = list.partition_point(|c| seqs.get(c).copied().unwrap_or(u64::MAX) < seq);
        list.insert(pos, id.to_string());
    }

    /// Remove one element from every index. Children keep their (now dangling) parent.
    pub fn remove(&mut self, id: &str) -> Option<Element> {
        let element = self.elements.remove(id)?;
        if let Some(seq) = self.seq.remove(id) {
            self.order.remove(&seq);
        }
        if let Some(siblings) = self.children.get_mut(&element.parent) {
            siblings.retain(|c| c != id);
            if siblings.is_empty() {
                self.children.remove(&element.parent);
            }
        }
        Some(element)
    }

    /// Ids below `id` in the hierarchy, pre-order, excluding `id` itself
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut stack: Vec<&str> = self
            .child_ids(Some(id))
            .iter()
            .rev()
            .map(String::as_str)
            .collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            out.push(current.to_string());
            stack.extend(self.child_ids(Some(current)).iter().rev().map(String::as_str));
        }
        out
    }

    /// Whether `target` lies on the parent chain starting at `start` (inclusive)
    pub fn chain_contains(&self, start: &str, target: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                break;
            }
            current = self.elements.get(id).and_then(|e| e.parent.as_deref());
        }
        false
    }

    /// Whether the parent chain above `id` loops back on itself
    pub fn has_parent_cycle(&self, id: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if !visited.insert(node) {
                return true;
            }
            current = self.elements.get(node).and_then(|e| e.parent.as_deref());
        }
        false
    }

    /// Every reference, hierarchy or flow, whose target does not exist
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut out = Vec::new();
        for el in self.iter() {
            let mut check = |field: &'static str, target: &str| {
                if !self.elements.contains_key(target) {
                    out.push(DanglingReference {
                        element: el.id.clone(),
                        field,
                        target: target.to_string(),
                    });
                }
            };
            if let Some(parent) = el.parent.as_deref() {
                check("parent", parent);
            }
            for target in &el.next {
                check("next", target);
            }
            if let Some(ok) = el.next_ok.as_deref() {
                check("next_ok", ok);
            }
            if let Some(ko) = el.next_ko.as_deref() {
                check("next_ko", ko);
            }
        }
        out
    }

    pub fn to_data(&self) -> ElementsData {
        ElementsData::new(self.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementType;

    fn el(id: &str, parent: Option<&str>) -> Element {
        let e = Element::new(ElementType::Category, id).with_id(id);
        match parent {
            Some(p) => e.with_parent(p),
            None => e,
        }
    }

    #[test]
    fn test_children_follow_insertion_order_after_relink() {
        let mut index = ElementIndex::default();
        index.insert(el("a", None));
        index.insert(el("b", None));
        index.insert(el("x", Some("a")));
        index.insert(el("y", Some("b")));
        index.insert(el("z", Some("a")));

        // y was inserted between x and z, so it lands between them
        index.set_parent("y", Some("a".to_string()));
        assert_eq!(index.child_ids(Some("a")), ["x", "y", "z"]);
        assert!(index.child_ids(Some("b")).is_empty());
    }

    #[test]
    fn test_lenient_load_drops_duplicates() {
        let data = ElementsData::new(vec![el("a", None), el("a", None), el("", None)]);
        let (index, dropped) = ElementIndex::from_data_lenient(data);
        assert_eq!(index.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_descendants_preorder() {
        let mut index = ElementIndex::default();
        index.insert(el("a", None));
        index.insert(el("b", Some("a")));
        index.insert(el("c", Some("b")));
        index.insert(el("d", Some("a")));
        assert_eq!(index.descendants("a"), vec!["b", "c", "d"]);
        assert!(index.descendants("d").is_empty());
    }

    #[test]
    fn test_chain_walk_terminates_on_cyclic_data() {
        let data = ElementsData::new(vec![el("a", Some("b")), el("b", Some("a"))]);
        let (index, _) = ElementIndex::from_data_lenient(data);
        assert!(!index.chain_contains("a", "zzz"));
        assert!(index.has_parent_cycle("a"));
    }

    #[test]
    fn test_dangling_references_reported() {
        let mut index = ElementIndex::default();
        let mut v = el("v", Some("ghost"));
        v.next_ok = Some("missing".to_string());
        index.insert(v);

        let dangling = index.dangling_references();
        assert_eq!(dangling.len(), 2);
        assert_eq!(dangling[0].field, "parent");
        assert_eq!(dangling[1].target, "missing");
    }
}
