//! Core data types for troubleshooting trees
//!
//! An [`Element`] lives in two independent relations:
//! - the **hierarchy**, one optional `parent` per element, used for the tree view
//! - the **flow**, `next` / `next_ok` / `next_ko` edges describing diagnostic
//!   transitions, which may loop back on itself

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Element Types
// =============================================================================

/// The fixed set of element kinds. Immutable once an element is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    #[serde(alias = "categorie")]
    Category,
    #[serde(alias = "probleme")]
    Problem,
    #[serde(alias = "etat")]
    State,
    #[serde(alias = "verif")]
    Verification,
    Action,
}

/// All element types, in display order
pub const ELEMENT_TYPES: &[ElementType] = &[
    ElementType::Category,
    ElementType::Problem,
    ElementType::State,
    ElementType::Verification,
    ElementType::Action,
];

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Category => "category",
            ElementType::Problem => "problem",
            ElementType::State => "state",
            ElementType::Verification => "verification",
            ElementType::Action => "action",
        }
    }

    /// Abbreviated tag shown beside titles in lists and trees
    pub fn short_tag(&self) -> &'static str {
        match self {
            ElementType::Category => "cat",
            ElementType::Problem => "prob",
            ElementType::State => "state",
            ElementType::Verification => "verif",
            ElementType::Action => "action",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ElementType::Category => "Category",
            ElementType::Problem => "Problem",
            ElementType::State => "State",
            ElementType::Verification => "Verification",
            ElementType::Action => "Action",
        }
    }

    /// Whether `next` is meaningful for this type
    pub fn uses_next(&self) -> bool {
        matches!(self, ElementType::State | ElementType::Action)
    }

    /// Whether `next_ok` / `next_ko` are meaningful for this type
    pub fn uses_branches(&self) -> bool {
        matches!(self, ElementType::Verification)
    }

    /// Whether the `usedoc` flag is meaningful for this type
    pub fn uses_doc(&self) -> bool {
        matches!(self, ElementType::Verification | ElementType::Action)
    }

    /// Next type in display order, wrapping around
    pub fn cycle(&self) -> ElementType {
        let idx = ELEMENT_TYPES.iter().position(|t| t == self).unwrap_or(0);
        ELEMENT_TYPES[(idx + 1) % ELEMENT_TYPES.len()]
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "category" | "categorie" | "cat" => Ok(ElementType::Category),
            "problem" | "probleme" | "prob" => Ok(ElementType::Problem),
            "state" | "etat" => Ok(ElementType::State),
            "verification" | "verif" | "check" => Ok(ElementType::Verification),
            "action" => Ok(ElementType::Action),
            other => Err(format!(
                "Unknown element type '{}'. Expected one of: category, problem, state, verification, action",
                other
            )),
        }
    }
}

// =============================================================================
// Element
// =============================================================================

fn is_false(b: &bool) -> bool {
    !*b
}

/// A node of the diagnostic graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementType,
    pub title: String,
    /// `None` means the element is a root of the hierarchy
    #[serde(default)]
    pub parent: Option<String>,
    /// Unconditional successors (state / action)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<String>,
    /// Successor when the check passes (verification)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_ok: Option<String>,
    /// Successor when the check fails (verification)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_ko: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub usedoc: bool,
}

impl Element {
    pub fn new(kind: ElementType, title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            title: title.into(),
            parent: None,
            next: Vec::new(),
            next_ok: None,
            next_ko: None,
            usedoc: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_next<I, S>(mut self, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next = next.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_branches(mut self, ok: Option<&str>, ko: Option<&str>) -> Self {
        self.next_ok = ok.map(str::to_string);
        self.next_ko = ko.map(str::to_string);
        self
    }

    pub fn with_usedoc(mut self, usedoc: bool) -> Self {
        self.usedoc = usedoc;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Canonical form: blank references become absent and `next` loses duplicates.
    ///
    /// Form layers hand over empty strings for unset selects, so every write path
    /// in the store goes through here.
    pub fn normalize(&mut self) {
        self.id = self.id.trim().to_string();
        fn blank_to_none(value: &mut Option<String>) {
            if value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(false) {
                *value = None;
            }
        }
        blank_to_none(&mut self.parent);
        blank_to_none(&mut self.next_ok);
        blank_to_none(&mut self.next_ko);

        let mut seen = std::collections::HashSet::new();
        self.next
            .retain(|id| !id.trim().is_empty() && seen.insert(id.clone()));
    }

    /// Every flow target of this element, `next` first, then OK, then KO
    pub fn flow_targets(&self) -> impl Iterator<Item = &str> {
        self.next
            .iter()
            .map(String::as_str)
            .chain(self.next_ok.as_deref())
            .chain(self.next_ko.as_deref())
    }

    /// Every id this element refers to, hierarchy included
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.parent.as_deref().into_iter().chain(self.flow_targets())
    }
}

// =============================================================================
// Persisted Collection
// =============================================================================

/// The persisted root structure: `{ "elements": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementsData {
    pub elements: Vec<Element>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ElementsPayload {
    Wrapped(ElementsData),
    Bare(Vec<Element>),
}

impl ElementsData {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Parse either the wrapped form or a bare array of elements
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let payload: ElementsPayload = serde_json::from_str(json)?;
        Ok(match payload {
            ElementsPayload::Wrapped(data) => data,
            ElementsPayload::Bare(elements) => Self { elements },
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty JSON with a 2-space indent, as written by exports
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// =============================================================================
// Derived Tree
// =============================================================================

/// An element with its hierarchy children. Derived from the store, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub element: Element,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(element: Element) -> Self {
        Self {
            element,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}
