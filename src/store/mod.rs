//! The element store
//!
//! Sole owner of the element collection. Every structural invariant is
//! enforced here:
//! - ids are unique and never reused within a session
//! - `parent`, `next`, `next_ok` and `next_ko` only point at existing elements
//! - the parent relation has no cycles
//!
//! Each operation validates first and mutates second, so a rejected call never
//! leaves partial state behind. Successful mutations bump the revision, queue
//! a notice, and write the whole collection to the storage slot.

mod index;

pub use index::{DanglingReference, ElementIndex};

use std::collections::HashSet;

use crate::model::{Element, ElementType, ElementsData};
use crate::notice::{Notice, NoticeLevel};
use crate::sample;
use crate::storage::{MemorySlot, StorageError, StorageSlot};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("Cannot move '{element}' under '{parent}': an element cannot become its own descendant")]
    Cycle { element: String, parent: String },
    #[error("Element '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Where the initial collection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Slot,
    Sample,
}

pub struct ElementStore {
    index: ElementIndex,
    selected: Option<String>,
    retired: HashSet<String>,
    slot: Box<dyn StorageSlot>,
    notices: Vec<Notice>,
    revision: u64,
    source: LoadSource,
    /// Raw slot payload that failed to parse, until it has been backed up
    unreadable: Option<String>,
}

impl ElementStore {
    /// Read the slot once, falling back to the bundled sample data when it is
    /// empty or cannot be parsed
    pub fn open(slot: Box<dyn StorageSlot>) -> Self {
        let mut unreadable = None;
        let loaded = match slot.load() {
            Ok(Some(payload)) => match ElementsData::from_json(&payload) {
                Ok(data) => Some(data),
                Err(e) => {
                    log::warn!(
                        "slot {} holds invalid data ({}), using sample data; it is backed up before the first save",
                        slot.describe(),
                        e
                    );
                    unreadable = Some(payload);
                    None
                }
            },
            Ok(None) => {
                log::info!("slot {} is empty, using sample data", slot.describe());
                None
            }
            Err(e) => {
                log::warn!("could not read slot {} ({}), using sample data", slot.describe(), e);
                None
            }
        };

        let (data, source) = match loaded {
            Some(data) => (data, LoadSource::Slot),
            None => (sample::default_data(), LoadSource::Sample),
        };

        let mut store = Self::with_data(slot, data);
        store.source = source;
        store.unreadable = unreadable;
        store
    }

    /// Build a store around already-loaded data. Nothing is written until the first mutation.
    pub fn with_data(slot: Box<dyn StorageSlot>, data: ElementsData) -> Self {
        let (index, dropped) = ElementIndex::from_data_lenient(data);
        if dropped > 0 {
            log::warn!("dropped {} element(s) with an empty or duplicate id", dropped);
        }
        let dangling = index.dangling_references().len();
        if dangling > 0 {
            log::warn!("loaded data has {} dangling reference(s)", dangling);
        }

        Self {
            index,
            selected: None,
            retired: HashSet::new(),
            slot,
            notices: Vec::new(),
            revision: 0,
            source: LoadSource::Slot,
            unreadable: None,
        }
    }

    /// Store backed by a throwaway in-memory slot
    pub fn in_memory(data: ElementsData) -> Self {
        Self::with_data(Box::new(MemorySlot::new()), data)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// All elements in collection order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.index.iter()
    }

    /// Direct children of `parent`; `None` returns the roots
    pub fn children(&self, parent: Option<&str>) -> Vec<&Element> {
        self.index
            .child_ids(parent)
            .iter()
            .filter_map(|id| self.index.get(id))
            .collect()
    }

    /// Ids below `id` in the hierarchy (not including `id`)
    pub fn descendants(&self, id: &str) -> Vec<String> {
        self.index.descendants(id)
    }

    /// Case-insensitive substring match on title and id. A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<&Element> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.index
            .iter()
            .filter(|el| {
                el.title.to_lowercase().contains(&needle) || el.id.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Elements that can become the parent of `id` without creating a cycle
    pub fn parent_candidates(&self, id: &str) -> Vec<&Element> {
        let mut excluded: HashSet<String> = self.descendants(id).into_iter().collect();
        excluded.insert(id.to_string());
        self.index
            .iter()
            .filter(|el| !excluded.contains(&el.id))
            .collect()
    }

    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        self.index.dangling_references()
    }

    pub fn data(&self) -> ElementsData {
        self.index.to_data()
    }

    pub(crate) fn index(&self) -> &ElementIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Incremented by every successful mutation; views recompute when it changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn load_source(&self) -> LoadSource {
        self.source
    }

    pub fn storage_location(&self) -> String {
        self.slot.describe()
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn selected(&self) -> Option<&Element> {
        self.selected.as_deref().and_then(|id| self.index.get(id))
    }

    pub fn select(&mut self, id: &str) -> Result<()> {
        if !self.index.contains(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // ========================================================================
    // Notices
    // ========================================================================

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a new element. An empty id is replaced by a generated one.
    /// Returns the id the element was stored under.
    pub fn add(&mut self, element: Element) -> Result<String> {
        let result = self.try_add(element);
        self.finish(result, |id| format!("Element '{}' added", id))
    }

    /// Replace the element with the same id
    pub fn update(&mut self, element: Element) -> Result<()> {
        let id = element.id.clone();
        let result = self.try_update(element);
        self.finish(result, |_| format!("Element '{}' updated", id))
    }

    /// Remove `id` and its whole subtree, then scrub flow references to the
    /// removed elements. Returns the removed ids, `id` first.
    pub fn delete(&mut self, id: &str) -> Result<Vec<String>> {
        let result = self.try_delete(id);
        self.finish(result, |removed| match removed.len() {
            1 => format!("Element '{}' deleted", removed[0]),
            n => format!("Element '{}' and {} descendant(s) deleted", removed[0], n - 1),
        })
    }

    /// Reparent `element_id`; `None` moves it to the root level
    pub fn move_element(&mut self, element_id: &str, new_parent: Option<&str>) -> Result<()> {
        let result = self.try_move(element_id, new_parent);
        self.finish(result, |_| match new_parent {
            Some(parent) => format!("Element '{}' moved under '{}'", element_id, parent),
            None => format!("Element '{}' moved to root", element_id),
        })
    }

    /// Swap in a whole new collection after validating it
    pub fn replace_all(&mut self, data: ElementsData) -> Result<usize> {
        let result = self.try_replace_all(data);
        self.finish(result, |n| format!("Imported {} element(s)", n))
    }

    /// Write the collection to the slot, reporting failures to the caller
    pub fn save(&mut self) -> Result<()> {
        match self.write_slot() {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Data saved".to_string());
                Ok(())
            }
            Err(e) => {
                log::warn!("save to {} failed: {}", self.slot.describe(), e);
                self.notify(NoticeLevel::Error, format!("Save failed: {}", e));
                Err(e)
            }
        }
    }

    fn finish<T>(&mut self, result: Result<T>, describe: impl FnOnce(&T) -> String) -> Result<T> {
        match result {
            Ok(value) => {
                self.revision += 1;
                let message = describe(&value);
                log::debug!("{} (revision {})", message, self.revision);
                self.notify(NoticeLevel::Success, message);
                self.persist();
                Ok(value)
            }
            Err(e) => {
                log::debug!("rejected: {}", e);
                self.notify(NoticeLevel::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Best-effort write after a mutation. The in-memory state stays authoritative.
    fn persist(&mut self) {
        if let Err(e) = self.write_slot() {
            log::warn!("could not persist to {}: {}", self.slot.describe(), e);
            self.notify(
                NoticeLevel::Warning,
                format!("Changes kept in memory but not saved: {}", e),
            );
        }
    }

    fn write_slot(&mut self) -> Result<()> {
        if let Some(original) = &self.unreadable {
            let at = self.slot.backup(original)?;
            log::warn!("previous contents of {} saved to {}", self.slot.describe(), at);
            self.notify(
                NoticeLevel::Warning,
                format!("Unreadable data was backed up to {}", at),
            );
            self.unreadable = None;
        }
        let payload = self.index.to_data().to_json()?;
        self.slot.store(&payload)?;
        Ok(())
    }

    fn generate_id(&self, kind: ElementType) -> String {
        let mut suffix = chrono::Utc::now().timestamp_millis();
        loop {
            let candidate = format!("{}{}", kind.as_str(), suffix);
            if !self.index.contains(&candidate) && !self.retired.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn check_title(element: &Element) -> Result<()> {
        if element.title.trim().is_empty() {
            return Err(StoreError::Validation("Title is required".to_string()));
        }
        Ok(())
    }

    /// Validate the element's parent and flow targets. References already held
    /// by `previous` are not re-checked.
    fn check_references(&self, element: &Element, previous: Option<&Element>) -> Result<()> {
        let held = |target: &str| previous.is_some_and(|p| p.flow_targets().any(|t| t == target));

        if let Some(parent) = element.parent.as_deref() {
            if parent == element.id {
                return Err(StoreError::Cycle {
                    element: element.id.clone(),
                    parent: parent.to_string(),
                });
            }
            let kept = previous.and_then(|p| p.parent.as_deref()) == Some(parent);
            if !kept && !self.index.contains(parent) {
                return Err(StoreError::Validation(format!(
                    "Parent '{}' does not exist",
                    parent
                )));
            }
        }
        for target in element.flow_targets() {
            // A flow edge back to the element itself is a legal loop
            if target != element.id && !self.index.contains(target) && !held(target) {
                return Err(StoreError::Validation(format!(
                    "'{}' points to unknown element '{}'",
                    element.id, target
                )));
            }
        }
        Ok(())
    }

    fn try_add(&mut self, mut element: Element) -> Result<String> {
        element.normalize();
        Self::check_title(&element)?;

        if element.id.is_empty() {
            element.id = self.generate_id(element.kind);
        } else if self.index.contains(&element.id) {
            return Err(StoreError::Validation(format!(
                "An element with id '{}' already exists",
                element.id
            )));
        } else if self.retired.contains(&element.id) {
            return Err(StoreError::Validation(format!(
                "Id '{}' belonged to a deleted element and cannot be reused",
                element.id
            )));
        }

        self.check_references(&element, None)?;

        let id = element.id.clone();
        self.index.insert(element);
        Ok(id)
    }

    fn try_update(&mut self, mut element: Element) -> Result<()> {
        element.normalize();
        let Some(existing) = self.index.get(&element.id) else {
            return Err(StoreError::NotFound(element.id.clone()));
        };
        let (old_kind, old_parent) = (existing.kind, existing.parent.clone());

        if old_kind != element.kind {
            return Err(StoreError::Validation(format!(
                "The type of '{}' cannot be changed ({} → {})",
                element.id, old_kind, element.kind
            )));
        }
        Self::check_title(&element)?;
        self.check_references(&element, Some(existing))?;

        if element.parent != old_parent {
            if let Some(parent) = element.parent.as_deref() {
                if self.index.chain_contains(parent, &element.id) {
                    return Err(StoreError::Cycle {
                        element: element.id.clone(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        self.index.replace(element);
        Ok(())
    }

    fn try_delete(&mut self, id: &str) -> Result<Vec<String>> {
        if !self.index.contains(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        // Work out the full removal set before touching anything
        let mut removed = vec![id.to_string()];
        removed.extend(self.index.descendants(id));
        let removed_set: HashSet<&str> = removed.iter().map(String::as_str).collect();

        let survivors_to_scrub: Vec<String> = self
            .index
            .iter()
            .filter(|el| !removed_set.contains(el.id.as_str()))
            .filter(|el| el.flow_targets().any(|t| removed_set.contains(t)))
            .map(|el| el.id.clone())
            .collect();

        for rid in &removed {
            self.index.remove(rid);
        }

        for sid in &survivors_to_scrub {
            if let Some(el) = self.index.get_mut(sid) {
                el.next.retain(|t| !removed_set.contains(t.as_str()));
                if el.next_ok.as_deref().is_some_and(|t| removed_set.contains(t)) {
                    el.next_ok = None;
                }
                if el.next_ko.as_deref().is_some_and(|t| removed_set.contains(t)) {
                    el.next_ko = None;
                }
            }
        }
        log::debug!(
            "delete {}: removed {} element(s), scrubbed {} survivor(s)",
            id,
            removed.len(),
            survivors_to_scrub.len()
        );

        if self
            .selected
            .as_deref()
            .is_some_and(|s| removed_set.contains(s))
        {
            self.selected = None;
        }

        self.retired.extend(removed.iter().cloned());
        Ok(removed)
    }

    fn try_move(&mut self, element_id: &str, new_parent: Option<&str>) -> Result<()> {
        if !self.index.contains(element_id) {
            return Err(StoreError::NotFound(element_id.to_string()));
        }
        if let Some(parent) = new_parent {
            if self.index.chain_contains(parent, element_id) {
                return Err(StoreError::Cycle {
                    element: element_id.to_string(),
                    parent: parent.to_string(),
                });
            }
            if !self.index.contains(parent) {
                return Err(StoreError::NotFound(parent.to_string()));
            }
        }

        self.index
            .set_parent(element_id, new_parent.map(str::to_string));
        Ok(())
    }

    fn try_replace_all(&mut self, data: ElementsData) -> Result<usize> {
        let mut ids: HashSet<String> = HashSet::new();
        for el in &data.elements {
            let id = el.id.trim();
            if id.is_empty() {
                return Err(StoreError::Validation(format!(
                    "Element '{}' has no id",
                    el.title
                )));
            }
            if !ids.insert(id.to_string()) {
                return Err(StoreError::Validation(format!("Duplicate id '{}'", id)));
            }
            if self.retired.contains(id) {
                return Err(StoreError::Validation(format!(
                    "Id '{}' belonged to a deleted element and cannot be reused",
                    id
                )));
            }
            Self::check_title(el)?;
        }

        let (staged, _) = ElementIndex::from_data_lenient(data);
        if let Some(dangling) = staged.dangling_references().into_iter().next() {
            return Err(StoreError::Validation(format!(
                "'{}' {} points to unknown element '{}'",
                dangling.element, dangling.field, dangling.target
            )));
        }
        if let Some(el) = staged.iter().find(|el| staged.has_parent_cycle(&el.id)) {
            return Err(StoreError::Validation(format!(
                "Parent chain of '{}' loops back on itself",
                el.id
            )));
        }

        let count = staged.len();
        self.index = staged;
        self.selected = None;
        Ok(count)
    }
}
