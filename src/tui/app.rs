//! Application state for the TUI

use std::collections::HashSet;
use std::time::{Duration, Instant};

use ratatui::text::{Line, Span};
use tui_tree_widget::{TreeItem, TreeState};

use crate::layout::{Direction, LayeredLayout, Layout, LayoutConfig, LayoutEngine};
use crate::model::{Element, ElementType};
use crate::notice::Notice;
use crate::store::ElementStore;
use crate::subgraph::{extract, Subgraph};
use crate::tree::{build_forest, flatten};

use super::ui::type_style;

/// How long a notice stays in the footer
const TOAST_TTL: Duration = Duration::from_secs(4);

/// Pane receiving navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tree,
    Diagram,
}

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Search,
    Input(InputKind),
    ConfirmDelete { id: String, count: usize },
    Help,
}

/// What the text prompt is collecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Add {
        parent: Option<String>,
        kind: ElementType,
    },
    Rename {
        id: String,
    },
}

/// Flow field set by the link keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Next,
    Ok,
    Ko,
}

/// Subgraph and layout for the element shown in the diagram pane
pub struct Diagram {
    pub root: String,
    pub revision: u64,
    pub subgraph: Subgraph,
    pub layout: Layout,
}

/// Main application state
pub struct App {
    pub store: ElementStore,
    layout_config: LayoutConfig,

    // Tree pane
    pub items: Vec<TreeItem<'static, String>>,
    pub tree_state: TreeState<String>,
    items_revision: Option<u64>,

    // UI state
    pub focus: Focus,
    pub mode: Mode,
    pub input: String,

    // Search
    pub search_query: String,
    pub search_hits: Vec<String>,
    pub search_cursor: usize,

    /// Element picked up with `m`, waiting to be dropped
    pub marked: Option<String>,

    pub toast: Option<(Notice, Instant)>,

    // Diagram pane
    pub diagram: Option<Diagram>,
    pub diagram_offset: (f64, f64),
    pub diagram_zoom: f64,
}

impl App {
    pub fn new(store: ElementStore, layout_config: LayoutConfig) -> Self {
        let mut app = Self {
            store,
            layout_config,
            items: Vec::new(),
            tree_state: TreeState::default(),
            items_revision: None,
            focus: Focus::Tree,
            mode: Mode::Normal,
            input: String::new(),
            search_query: String::new(),
            search_hits: Vec::new(),
            search_cursor: 0,
            marked: None,
            toast: None,
            diagram: None,
            diagram_offset: (0.0, 0.0),
            diagram_zoom: 1.0,
        };
        app.sync();
        let first_root = app.store.children(None).first().map(|el| el.id.clone());
        if let Some(id) = first_root {
            app.reveal(&id);
        }
        app
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    /// Rebuild whatever is stale after a mutation and pick up new notices
    pub fn sync(&mut self) {
        if self.items_revision != Some(self.store.revision()) {
            self.items = self.build_items();
            self.items_revision = Some(self.store.revision());
        }

        // Selection may have been deleted
        if self.store.selected().is_none() {
            if let Some(id) = self.tree_state.selected().last().cloned() {
                if self.store.select(&id).is_err() {
                    self.tree_state.select(Vec::new());
                }
            }
        }

        if let Some(notice) = self.store.drain_notices().pop() {
            self.toast = Some((notice, Instant::now()));
        }
    }

    /// Tree items built bottom-up from the reversed pre-order walk
    fn build_items(&self) -> Vec<TreeItem<'static, String>> {
        let forest = build_forest(&self.store);
        let mut pending: Vec<Vec<TreeItem<'static, String>>> = vec![Vec::new()];

        for (depth, element) in flatten(&forest).into_iter().rev() {
            if pending.len() < depth + 2 {
                pending.resize_with(depth + 2, Vec::new);
            }
            let mut children = std::mem::take(&mut pending[depth + 1]);
            children.reverse();
            let text = self.item_text(element);
            let item = if children.is_empty() {
                TreeItem::new_leaf(element.id.clone(), text)
            } else {
                match TreeItem::new(element.id.clone(), text.clone(), children) {
                    Ok(item) => item,
                    Err(e) => {
                        log::warn!("tree item {}: {}", element.id, e);
                        TreeItem::new_leaf(element.id.clone(), text)
                    }
                }
            };
            pending[depth].push(item);
        }

        let mut roots = std::mem::take(&mut pending[0]);
        roots.reverse();
        roots
    }

    fn item_text(&self, element: &Element) -> Line<'static> {
        let mut spans = vec![
            Span::styled(format!("[{}]", element.kind.short_tag()), type_style(element.kind)),
            Span::raw(" "),
            Span::raw(element.title.clone()),
        ];
        if self.marked.as_deref() == Some(element.id.as_str()) {
            spans.push(Span::raw(" ⇢"));
        }
        Line::from(spans)
    }

    /// Recompute the diagram when the selection or the data changed
    pub fn refresh_diagram(&mut self) {
        let Some(root) = self.store.selected().map(|el| el.id.clone()) else {
            self.diagram = None;
            return;
        };
        let stale = match &self.diagram {
            Some(d) => d.root != root || d.revision != self.store.revision(),
            None => true,
        };
        if stale {
            let subgraph = extract(&self.store, &root);
            let layout = LayeredLayout.layout(&subgraph, &self.layout_config);
            if self.diagram.as_ref().map(|d| &d.root) != Some(&root) {
                self.reset_view();
            }
            self.diagram = Some(Diagram {
                root,
                revision: self.store.revision(),
                subgraph,
                layout,
            });
        }
    }

    pub fn layout_direction(&self) -> Direction {
        self.layout_config.direction
    }

    pub fn selected_element(&self) -> Option<&Element> {
        self.store.selected()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.store.selected().map(|el| el.id.clone())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Push the tree widget's selection into the store
    pub fn follow_tree_selection(&mut self) {
        match self.tree_state.selected().last().cloned() {
            Some(id) => {
                let _ = self.store.select(&id);
            }
            None => self.store.clear_selection(),
        }
    }

    /// Open every ancestor of `id` and select it
    pub fn reveal(&mut self, id: &str) {
        let path = self.path_to(id);
        if path.is_empty() {
            return;
        }
        for end in 1..path.len() {
            self.tree_state.open(path[..end].to_vec());
        }
        self.tree_state.select(path);
        let _ = self.store.select(id);
    }

    /// Ids from the root down to `id`, or empty if `id` is not in the tree
    pub fn path_to(&self, id: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.store.get(id);
        while let Some(el) = current {
            if !seen.insert(el.id.clone()) {
                return Vec::new();
            }
            path.push(el.id.clone());
            current = match el.parent.as_deref() {
                Some(parent) => match self.store.get(parent) {
                    Some(p) => Some(p),
                    None => return Vec::new(),
                },
                None => None,
            };
        }
        path.reverse();
        path
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Tree => Focus::Diagram,
            Focus::Diagram => Focus::Tree,
        };
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        let (w, h) = self
            .diagram
            .as_ref()
            .map(|d| (d.layout.width.max(1.0), d.layout.height.max(1.0)))
            .unwrap_or((1.0, 1.0));
        let step = 0.1 / self.diagram_zoom;
        self.diagram_offset.0 += dx * w * step;
        self.diagram_offset.1 += dy * h * step;
    }

    pub fn zoom(&mut self, factor: f64) {
        self.diagram_zoom = (self.diagram_zoom * factor).clamp(0.25, 8.0);
    }

    pub fn reset_view(&mut self) {
        self.diagram_offset = (0.0, 0.0);
        self.diagram_zoom = 1.0;
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub fn start_search(&mut self) {
        self.mode = Mode::Search;
        self.search_query.clear();
        self.search_hits.clear();
        self.search_cursor = 0;
    }

    pub fn update_search(&mut self) {
        self.search_hits = self
            .store
            .search(&self.search_query)
            .into_iter()
            .map(|el| el.id.clone())
            .collect();
        self.search_cursor = 0;
    }

    pub fn search_step(&mut self, forward: bool) {
        let n = self.search_hits.len();
        if n == 0 {
            return;
        }
        self.search_cursor = if forward {
            (self.search_cursor + 1) % n
        } else {
            (self.search_cursor + n - 1) % n
        };
    }

    /// Jump to the highlighted hit and leave search mode
    pub fn accept_search(&mut self) {
        if let Some(id) = self.search_hits.get(self.search_cursor).cloned() {
            self.reveal(&id);
        }
        self.mode = Mode::Normal;
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Prompt for the title of a new element under the selection
    pub fn start_add(&mut self, as_root: bool) {
        let parent = if as_root { None } else { self.store.selected() };
        let kind = match parent {
            Some(p) if p.kind != ElementType::Action => p.kind.cycle(),
            Some(_) => ElementType::Action,
            None => ElementType::Category,
        };
        self.input.clear();
        self.mode = Mode::Input(InputKind::Add {
            parent: parent.map(|p| p.id.clone()),
            kind,
        });
    }

    pub fn start_rename(&mut self) {
        if let Some(el) = self.store.selected() {
            self.input = el.title.clone();
            self.mode = Mode::Input(InputKind::Rename { id: el.id.clone() });
        }
    }

    /// Tab in the add prompt cycles the element type
    pub fn cycle_input_type(&mut self) {
        if let Mode::Input(InputKind::Add { kind, .. }) = &mut self.mode {
            *kind = kind.cycle();
        }
    }

    pub fn submit_input(&mut self) {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let title = std::mem::take(&mut self.input);
        match mode {
            Mode::Input(InputKind::Add { parent, kind }) => {
                let mut element = Element::new(kind, title.trim());
                element.parent = parent;
                if let Ok(id) = self.store.add(element) {
                    self.sync();
                    self.reveal(&id);
                }
            }
            Mode::Input(InputKind::Rename { id }) => {
                if let Some(mut element) = self.store.get(&id).cloned() {
                    element.title = title.trim().to_string();
                    let _ = self.store.update(element);
                }
            }
            other => self.mode = other,
        }
        self.sync();
    }

    pub fn cancel(&mut self) {
        self.mode = Mode::Normal;
        self.input.clear();
    }

    pub fn request_delete(&mut self) {
        if let Some(el) = self.store.selected() {
            let count = 1 + self.store.descendants(&el.id).len();
            self.mode = Mode::ConfirmDelete {
                id: el.id.clone(),
                count,
            };
        }
    }

    pub fn confirm_delete(&mut self) {
        if let Mode::ConfirmDelete { id, .. } = std::mem::replace(&mut self.mode, Mode::Normal) {
            let parent = self.store.get(&id).and_then(|el| el.parent.clone());
            if let Ok(removed) = self.store.delete(&id) {
                if self.marked.as_ref().is_some_and(|m| removed.contains(m)) {
                    self.marked = None;
                }
                self.sync();
                match parent {
                    Some(parent) => self.reveal(&parent),
                    None => {
                        self.tree_state.select(Vec::new());
                    }
                }
            }
        }
        self.sync();
    }

    /// Pick up the selection for a later move or link, or drop the mark
    pub fn toggle_mark(&mut self) {
        let selected = self.selected_id();
        self.marked = if self.marked == selected { None } else { selected };
        self.items_revision = None;
        self.sync();
    }

    pub fn clear_mark(&mut self) {
        if self.marked.take().is_some() {
            self.items_revision = None;
            self.sync();
        }
    }

    /// Move the marked element under the selection, or to the root level
    pub fn drop_marked(&mut self, to_root: bool) {
        let Some(marked) = self.marked.clone() else {
            self.toast = Some((Notice::warning("Mark an element with 'm' first"), Instant::now()));
            return;
        };
        let target = if to_root { None } else { self.selected_id() };
        if self.store.move_element(&marked, target.as_deref()).is_ok() {
            self.marked = None;
            self.items_revision = None;
            self.sync();
            self.reveal(&marked);
        }
        self.sync();
    }

    /// Point a flow field of the marked element at the selection
    pub fn link_marked(&mut self, link: LinkKind) {
        let (Some(marked), Some(target)) = (self.marked.clone(), self.selected_id()) else {
            self.toast = Some((
                Notice::warning("Mark a source with 'm', then select the target"),
                Instant::now(),
            ));
            return;
        };
        if let Some(mut element) = self.store.get(&marked).cloned() {
            match link {
                LinkKind::Next if !element.next.contains(&target) => element.next.push(target),
                LinkKind::Next => element.next.retain(|t| t != &target),
                LinkKind::Ok => element.next_ok = Some(target),
                LinkKind::Ko => element.next_ko = Some(target),
            }
            let _ = self.store.update(element);
        }
        self.sync();
    }

    pub fn save(&mut self) {
        let _ = self.store.save();
        self.sync();
    }

    /// Expire the toast
    pub fn tick(&mut self) {
        if self
            .toast
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= TOAST_TTL)
        {
            self.toast = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementsData;
    use crate::notice::NoticeLevel;

    fn app() -> App {
        let store = ElementStore::in_memory(ElementsData::new(vec![
            Element::new(ElementType::Category, "Pump").with_id("cat1"),
            Element::new(ElementType::Problem, "No pressure")
                .with_id("prob1")
                .with_parent("cat1"),
            Element::new(ElementType::Verification, "Filter clogged?")
                .with_id("verif1")
                .with_parent("prob1"),
            Element::new(ElementType::Category, "Motor").with_id("cat2"),
        ]));
        App::new(store, LayoutConfig::default())
    }

    #[test]
    fn test_starts_on_first_root() {
        let app = app();
        assert_eq!(app.selected_id().as_deref(), Some("cat1"));
        assert_eq!(app.items.len(), 2);
    }

    #[test]
    fn test_path_and_reveal() {
        let mut app = app();
        assert_eq!(app.path_to("verif1"), vec!["cat1", "prob1", "verif1"]);
        app.reveal("verif1");
        assert_eq!(app.tree_state.selected().to_vec(), vec!["cat1", "prob1", "verif1"]);
        assert_eq!(app.selected_id().as_deref(), Some("verif1"));
    }

    #[test]
    fn test_add_child_uses_next_type() {
        let mut app = app();
        app.reveal("prob1");
        app.start_add(false);
        assert_eq!(
            app.mode,
            Mode::Input(InputKind::Add {
                parent: Some("prob1".to_string()),
                kind: ElementType::State
            })
        );
        app.input = "Motor hums".to_string();
        app.submit_input();

        let added = app.store.selected().unwrap();
        assert_eq!(added.title, "Motor hums");
        assert_eq!(added.parent.as_deref(), Some("prob1"));
        assert_eq!(app.toast.as_ref().unwrap().0.level, NoticeLevel::Success);
    }

    #[test]
    fn test_empty_title_shows_error_toast() {
        let mut app = app();
        app.start_add(true);
        app.input = "   ".to_string();
        app.submit_input();
        assert_eq!(app.store.len(), 4);
        assert!(app.toast.as_ref().unwrap().0.is_error());
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut app = app();
        app.request_delete();
        assert_eq!(
            app.mode,
            Mode::ConfirmDelete {
                id: "cat1".to_string(),
                count: 3
            }
        );
        app.cancel();
        assert_eq!(app.store.len(), 4);

        app.request_delete();
        app.confirm_delete();
        assert_eq!(app.store.len(), 1);
        assert!(app.store.get("cat2").is_some());
        assert_eq!(app.items.len(), 1);
    }

    #[test]
    fn test_mark_and_drop_rejects_cycle() {
        let mut app = app();
        app.toggle_mark();
        assert_eq!(app.marked.as_deref(), Some("cat1"));

        app.reveal("verif1");
        app.drop_marked(false);
        assert_eq!(app.store.get("cat1").unwrap().parent, None);
        assert!(app.toast.as_ref().unwrap().0.is_error());

        app.reveal("cat2");
        app.drop_marked(false);
        assert_eq!(app.store.get("cat1").unwrap().parent.as_deref(), Some("cat2"));
        assert_eq!(app.marked, None);
    }

    #[test]
    fn test_link_marked() {
        let mut app = app();
        app.reveal("verif1");
        app.toggle_mark();
        app.reveal("cat2");
        app.link_marked(LinkKind::Ko);
        assert_eq!(app.store.get("verif1").unwrap().next_ko.as_deref(), Some("cat2"));
    }

    #[test]
    fn test_search_jumps_to_hit() {
        let mut app = app();
        app.start_search();
        app.search_query = "FILTER".to_string();
        app.update_search();
        assert_eq!(app.search_hits, vec!["verif1"]);
        app.accept_search();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.selected_id().as_deref(), Some("verif1"));
    }

    #[test]
    fn test_diagram_follows_selection() {
        let mut app = app();
        app.refresh_diagram();
        assert_eq!(app.diagram.as_ref().unwrap().root, "cat1");
        app.reveal("verif1");
        app.refresh_diagram();
        let diagram = app.diagram.as_ref().unwrap();
        assert_eq!(diagram.root, "verif1");
        assert_eq!(diagram.layout.nodes.len(), 1);
    }

    #[test]
    fn test_rename() {
        let mut app = app();
        app.start_rename();
        assert_eq!(app.input, "Pump");
        app.input = "Pump unit".to_string();
        app.submit_input();
        assert_eq!(app.store.get("cat1").unwrap().title, "Pump unit");
    }
}
