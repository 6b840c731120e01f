//! Event handling for the TUI
//!
//! Vim-style keybindings and mode switching

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::app::{App, Focus, LinkKind, Mode};

/// Handle a key event, returns true if app should quit
pub fn handle_event(app: &mut App, key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    match app.mode.clone() {
        Mode::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
                app.mode = Mode::Normal;
            }
            false
        }
        Mode::Search => handle_search_mode(app, key),
        Mode::Input(_) => handle_input_mode(app, key),
        Mode::ConfirmDelete { .. } => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
                _ => app.cancel(),
            }
            false
        }
        Mode::Normal => handle_normal_mode(app, key),
    }
}

fn handle_search_mode(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => app.cancel(),
        KeyCode::Enter => app.accept_search(),
        KeyCode::Down | KeyCode::Tab => app.search_step(true),
        KeyCode::Up | KeyCode::BackTab => app.search_step(false),
        KeyCode::Backspace => {
            app.search_query.pop();
            app.update_search();
        }
        KeyCode::Char(c) => {
            app.search_query.push(c);
            app.update_search();
        }
        _ => {}
    }
    false
}

fn handle_input_mode(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => app.cancel(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Tab => app.cycle_input_type(),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.input.push(c),
        _ => {}
    }
    false
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) -> bool {
    // Keys shared by both panes
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            app.mode = Mode::Help;
            return false;
        }
        KeyCode::Tab => {
            app.toggle_focus();
            return false;
        }
        KeyCode::Char('/') => {
            app.start_search();
            return false;
        }
        _ => {}
    }

    match app.focus {
        Focus::Tree => handle_tree_keys(app, key),
        Focus::Diagram => handle_diagram_keys(app, key),
    }
    false
}

fn handle_tree_keys(app: &mut App, key: KeyEvent) {
    let moved = match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.tree_state.key_down(),
        KeyCode::Char('k') | KeyCode::Up => app.tree_state.key_up(),
        KeyCode::Char('h') | KeyCode::Left => app.tree_state.key_left(),
        KeyCode::Char('l') | KeyCode::Right => app.tree_state.key_right(),
        KeyCode::Enter | KeyCode::Char(' ') => app.tree_state.toggle_selected(),
        KeyCode::Char('g') | KeyCode::Home => app.tree_state.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.tree_state.select_last(),
        _ => {
            handle_edit_keys(app, key);
            return;
        }
    };
    if moved {
        app.follow_tree_selection();
    }
}

fn handle_edit_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('a') => app.start_add(false),
        KeyCode::Char('A') => app.start_add(true),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('m') => app.toggle_mark(),
        KeyCode::Char('p') => app.drop_marked(false),
        KeyCode::Char('P') => app.drop_marked(true),
        KeyCode::Char('n') => app.link_marked(LinkKind::Next),
        KeyCode::Char('o') => app.link_marked(LinkKind::Ok),
        KeyCode::Char('x') => app.link_marked(LinkKind::Ko),
        KeyCode::Char('s') => app.save(),
        KeyCode::Esc => app.clear_mark(),
        _ => {}
    }
}

fn handle_diagram_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => app.pan(-1.0, 0.0),
        KeyCode::Char('l') | KeyCode::Right => app.pan(1.0, 0.0),
        KeyCode::Char('k') | KeyCode::Up => app.pan(0.0, -1.0),
        KeyCode::Char('j') | KeyCode::Down => app.pan(0.0, 1.0),
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom(1.25),
        KeyCode::Char('-') => app.zoom(0.8),
        KeyCode::Char('0') => app.reset_view(),
        KeyCode::Esc => app.toggle_focus(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutConfig;
    use crate::model::{Element, ElementType, ElementsData};
    use crate::store::ElementStore;

    fn app() -> App {
        let store = ElementStore::in_memory(ElementsData::new(vec![
            Element::new(ElementType::Category, "Pump").with_id("cat1"),
            Element::new(ElementType::Problem, "Leak")
                .with_id("prob1")
                .with_parent("cat1"),
        ]));
        App::new(store, LayoutConfig::default())
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_event(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        assert!(press(&mut app, KeyCode::Char('q')));
        assert!(handle_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
    }

    #[test]
    fn test_add_flow_through_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "Hose split");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Normal);
        let added = app.store.selected().unwrap();
        assert_eq!(added.title, "Hose split");
        assert_eq!(added.kind, ElementType::Problem);
        assert_eq!(added.parent.as_deref(), Some("cat1"));
    }

    #[test]
    fn test_tab_cycles_type_in_prompt() {
        let mut app = app();
        press(&mut app, KeyCode::Char('A'));
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Noise");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.store.selected().unwrap().kind, ElementType::Problem);
    }

    #[test]
    fn test_delete_cancelled_by_other_key() {
        let mut app = app();
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.store.len(), 2);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.store.is_empty());
    }

    #[test]
    fn test_search_mode_typing() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "leak");
        assert_eq!(app.search_hits, vec!["prob1"]);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.selected_id().as_deref(), Some("prob1"));
    }

    #[test]
    fn test_diagram_focus_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Diagram);
        press(&mut app, KeyCode::Char('+'));
        assert!(app.diagram_zoom > 1.0);
        press(&mut app, KeyCode::Char('0'));
        assert_eq!(app.diagram_zoom, 1.0);
        // 'q' still quits from the diagram pane
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_help_overlay() {
        let mut app = app();
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::Help);
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.mode, Mode::Normal);
    }
}
