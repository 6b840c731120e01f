//! UI rendering for the TUI

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use super::app::{App, Focus, InputKind, Mode};
use super::views::{detail, diagram, tree};
use crate::model::ElementType;
use crate::notice::NoticeLevel;

/// Main draw function - orchestrates all rendering
pub fn draw(frame: &mut Frame, app: &mut App) {
    app.refresh_diagram();
    let area = frame.area();

    let main_layout = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Min(8),    // Content
        Constraint::Length(1), // Footer/status
    ])
    .split(area);

    draw_header(frame, app, main_layout[0]);

    let content =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(main_layout[1]);
    tree::draw(frame, app, content[0]);

    let right = Layout::vertical([Constraint::Length(11), Constraint::Min(5)]).split(content[1]);
    detail::draw(frame, app, right[0]);
    diagram::draw(frame, app, right[1]);

    draw_footer(frame, app, main_layout[2]);

    match &app.mode {
        Mode::Help => draw_help_overlay(frame, area),
        Mode::Search => draw_search_overlay(frame, app, area),
        Mode::Input(kind) => draw_input_overlay(frame, app, kind, area),
        Mode::ConfirmDelete { id, count } => draw_confirm_overlay(frame, id, *count, area),
        Mode::Normal => {}
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let marked = match &app.marked {
        Some(id) => format!(" │ marked: {}", id),
        None => String::new(),
    };
    let header_text = format!(
        " diagtree │ {} elements │ {}{}",
        app.store.len(),
        app.store.storage_location(),
        marked
    );
    let header =
        Paragraph::new(header_text).style(Style::default().bg(Color::Blue).fg(Color::White).bold());
    frame.render_widget(header, area);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    if let Some((notice, _)) = &app.toast {
        let color = match notice.level {
            NoticeLevel::Success => Color::Green,
            NoticeLevel::Warning => Color::Yellow,
            NoticeLevel::Error => Color::Red,
        };
        let footer = Paragraph::new(format!(" {}", notice))
            .style(Style::default().bg(color).fg(Color::Black));
        frame.render_widget(footer, area);
        return;
    }

    let keybinds = match app.focus {
        Focus::Tree => "j/k:move  h/l:fold  a/A:add  r:rename  d:delete  m:mark  p:drop  /:search  Tab:diagram  ?:help  q:quit",
        Focus::Diagram => "h/j/k/l:pan  +/-:zoom  0:reset  Tab:tree  ?:help  q:quit",
    };
    let footer = Paragraph::new(format!(" {}", keybinds))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(footer, area);
}

/// Centered popup area, clamped to the screen
fn popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = popup(area, 60, 30);
    frame.render_widget(Clear, popup_area);

    let help_text = r#"
  Tree
  ─────────────────────────────────
  j/k, ↑/↓     Move up/down
  h/l, ←/→     Collapse / expand
  Enter        Toggle node
  g/G          First / last
  a            Add child of selection
  A            Add root category
  r            Rename
  d            Delete (with descendants)
  m            Mark / unmark for move or link
  p / P        Move marked under selection / to root
  n            Toggle marked → selection as next
  o / x        Set marked's OK / KO target
  s            Save
  /            Search

  Diagram (Tab to focus)
  ─────────────────────────────────
  h/j/k/l      Pan
  +/-          Zoom in/out
  0            Reset view

  Press ? or Esc to close
"#;

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White).bg(Color::Black));
    frame.render_widget(help, popup_area);
}

fn draw_search_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = popup(area, 70, 16);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" Search: {}▏", app.search_query))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if app.search_hits.is_empty() {
        let hint = if app.search_query.trim().is_empty() {
            "Type to search titles and ids"
        } else {
            "No matches"
        };
        frame.render_widget(
            Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let items: Vec<ListItem> = app
        .search_hits
        .iter()
        .filter_map(|id| app.store.get(id))
        .map(|el| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", el.kind.short_tag()), type_style(el.kind)),
                Span::raw(el.title.clone()),
                Span::styled(format!("  {}", el.id), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).bold());
    let mut state = ListState::default().with_selected(Some(app.search_cursor));
    frame.render_stateful_widget(list, inner, &mut state);
}

fn draw_input_overlay(frame: &mut Frame, app: &App, kind: &InputKind, area: Rect) {
    let popup_area = popup(area, 60, 5);
    frame.render_widget(Clear, popup_area);

    let title = match kind {
        InputKind::Add { parent, kind } => {
            let under = parent.as_deref().unwrap_or("root");
            format!(" New {} under {} (Tab: type) ", kind.display_name(), under)
        }
        InputKind::Rename { id } => format!(" Rename {} ", id),
    };
    let prompt = Paragraph::new(format!("{}▏", app.input)).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );
    frame.render_widget(prompt, popup_area);
}

fn draw_confirm_overlay(frame: &mut Frame, id: &str, count: usize, area: Rect) {
    let popup_area = popup(area, 56, 5);
    frame.render_widget(Clear, popup_area);

    let message = if count > 1 {
        format!("Delete '{}' and {} descendant(s)? (y/N)", id, count - 1)
    } else {
        format!("Delete '{}'? (y/N)", id)
    };
    let confirm = Paragraph::new(message)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title(" Confirm ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(confirm, popup_area);
}

/// Get color for element type
pub fn type_color(kind: ElementType) -> Color {
    match kind {
        ElementType::Category => Color::Magenta,
        ElementType::Problem => Color::Yellow,
        ElementType::State => Color::Blue,
        ElementType::Verification => Color::Cyan,
        ElementType::Action => Color::Green,
    }
}

pub fn type_style(kind: ElementType) -> Style {
    Style::default().fg(type_color(kind)).bold()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutConfig;
    use crate::model::{Element, ElementsData};
    use crate::store::ElementStore;
    use ratatui::backend::TestBackend;

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> App {
        let store = ElementStore::in_memory(ElementsData::new(vec![
            Element::new(ElementType::Verification, "Inlet filter clean?")
                .with_id("verif1")
                .with_branches(Some("action1"), None),
            Element::new(ElementType::Action, "Flush the filter")
                .with_id("action1")
                .with_parent("verif1"),
        ]));
        App::new(store, LayoutConfig::default())
    }

    #[test]
    fn test_draws_panes() {
        let mut app = app();
        let screen = render(&mut app);
        assert!(screen.contains("diagtree"));
        assert!(screen.contains("Inlet filter clean?"));
        assert!(screen.contains("Detail"));
        assert!(screen.contains("Diagram"));
    }

    #[test]
    fn test_tree_pane_nests_children() {
        let mut app = app();
        app.reveal("action1");
        let screen = render(&mut app);

        // Row and column of the first occurrence of `needle`
        let locate = |needle: &str| {
            screen.lines().enumerate().find_map(|(row, line)| {
                line.find(needle).map(|at| (row, line[..at].chars().count()))
            })
        };
        let (parent_row, parent_col) = locate("[verif] Inlet filter clean?").unwrap();
        let (child_row, child_col) = locate("[action] Flush the filter").unwrap();
        assert_eq!(child_row, parent_row + 1);
        assert!(child_col > parent_col);
    }

    #[test]
    fn test_confirm_overlay() {
        let mut app = app();
        app.request_delete();
        let screen = render(&mut app);
        assert!(screen.contains("Delete 'verif1' and 1 descendant(s)? (y/N)"));
    }

    #[test]
    fn test_toast_replaces_keybinds() {
        let mut app = app();
        app.start_rename();
        app.input = "Inlet screen clean?".to_string();
        app.submit_input();
        let screen = render(&mut app);
        assert!(screen.contains("Element 'verif1' updated"));
    }
}
