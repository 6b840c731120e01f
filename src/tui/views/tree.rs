//! Tree pane - the hierarchy with expand/collapse

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use tui_tree_widget::Tree;

use crate::tui::app::{App, Focus};

pub fn draw(frame: &mut Frame, app: &mut App, area: Rect) {
    let border = if app.focus == Focus::Tree {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .title(" Tree ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    if app.items.is_empty() {
        let empty = Paragraph::new("No elements. Press A to add a category.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    match Tree::new(&app.items) {
        Ok(tree) => {
            let tree = tree
                .block(block)
                .highlight_style(Style::default().bg(Color::DarkGray).bold())
                .highlight_symbol("▶ ");
            frame.render_stateful_widget(tree, area, &mut app.tree_state);
        }
        Err(e) => {
            let error = Paragraph::new(format!("Cannot draw tree: {}", e))
                .style(Style::default().fg(Color::Red))
                .block(block);
            frame.render_widget(error, area);
        }
    }
}
