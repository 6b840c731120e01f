//! Detail panel view - shows full element information

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::tui::app::App;
use crate::tui::ui::{type_color, type_style};

/// Draw the detail panel for the selected element
pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Detail ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let Some(el) = app.selected_element() else {
        let empty = Paragraph::new("Select an element to view details")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, inner_area);
        return;
    };

    let width = inner_area.width.saturating_sub(8) as usize;
    let target = |id: &str| -> Span<'static> {
        match app.store.get(id) {
            Some(t) => Span::styled(
                format!("[{}] {}", t.kind.short_tag(), truncate_str(&t.title, width)),
                Style::default().fg(type_color(t.kind)),
            ),
            None => Span::styled(format!("{} (missing)", id), Style::default().fg(Color::Red)),
        }
    };

    let mut header = vec![
        Span::styled(
            format!(" {} ", el.kind.display_name().to_uppercase()),
            type_style(el.kind).reversed(),
        ),
        Span::raw(" "),
        Span::styled(el.title.clone(), Style::default().fg(Color::White).bold()),
    ];
    if el.usedoc {
        header.push(Span::styled("  [doc]", Style::default().fg(Color::Yellow)));
    }

    let mut lines: Vec<Line> = vec![Line::from(header)];
    lines.push(Line::from(Span::styled(
        format!("ID: {}", el.id),
        Style::default().fg(Color::DarkGray),
    )));

    lines.push(Line::from(vec![
        Span::styled("Parent: ", Style::default().fg(Color::Cyan)),
        match el.parent.as_deref() {
            Some(parent) => target(parent),
            None => Span::styled("(root)", Style::default().fg(Color::DarkGray)),
        },
    ]));

    for next in &el.next {
        lines.push(Line::from(vec![
            Span::styled("→ ", Style::default().fg(Color::Yellow)),
            target(next),
        ]));
    }
    if let Some(ok) = el.next_ok.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("OK → ", Style::default().fg(Color::Green).bold()),
            target(ok),
        ]));
    }
    if let Some(ko) = el.next_ko.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("KO → ", Style::default().fg(Color::Red).bold()),
            target(ko),
        ]));
    }

    let incoming: Vec<&str> = app
        .store
        .elements()
        .filter(|other| other.flow_targets().any(|t| t == el.id))
        .map(|other| other.id.as_str())
        .collect();
    let children = app.store.children(Some(&el.id)).len();
    lines.push(Line::from(Span::styled(
        format!(
            "{} child(ren) │ reached from: {}",
            children,
            if incoming.is_empty() {
                "-".to_string()
            } else {
                incoming.join(", ")
            }
        ),
        Style::default().fg(Color::DarkGray),
    )));

    let detail = Paragraph::new(lines).wrap(Wrap { trim: true });
    frame.render_widget(detail, inner_area);
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
