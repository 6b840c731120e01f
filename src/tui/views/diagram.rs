//! Diagram pane - the flow reachable from the selection, laid out in ranks

use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        Block, Borders, Paragraph,
    },
};

use crate::layout::Direction;
use crate::subgraph::EdgeKind;
use crate::tui::app::{App, Focus};
use crate::tui::ui::type_color;

/// Extra room around the layout, in layout units
const MARGIN: f64 = 40.0;

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let border = if app.focus == Focus::Diagram {
        Color::Magenta
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .title(format!(
            " Diagram │ {} │ zoom: {}% ",
            match app.layout_direction() {
                Direction::TopBottom => "TB",
                Direction::LeftRight => "LR",
            },
            (app.diagram_zoom * 100.0).round() as i32
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let Some(diagram) = app.diagram.as_ref() else {
        let empty = Paragraph::new("Select an element to see its flow")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, inner_area);
        return;
    };
    if inner_area.width == 0 || inner_area.height == 0 {
        return;
    }

    let layout = &diagram.layout;

    // Fit the whole layout, then apply zoom and pan. Canvas y grows upward.
    let half_w = (layout.width / 2.0 + MARGIN) / app.diagram_zoom;
    let half_h = (layout.height / 2.0 + MARGIN) / app.diagram_zoom;
    let cx = layout.width / 2.0 + app.diagram_offset.0;
    let cy = layout.height / 2.0 - app.diagram_offset.1;
    let flip = |y: f64| layout.height - y;

    // Layout units covered by one terminal column
    let units_per_col = (2.0 * half_w) / inner_area.width as f64;

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([cx - half_w, cx + half_w])
        .y_bounds([cy - half_h, cy + half_h])
        .paint(|ctx| {
            for edge in &diagram.subgraph.edges {
                let Some(route) = layout.route(&edge.id) else {
                    continue;
                };
                let color = match edge.kind {
                    EdgeKind::Next => Color::DarkGray,
                    EdgeKind::Ok => Color::Green,
                    EdgeKind::Ko => Color::Red,
                };
                for pair in route.points.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].x,
                        y1: flip(pair[0].y),
                        x2: pair[1].x,
                        y2: flip(pair[1].y),
                        color,
                    });
                }
                if let (Some(label), Some(mid)) =
                    (edge.label(), route.points.get(route.points.len() / 2))
                {
                    ctx.print(
                        mid.x,
                        flip(mid.y),
                        Span::styled(label, Style::default().fg(color).bold()),
                    );
                }
            }

            ctx.layer();

            for pos in &layout.nodes {
                let Some(node) = diagram.subgraph.node(&pos.id) else {
                    continue;
                };
                let color = type_color(node.kind);
                ctx.draw(&Rectangle {
                    x: pos.x,
                    y: flip(pos.y + pos.height),
                    width: pos.width,
                    height: pos.height,
                    color,
                });

                let max_chars = ((pos.width / units_per_col) as usize).saturating_sub(2);
                if max_chars > 0 {
                    let title: String = node.title.chars().take(max_chars).collect();
                    let style = if node.id == diagram.root {
                        Style::default().fg(color).bold().underlined()
                    } else {
                        Style::default().fg(color)
                    };
                    ctx.print(
                        pos.x + units_per_col,
                        flip(pos.y + pos.height / 2.0),
                        Span::styled(title, style),
                    );
                }
            }
        });

    frame.render_widget(canvas, inner_area);
}
