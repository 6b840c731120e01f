//! Terminal User Interface for diagtree
//!
//! An interactive editor for the element tree.
//! Features:
//! - Tree pane with expand/collapse and vim-style navigation
//! - Detail pane for the selected element
//! - Diagram pane drawing the reachable flow with the layered layout
//! - Search, add, rename, delete with confirmation, mark-and-drop move
//! - Footer toast for store notices

pub mod app;
pub mod events;
pub mod ui;
pub mod views;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{poll, read, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use crate::config::Config;
use crate::store::ElementStore;
use app::App;
use events::handle_event;

/// Run the TUI application
pub fn run(store: ElementStore, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, config.layout.clone());
    let result = run_event_loop(&mut terminal, &mut app);

    // Restore terminal - this MUST run even if app fails
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();

    result
}

fn run_event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if poll(timeout)? {
            if let Event::Key(key) = read()? {
                if handle_event(app, key) {
                    return Ok(());
                }
                app.sync();
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }
    }
}
