//! Debugger application state and logic.

use crate::cpu::trace::{self, TraceEntry};

/// Debugger application state.
pub struct DebuggerApp {
    /// Recorded run, one entry per executed step.
    pub trace: Vec<TraceEntry>,
    /// Index of the step being inspected.
    pub selected: usize,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
}

impl DebuggerApp {
    /// Record `program` and open the debugger on its first step.
    pub fn new(program: &[u16], max_steps: usize) -> Self {
        let trace = trace::record(program, max_steps);
        let status = match trace.last() {
            Some(last) => format!(
                "{} steps recorded, final state {:?}. ↑/↓ to browse, q to quit.",
                trace.len(),
                last.after.state
            ),
            None => "Nothing executed.".into(),
        };

        Self {
            trace,
            selected: 0,
            should_quit: false,
            status,
        }
    }

    /// The step under the cursor.
    pub fn current(&self) -> Option<&TraceEntry> {
        self.trace.get(self.selected)
    }

    /// Move the cursor by `delta` steps, clamped to the recorded range.
    pub fn move_by(&mut self, delta: isize) {
        if self.trace.is_empty() {
            return;
        }
        let last = self.trace.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    /// Jump to the first step.
    pub fn first(&mut self) {
        self.selected = 0;
    }

    /// Jump to the last step.
    pub fn last(&mut self) {
        self.selected = self.trace.len().saturating_sub(1);
    }

    /// The window of trace rows to show in a list `height` rows tall.
    pub fn visible_rows(&self, height: usize) -> std::ops::Range<usize> {
        let start = self.selected.saturating_sub(height / 2);
        let end = (start + height).min(self.trace.len());
        let start = end.saturating_sub(height).min(start);
        start..end
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u16>, max_steps: usize) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let mut app = DebuggerApp::new(&program, max_steps);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    while !app.should_quit {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('s') => app.move_by(1),
                        KeyCode::Up | KeyCode::Char('k') => app.move_by(-1),
                        KeyCode::PageDown => app.move_by(10),
                        KeyCode::PageUp => app.move_by(-10),
                        KeyCode::Home => app.first(),
                        KeyCode::End => app.last(),
                        _ => {}
                    }
                }
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
