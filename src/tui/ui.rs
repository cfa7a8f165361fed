//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem, Wrap},
    style::{Color, Style, Modifier},
};
use crate::cpu::io::{pin_states, PinState, DIGITAL_PINS};
use crate::cpu::{Snapshot, Sreg};
use super::app::DebuggerApp;

/// SREG bit names, most significant first.
const SREG_NAMES: [&str; 8] = ["I", "T", "H", "S", "V", "N", "Z", "C"];

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(44),
            Constraint::Min(40),
        ])
        .split(rows[0]);

    draw_instructions(frame, top[0], app);
    draw_registers(frame, top[1], app);
    draw_pins(frame, rows[1], app);
    draw_serial(frame, rows[2], app);
    draw_status(frame, rows[3], app);
}

/// Draw the recorded instruction list.
fn draw_instructions(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let height = (area.height as usize).saturating_sub(2);

    let items: Vec<ListItem> = app
        .visible_rows(height)
        .map(|i| {
            let entry = &app.trace[i];
            let is_current = i == app.selected;
            let prefix = if is_current { "▶ " } else { "  " };
            let text = format!("{}{:04X}: {:04X}  {}", prefix, entry.addr, entry.word, entry.text);

            let style = if is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if entry.text.starts_with("???") {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Program ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw PC, SREG and the register file after the selected step.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let content = match app.current() {
        Some(entry) => register_lines(&entry.after),
        None => vec![Line::from("No data.")],
    };

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

fn register_lines(s: &Snapshot) -> Vec<Line<'static>> {
    let sreg = Sreg::from_bits_retain(s.sreg);

    let mut flags = vec![Span::raw("SREG: ")];
    for (i, name) in SREG_NAMES.iter().enumerate() {
        let bit = Sreg::from_bits_retain(0x80 >> i);
        let style = if sreg.contains(bit) {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        flags.push(Span::styled(format!("{} ", name), style));
    }
    flags.push(Span::raw(format!(" ({:08b})", s.sreg)));

    let mut lines = vec![
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("0x{:04X}", s.pc), Style::default().fg(Color::Yellow)),
            Span::raw("   Cycles: "),
            Span::styled(format!("{}", s.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", s.state), Style::default().fg(Color::Magenta)),
        ]),
        Line::from(flags),
        Line::from(""),
    ];

    for row in s.registers.chunks(4).enumerate() {
        let (row_idx, values) = row;
        let spans: Vec<Span> = values
            .iter()
            .enumerate()
            .map(|(col, value)| {
                let reg = row_idx * 4 + col;
                let style = if *value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Span::styled(format!("R{:<2}: 0x{:02X}   ", reg, value), style)
            })
            .collect();
        lines.push(Line::from(spans));
    }

    lines
}

/// Draw digital pin levels.
fn draw_pins(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let pins = match app.current() {
        Some(entry) => pin_states(&entry.after.io),
        None => [PinState::Input; DIGITAL_PINS],
    };

    let line = |range: std::ops::Range<usize>| {
        Line::from(
            range
                .map(|i| {
                    let (label, color) = match pins[i] {
                        PinState::Input => ("IN", Color::DarkGray),
                        PinState::High => ("HIGH", Color::Green),
                        PinState::Low => ("LOW", Color::Red),
                    };
                    Span::styled(format!("D{:<2}: {:<5} ", i, label), Style::default().fg(color))
                })
                .collect::<Vec<_>>(),
        )
    };

    let paragraph = Paragraph::new(vec![line(0..8), line(8..DIGITAL_PINS)])
        .block(Block::default()
            .title(" Digital Pins ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(paragraph, area);
}

/// Draw the UART output.
fn draw_serial(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let text = app
        .current()
        .map(|e| String::from_utf8_lossy(&e.after.serial).into_owned())
        .unwrap_or_default();

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default()
            .title(" Serial ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)));

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" ↑↓/jk: Step  PgUp/PgDn: ±10  Home/End  q: Quit ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}
