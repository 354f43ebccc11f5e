//! Terminal rendering. Pure functions of the [`App`] state.

use chrono::TimeDelta;
use ratatui::{prelude::*, widgets::*};
use std::str::FromStr;

use crate::{
    app::{App, Notice, NoticeKind, Surface},
    config::ProgressBarConfig,
};

const POPUP_HEIGHT: u16 = 7;

pub fn render(f: &mut Frame, app: &App) {
    render_timer(f, app);
    if let Surface::Popup(notice) = app.surface() {
        render_popup(f, app, notice);
    }
}

fn render_timer(f: &mut Frame, app: &App) {
    let bar = &app.config().progress_bar;
    let state = app.engine().state();

    let (color, message) = if state.running {
        (bar.color(state.phase), bar.message(state.phase))
    } else {
        (bar.pause_color.as_str(), bar.pause_msg.as_str())
    };
    let color = parse_color(color);

    let width = app.bar_width() + 4;
    let area = centered_rect(width, 8, f.size());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type(bar))
        .border_style(Style::default().fg(color));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new(message)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        rows[0],
    );

    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(color).bg(Color::Black))
            .ratio(app.engine().progress())
            .label(""),
        rows[2],
    );

    f.render_widget(
        Paragraph::new(status_line(state.remaining, state.n))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center),
        rows[4],
    );
}

fn render_popup(f: &mut Frame, app: &App, notice: &Notice) {
    let (title, color) = match notice.kind {
        NoticeKind::Error => (" Error ", Color::Red),
        NoticeKind::Warning => (" Warning ", Color::Yellow),
        NoticeKind::Info => (" Notice ", Color::Blue),
    };

    let width = (app.config().progress_bar.max_width + 4).min(f.size().width);
    let area = centered_rect(width, POPUP_HEIGHT, f.size());

    let lines = vec![
        Line::from(Span::styled(
            notice.text.as_str(),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter / Esc to dismiss",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ))
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(color)),
            ),
        area,
    );
}

/// `Remaining: MM:SS | #k`, where `k` is the pomodoro number.
pub fn status_line(remaining: TimeDelta, n: u32) -> String {
    let secs = remaining.num_seconds().max(0);
    format!(
        "Remaining: {:02}:{:02} | #{}",
        secs / 60,
        secs % 60,
        n.div_ceil(2)
    )
}

fn border_type(bar: &ProgressBarConfig) -> BorderType {
    match bar.border_type.as_str() {
        "rounded" => BorderType::Rounded,
        "plain" => BorderType::Plain,
        "double" => BorderType::Double,
        _ => BorderType::Thick,
    }
}

/// Colors are validated on load; anything that still fails to parse renders
/// in the terminal's default color.
fn parse_color(value: &str) -> Color {
    Color::from_str(value).unwrap_or(Color::Reset)
}

/// Fixed-size rectangle centered in `r`, shrunk to fit.
fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let w = w.min(r.width);
    let h = h.min(r.height);
    Rect {
        x: r.x + (r.width - w) / 2,
        y: r.y + (r.height - h) / 2,
        width: w,
        height: h,
    }
}
