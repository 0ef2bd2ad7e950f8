mod tui_app;

use std::io;
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tui_app::{
    format_band, format_mw, format_opt_mw, live_countdown, load_bar, load_severity, status_label,
    truncate, AppState, ConnectionStatus,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build HTTP client");

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut timeline_state = TableState::default();
    timeline_state.select(None);

    let result = run_loop(&mut terminal, &mut app, &client, &mut timeline_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    timeline_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(2);
    // Redraw at least once a second so the countdown ticks between refreshes.
    let redraw_interval = Duration::from_secs(1);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, timeline_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO)
            .min(redraw_interval);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.timeline_len().saturating_sub(1);
                            let next = timeline_state.selected().map_or(0, |i| (i + 1).min(max));
                            timeline_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = timeline_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            timeline_state.select(Some(prev));
                        }
                        KeyCode::Esc => timeline_state.select(None),
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, timeline_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | gauge | outlook | timeline | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(3), // capacity gauge
            Constraint::Length(3), // outlook
            Constraint::Min(0),    // timeline
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_gauge(f, app, chunks[1]);
    render_outlook(f, app, chunks[2]);
    render_timeline(f, app, timeline_state, chunks[3]);
    render_footer(f, chunks[4]);
}

fn status_color(status: &str) -> Color {
    match status {
        "CRITICAL" => Color::Red,
        "WARNING" => Color::Yellow,
        _ => Color::Green,
    }
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (conn_text, conn_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            " GridSync · Alberta  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(conn_text, Style::default().fg(conn_color)),
    ];

    if let Some(grid) = &app.grid {
        spans.extend([
            Span::raw("  │  "),
            Span::styled(
                format!("{} MW", format_mw(grid.live.usage_mw)),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  │  "),
            Span::styled(
                status_label(&grid.status),
                Style::default()
                    .fg(status_color(&grid.status))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  │  "),
            Span::styled(
                format!("updated {}", grid.live.last_updated.format("%H:%M:%S UTC")),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        if grid.live.is_mock {
            spans.push(Span::raw("  │  "));
            spans.push(Span::styled(
                "DEMO DATA",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            ));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_gauge(f: &mut Frame, app: &AppState, area: Rect) {
    let (percent, label, color) = match &app.grid {
        Some(grid) => (
            grid.live.capacity_percent.min(100) as u16,
            format!(
                "{}% of {} MW",
                grid.live.capacity_percent,
                format_mw(grid.max_capacity_mw)
            ),
            status_color(&grid.status),
        ),
        None => (0, "—".to_string(), Color::DarkGray),
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(Span::styled(
                    " CAPACITY ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        )
        .gauge_style(Style::default().fg(color))
        .percent(percent)
        .label(label);

    f.render_widget(gauge, area);
}

fn render_outlook(f: &mut Frame, app: &AppState, area: Rect) {
    let line = match &app.grid {
        Some(grid) if !grid.forecast_available => Line::from(Span::styled(
            "Forecast unavailable, showing history only",
            Style::default().fg(Color::DarkGray),
        )),
        Some(grid) => {
            let message = live_countdown(grid.next_risk_window.as_ref(), Utc::now())
                .unwrap_or_else(|| grid.countdown_message.clone());
            let color = match grid.next_risk_window.as_ref().map(|w| w.risk_level.as_str()) {
                Some("critical") => Color::Red,
                Some(_) => Color::Yellow,
                None => Color::Green,
            };
            let mut spans = vec![Span::styled(message, Style::default().fg(color))];
            if let Some(points) = app.health.forecast_points {
                spans.push(Span::styled(
                    format!("  ({points} forecast points)"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled("—", Style::default().fg(Color::DarkGray))),
    };

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " OUTLOOK ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn render_timeline(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["Time", "Actual", "Predicted", "Band", "Load"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .grid
        .iter()
        .flat_map(|g| g.timeline.iter().map(move |p| (g, p)))
        .map(|(g, p)| {
            let value = p.historical_mw.or(p.predicted_mw);
            let color = value.map_or(Color::DarkGray, |mw| status_color(load_severity(mw, g)));
            let time_color = if p.predicted_mw.is_some() {
                Color::White
            } else {
                Color::DarkGray
            };

            Row::new(vec![
                Cell::from(p.label.clone()).style(Style::default().fg(time_color)),
                Cell::from(format_opt_mw(p.historical_mw)).style(Style::default().fg(Color::Cyan)),
                Cell::from(format_opt_mw(p.predicted_mw)),
                Cell::from(format_band(p.lower_bound, p.upper_bound))
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(value.map_or(String::new(), |mw| load_bar(mw, g.max_capacity_mw, 20)))
                    .style(Style::default().fg(color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(15),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " TIMELINE (24h history + forecast) ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll timeline  "),
        Span::styled("auto-refresh: 2s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
