use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::app::{App, Overlay, Screen};
use crate::{splash, theme};

pub fn draw(frame: &mut Frame, app: &App) {
    match app.screen {
        Screen::Splash => draw_splash(frame),
        Screen::Main => draw_main(frame, app),
    }
}

fn draw_main(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(24),
            Constraint::Percentage(46),
            Constraint::Percentage(30),
        ])
        .split(rows[0]);

    draw_projects(frame, app, panels[0]);
    draw_gallery(frame, app, panels[1]);
    draw_actions(frame, panels[2]);
    draw_input(frame, app, rows[1]);
    draw_status(frame, app, rows[2]);

    if app.overlay == Overlay::Progress {
        draw_progress_overlay(frame, app);
    }
}

fn panel_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(theme::TEXT).add_modifier(Modifier::BOLD),
        ))
}

fn draw_projects(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    for (i, project) in app.registry().iter().enumerate() {
        let marker = if i == app.current {
            Span::styled(
                format!(">[{}] {}", i + 1, project.name),
                Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(
                format!(" [{}] {}", i + 1, project.name),
                Style::default().fg(theme::TEXT),
            )
        };
        lines.push(Line::from(marker));
        lines.push(Line::from(Span::styled(
            format!("    {}", project.description),
            Style::default().fg(theme::DIM),
        )));
        lines.push(Line::default());
    }
    frame.render_widget(Paragraph::new(lines).block(panel_block("PROJECTS")), area);
}

fn draw_gallery(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("IMAGES ({})", app.images.len());
    if app.images.is_empty() {
        let hint = Paragraph::new(Span::styled(
            "No images yet. Press [g] to generate.",
            Style::default().fg(theme::DIM),
        ))
        .block(panel_block(&title));
        frame.render_widget(hint, area);
        return;
    }

    let items: Vec<ListItem> = app
        .images
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let shown = if name.chars().count() > 40 {
                let head: String = name.chars().take(40).collect();
                format!("{head}...")
            } else {
                name
            };
            let marker = if app.selected.contains(&i) {
                Span::styled("✓ ", Style::default().fg(theme::SUCCESS))
            } else {
                Span::raw("  ")
            };
            ListItem::new(Line::from(vec![
                marker,
                Span::styled(format!("[{:2}] ", i + 1), Style::default().fg(theme::DIM)),
                Span::styled(shown, Style::default().fg(theme::TEXT)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(panel_block(&title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    state.select(Some(app.cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_actions(frame: &mut Frame, area: Rect) {
    let bindings: &[(&str, &str)] = &[
        ("g", "Generate images"),
        ("b", "Browse exports"),
        ("s", "Select/deselect"),
        ("a", "Select all"),
        ("", ""),
        ("v", "Create video"),
        ("c", "Captions + video"),
        ("o", "Audio info"),
        ("", ""),
        ("1-3", "Switch project"),
        ("d", "Delete selected"),
        ("q", "Quit"),
    ];
    let lines: Vec<Line> = bindings
        .iter()
        .map(|(key, label)| {
            if key.is_empty() {
                Line::default()
            } else {
                Line::from(vec![
                    Span::styled(format!("[{key}] "), Style::default().fg(theme::ACCENT)),
                    Span::styled(*label, Style::default().fg(theme::TEXT)),
                ])
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(panel_block("ACTIONS")), area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let (title, active) = match &app.overlay {
        Overlay::Prompt => ("PROMPT".to_string(), true),
        Overlay::Caption { index, .. } => {
            (format!("CAPTION {}/{}", index + 1, app.selected.len()), true)
        }
        _ => ("PROMPT [g]".to_string(), false),
    };
    let border = if active { theme::ACCENT } else { theme::BORDER };
    let text = if active {
        Line::from(vec![
            Span::styled(app.input.clone(), Style::default().fg(theme::TEXT)),
            Span::styled("█", Style::default().fg(theme::ACCENT)),
        ])
    } else {
        Line::from(Span::styled(
            "Press [g] and type a prompt, then Enter",
            Style::default().fg(theme::DIM),
        ))
    };
    let input = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(Span::styled(
                format!(" {title} "),
                Style::default().fg(theme::TEXT).add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(input, area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.active_job {
        Some(job) => Line::from(Span::styled(
            format!("⏳ {}", job.stage),
            Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
        )),
        None => {
            let color = if app.status.starts_with("Error") {
                theme::ERROR
            } else {
                theme::SUCCESS
            };
            Line::from(Span::styled(
                format!("✓ {}", app.status),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_progress_overlay(frame: &mut Frame, app: &App) {
    let Some(job) = &app.active_job else { return };
    let area = centered_rect(frame.size(), 60, 7);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::ACCENT))
        .title(Span::styled(
            " WORKING ",
            Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Span::styled(
            job.stage.clone(),
            Style::default().fg(theme::TEXT),
        )),
        rows[0],
    );
    if let Some(fraction) = job.progress {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(theme::ACCENT))
            .ratio(f64::from(fraction.clamp(0.0, 1.0)))
            .label(format!("{:3.0}%", fraction * 100.0));
        frame.render_widget(gauge, rows[1]);
    }
    frame.render_widget(
        Paragraph::new(Span::styled(
            "Esc hides this; the job keeps running",
            Style::default().fg(theme::DIM),
        )),
        rows[2],
    );
}

fn draw_splash(frame: &mut Frame) {
    let mut lines: Vec<Line> = splash::BANNER
        .iter()
        .map(|row| Line::from(Span::styled(*row, Style::default().fg(theme::ACCENT))))
        .collect();
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        splash::TAGLINE,
        Style::default().fg(theme::DIM),
    )));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        splash::HINT,
        Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
    )));

    let height = lines.len() as u16;
    let area = centered_rect(frame.size(), 76, height);
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        area,
    );
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
