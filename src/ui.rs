use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use study_planner::model::{SliderRange, MAX_LENGTH, TEMPERATURE, TOP_P};
use study_planner::{ModelChoice, Role};

use crate::app::{App, FocusPane, InputMode, Notice, SidebarItem};

const SIDEBAR_WIDTH: u16 = 34;

/// Style `**bold**` runs in a line of model output. An unmatched `**` is
/// left as literal text.
fn styled_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    let closed = parts.len() % 2 == 1;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if i % 2 == 1 && !(is_last && !closed) {
            if !part.is_empty() {
                spans.push(Span::styled(
                    part.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            }
        } else if i % 2 == 1 {
            spans.push(Span::raw(format!("**{}", part)));
        } else if !part.is_empty() {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

/// Text slider such as `[=====-----]`.
fn slider_bar(value: f64, range: &SliderRange, width: usize) -> String {
    let fraction = ((value - range.min) / (range.max - range.min)).clamp(0.0, 1.0);
    let filled = (fraction * width as f64).round() as usize;
    format!("[{}{}]", "=".repeat(filled), "-".repeat(width - filled))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.is_locked() {
        render_credential_warning(frame, body_area);
    } else {
        let [sidebar_area, chat_area] = Layout::horizontal([
            Constraint::Length(SIDEBAR_WIDTH),
            Constraint::Min(0),
        ])
        .areas(body_area);

        render_sidebar(app, frame, sidebar_area);
        render_chat(app, frame, chat_area);
    }

    render_footer(app, frame, footer_area);

    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = match app.token_source {
        Some(source) => format!(" [token: {}]", source.as_str()),
        None => " [no token]".to_string(),
    };

    let title = Line::from(vec![
        Span::styled(" Llama 2 Study Planner ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(status, Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " TYPING ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let hints: Vec<Span> = if app.show_api_key_input {
        [hint(" Enter ", " use "), hint(" Ctrl-S ", " use and save "), hint(" Esc ", " cancel ")].concat()
    } else if app.show_model_picker {
        [hint(" j/k ", " nav "), hint(" Enter ", " select "), hint(" Esc ", " cancel ")].concat()
    } else if app.is_locked() {
        [hint(" K ", " enter token "), hint(" q ", " quit ")].concat()
    } else if app.input_mode == InputMode::Editing {
        let send = if app.is_generating() { " (generating) " } else { " send " };
        [hint(" Enter ", send), hint(" Tab ", " focus "), hint(" Esc ", " stop typing ")].concat()
    } else {
        let mut hints = vec![hint(" Tab ", " focus ")];
        match app.focus {
            FocusPane::Sidebar => {
                hints.push(hint(" j/k ", " select "));
                hints.push(hint(" h/l ", " adjust "));
                hints.push(hint(" Enter ", " activate "));
            }
            FocusPane::Chat => {
                hints.push(hint(" j/k ", " scroll "));
                hints.push(hint(" g/G ", " top/bottom "));
            }
            FocusPane::Input => {
                hints.push(hint(" i ", " type "));
            }
        }
        hints.push(hint(" M ", " model "));
        hints.push(hint(" C ", " clear chat "));
        hints.push(hint(" q ", " quit "));
        hints.concat()
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Shown instead of the chat when no token is configured.
fn render_credential_warning(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Replicate API token ");

    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "  ⚠  Please enter your API key!",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("  Set REPLICATE_API_TOKEN in your environment (or a .env file) and restart,"),
        Line::from("  or press K to enter a token now. It is kept for this session only"),
        Line::from("  unless you save it to your config file with Ctrl-S."),
    ]);

    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    app.sidebar_area = Some(area);

    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Models and Parameters ");

    let bar_width = (area.width as usize).saturating_sub(14).clamp(4, 20);
    let config = &app.session.config;

    let items: Vec<ListItem> = SidebarItem::all()
        .iter()
        .map(|item| {
            let label = Span::styled(
                format!("{}:", item.label()),
                Style::default().fg(Color::Yellow),
            );
            let lines = match item {
                SidebarItem::Model => vec![
                    Line::from(label),
                    Line::from(format!("  {}", config.model.as_str())),
                ],
                SidebarItem::Temperature => vec![
                    Line::from(vec![label, Span::raw(format!(" {:.2}", config.temperature))]),
                    Line::from(format!("  {}", slider_bar(config.temperature, &TEMPERATURE, bar_width))),
                ],
                SidebarItem::TopP => vec![
                    Line::from(vec![label, Span::raw(format!(" {:.2}", config.top_p))]),
                    Line::from(format!("  {}", slider_bar(config.top_p, &TOP_P, bar_width))),
                ],
                SidebarItem::MaxLength => vec![
                    Line::from(vec![label, Span::raw(format!(" {}", config.max_length))]),
                    Line::from(format!(
                        "  {}",
                        slider_bar(f64::from(config.max_length), &MAX_LENGTH, bar_width)
                    )),
                ],
                SidebarItem::ClearHistory => vec![
                    Line::default(),
                    Line::from(Span::styled(
                        format!("[ {} ]", item.label()),
                        Style::default().fg(Color::Red),
                    )),
                ],
            };
            ListItem::new(lines)
        })
        .collect();

    let highlight = if focused {
        Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight)
        .highlight_symbol(if focused { "> " } else { "  " });

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Chat history on top, input at the bottom
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    app.chat_area = Some(chat_area);
    app.query_chat_height = chat_area.height.saturating_sub(2);
    app.query_chat_width = chat_area.width.saturating_sub(2);

    let chat_focused = app.focus == FocusPane::Chat;
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if chat_focused { Color::Cyan } else { Color::DarkGray }))
        .title(format!(" {} ", app.session.config.model.as_str()));

    let user_label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let assistant_label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    for turn in app.session.conversation().turns() {
        match turn.role {
            Role::User => {
                lines.push(Line::from(Span::styled("You:", user_label)));
                lines.extend(turn.content.lines().map(|l| Line::from(l.to_string())));
            }
            Role::Assistant => {
                lines.push(Line::from(Span::styled("Assistant:", assistant_label)));
                lines.extend(turn.content.lines().map(styled_line));
            }
        }
        lines.push(Line::default());
    }

    if let Some(generation) = &app.generation {
        lines.push(Line::from(Span::styled("Assistant:", assistant_label)));
        if generation.buffer.is_empty() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            lines.extend(generation.buffer.lines().map(styled_line));
        }
        lines.push(Line::default());
    }

    if let Some(notice) = &app.notice {
        let style = match notice {
            Notice::Rejected(_) => Style::default().fg(Color::Red),
            Notice::Failed(_) => Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
        };
        lines.push(Line::from(Span::styled(notice.message(), style)));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.query_scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.is_generating() {
        Color::DarkGray
    } else if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let title = if app.is_generating() {
        " Message (waiting for the answer...) "
    } else {
        " Message "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Centered popup rectangle clamped to the screen.
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let models = ModelChoice::all();
    let popup_area = popup_rect(area, 40, models.len() as u16 + 2);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Choose a Llama2 model ");

    let items: Vec<ListItem> = models
        .iter()
        .map(|model| {
            let style = if *model == app.session.config.model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model.as_str())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 60, 7);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Replicate API Token ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your token. Enter: this session. Ctrl-S: also save.")
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Mask all but the last four characters
    let char_count = app.api_key_input.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let masked_len = char_count - 4;
        let last_four: String = app.api_key_input.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    };

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} characters", char_count))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;
    use study_planner::ModelConfig;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_styled_line_bold_runs() {
        let line = styled_line("Week **one** and **two**");
        assert_eq!(line_text(&line), "Week one and two");
        assert_eq!(line.spans.len(), 4);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_styled_line_unclosed_marker_is_literal() {
        let line = styled_line("a **b");
        assert_eq!(line_text(&line), "a **b");
    }

    #[test]
    fn test_slider_bar() {
        assert_eq!(slider_bar(64.0, &MAX_LENGTH, 4), "[----]");
        assert_eq!(slider_bar(4096.0, &MAX_LENGTH, 4), "[====]");
        assert_eq!(slider_bar(0.505, &TOP_P, 10), "[=====-----]");
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_locked_screen_shows_only_warning() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::with_client(None, ModelConfig::default(), tx);
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Please enter your API key!"));
        assert!(!text.contains("Models and Parameters"));
    }

    #[test]
    fn test_chat_screen_shows_greeting_and_sidebar() {
        let (mut app, _rx) = crate::app::tests::unlocked_app();
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("How may I assist you today?"));
        assert!(text.contains("Models and Parameters"));
        assert!(text.contains("Llama2-7B"));
        assert!(app.chat_area.is_some());
    }
}
