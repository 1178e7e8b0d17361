use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use crate::app::{App, BackendStatus, FocusPane, MAX_INPUT_LINES, SUGGESTIONS};
use crate::message::{ChatMessage, ChatRole};
use crate::theme;

const ASSISTANT_LABEL: &str = "GutHealth AI";
const USER_LABEL: &str = "You";
const MIN_BUBBLE_WIDTH: usize = 12;
const PLACEHOLDER: &str = "Ask about your gut health, digestion, or nutrition...";

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str, base: Style) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut current_text), base));
                }
                spans.push(Span::styled(bold_text, base.add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
                if found_close {
                    current_text.push_str("**");
                }
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }
    spans
}

/// Terminal columns taken by `text`; wide glyphs such as CJK and emoji count twice
fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

/// Alternating runs of whitespace and non-whitespace
fn split_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            runs.push(&text[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        runs.push(&text[start..]);
    }
    runs
}

/// Word-wrap text to `width` terminal columns. Explicit line breaks,
/// leading indentation and inner spacing are kept; words wider than a
/// whole line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for raw in text.split('\n') {
        let raw = raw.replace('\t', "    ");
        let body = raw.trim_start();
        let indent = &raw[..raw.len() - body.len()];

        let mut current = String::new();
        let mut current_w = 0;
        if display_width(indent) < width {
            current.push_str(indent);
            current_w = display_width(indent);
        }

        let mut has_word = false;
        let mut gap = "";
        for run in split_runs(body) {
            if run.starts_with(char::is_whitespace) {
                gap = run;
                continue;
            }

            let word_w = display_width(run);
            let gap_w = display_width(gap);
            if current_w + gap_w + word_w <= width {
                current.push_str(gap);
                current.push_str(run);
                current_w += gap_w + word_w;
            } else {
                if has_word {
                    out.push(std::mem::take(&mut current));
                    current_w = 0;
                }
                let mut buf = [0u8; 4];
                for c in run.chars() {
                    let char_w = display_width(c.encode_utf8(&mut buf));
                    if current_w + char_w > width && current_w > 0 {
                        out.push(std::mem::take(&mut current));
                        current_w = 0;
                    }
                    current.push(c);
                    current_w += char_w;
                }
            }
            has_word = true;
            gap = "";
        }

        out.push(current);
    }

    out
}

fn spans_width(spans: &[Span]) -> usize {
    spans.iter().map(Span::width).sum()
}

/// Draw a labelled rounded box around `rows`
fn push_bubble(
    lines: &mut Vec<Line<'static>>,
    label: &str,
    rows: Vec<Vec<Span<'static>>>,
    border: Style,
    alignment: Alignment,
) {
    let label_len = display_width(label);
    let inner = rows
        .iter()
        .map(|row| spans_width(row))
        .max()
        .unwrap_or(0)
        .max(label_len + 2);

    lines.push(
        Line::from(vec![
            Span::styled("╭─ ", border),
            Span::styled(label.to_string(), border.add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {}╮", "─".repeat(inner - label_len - 1)), border),
        ])
        .alignment(alignment),
    );

    for row in rows {
        let padding = inner - spans_width(&row);
        let mut spans = vec![Span::styled("│ ", border)];
        spans.extend(row);
        spans.push(Span::raw(" ".repeat(padding)));
        spans.push(Span::styled(" │", border));
        lines.push(Line::from(spans).alignment(alignment));
    }

    lines.push(
        Line::from(Span::styled(format!("╰{}╯", "─".repeat(inner + 2)), border))
            .alignment(alignment),
    );
}

fn push_message(lines: &mut Vec<Line<'static>>, msg: &ChatMessage, width: usize) {
    // Bubbles take at most three quarters of the transcript width
    let max_inner = (width * 3 / 4).saturating_sub(4).max(MIN_BUBBLE_WIDTH);

    let (label, border, text_style, alignment) = match msg.role {
        ChatRole::User => (USER_LABEL, theme::user_border(), theme::user_text(), Alignment::Right),
        ChatRole::Assistant => (
            ASSISTANT_LABEL,
            theme::assistant_border(),
            theme::assistant_text(),
            Alignment::Left,
        ),
    };

    let rows: Vec<Vec<Span<'static>>> = wrap_text(&msg.content, max_inner)
        .into_iter()
        .map(|line| match msg.role {
            ChatRole::User => vec![Span::styled(line, text_style)],
            ChatRole::Assistant => parse_markdown_line(&line, text_style),
        })
        .collect();

    push_bubble(lines, label, rows, border, alignment);
    lines.push(
        Line::from(Span::styled(format!(" {} ", msg.timestamp), theme::muted()))
            .alignment(alignment),
    );
    lines.push(Line::default());
}

fn push_typing_indicator(lines: &mut Vec<Line<'static>>, frame: u8) {
    // Animated dots: cycles through one, two and three
    let dots = ["•    ", "• •  ", "• • •"][(frame % 3) as usize];
    let rows = vec![vec![Span::styled(
        dots.to_string(),
        Style::default().fg(theme::SAGE).add_modifier(Modifier::BOLD),
    )]];
    push_bubble(lines, ASSISTANT_LABEL, rows, theme::assistant_border(), Alignment::Left);
}

/// Every line of the transcript as it will be drawn at `width` columns
pub fn transcript_lines(
    messages: &[ChatMessage],
    loading: bool,
    animation_frame: u8,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for msg in messages {
        push_message(&mut lines, msg, width);
    }
    if loading {
        push_typing_indicator(&mut lines, animation_frame);
    }
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let input_height = app.input_line_count().clamp(1, MAX_INPUT_LINES) + 2;

    // Main layout: header, body, input, footer
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.chat.shows_suggestions() {
        // Welcome text + heading + six prompts + borders
        let welcome_height = (SUGGESTIONS.len() + 5) as u16;
        let [welcome_area, transcript_area] = Layout::vertical([
            Constraint::Length(welcome_height),
            Constraint::Min(0),
        ])
        .areas(body_area);
        render_welcome(app, frame, welcome_area);
        render_transcript(app, frame, transcript_area);
    } else {
        render_transcript(app, frame, body_area);
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let [brand_area, status_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(14),
    ])
    .areas(area);

    let mut brand = Line::from(vec![
        Span::styled(" GutHealth AI ", Style::default().fg(theme::CREAM).bold()),
        Span::styled(
            "Your digestive wellness companion",
            Style::default().fg(theme::WARM_BEIGE),
        ),
    ]);
    if let BackendStatus::Degraded(reason) = &app.backend_status {
        brand.push_span(Span::styled(
            format!("  ({})", reason),
            Style::default().fg(theme::TERRACOTTA),
        ));
    }
    let header_style = Style::default().bg(theme::FOREST);
    frame.render_widget(Paragraph::new(brand).style(header_style), brand_area);

    let (label, color) = match &app.backend_status {
        BackendStatus::Online => ("Online", theme::SAGE),
        BackendStatus::Degraded(_) => ("Degraded", theme::TERRACOTTA),
        BackendStatus::Offline => ("Offline", Color::Red),
    };
    let status = Line::from(vec![
        Span::styled("♥ ", Style::default().fg(theme::TERRACOTTA)),
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(label, Style::default().fg(theme::CREAM)),
    ])
    .alignment(Alignment::Right);
    frame.render_widget(Paragraph::new(status).style(header_style), status_area);
}

fn render_welcome(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Suggestions;
    let border_color = if focused { theme::SAGE } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(" Welcome to GutHealth AI ", theme::title()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [intro_area, heading_area, list_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(inner);

    let intro = Paragraph::new(
        "Get personalized guidance on digestive wellness, nutrition, and gut health from our AI assistant.",
    )
    .style(theme::muted())
    .wrap(Wrap { trim: true });
    frame.render_widget(intro, intro_area);

    let heading = if focused {
        "Suggested questions:"
    } else {
        "Suggested questions (Tab to pick):"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(heading, theme::title())),
        heading_area,
    );

    let items: Vec<ListItem> = SUGGESTIONS
        .iter()
        .map(|q| ListItem::new(format!(" {} ", q)))
        .collect();

    let mut list = List::new(items).style(theme::user_text());
    if focused {
        list = list.highlight_style(theme::selected()).highlight_symbol("> ");
    }

    frame.render_stateful_widget(list, list_area, &mut app.suggestion_state);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");
    let inner = block.inner(area);

    let lines = transcript_lines(
        app.chat.messages(),
        app.is_loading(),
        app.animation_frame,
        inner.width as usize,
    );

    // Store area and size for mouse hit-testing and scroll calculations
    app.chat_area = Some(area);
    let total = lines.len().min(u16::MAX as usize) as u16;
    app.set_transcript_metrics(total, inner.height);

    let transcript = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(transcript, area);

    if app.chat_total_lines > app.chat_height {
        let mut scrollbar_state = ScrollbarState::new(
            app.chat_total_lines.saturating_sub(app.chat_height) as usize,
        )
        .position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.is_loading();
    let focused = app.focus == FocusPane::Input;

    let (title, border_style) = if loading {
        (" Waiting for GutHealth AI... ", theme::disabled())
    } else if focused {
        (" Ask (Enter to send, Alt+Enter for newline) ", Style::default().fg(theme::SAGE))
    } else {
        (" Ask (Tab to focus) ", Style::default().fg(Color::DarkGray))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);

    if app.input.is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            PLACEHOLDER,
            theme::muted().add_modifier(Modifier::ITALIC),
        ))
        .block(block);
        frame.render_widget(placeholder, area);
    } else {
        let (line, column) = app.input_cursor_position();
        let width = inner.width as usize;
        let height = inner.height as usize;

        // Scroll so the cursor stays visible
        let h_offset = if width > 0 && column >= width { column - width + 1 } else { 0 };
        let v_offset = if height > 0 && line >= height { line - height + 1 } else { 0 };

        let text_style = if loading { theme::disabled() } else { theme::user_text() };
        let input = Paragraph::new(app.input.as_str())
            .style(text_style)
            .block(block)
            .scroll((v_offset as u16, h_offset as u16));
        frame.render_widget(input, area);
    }

    // Show cursor only when the box accepts typing
    if focused && !loading {
        let (line, column) = app.input_cursor_position();
        let width = inner.width as usize;
        let height = inner.height as usize;
        let x = if width > 0 { column.min(width - 1) } else { 0 };
        let y = if height > 0 { line.min(height - 1) } else { 0 };
        frame.set_cursor_position((inner.x + x as u16, inner.y + y as u16));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mode_text = if app.is_loading() { " THINKING " } else { " CHAT " };
    let mode_style = if app.is_loading() {
        Style::default().bg(theme::TERRACOTTA).fg(Color::Black)
    } else {
        Style::default().bg(theme::FOREST).fg(theme::CREAM)
    };

    let mut hints = match app.focus {
        FocusPane::Input => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Alt+Enter ", key_style),
            Span::styled(" newline ", label_style),
        ],
        FocusPane::Suggestions => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" ask ", label_style),
        ],
    };

    if app.chat.shows_suggestions() {
        hints.extend(vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" suggestions ", label_style),
        ]);
    }

    hints.extend(vec![
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(
            if app.focus == FocusPane::Suggestions { " back " } else { " quit " },
            label_style,
        ),
    ]);

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
