use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use unichatbot_core::ChatRole;
use crate::app::{App, InputMode, Screen};

/// Parse a line of text and convert **bold** and *italic* markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' {
            // Check for ** (bold)
            if chars.peek().map(|(_, c)| *c) == Some('*') {
                // Consume the second *
                chars.next();

                // Push any accumulated plain text
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;

                while let Some((_, c)) = chars.next() {
                    if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                        chars.next(); // consume second *
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            } else {
                // Single * - could be italic, but for now treat as literal
                current_text.push(c);
            }
        } else {
            current_text.push(c);
        }
    }

    // Push any remaining text
    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
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

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Documents => render_documents_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" UniChatBot ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("[{}] ", app.backend.display_name()),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(app.backend_http.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
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

    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::Documents => " DOCS ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => vec![
            Span::styled(" i ", key_style),
            Span::styled(" ask ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" b ", key_style),
            Span::styled(" backend ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" documents ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Chat, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(if app.can_send() { " send " } else { " sending… " }, label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        (Screen::Documents, InputMode::Normal) => vec![
            Span::styled(" a ", key_style),
            Span::styled(" add file ", label_style),
            Span::styled(" d ", key_style),
            Span::styled(" remove ", label_style),
            Span::styled(" u ", key_style),
            Span::styled(" upload ", label_style),
            Span::styled(" I ", key_style),
            Span::styled(" ingest ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" force reset ", label_style),
            Span::styled(" b ", key_style),
            Span::styled(" backend ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" chat ", label_style),
        ],
        (Screen::Documents, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" add ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" done ", label_style),
        ],
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

fn thinking_line(animation_frame: u8, label: &str) -> Line<'static> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat((animation_frame as usize) + 1);
    Line::from(Span::styled(
        format!("{}{}", label, dots),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    ))
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(chat_border_color))
        .title(format!(" Chat ({}) ", app.session.status().as_str()));

    let messages = app.session.messages();
    let chat_text = if messages.visible().next().is_none() {
        let mut lines = vec![Line::from(Span::styled(
            "Ask me about courses, policies, and more.",
            Style::default().fg(Color::DarkGray),
        ))];
        if app.is_thinking() {
            lines.push(thinking_line(app.animation_frame, "Thinking"));
        }
        Text::from(lines)
    } else {
        let mut lines: Vec<Line> = Vec::new();

        // Empty assistant messages are in-progress placeholders
        for msg in messages.visible() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "Assistant:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    // Split response into lines and parse markdown
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
                ChatRole::System => {
                    lines.push(Line::from(Span::styled(
                        msg.content.clone(),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                }
            }
            lines.push(Line::default());
        }

        if app.is_thinking() {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(thinking_line(app.animation_frame, "Thinking"));
        }

        if let Some(sources) = app.session.sources().filter(|s| !s.is_empty()) {
            let mut spans = vec![Span::styled(
                "Sources: ",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )];
            spans.extend(sources.iter().map(|s| {
                Span::styled(format!("{}  ", s.label()), Style::default().fg(Color::Gray))
            }));
            lines.push(Line::from(spans));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    render_input_line(
        frame,
        input_area,
        &app.query_input,
        app.query_cursor,
        editing,
        " Question ",
        "Type your question…",
    );
}

fn render_documents_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [upload_area, ingest_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(6),
    ])
    .areas(area);

    let [files_area, path_area, upload_status_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(upload_area);

    // Selected files
    let items: Vec<ListItem> = app
        .selection
        .paths()
        .iter()
        .map(|p| ListItem::new(p.display().to_string()))
        .collect();
    let files_title = if app.uploading {
        format!(" Upload PDFs ({}) - uploading ", app.selection.count_label())
    } else {
        format!(" Upload PDFs ({}) ", app.selection.count_label())
    };
    let files = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(files_title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(files, files_area, &mut app.files_state);

    render_input_line(
        frame,
        path_area,
        &app.path_input,
        app.path_cursor,
        app.input_mode == InputMode::Editing,
        " Add PDF path ",
        "Press a, then type a path to a .pdf file",
    );

    let upload_status = if app.uploading {
        thinking_line(app.animation_frame, app.upload_status.trim_end_matches('…'))
    } else {
        Line::from(app.upload_status.clone())
    };
    frame.render_widget(Paragraph::new(upload_status), upload_status_area);

    // Ingest controls
    let check = if app.force_reset { "[x]" } else { "[ ]" };
    let mut ingest_lines = vec![
        Line::from(vec![
            Span::styled("Backend: ", Style::default().fg(Color::Gray)),
            Span::styled(app.backend.display_name(), Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
            Span::raw("   "),
            Span::styled(format!("{} Force reset", check), Style::default().fg(Color::Gray)),
        ]),
        Line::from(Span::styled(
            "Use force reset to rebuild the vector store when changing embeddings or backend.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if app.ingesting {
        ingest_lines.push(thinking_line(app.animation_frame, app.ingest_status.trim_end_matches('…')));
    } else if !app.ingest_status.is_empty() {
        ingest_lines.push(Line::from(app.ingest_status.clone()));
    }

    let ingest = Paragraph::new(ingest_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(" Ingest PDFs "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(ingest, ingest_area);
}

fn render_input_line(
    frame: &mut Frame,
    area: Rect,
    value: &str,
    cursor_pos: usize,
    editing: bool,
    title: &str,
    placeholder: &str,
) {
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Horizontal scroll so the cursor stays visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if value.is_empty() && !editing {
        Paragraph::new(Span::styled(
            placeholder.to_string(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Get the visible slice of the input
        let visible_text: String = value
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(block), area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_markdown_becomes_styled_span() {
        let line = parse_markdown_line("Attendance requires **75%** of sessions");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "75%");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unclosed_bold_stays_literal() {
        let line = parse_markdown_line("a **b");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a **b");
    }
}
