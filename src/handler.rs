use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Session(event) => {
            app.session.apply(event);
            app.scroll_chat_to_bottom();
        }
        AppEvent::UploadFinished(report) => app.finish_upload(report),
        AppEvent::IngestFinished(status) => app.finish_ingest(status),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (Screen::Chat, InputMode::Editing) => handle_chat_editing(app, key),
        (Screen::Documents, InputMode::Normal) => handle_documents_normal(app, key),
        (Screen::Documents, InputMode::Editing) => handle_path_editing(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('b') => app.cycle_backend(),
        KeyCode::Tab => app.screen = Screen::Documents,
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            // Ignored while an answer is still arriving
            app.submit_question();
        }
        _ => edit_line(&mut app.query_input, &mut app.query_cursor, key),
    }
}

fn handle_documents_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('a') | KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Char('j') | KeyCode::Down => app.files_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.files_nav_up(),
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected_file(),
        KeyCode::Char('u') => app.start_upload(),
        KeyCode::Char('I') => app.start_ingest(),
        KeyCode::Char('r') => app.toggle_force_reset(),
        KeyCode::Char('b') => app.cycle_backend(),
        KeyCode::Tab | KeyCode::Esc => app.screen = Screen::Chat,
        _ => {}
    }
}

fn handle_path_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.add_selected_path(),
        _ => edit_line(&mut app.path_input, &mut app.path_cursor, key),
    }
}

/// Cursor movement and character editing shared by both input boxes
fn edit_line(input: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = input.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = input.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let Some(area) = app.chat_area else {
        return;
    };
    let inside = mouse.column >= area.x
        && mouse.column < area.x + area.width
        && mouse.row >= area.y
        && mouse.row < area.y + area.height;
    if app.screen != Screen::Chat || !inside {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(),
        MouseEventKind::ScrollUp => app.scroll_up(),
        _ => {}
    }
}
