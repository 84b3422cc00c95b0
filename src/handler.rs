use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use study_planner::ApiToken;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Generation(event) => app.handle_generation(event),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popups take every key while open
    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    if app.is_locked() {
        handle_locked(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

/// Without a token only the warning screen is live.
fn handle_locked(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('k') | KeyCode::Char('K') | KeyCode::Enter => {
            app.show_api_key_input = true;
            app.api_key_input.clear();
            app.api_key_input_cursor = 0;
        }
        _ => {}
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_input_cursor = 0;
        }
        // Enter keeps the token for this session; Ctrl-S also saves it
        KeyCode::Enter => submit_api_key(app, false),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            submit_api_key(app, true)
        }
        KeyCode::Backspace => {
            if app.api_key_input_cursor > 0 {
                app.api_key_input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
            app.api_key_input.insert(byte_pos, c);
            app.api_key_input_cursor += 1;
        }
        KeyCode::Left => {
            app.api_key_input_cursor = app.api_key_input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.api_key_input.chars().count();
            app.api_key_input_cursor = (app.api_key_input_cursor + 1).min(char_count);
        }
        _ => {}
    }
}

fn submit_api_key(app: &mut App, remember: bool) {
    if let Some(token) = ApiToken::new(app.api_key_input.as_str()) {
        app.set_api_token(token, remember);
    }
    app.show_api_key_input = false;
    app.api_key_input.clear();
    app.api_key_input_cursor = 0;
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Tab cycles: Input -> Chat -> Sidebar -> Input
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Sidebar,
                FocusPane::Sidebar => FocusPane::Input,
            };
            if app.focus == FocusPane::Input {
                start_editing(app);
            }
        }

        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            start_editing(app);
        }

        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('C') => app.clear_history(),

        _ => match app.focus {
            FocusPane::Sidebar => handle_sidebar(app, key),
            FocusPane::Chat => handle_chat_scroll(app, key),
            FocusPane::Input => {
                if key.code == KeyCode::Enter {
                    start_editing(app);
                }
            }
        },
    }
}

fn start_editing(app: &mut App) {
    app.input_mode = InputMode::Editing;
    app.query_cursor = app.query_input.chars().count();
}

fn handle_sidebar(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_nav_up(),
        KeyCode::Char('l') | KeyCode::Right => app.adjust_selected(1),
        KeyCode::Char('h') | KeyCode::Left => app.adjust_selected(-1),
        // Coarse steps
        KeyCode::Char('L') => app.adjust_selected(10),
        KeyCode::Char('H') => app.adjust_selected(-10),
        KeyCode::Enter | KeyCode::Char(' ') => app.activate_selected(),
        _ => {}
    }
}

fn handle_chat_scroll(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.query_scroll = app.query_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.query_scroll = app.query_scroll.saturating_sub(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = (app.query_chat_height / 2).max(1);
            app.query_scroll = app.query_scroll.saturating_add(half);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = (app.query_chat_height / 2).max(1);
            app.query_scroll = app.query_scroll.saturating_sub(half);
        }
        KeyCode::Char('g') => app.query_scroll = 0,
        KeyCode::Char('G') => app.scroll_query_to_bottom(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Chat;
        }
        KeyCode::Enter => {
            // Input stays put while a generation is streaming
            if app.can_submit() && !app.query_input.trim().is_empty() {
                app.submit_query();
            }
        }
        KeyCode::Backspace => {
            if app.query_cursor > 0 {
                app.query_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.query_input.chars().count();
            if app.query_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.query_cursor = app.query_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.query_input.chars().count();
            app.query_cursor = (app.query_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.query_cursor = 0;
        }
        KeyCode::End => {
            app.query_cursor = app.query_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
            app.query_input.insert(byte_pos, c);
            app.query_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    let in_sidebar = app
        .sidebar_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => {
            app.query_scroll = app.query_scroll.saturating_add(3);
        }
        MouseEventKind::ScrollUp if in_chat => {
            app.query_scroll = app.query_scroll.saturating_sub(3);
        }
        MouseEventKind::ScrollDown if in_sidebar => app.sidebar_nav_down(),
        MouseEventKind::ScrollUp if in_sidebar => app.sidebar_nav_up(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::unlocked_app;
    use crate::app::SidebarItem;
    use study_planner::{ModelConfig, TokenSource};
    use tokio::sync::mpsc;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_char_to_byte_index_handles_multibyte() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_editing_moves_cursor_and_deletes() {
        let (mut app, _rx) = unlocked_app();
        type_text(&mut app, "helo");
        press(&mut app, KeyCode::Left);
        type_text(&mut app, "l");
        assert_eq!(app.query_input, "hello");

        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Delete);
        assert_eq!(app.query_input, "ello");
        assert_eq!(app.query_cursor, 0);
    }

    #[tokio::test]
    async fn test_enter_submits_and_refusal_is_shown() {
        let (mut app, _rx) = unlocked_app();
        type_text(&mut app, "Tell me a joke");
        press(&mut app, KeyCode::Enter);

        assert!(app.query_input.is_empty());
        assert!(app.notice.is_some());
        assert_eq!(app.session.conversation().len(), 2);
    }

    #[test]
    fn test_sidebar_keys_adjust_parameters() {
        let (mut app, _rx) = unlocked_app();
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Tab); // Input -> Chat
        press(&mut app, KeyCode::Tab); // Chat -> Sidebar
        assert_eq!(app.focus, FocusPane::Sidebar);

        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.session.config.temperature, 0.2);

        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_sidebar_item(), SidebarItem::ClearHistory);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.conversation().len(), 1);
    }

    #[test]
    fn test_locked_app_opens_token_popup() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::with_client(None, ModelConfig::default(), tx);

        type_text(&mut app, "study plan");
        assert!(app.query_input.is_empty());
        assert!(!app.show_api_key_input);

        press(&mut app, KeyCode::Char('K'));
        assert!(app.show_api_key_input);
        type_text(&mut app, "r8_abc");
        assert_eq!(app.api_key_input, "r8_abc");

        press(&mut app, KeyCode::Esc);
        assert!(!app.show_api_key_input);
        assert!(app.api_key_input.is_empty());
        assert!(app.is_locked());
    }

    #[test]
    fn test_entered_token_unlocks_for_this_session_only() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::with_client(None, ModelConfig::default(), tx);

        press(&mut app, KeyCode::Char('K'));
        type_text(&mut app, "r8_abc");
        press(&mut app, KeyCode::Enter);

        assert!(!app.is_locked());
        assert!(!app.show_api_key_input);
        assert_eq!(app.token_source, Some(TokenSource::Session));
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn test_blank_token_keeps_app_locked() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::with_client(None, ModelConfig::default(), tx);

        press(&mut app, KeyCode::Char('K'));
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);

        assert!(app.is_locked());
        assert_eq!(app.token_source, None);
    }
}
