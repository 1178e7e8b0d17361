use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_exchange().await;
            app.poll_health().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any focus
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::PageUp => {
            app.scroll_half_page_up();
            return;
        }
        KeyCode::PageDown => {
            app.scroll_half_page_down();
            return;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.toggle_focus();
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Input => handle_input_key(app, key),
        FocusPane::Suggestions => handle_suggestions_key(app, key),
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        // Shift+Enter only arrives distinctly with keyboard enhancement; Alt+Enter works everywhere
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.insert_newline();
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.insert_char(c);
        }
        _ => {}
    }
}

fn handle_suggestions_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.focus = FocusPane::Input,
        KeyCode::Char('j') | KeyCode::Down => app.suggestion_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.suggestion_nav_up(),
        KeyCode::Enter => {
            app.submit_suggestion();
        }
        KeyCode::Char('q') => app.should_quit = true,
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
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{app_with, wait_for_settle, EchoBackend, StalledBackend};
    use crate::app::SUGGESTIONS;
    use crate::message::ChatRole;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};
    use std::sync::Arc;

    fn key(code: KeyCode) -> AppEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_enter_submits_and_tick_settles() {
        let mut app = app_with(Arc::new(EchoBackend));
        type_text(&mut app, "gut-brain?").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert!(app.is_loading());
        assert_eq!(app.chat.messages().len(), 2);

        for _ in 0..200 {
            handle_event(&mut app, AppEvent::Tick).await.unwrap();
            if !app.is_loading() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!app.is_loading());
        let last = app.chat.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, "echo: gut-brain?");
    }

    #[tokio::test]
    async fn test_modified_enter_inserts_newline() {
        let mut app = app_with(Arc::new(EchoBackend));
        type_text(&mut app, "line one").await;
        handle_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::SHIFT)).await.unwrap();
        type_text(&mut app, "two").await;
        handle_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::ALT)).await.unwrap();

        assert_eq!(app.input, "line one\ntwo\n");
        assert_eq!(app.chat.messages().len(), 1);

        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.chat.messages()[1].content, "line one\ntwo");
        wait_for_settle(&mut app).await;
    }

    #[tokio::test]
    async fn test_enter_on_blank_input_does_nothing() {
        let mut app = app_with(Arc::new(EchoBackend));
        type_text(&mut app, "   ").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.chat.messages().len(), 1);
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_typing_ignored_while_waiting() {
        let mut app = app_with(Arc::new(StalledBackend));
        type_text(&mut app, "hi").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        type_text(&mut app, "more").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.input.is_empty());
        assert_eq!(app.chat.messages().len(), 2);
        app.shutdown();
    }

    #[tokio::test]
    async fn test_suggestion_flow() {
        let mut app = app_with(Arc::new(EchoBackend));
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.focus, FocusPane::Suggestions);

        handle_event(&mut app, key(KeyCode::Char('j'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.chat.messages()[1].content, SUGGESTIONS[1]);
        assert_eq!(app.focus, FocusPane::Input);
        wait_for_settle(&mut app).await;
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let mut app = app_with(Arc::new(EchoBackend));
        handle_event(&mut app, key_with(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert!(app.should_quit);

        let mut app = app_with(Arc::new(EchoBackend));
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert!(!app.should_quit);
        assert_eq!(app.focus, FocusPane::Input);
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_resize_leaves_state_alone() {
        let mut app = app_with(Arc::new(EchoBackend));
        type_text(&mut app, "kefir").await;
        handle_event(&mut app, AppEvent::Resize).await.unwrap();
        assert_eq!(app.input, "kefir");
        assert!(!app.should_quit);
        assert_eq!(app.chat.messages().len(), 1);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 3, 10, 5);
        assert!(point_in_rect(2, 3, rect));
        assert!(point_in_rect(11, 7, rect));
        assert!(!point_in_rect(12, 7, rect));
        assert!(!point_in_rect(5, 8, rect));
    }
}
