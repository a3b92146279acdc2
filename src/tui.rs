use crossterm::event::KeyCode;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

use crate::fmt::money;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const AMOUNT_POS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const AMOUNT_NEG_STYLE: Style = Style::new().fg(Color::Red);

pub const ERROR_STYLE: Style = Style::new().fg(Color::Red);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);

/// Format an amount as a colored Span (green for savings, red for spend).
/// Shows absolute value; color conveys the sign.
pub fn money_span(amount: f64) -> Span<'static> {
    let style = if amount < 0.0 {
        AMOUNT_NEG_STYLE
    } else {
        AMOUNT_POS_STYLE
    };
    Span::styled(money(amount.abs()), style)
}

/// Signed amount, colored by sign. For figures that can legitimately go negative.
pub fn signed_money_span(amount: f64) -> Span<'static> {
    let style = if amount < 0.0 {
        AMOUNT_NEG_STYLE
    } else {
        AMOUNT_POS_STYLE
    };
    Span::styled(money(amount), style)
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

/// Restore the terminal before the default panic output.
pub fn install_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));
}

#[derive(Debug, PartialEq, Eq)]
pub enum InputAction {
    Continue,
    Submit,
    Cancel,
}

/// Single-line text field edited in place.
#[derive(Debug, Default)]
pub struct LineInput {
    pub cursor: usize,
}

impl LineInput {
    /// Apply a key to `buf`. Cursor is a char index.
    pub fn handle_key(&mut self, buf: &mut String, code: KeyCode) -> InputAction {
        self.cursor = self.cursor.min(buf.chars().count());
        match code {
            KeyCode::Enter => return InputAction::Submit,
            KeyCode::Esc => return InputAction::Cancel,
            KeyCode::Char(c) => {
                let at = byte_index(buf, self.cursor);
                buf.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let at = byte_index(buf, self.cursor);
                buf.remove(at);
            }
            KeyCode::Delete if self.cursor < buf.chars().count() => {
                let at = byte_index(buf, self.cursor);
                buf.remove(at);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(buf.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = buf.chars().count(),
            _ => {}
        }
        InputAction::Continue
    }

    /// Put the cursor after the last char of `buf`.
    pub fn reset(&mut self, buf: &str) {
        self.cursor = buf.chars().count();
    }
}

fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        let (wrapped, lines) = wrap_text("one two three four", 9);
        assert_eq!(lines, 2);
        assert!(wrapped.contains('\n'));
        assert_eq!(wrap_text("abc", 0), ("abc".to_string(), 1));
    }

    #[test]
    fn test_line_input_editing() {
        let mut buf = String::new();
        let mut input = LineInput::default();
        for c in "caf".chars() {
            input.handle_key(&mut buf, KeyCode::Char(c));
        }
        input.handle_key(&mut buf, KeyCode::Char('é'));
        assert_eq!(buf, "café");
        input.handle_key(&mut buf, KeyCode::Left);
        input.handle_key(&mut buf, KeyCode::Backspace);
        assert_eq!(buf, "caé");
        input.handle_key(&mut buf, KeyCode::Home);
        input.handle_key(&mut buf, KeyCode::Delete);
        assert_eq!(buf, "aé");
        assert_eq!(input.handle_key(&mut buf, KeyCode::Enter), InputAction::Submit);
        assert_eq!(input.handle_key(&mut buf, KeyCode::Esc), InputAction::Cancel);
    }

    #[test]
    fn test_signed_money_span_keeps_sign() {
        let span = signed_money_span(-100.0);
        assert_eq!(span.content, "-$100.00");
        assert_eq!(span.style, AMOUNT_NEG_STYLE);
        assert_eq!(signed_money_span(42.5).content, "$42.50");
        assert_eq!(money_span(-100.0).content, "$100.00");
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut buf = "x".to_string();
        let mut input = LineInput::default();
        input.handle_key(&mut buf, KeyCode::Backspace);
        assert_eq!(buf, "x");
    }
}
