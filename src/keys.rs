use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key means outside of a pending prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Select,
    Back,
    Refresh,
    Search,
    Start,
    Restart,
    Transition,
    Log,
    Help,
    Quit,
}

pub fn action(key: &KeyEvent) -> Option<KeyAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('f') => Some(KeyAction::PageDown),
            KeyCode::Char('b') => Some(KeyAction::PageUp),
            _ => None,
        };
    }
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Up,
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Down,
        KeyCode::PageUp => KeyAction::PageUp,
        KeyCode::PageDown | KeyCode::Char(' ') => KeyAction::PageDown,
        KeyCode::Home | KeyCode::Char('g') => KeyAction::Top,
        KeyCode::End | KeyCode::Char('G') => KeyAction::Bottom,
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => KeyAction::Select,
        KeyCode::Left | KeyCode::Backspace | KeyCode::Char('h') => KeyAction::Back,
        KeyCode::Char('r') => KeyAction::Refresh,
        KeyCode::Char('/') => KeyAction::Search,
        KeyCode::Char('s') => KeyAction::Start,
        KeyCode::Char('S') => KeyAction::Restart,
        KeyCode::Char('t') => KeyAction::Transition,
        KeyCode::Char('L') => KeyAction::Log,
        KeyCode::Char('?') => KeyAction::Help,
        KeyCode::Char('q') => KeyAction::Quit,
        _ => return None,
    };
    Some(action)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub keys: &'static str,
    pub help: &'static str,
}

const fn binding(keys: &'static str, help: &'static str) -> KeyBinding {
    KeyBinding { keys, help }
}

pub const UP: KeyBinding = binding("↑/k", "up");
pub const DOWN: KeyBinding = binding("↓/j", "down");
pub const PAGE: KeyBinding = binding("pgup/pgdn", "page");
pub const SELECT: KeyBinding = binding("enter/→", "select");
pub const BACK: KeyBinding = binding("←/h", "back");
pub const REFRESH: KeyBinding = binding("r", "refresh");
pub const SEARCH: KeyBinding = binding("/", "search");
pub const START: KeyBinding = binding("s", "start pipeline");
pub const RESTART: KeyBinding = binding("S", "retry failed stage");
pub const TRANSITION: KeyBinding = binding("t", "toggle transition");
pub const LOG: KeyBinding = binding("L", "logs");
pub const NEXT_PAGE: KeyBinding = binding("r", "next log page");
pub const HELP: KeyBinding = binding("?", "help");
pub const QUIT: KeyBinding = binding("q", "quit");

/// One-line help: "key desc • key desc"
pub fn short_help(bindings: &[KeyBinding]) -> String {
    bindings
        .iter()
        .map(|b| format!("{} {}", b.keys, b.help))
        .collect::<Vec<_>>()
        .join(" • ")
}
