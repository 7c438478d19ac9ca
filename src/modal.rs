//! Modal overlay for confirmations, free text and search.
//!
//! While a prompt is pending every key goes here. Cancelling never produces a
//! response; the originating view simply hears nothing back.

use crate::bus::{PendingAction, Prompt, PromptKind, Response, ViewId};
use crossterm::event::{KeyCode, KeyEvent};
use tracing::debug;

pub const MAX_INPUT_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingInput {
    pub origin: ViewId,
    pub prompt: String,
    pub action: PendingAction,
    pub buffer: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ModalState {
    #[default]
    Idle,
    ConfirmPending(PendingInput),
    TextPending(PendingInput),
    SearchPending(PendingInput),
}

impl ModalState {
    fn pending(&self) -> Option<(PromptKind, &PendingInput)> {
        match self {
            ModalState::Idle => None,
            ModalState::ConfirmPending(input) => Some((PromptKind::Confirm, input)),
            ModalState::TextPending(input) => Some((PromptKind::Text, input)),
            ModalState::SearchPending(input) => Some((PromptKind::Search, input)),
        }
    }

    fn buffer_mut(&mut self) -> Option<&mut String> {
        match self {
            ModalState::TextPending(input) | ModalState::SearchPending(input) => {
                Some(&mut input.buffer)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Overlay {
    state: ModalState,
    notice: Option<String>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state != ModalState::Idle
    }

    pub fn open(&mut self, origin: ViewId, prompt: Prompt) {
        if let Some((kind, input)) = self.state.pending() {
            debug!("replacing pending {:?} prompt from {}", kind, input.origin);
        }
        let input = PendingInput {
            origin,
            prompt: prompt.text,
            action: prompt.action,
            buffer: String::new(),
        };
        self.state = match prompt.kind {
            PromptKind::Confirm => ModalState::ConfirmPending(input),
            PromptKind::Text => ModalState::TextPending(input),
            PromptKind::Search => ModalState::SearchPending(input),
        };
    }

    /// Feed a key to the pending prompt; returns the response when one is due
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Response> {
        let (kind, _) = self.state.pending()?;
        match kind {
            PromptKind::Confirm => self.handle_confirm_key(key.code),
            PromptKind::Text | PromptKind::Search => self.handle_text_key(key.code),
        }
    }

    fn handle_confirm_key(&mut self, code: KeyCode) -> Option<Response> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.finish(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.state = ModalState::Idle;
                None
            }
            _ => None,
        }
    }

    fn handle_text_key(&mut self, code: KeyCode) -> Option<Response> {
        match code {
            KeyCode::Char(c) => {
                if let Some(buffer) = self.state.buffer_mut() {
                    if buffer.chars().count() < MAX_INPUT_LEN {
                        buffer.push(c);
                    }
                }
                None
            }
            KeyCode::Backspace => {
                if let Some(buffer) = self.state.buffer_mut() {
                    buffer.pop();
                }
                None
            }
            KeyCode::Enter => {
                let confirmed = self
                    .state
                    .pending()
                    .is_some_and(|(_, input)| !input.buffer.is_empty());
                self.finish(confirmed)
            }
            KeyCode::Esc => {
                self.state = ModalState::Idle;
                None
            }
            _ => None,
        }
    }

    fn finish(&mut self, confirmed: bool) -> Option<Response> {
        let state = std::mem::take(&mut self.state);
        let (kind, input) = match state {
            ModalState::Idle => return None,
            ModalState::ConfirmPending(input) => (PromptKind::Confirm, input),
            ModalState::TextPending(input) => (PromptKind::Text, input),
            ModalState::SearchPending(input) => (PromptKind::Search, input),
        };
        Some(Response {
            origin: input.origin,
            kind,
            action: input.action,
            text: input.buffer,
            confirmed,
        })
    }

    /// Status-line text of the pending prompt
    pub fn prompt_line(&self) -> Option<String> {
        let (kind, input) = self.state.pending()?;
        Some(match kind {
            PromptKind::Confirm => format!("{} (y/n)", input.prompt),
            PromptKind::Text => format!("{}{}", input.prompt, input.buffer),
            PromptKind::Search => format!("/{}", input.buffer),
        })
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(text.into());
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Drop the notice; true when there was one to dismiss
    pub fn dismiss(&mut self) -> bool {
        self.notice.take().is_some()
    }
}
