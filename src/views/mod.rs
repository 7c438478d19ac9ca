//! The screens of the dashboard.
//!
//! Views run on the coordinator thread and must never block. Anything that
//! talks to the source is handed to [`ViewContext::spawn`] and comes back
//! later as a message.

pub mod build;
pub mod pager;
pub mod pipeline;
pub mod pipelines;

use crate::bus::{Message, Prompt, Response, ViewData, ViewId, ViewRequest};
use crate::cache::DataCache;
use crate::keys::{KeyAction, KeyBinding};
use crate::service::PipelineService;
use crate::tasks::Tasks;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use std::collections::VecDeque;
use std::sync::Arc;

pub use build::BuildView;
pub use pager::PagerView;
pub use pipeline::PipelineView;
pub use pipelines::PipelinesView;

/// What views get to work with
pub struct ViewContext {
    pub service: Arc<PipelineService>,
    pub cache: Arc<DataCache>,
    pub tasks: Tasks,
    outbox: VecDeque<Message>,
}

impl ViewContext {
    pub fn new(service: Arc<PipelineService>, cache: Arc<DataCache>, tasks: Tasks) -> Self {
        Self {
            service,
            cache,
            tasks,
            outbox: VecDeque::new(),
        }
    }

    /// Queue a message for the coordinator; handled after the current one
    pub fn emit(&mut self, message: Message) {
        self.outbox.push_back(message);
    }

    pub fn prompt(&mut self, origin: ViewId, prompt: Prompt) {
        self.emit(Message::Input { origin, prompt });
    }

    pub fn error(&mut self, origin: ViewId, text: impl Into<String>) {
        self.emit(Message::error(origin, text));
    }

    pub fn next_message(&mut self) -> Option<Message> {
        self.outbox.pop_front()
    }

    /// Run `job` in the background; its result is delivered over the bus
    pub fn spawn<F>(&self, origin: ViewId, label: &str, job: F)
    where
        F: FnOnce(&PipelineService, &DataCache) -> Message + Send + 'static,
    {
        let service = self.service.clone();
        let cache = self.cache.clone();
        self.tasks
            .spawn(origin, label, move || job(&service, &cache));
    }
}

/// Presentation flags owned by the coordinator
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderState {
    pub full_help: bool,
}

pub trait View {
    fn id(&self) -> ViewId;

    /// Breadcrumb segment
    fn label(&self) -> String;

    /// Pushed onto the navigation stack with its initial data
    fn on_activate(&mut self, request: ViewRequest, ctx: &mut ViewContext);

    /// Fresh data has landed in the cache
    fn on_data(&mut self, data: ViewData, ctx: &mut ViewContext);

    fn on_input(&mut self, key: KeyAction, ctx: &mut ViewContext);

    /// Answer to a prompt this view opened
    fn on_response(&mut self, _response: Response, _ctx: &mut ViewContext) {}

    fn on_refresh(&mut self, ctx: &mut ViewContext);

    fn render(&self, frame: &mut Frame, area: Rect, state: &RenderState);

    fn help(&self) -> Vec<KeyBinding>;
}

/// Cursor over a list of rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    index: usize,
}

pub const PAGE_SIZE: usize = 10;

impl Selection {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Keep the cursor on a row after the list changed
    pub fn clamp(&mut self, len: usize) {
        self.index = self.index.min(len.saturating_sub(1));
    }

    /// Apply a movement key; returns false for keys that don't move
    pub fn apply(&mut self, key: KeyAction, len: usize) -> bool {
        let last = len.saturating_sub(1);
        self.index = match key {
            KeyAction::Up => self.index.saturating_sub(1),
            KeyAction::Down => (self.index + 1).min(last),
            KeyAction::PageUp => self.index.saturating_sub(PAGE_SIZE),
            KeyAction::PageDown => (self.index + PAGE_SIZE).min(last),
            KeyAction::Top => 0,
            KeyAction::Bottom => last,
            _ => return false,
        };
        true
    }
}

pub fn status_style(status: &str) -> Style {
    match status.to_ascii_lowercase().as_str() {
        "succeeded" | "enabled" => Style::default().fg(Color::Green),
        "failed" | "stopped" | "disabled" | "fault" | "timed_out" => {
            Style::default().fg(Color::Red)
        }
        "inprogress" | "in_progress" | "pending" | "stopping" => {
            Style::default().fg(Color::Yellow)
        }
        _ => Style::default().fg(Color::Gray),
    }
}

/// Re-fetch the pipeline listing and store it
pub fn refresh_pipelines(service: &PipelineService, cache: &DataCache) -> Message {
    match service.fetch_list() {
        Ok(list) => {
            cache.replace_pipelines(list);
            Message::ViewUpdate(ViewData::Pipelines)
        }
        Err(err) => Message::error(ViewId::Pipelines, err.to_string()),
    }
}

/// Re-fetch one pipeline's stages and store them
pub fn refresh_pipeline(service: &PipelineService, cache: &DataCache, name: &str) -> Message {
    match service.fetch_detail(name) {
        Ok(detail) => {
            cache.store_detail(detail);
            Message::ViewUpdate(ViewData::Pipeline {
                name: name.to_string(),
            })
        }
        Err(err) => Message::error(ViewId::Pipeline, err.to_string()),
    }
}

pub fn refresh_build(service: &PipelineService, cache: &DataCache, build_id: &str) -> Message {
    match service.fetch_build(build_id) {
        Ok(build) => {
            cache.store_build(build);
            Message::ViewUpdate(ViewData::Build {
                build_id: build_id.to_string(),
            })
        }
        Err(err) => Message::error(ViewId::Build, err.to_string()),
    }
}
