use super::{PAGE_SIZE, RenderState, View, ViewContext};
use crate::bus::{Message, ViewData, ViewId, ViewRequest};
use crate::error::CoreError;
use crate::keys::{self, KeyAction, KeyBinding};
use crate::model::LogChunk;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerMode {
    Buildspec,
    Log,
}

/// Scrollable text: a buildspec or the pages of a build log
#[derive(Debug)]
pub struct PagerView {
    mode: PagerMode,
    build_id: String,
    lines: Vec<String>,
    /// Where the next log page starts
    token: Option<String>,
    /// Latest page fetch; replies to earlier ones are dropped
    request: u64,
    scroll: usize,
}

impl Default for PagerView {
    fn default() -> Self {
        Self {
            mode: PagerMode::Buildspec,
            build_id: String::new(),
            lines: Vec::new(),
            token: None,
            request: 0,
            scroll: 0,
        }
    }
}

impl PagerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &PagerMode {
        &self.mode
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    fn reset(&mut self, mode: PagerMode, build_id: String) {
        self.mode = mode;
        self.build_id = build_id;
        self.lines.clear();
        self.token = None;
        self.scroll = 0;
    }

    fn fetch_page(&mut self, ctx: &ViewContext) {
        self.request += 1;
        let request = self.request;
        let build_id = self.build_id.clone();
        let token = self.token.clone();
        ctx.spawn(ViewId::Pager, "refresh-log", move |service, cache| {
            let Some(build) = cache.build(&build_id) else {
                return Message::error(
                    ViewId::Pager,
                    CoreError::NotReady(format!("build {build_id}")).to_string(),
                );
            };
            match service.fetch_log(&build.logs, token.as_deref()) {
                Ok(chunk) => Message::ViewUpdate(ViewData::Log {
                    build_id,
                    request,
                    chunk,
                }),
                Err(err) => Message::error(ViewId::Pager, err.to_string()),
            }
        });
    }

    fn append(&mut self, chunk: LogChunk) {
        self.lines.extend(chunk.lines);
        if chunk.next_token.is_some() {
            self.token = chunk.next_token;
        }
    }

    fn last_line(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }
}

impl View for PagerView {
    fn id(&self) -> ViewId {
        ViewId::Pager
    }

    fn label(&self) -> String {
        match self.mode {
            PagerMode::Buildspec => "buildspec".to_string(),
            PagerMode::Log => "logs".to_string(),
        }
    }

    fn on_activate(&mut self, request: ViewRequest, ctx: &mut ViewContext) {
        match request {
            ViewRequest::Buildspec { build_id } => {
                self.reset(PagerMode::Buildspec, build_id);
                match ctx.cache.build(&self.build_id) {
                    Some(build) => {
                        self.lines = build.project.buildspec.lines().map(str::to_string).collect();
                    }
                    None => ctx.error(
                        ViewId::Pager,
                        CoreError::NotReady(format!("build {}", self.build_id)).to_string(),
                    ),
                }
            }
            ViewRequest::Log { build_id } => {
                self.reset(PagerMode::Log, build_id);
                self.fetch_page(ctx);
            }
            other => debug!("pager cannot open {:?}", other),
        }
    }

    fn on_data(&mut self, data: ViewData, _ctx: &mut ViewContext) {
        match data {
            ViewData::Log {
                build_id,
                request,
                chunk,
            } if self.mode == PagerMode::Log
                && build_id == self.build_id
                && request == self.request =>
            {
                self.append(chunk);
            }
            other => debug!("pager discarding {:?}", other),
        }
    }

    fn on_input(&mut self, key: KeyAction, ctx: &mut ViewContext) {
        let last = self.last_line();
        match key {
            KeyAction::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyAction::Down => self.scroll = (self.scroll + 1).min(last),
            KeyAction::PageUp => self.scroll = self.scroll.saturating_sub(PAGE_SIZE),
            KeyAction::PageDown => self.scroll = (self.scroll + PAGE_SIZE).min(last),
            KeyAction::Top => self.scroll = 0,
            KeyAction::Bottom => self.scroll = last,
            KeyAction::Back => ctx.emit(Message::Previous { refresh: false }),
            KeyAction::Refresh => self.on_refresh(ctx),
            _ => {}
        }
    }

    fn on_refresh(&mut self, ctx: &mut ViewContext) {
        if self.mode == PagerMode::Log {
            self.fetch_page(ctx);
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect, _state: &RenderState) {
        let title = match self.mode {
            PagerMode::Buildspec => format!(" Buildspec {} ", self.build_id),
            PagerMode::Log => format!(" Build log {} ", self.build_id),
        };
        let percent = if self.lines.len() <= 1 {
            100
        } else {
            self.scroll * 100 / self.last_line()
        };
        let block = Block::default()
            .title(title)
            .title_bottom(format!(" {percent:3}% "))
            .borders(Borders::ALL);
        let text = self.lines.join("\n");
        let scroll = u16::try_from(self.scroll).unwrap_or(u16::MAX);
        frame.render_widget(Paragraph::new(text).block(block).scroll((scroll, 0)), area);
    }

    fn help(&self) -> Vec<KeyBinding> {
        let mut bindings = vec![keys::UP, keys::DOWN, keys::PAGE, keys::BACK];
        if self.mode == PagerMode::Log {
            bindings.push(keys::NEXT_PAGE);
        }
        bindings.extend([keys::HELP, keys::QUIT]);
        bindings
    }
}
