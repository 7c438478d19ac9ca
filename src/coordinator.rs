//! The root loop: the single consumer of the bus.
//!
//! Owns the navigation stack, the modal overlay and every view. All state
//! changes happen here, one message at a time.

use crate::bus::{Bus, Message, ViewId, ViewRequest};
use crate::cache::DataCache;
use crate::keys::{self, KeyAction, KeyBinding};
use crate::modal::Overlay;
use crate::nav::{NavigationStack, truncate_path};
use crate::service::PipelineService;
use crate::tasks::Tasks;
use crate::views::{
    BuildView, PagerView, PipelineView, PipelinesView, RenderState, View, ViewContext,
};
use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, select, tick};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_secs(1);
const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK: Duration = Duration::from_millis(100);
const PATH_PREFIX: &str = "Path: /";

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Pause before refreshing the view revealed by a triggered back
    pub refresh_delay: Duration,
    pub full_help: bool,
    /// Always-on filter for the pipeline listing
    pub extra_filter: Option<String>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            refresh_delay: DEFAULT_REFRESH_DELAY,
            full_help: false,
            extra_filter: None,
        }
    }
}

pub struct Coordinator {
    views: HashMap<ViewId, Box<dyn View>>,
    ctx: ViewContext,
    nav: NavigationStack,
    overlay: Overlay,
    bus: Bus,
    refresh_delay: Duration,
    render_state: RenderState,
    spinner: usize,
    should_quit: bool,
}

impl Coordinator {
    pub fn new(
        service: Arc<PipelineService>,
        cache: Arc<DataCache>,
        options: CoordinatorOptions,
    ) -> Self {
        let bus = Bus::new();
        let ctx = ViewContext::new(service, cache, Tasks::new(bus.sender()));
        let mut views: HashMap<ViewId, Box<dyn View>> = HashMap::new();
        views.insert(
            ViewId::Pipelines,
            Box::new(PipelinesView::new(options.extra_filter)),
        );
        views.insert(ViewId::Pipeline, Box::new(PipelineView::new()));
        views.insert(ViewId::Build, Box::new(BuildView::new()));
        views.insert(ViewId::Pager, Box::new(PagerView::new()));

        Self {
            views,
            ctx,
            nav: NavigationStack::new(),
            overlay: Overlay::new(),
            bus,
            refresh_delay: options.refresh_delay,
            render_state: RenderState {
                full_help: options.full_help,
            },
            spinner: 0,
            should_quit: false,
        }
    }

    /// Producers outside the views (tests, external tooling) send here
    pub fn sender(&self) -> Sender<Message> {
        self.bus.sender()
    }

    pub fn nav(&self) -> &NavigationStack {
        &self.nav
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn active(&self) -> ViewId {
        self.nav.current()
    }

    pub fn refreshing(&self) -> bool {
        self.ctx.tasks.refreshing()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn full_help(&self) -> bool {
        self.render_state.full_help
    }

    /// Activate the root view
    pub fn start(&mut self) {
        info!("starting at {}", self.nav.path());
        if let Some(view) = self.views.get_mut(&ViewId::Pipelines) {
            view.on_activate(ViewRequest::Pipelines, &mut self.ctx);
        }
        self.drain();
    }

    /// Handle one message and everything the views emitted while handling it
    pub fn dispatch(&mut self, message: Message) {
        self.handle(message);
        self.drain();
    }

    fn drain(&mut self) {
        while let Some(next) = self.ctx.next_message() {
            self.handle(next);
        }
    }

    fn handle(&mut self, message: Message) {
        debug!("{} message at {}", message.class(), self.nav.path());
        match message {
            Message::ViewChange { origin, request } => {
                let id = match request.resolve() {
                    Ok(id) if self.views.contains_key(&id) => id,
                    Ok(id) => {
                        self.show_error(origin, format!("unknown view: {id}"));
                        return;
                    }
                    Err(err) => {
                        self.show_error(origin, err.to_string());
                        return;
                    }
                };
                self.nav.push(id, request.label());
                if let Some(view) = self.views.get_mut(&id) {
                    view.on_activate(request, &mut self.ctx);
                }
            }
            Message::ViewUpdate(data) => {
                let target = data.target();
                if target != self.nav.current() {
                    debug!("dropping update for inactive {}", target);
                    return;
                }
                if let Some(view) = self.views.get_mut(&target) {
                    view.on_data(data, &mut self.ctx);
                }
            }
            Message::Previous { refresh } => {
                if !self.nav.pop() {
                    debug!("already at the root");
                    return;
                }
                if refresh {
                    let target = self.nav.current();
                    self.ctx
                        .tasks
                        .defer(self.refresh_delay, Message::Refresh { target });
                }
            }
            Message::Input { origin, prompt } => self.overlay.open(origin, prompt),
            Message::Response(response) => {
                if let Some(view) = self.views.get_mut(&self.nav.current()) {
                    view.on_response(response, &mut self.ctx);
                }
            }
            Message::Error { origin, text } => self.show_error(origin, text),
            Message::Refresh { target } => {
                if target != self.nav.current() {
                    debug!("skipping refresh of inactive {}", target);
                    return;
                }
                if let Some(view) = self.views.get_mut(&target) {
                    view.on_refresh(&mut self.ctx);
                }
            }
        }
    }

    fn show_error(&mut self, origin: ViewId, text: String) {
        warn!("{}: {}", origin, text);
        self.overlay.notify(text);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            info!("Ctrl+C pressed, quitting");
            self.should_quit = true;
            return;
        }
        // A shown error swallows the next key, prompt or not
        if self.overlay.dismiss() {
            return;
        }
        if self.overlay.is_pending() {
            if let Some(response) = self.overlay.handle_key(key) {
                self.dispatch(Message::Response(response));
            }
            return;
        }

        let Some(action) = keys::action(&key) else {
            return;
        };
        match action {
            KeyAction::Quit => {
                info!("Quit requested by user");
                self.should_quit = true;
            }
            KeyAction::Help => self.render_state.full_help = !self.render_state.full_help,
            _ => {
                let ctx = &mut self.ctx;
                if let Some(view) = self.views.get_mut(&self.nav.current()) {
                    view.on_input(action, ctx);
                }
                self.drain();
            }
        }
    }

    /// Wait up to `timeout` for one bus message and handle it
    pub fn pump(&mut self, timeout: Duration) -> Option<&'static str> {
        let message = self.bus.receiver().recv_timeout(timeout).ok()?;
        let class = message.class();
        self.dispatch(message);
        Some(class)
    }

    pub fn run<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        input: Receiver<Event>,
    ) -> Result<()> {
        let bus = self.bus.receiver().clone();
        let ticker = tick(TICK);
        self.start();

        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;
            select! {
                recv(bus) -> message => match message {
                    Ok(message) => self.dispatch(message),
                    Err(_) => break,
                },
                recv(input) -> event => match event {
                    Ok(Event::Key(key)) => self.handle_key(key),
                    Ok(_) => {}
                    Err(_) => {
                        info!("input closed");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    if self.refreshing() {
                        self.spinner = (self.spinner + 1) % SPINNER.len();
                    }
                },
            }
        }
        Ok(())
    }

    pub fn status_line(&self, width: usize) -> String {
        let spinner = if self.refreshing() {
            format!("{} ", SPINNER[self.spinner])
        } else {
            String::new()
        };
        if let Some(prompt) = self.overlay.prompt_line() {
            return format!("{spinner}{prompt}");
        }
        if let Some(notice) = self.overlay.notice() {
            return format!("{spinner}ERROR: {notice} (press any key to continue)");
        }
        let room = width.saturating_sub(spinner.chars().count() + PATH_PREFIX.chars().count());
        format!(
            "{spinner}{PATH_PREFIX}{}",
            truncate_path(&self.nav.path(), room)
        )
    }

    fn help_bindings(&self) -> Vec<KeyBinding> {
        self.views
            .get(&self.nav.current())
            .map(|view| view.help())
            .unwrap_or_default()
    }

    pub fn draw(&self, frame: &mut Frame) {
        let bindings = self.help_bindings();
        let help_lines: Vec<Line> = if self.render_state.full_help {
            bindings
                .chunks(4)
                .map(|chunk| Line::from(keys::short_help(chunk)))
                .collect()
        } else {
            vec![Line::from(keys::short_help(&bindings))]
        };
        let help_height = u16::try_from(help_lines.len()).unwrap_or(1);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),              // Active view
                Constraint::Length(1),           // Status line
                Constraint::Length(help_height), // Help
            ])
            .split(frame.area());

        if let Some(view) = self.views.get(&self.nav.current()) {
            view.render(frame, chunks[0], &self.render_state);
        }
        self.draw_status(frame, chunks[1]);
        frame.render_widget(
            Paragraph::new(help_lines).style(Style::default().fg(Color::DarkGray)),
            chunks[2],
        );
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let text = self.status_line(area.width as usize);
        let style = if self.overlay.is_pending() {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if self.overlay.notice().is_some() {
            Style::default().fg(Color::White).bg(Color::Red)
        } else {
            Style::default().fg(Color::Cyan)
        };
        frame.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), area);
    }
}
