use super::{RenderState, Selection, View, ViewContext, refresh_build, status_style};
use crate::bus::{Message, PendingAction, Prompt, Response, ViewData, ViewId, ViewRequest};
use crate::error::CoreError;
use crate::keys::{self, KeyAction, KeyBinding};
use crate::model::{ActionTarget, BuildDetail};
use crate::views::pipeline::NOT_FAILED;
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use tracing::debug;

pub const INLINE_BUILDSPEC: &str = "Inline BuildSpec, press enter to see it";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Plain,
    Heading,
    Buildspec,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRow {
    pub key: String,
    pub value: String,
    pub kind: RowKind,
}

fn row(key: impl Into<String>, value: impl Into<String>) -> BuildRow {
    BuildRow {
        key: key.into(),
        value: value.into(),
        kind: RowKind::Plain,
    }
}

fn heading(key: &str, value: &str) -> BuildRow {
    BuildRow {
        kind: RowKind::Heading,
        ..row(key, value)
    }
}

fn blank() -> BuildRow {
    row("", "")
}

pub fn build_rows(build: &BuildDetail) -> Vec<BuildRow> {
    let project = &build.project;
    let buildspec = if project.has_inline_buildspec() {
        INLINE_BUILDSPEC.to_string()
    } else {
        project.buildspec.clone()
    };
    let env = &build.environment;
    let log_row = |key: &str, value: &str| BuildRow {
        kind: RowKind::Log,
        ..row(key, value)
    };

    let mut rows = vec![
        row("Project Name", &project.name),
        row("Description", &project.description),
        row("Build Status", &build.status),
        row("Build ID", &build.id),
        BuildRow {
            kind: RowKind::Buildspec,
            ..row("BuildSpec", buildspec)
        },
        blank(),
        row("Source Type", &build.source_type),
        blank(),
        heading("Environment:", ""),
        row("  Compute Type", &env.compute_type),
        row("  Image", &env.image),
        row("  Type", &env.kind),
        row("  Privileged Mode", env.privileged_mode.to_string()),
        blank(),
        BuildRow {
            kind: RowKind::Log,
            ..heading("Logs:", "")
        },
        log_row("  Group Name", &build.logs.group),
        log_row("  Stream Name", build.logs.stream.as_deref().unwrap_or("N/A")),
        blank(),
        heading("Environment Variables:", ""),
    ];
    rows.extend(
        env.variables
            .iter()
            .map(|(name, value)| row(format!("  {name}"), value)),
    );
    rows.push(blank());

    match &build.vpc {
        None => rows.push(heading("VPC Configuration:", "Not configured")),
        Some(vpc) => {
            rows.push(heading("VPC Configuration:", ""));
            rows.push(row("  VPC ID", &vpc.vpc_id));
            rows.push(row("  Subnets IDs", vpc.subnets.join(", ")));
            rows.push(row("  Security Groups IDs", vpc.security_groups.join(", ")));
        }
    }

    rows.push(blank());
    rows.push(heading("Phases:", ""));
    rows.extend(
        build
            .phases
            .iter()
            .map(|phase| row(format!("  {}", phase.kind), &phase.status)),
    );
    rows.push(blank());
    rows.push(heading("Tags:", ""));
    rows.extend(
        project
            .tags
            .iter()
            .map(|(k, v)| row(format!("  {k}"), v)),
    );
    rows
}

/// Key/value details of one build
#[derive(Debug, Default)]
pub struct BuildView {
    target: Option<ActionTarget>,
    build_id: String,
    rows: Vec<BuildRow>,
    selection: Selection,
    loaded: bool,
}

impl BuildView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn rows(&self) -> &[BuildRow] {
        &self.rows
    }

    pub fn select(&mut self, index: usize) {
        self.selection.reset();
        for _ in 0..index {
            self.selection.apply(KeyAction::Down, self.rows.len());
        }
    }

    fn load(&mut self, ctx: &ViewContext) {
        if let Some(build) = ctx.cache.build(&self.build_id) {
            self.rows = build_rows(&build);
            self.loaded = true;
        }
        self.selection.clamp(self.rows.len());
    }

    fn open_pager(&self, kind: RowKind, ctx: &mut ViewContext) {
        let build_id = self.build_id.clone();
        let request = match kind {
            RowKind::Buildspec => ViewRequest::Buildspec { build_id },
            RowKind::Log => ViewRequest::Log { build_id },
            _ => return,
        };
        ctx.emit(Message::ViewChange {
            origin: ViewId::Build,
            request,
        });
    }

    fn failed(&self, ctx: &ViewContext) -> bool {
        ctx.cache
            .build(&self.build_id)
            .is_some_and(|b| b.status.eq_ignore_ascii_case("failed"))
    }
}

impl View for BuildView {
    fn id(&self) -> ViewId {
        ViewId::Build
    }

    fn label(&self) -> String {
        match &self.target {
            Some(target) => target
                .project()
                .map_or_else(|| target.action.clone(), str::to_string),
            None => self.build_id.clone(),
        }
    }

    fn on_activate(&mut self, request: ViewRequest, ctx: &mut ViewContext) {
        let ViewRequest::Action(target) = request else {
            debug!("build view cannot open {:?}", request);
            return;
        };
        let Some(build_id) = target.external_execution_id.clone() else {
            ctx.error(
                ViewId::Build,
                CoreError::NotReady(format!("build of {}", target.action)).to_string(),
            );
            return;
        };
        self.build_id = build_id;
        self.target = Some(target);
        self.rows.clear();
        self.loaded = false;
        self.selection.reset();
        self.load(ctx);
        self.on_refresh(ctx);
    }

    fn on_data(&mut self, data: ViewData, ctx: &mut ViewContext) {
        match data {
            ViewData::Build { build_id } if build_id == self.build_id => self.load(ctx),
            other => debug!("build view {} discarding {:?}", self.build_id, other),
        }
    }

    fn on_input(&mut self, key: KeyAction, ctx: &mut ViewContext) {
        if self.selection.apply(key, self.rows.len()) {
            return;
        }
        match key {
            KeyAction::Back => ctx.emit(Message::Previous { refresh: true }),
            KeyAction::Refresh => self.on_refresh(ctx),
            KeyAction::Log => self.open_pager(RowKind::Log, ctx),
            KeyAction::Select => {
                if let Some(kind) = self.rows.get(self.selection.index()).map(|r| r.kind) {
                    self.open_pager(kind, ctx);
                }
            }
            KeyAction::Restart => {
                let Some(target) = self.target.clone() else {
                    return;
                };
                if self.failed(ctx) {
                    let prompt = Prompt::confirm(
                        format!("Retry stage {}?", target.stage),
                        PendingAction::RetryStage(target),
                    );
                    ctx.prompt(ViewId::Build, prompt);
                } else {
                    ctx.error(ViewId::Build, NOT_FAILED);
                }
            }
            _ => {}
        }
    }

    fn on_response(&mut self, response: Response, ctx: &mut ViewContext) {
        let PendingAction::RetryStage(target) = response.action else {
            return;
        };
        if !response.confirmed {
            return;
        }
        let build_id = self.build_id.clone();
        ctx.spawn(ViewId::Build, "retry-stage", move |service, cache| {
            let Some(execution) = cache.last_execution_id(&target.pipeline) else {
                return Message::error(
                    ViewId::Build,
                    CoreError::NotReady(format!("execution of {}", target.pipeline)).to_string(),
                );
            };
            match service.retry_stage(&execution, &target.pipeline, &target.stage) {
                Ok(()) => refresh_build(service, cache, &build_id),
                Err(err) => Message::error(ViewId::Build, err.to_string()),
            }
        });
    }

    fn on_refresh(&mut self, ctx: &mut ViewContext) {
        let build_id = self.build_id.clone();
        ctx.spawn(ViewId::Build, "refresh-build", move |service, cache| {
            refresh_build(service, cache, &build_id)
        });
    }

    fn render(&self, frame: &mut Frame, area: Rect, _state: &RenderState) {
        let block = Block::default()
            .title(format!(" Build {} ", self.build_id))
            .borders(Borders::ALL);
        if self.rows.is_empty() {
            let text = if self.loaded {
                "No details"
            } else {
                "Loading build..."
            };
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }

        let rows = self.rows.iter().map(|r| {
            let key = match r.kind {
                RowKind::Heading => {
                    Cell::from(r.key.clone()).style(Style::default().add_modifier(Modifier::BOLD))
                }
                _ => Cell::from(r.key.clone()),
            };
            let value = if r.key == "Build Status" {
                Cell::from(r.value.clone()).style(status_style(&r.value))
            } else {
                Cell::from(r.value.clone())
            };
            Row::new(vec![key, value])
        });
        let table = Table::new(rows, [Constraint::Percentage(30), Constraint::Percentage(70)])
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut table_state = TableState::default().with_selected(Some(self.selection.index()));
        frame.render_stateful_widget(table, area, &mut table_state);
    }

    fn help(&self) -> Vec<KeyBinding> {
        vec![
            keys::UP,
            keys::DOWN,
            keys::SELECT,
            keys::BACK,
            keys::LOG,
            keys::RESTART,
            keys::REFRESH,
            keys::HELP,
            keys::QUIT,
        ]
    }
}
