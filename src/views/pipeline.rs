use super::{RenderState, Selection, View, ViewContext, refresh_pipeline, status_style};
use crate::bus::{Message, PendingAction, Prompt, Response, ViewData, ViewId, ViewRequest};
use crate::keys::{self, KeyAction, KeyBinding};
use crate::model::{ActionState, ActionTarget, PipelineDetail, STATUS_FAILED};
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use tracing::debug;

pub const NOT_READY: &str = "Execution not ready... refreshing.";
pub const NOT_FAILED: &str = "Can't restart a stage that has not failed.";

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineRow {
    Stage { name: String, status: String },
    /// Gate into `stage` from the stage before it
    Transition { stage: String, enabled: bool },
    Action { stage: String, action: ActionState },
    Spacer,
}

pub fn build_rows(detail: &PipelineDetail) -> Vec<PipelineRow> {
    let mut rows = Vec::new();
    for (i, stage) in detail.stages.iter().enumerate() {
        if i > 0 {
            rows.push(PipelineRow::Spacer);
            rows.push(PipelineRow::Transition {
                stage: stage.name.clone(),
                enabled: stage.inbound_transition_enabled,
            });
            rows.push(PipelineRow::Spacer);
        }
        rows.push(PipelineRow::Stage {
            name: stage.name.clone(),
            status: stage
                .latest_status
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
        });
        rows.extend(stage.actions.iter().map(|action| PipelineRow::Action {
            stage: stage.name.clone(),
            action: action.clone(),
        }));
    }
    rows
}

/// Stages, transitions and actions of one pipeline
#[derive(Debug, Default)]
pub struct PipelineView {
    name: String,
    rows: Vec<PipelineRow>,
    selection: Selection,
    loaded: bool,
}

impl PipelineView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[PipelineRow] {
        &self.rows
    }

    /// Put the cursor on a row; used when the view is driven without keys
    pub fn select(&mut self, index: usize) {
        self.selection.reset();
        for _ in 0..index {
            self.selection.apply(KeyAction::Down, self.rows.len());
        }
    }

    fn selected(&self) -> Option<&PipelineRow> {
        self.rows.get(self.selection.index())
    }

    fn target(&self, stage: &str, action: &ActionState) -> ActionTarget {
        ActionTarget {
            pipeline: self.name.clone(),
            stage: stage.to_string(),
            action: action.name.clone(),
            provider: action.provider.clone(),
            status: action.status.clone().unwrap_or_default(),
            external_execution_id: action.external_execution_id.clone(),
        }
    }

    fn load(&mut self, ctx: &ViewContext) {
        if let Some(detail) = ctx.cache.pipeline(&self.name).and_then(|e| e.detail) {
            self.rows = build_rows(&detail);
            self.loaded = true;
        }
        self.selection.clamp(self.rows.len());
    }

    fn open_action(&mut self, stage: &str, action: &ActionState, ctx: &mut ViewContext) {
        let target = self.target(stage, action);
        if target.provider.eq_ignore_ascii_case("codebuild")
            && target.external_execution_id.is_none()
        {
            ctx.error(ViewId::Pipeline, NOT_READY);
            self.on_refresh(ctx);
            return;
        }
        ctx.emit(Message::ViewChange {
            origin: ViewId::Pipeline,
            request: ViewRequest::Action(target),
        });
    }

    fn mutate<F>(&self, ctx: &ViewContext, label: &str, mutation: F)
    where
        F: FnOnce(&crate::service::PipelineService, &crate::cache::DataCache) -> crate::error::Result<()>
            + Send
            + 'static,
    {
        let name = self.name.clone();
        ctx.spawn(ViewId::Pipeline, label, move |service, cache| {
            match mutation(service, cache) {
                Ok(()) => refresh_pipeline(service, cache, &name),
                Err(err) => Message::error(ViewId::Pipeline, err.to_string()),
            }
        });
    }
}

impl View for PipelineView {
    fn id(&self) -> ViewId {
        ViewId::Pipeline
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn on_activate(&mut self, request: ViewRequest, ctx: &mut ViewContext) {
        let ViewRequest::Pipeline { name } = request else {
            debug!("pipeline view cannot open {:?}", request);
            return;
        };
        self.name = name;
        self.rows.clear();
        self.loaded = false;
        self.selection.reset();
        self.load(ctx);
        self.on_refresh(ctx);
    }

    fn on_data(&mut self, data: ViewData, ctx: &mut ViewContext) {
        match data {
            ViewData::Pipeline { name } if name == self.name => self.load(ctx),
            other => debug!("pipeline view {} discarding {:?}", self.name, other),
        }
    }

    fn on_input(&mut self, key: KeyAction, ctx: &mut ViewContext) {
        if self.selection.apply(key, self.rows.len()) {
            return;
        }
        match key {
            KeyAction::Back => ctx.emit(Message::Previous { refresh: true }),
            KeyAction::Refresh => self.on_refresh(ctx),
            KeyAction::Start => {
                let prompt = Prompt::confirm(
                    format!("Start pipeline {}?", self.name),
                    PendingAction::StartPipeline {
                        pipeline: self.name.clone(),
                    },
                );
                ctx.prompt(ViewId::Pipeline, prompt);
            }
            KeyAction::Restart => {
                if let Some(PipelineRow::Action { stage, action }) = self.selected() {
                    if action.status.as_deref() == Some(STATUS_FAILED) {
                        let prompt = Prompt::confirm(
                            format!("Retry stage {stage}?"),
                            PendingAction::RetryStage(self.target(stage, action)),
                        );
                        ctx.prompt(ViewId::Pipeline, prompt);
                    } else {
                        ctx.error(ViewId::Pipeline, NOT_FAILED);
                    }
                }
            }
            KeyAction::Transition => {
                if let Some(PipelineRow::Transition { stage, enabled }) = self.selected() {
                    let pipeline = self.name.clone();
                    let stage = stage.clone();
                    let prompt = if *enabled {
                        Prompt::text(
                            format!("Disable transition into {stage}, reason (empty to cancel): "),
                            PendingAction::DisableTransition { pipeline, stage },
                        )
                    } else {
                        Prompt::confirm(
                            format!("Enable transition into {stage}?"),
                            PendingAction::EnableTransition { pipeline, stage },
                        )
                    };
                    ctx.prompt(ViewId::Pipeline, prompt);
                }
            }
            KeyAction::Select => {
                if let Some(PipelineRow::Action { stage, action }) = self.selected().cloned() {
                    self.open_action(&stage, &action, ctx);
                }
            }
            _ => {}
        }
    }

    fn on_response(&mut self, response: Response, ctx: &mut ViewContext) {
        if !response.confirmed {
            return;
        }
        match response.action {
            PendingAction::StartPipeline { pipeline } => {
                self.mutate(ctx, "start-pipeline", move |service, _| {
                    service.start_execution(&pipeline).map(|_| ())
                });
            }
            PendingAction::RetryStage(target) => {
                self.mutate(ctx, "retry-stage", move |service, cache| {
                    let execution = cache.last_execution_id(&target.pipeline).ok_or_else(|| {
                        crate::error::CoreError::NotReady(format!(
                            "execution of {}",
                            target.pipeline
                        ))
                    })?;
                    service.retry_stage(&execution, &target.pipeline, &target.stage)
                });
            }
            PendingAction::DisableTransition { pipeline, stage } => {
                let reason = response.text;
                self.mutate(ctx, "disable-transition", move |service, _| {
                    service.set_transition(&pipeline, &stage, false, Some(&reason))
                });
            }
            PendingAction::EnableTransition { pipeline, stage } => {
                self.mutate(ctx, "enable-transition", move |service, _| {
                    service.set_transition(&pipeline, &stage, true, None)
                });
            }
            PendingAction::Filter => {}
        }
    }

    fn on_refresh(&mut self, ctx: &mut ViewContext) {
        let name = self.name.clone();
        ctx.spawn(ViewId::Pipeline, "refresh-pipeline", move |service, cache| {
            refresh_pipeline(service, cache, &name)
        });
    }

    fn render(&self, frame: &mut Frame, area: Rect, _state: &RenderState) {
        let block = Block::default()
            .title(format!(" {} ", self.name))
            .borders(Borders::ALL);
        if self.rows.is_empty() {
            let text = if self.loaded {
                "No stages"
            } else {
                "Loading stages..."
            };
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }

        let header = Row::new(vec!["Name", "Type", "Stage", "Status", "Last change"]).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        let rows = self.rows.iter().map(|row| match row {
            PipelineRow::Stage { name, status } => Row::new(vec![
                Cell::from(name.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(""),
                Cell::from(""),
                Cell::from(status.clone()).style(status_style(status)),
                Cell::from(""),
            ]),
            PipelineRow::Transition { stage, enabled } => {
                let state = if *enabled { "Enabled" } else { "Disabled" };
                Row::new(vec![
                    Cell::from("-- Transition"),
                    Cell::from("Transition"),
                    Cell::from(stage.clone()),
                    Cell::from(state).style(status_style(state)),
                    Cell::from(""),
                ])
            }
            PipelineRow::Action { stage, action } => {
                let (status, changed) = action.display_status();
                let style = status_style(&status);
                Row::new(vec![
                    Cell::from(format!("└ {}", action.name)),
                    Cell::from(format!("{}/{}", action.provider, action.category)),
                    Cell::from(stage.clone()),
                    Cell::from(status).style(style),
                    Cell::from(changed),
                ])
            }
            PipelineRow::Spacer => Row::new(vec![""; 5]),
        });
        let widths = [
            Constraint::Percentage(25),
            Constraint::Percentage(20),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(25),
        ];
        let table = Table::new(rows, widths)
            .header(header)
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
            keys::START,
            keys::RESTART,
            keys::TRANSITION,
            keys::REFRESH,
            keys::HELP,
            keys::QUIT,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::PromptKind;
    use crate::source::demo;
    use crate::views::testing;
    use std::time::Duration;

    fn open(name: &str) -> (PipelineView, ViewContext, crossbeam_channel::Receiver<Message>) {
        let (mut ctx, rx) = testing::context();
        let mut view = PipelineView::new();
        view.on_activate(
            ViewRequest::Pipeline {
                name: name.to_string(),
            },
            &mut ctx,
        );
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            message,
            Message::ViewUpdate(ViewData::Pipeline {
                name: name.to_string()
            })
        );
        view.on_data(
            ViewData::Pipeline {
                name: name.to_string(),
            },
            &mut ctx,
        );
        (view, ctx, rx)
    }

    fn position(view: &PipelineView, wanted: impl Fn(&PipelineRow) -> bool) -> usize {
        view.rows().iter().position(wanted).unwrap()
    }

    #[test]
    fn test_rows_interleave_transitions() {
        let (view, _ctx, _rx) = open(demo::DEMO_PIPELINE);
        let kinds: Vec<&str> = view
            .rows()
            .iter()
            .map(|row| match row {
                PipelineRow::Stage { .. } => "stage",
                PipelineRow::Transition { .. } => "transition",
                PipelineRow::Action { .. } => "action",
                PipelineRow::Spacer => "",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "stage", "action", "", "transition", "", "stage", "action", "", "transition", "",
                "stage", "action"
            ]
        );
    }

    #[test]
    fn test_stale_detail_is_discarded() {
        let (mut view, mut ctx, _rx) = open(demo::DEMO_PIPELINE);
        let before = view.rows().to_vec();
        view.on_data(
            ViewData::Pipeline {
                name: demo::FAILING_PIPELINE.to_string(),
            },
            &mut ctx,
        );
        assert_eq!(view.rows(), before.as_slice());
        assert_eq!(view.name(), demo::DEMO_PIPELINE);
    }

    #[test]
    fn test_select_codebuild_action_opens_build() {
        let (mut view, mut ctx, _rx) = open(demo::DEMO_PIPELINE);
        let index = position(&view, |row| {
            matches!(row, PipelineRow::Action { action, .. } if action.provider == "CodeBuild")
        });
        view.select(index);
        view.on_input(KeyAction::Select, &mut ctx);
        match ctx.next_message() {
            Some(Message::ViewChange {
                origin,
                request: ViewRequest::Action(target),
            }) => {
                assert_eq!(origin, ViewId::Pipeline);
                assert_eq!(target.external_execution_id.as_deref(), Some(demo::DEMO_BUILD));
                assert_eq!(target.stage, "Build");
            }
            other => panic!("expected a view change, got {other:?}"),
        }
    }

    #[test]
    fn test_action_without_execution_is_not_ready() {
        let (mut view, mut ctx, rx) = open(demo::WAITING_PIPELINE);
        let index = position(&view, |row| {
            matches!(row, PipelineRow::Action { action, .. } if action.name == "Render")
        });
        view.select(index);
        view.on_input(KeyAction::Select, &mut ctx);
        assert_eq!(
            ctx.next_message(),
            Some(Message::error(ViewId::Pipeline, NOT_READY))
        );
        // and a refresh was started
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(message, Message::ViewUpdate(ViewData::Pipeline { .. })));
    }

    #[test]
    fn test_restart_only_failed_actions() {
        let (mut view, mut ctx, _rx) = open(demo::FAILING_PIPELINE);
        let unit = position(&view, |row| {
            matches!(row, PipelineRow::Action { action, .. } if action.name == "Unit")
        });
        view.select(unit);
        view.on_input(KeyAction::Restart, &mut ctx);
        assert_eq!(
            ctx.next_message(),
            Some(Message::error(ViewId::Pipeline, NOT_FAILED))
        );

        view.on_input(KeyAction::Down, &mut ctx);
        view.on_input(KeyAction::Restart, &mut ctx);
        match ctx.next_message() {
            Some(Message::Input { prompt, .. }) => {
                assert_eq!(prompt.kind, PromptKind::Confirm);
                assert!(matches!(prompt.action, PendingAction::RetryStage(ref t) if t.stage == "Test"));
            }
            other => panic!("expected a prompt, got {other:?}"),
        }
    }

    #[test]
    fn test_disable_transition_asks_for_reason() {
        let (mut view, mut ctx, rx) = open(demo::DEMO_PIPELINE);
        let index = position(&view, |row| {
            matches!(row, PipelineRow::Transition { stage, .. } if stage == "Deploy")
        });
        view.select(index);
        view.on_input(KeyAction::Transition, &mut ctx);
        let Some(Message::Input { prompt, .. }) = ctx.next_message() else {
            panic!("expected a prompt");
        };
        assert_eq!(prompt.kind, PromptKind::Text);

        view.on_response(
            Response {
                origin: ViewId::Pipeline,
                kind: PromptKind::Text,
                action: prompt.action,
                text: "release freeze".to_string(),
                confirmed: true,
            },
            &mut ctx,
        );
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        view.on_data(
            match message {
                Message::ViewUpdate(data) => data,
                other => panic!("expected an update, got {other:?}"),
            },
            &mut ctx,
        );
        assert!(view.rows().contains(&PipelineRow::Transition {
            stage: "Deploy".to_string(),
            enabled: false,
        }));
    }

    #[test]
    fn test_back_refreshes_parent() {
        let (mut view, mut ctx, _rx) = open(demo::DEMO_PIPELINE);
        view.on_input(KeyAction::Back, &mut ctx);
        assert_eq!(ctx.next_message(), Some(Message::Previous { refresh: true }));
    }
}
