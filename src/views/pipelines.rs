use super::{RenderState, Selection, View, ViewContext, refresh_pipelines, status_style};
use crate::bus::{Message, PendingAction, Prompt, Response, ViewData, ViewId, ViewRequest};
use crate::keys::{self, KeyAction, KeyBinding};
use crate::model::{PipelineSummary, print_time};
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use tracing::debug;

/// Root listing of every pipeline
#[derive(Debug, Default)]
pub struct PipelinesView {
    rows: Vec<PipelineSummary>,
    /// Always applied, e.g. from a profile
    extra_filter: Option<String>,
    /// Interactive search; cleared with an empty search
    search: Option<String>,
    selection: Selection,
    loaded: bool,
}

fn columns(summary: &PipelineSummary) -> [String; 4] {
    let last = summary
        .last_execution
        .as_ref()
        .and_then(|e| e.last_update.as_ref())
        .map(print_time)
        .unwrap_or_default();
    [
        summary.name.clone(),
        summary.triggered_by(),
        summary.status().to_string(),
        last,
    ]
}

fn row_matches(columns: &[String; 4], filter: Option<&str>) -> bool {
    filter.is_none_or(|f| columns.iter().any(|c| c.contains(f)))
}

impl PipelinesView {
    pub fn new(extra_filter: Option<String>) -> Self {
        Self {
            extra_filter,
            ..Self::default()
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn selected_index(&self) -> usize {
        self.selection.index()
    }

    /// Rows left after the profile filter and the search
    pub fn visible(&self) -> Vec<&PipelineSummary> {
        self.rows
            .iter()
            .filter(|summary| {
                let columns = columns(summary);
                row_matches(&columns, self.extra_filter.as_deref())
                    && row_matches(&columns, self.search.as_deref())
            })
            .collect()
    }

    pub fn selected(&self) -> Option<&PipelineSummary> {
        self.visible().get(self.selection.index()).copied()
    }
}

impl View for PipelinesView {
    fn id(&self) -> ViewId {
        ViewId::Pipelines
    }

    fn label(&self) -> String {
        crate::nav::ROOT_LABEL.to_string()
    }

    fn on_activate(&mut self, _request: ViewRequest, ctx: &mut ViewContext) {
        self.rows = ctx.cache.pipelines();
        self.on_refresh(ctx);
    }

    fn on_data(&mut self, data: ViewData, ctx: &mut ViewContext) {
        if data != ViewData::Pipelines {
            debug!("pipelines view ignoring {:?}", data);
            return;
        }
        self.rows = ctx.cache.pipelines();
        self.loaded = true;
        let len = self.visible().len();
        self.selection.clamp(len);
    }

    fn on_input(&mut self, key: KeyAction, ctx: &mut ViewContext) {
        let len = self.visible().len();
        if self.selection.apply(key, len) {
            return;
        }
        match key {
            KeyAction::Select => {
                if let Some(summary) = self.selected() {
                    let request = ViewRequest::Pipeline {
                        name: summary.name.clone(),
                    };
                    ctx.emit(Message::ViewChange {
                        origin: ViewId::Pipelines,
                        request,
                    });
                }
            }
            KeyAction::Start => {
                if let Some(summary) = self.selected() {
                    let prompt = Prompt::confirm(
                        format!("Start pipeline {}?", summary.name),
                        PendingAction::StartPipeline {
                            pipeline: summary.name.clone(),
                        },
                    );
                    ctx.prompt(ViewId::Pipelines, prompt);
                }
            }
            KeyAction::Search => ctx.prompt(ViewId::Pipelines, Prompt::search()),
            KeyAction::Refresh => self.on_refresh(ctx),
            _ => {}
        }
    }

    fn on_response(&mut self, response: Response, ctx: &mut ViewContext) {
        match response.action {
            PendingAction::Filter => {
                self.search = response.confirmed.then_some(response.text);
                self.selection.reset();
            }
            PendingAction::StartPipeline { pipeline } if response.confirmed => {
                ctx.spawn(ViewId::Pipelines, "start-pipeline", move |service, cache| {
                    match service.start_execution(&pipeline) {
                        Ok(_) => refresh_pipelines(service, cache),
                        Err(err) => Message::error(ViewId::Pipelines, err.to_string()),
                    }
                });
            }
            other => debug!("pipelines view ignoring response for {:?}", other),
        }
    }

    fn on_refresh(&mut self, ctx: &mut ViewContext) {
        ctx.spawn(ViewId::Pipelines, "refresh-pipelines", refresh_pipelines);
    }

    fn render(&self, frame: &mut Frame, area: Rect, _state: &RenderState) {
        let visible = self.visible();
        let mut title = format!(" Pipelines ({}/{}) ", visible.len(), self.rows.len());
        if let Some(search) = &self.search {
            title.push_str(&format!("[/{search}] "));
        }
        let block = Block::default().title(title).borders(Borders::ALL);

        if visible.is_empty() {
            let text = if self.loaded {
                "No pipelines found"
            } else {
                "Loading pipelines..."
            };
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }

        let header = Row::new(vec!["Name", "User", "Status", "Last execution"]).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        let rows = visible.iter().map(|summary| {
            let [name, user, status, last] = columns(summary);
            let style = status_style(&status);
            Row::new(vec![
                Cell::from(name),
                Cell::from(user),
                Cell::from(status).style(style),
                Cell::from(last),
            ])
        });
        let widths = [
            Constraint::Percentage(40),
            Constraint::Percentage(20),
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
            keys::START,
            keys::SEARCH,
            keys::REFRESH,
            keys::HELP,
            keys::QUIT,
        ]
    }
}
