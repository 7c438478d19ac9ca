//! The single channel every state change travels through.
//!
//! Background producers send on a rendezvous channel; the coordinator is the
//! only receiver. Each message class carries its own payload type, so a view
//! never has to guess what it was handed.

use crate::error::CoreError;
use crate::model::{ActionTarget, LogChunk};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::fmt;

/// The views the dashboard knows how to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    Pipelines,
    Pipeline,
    Build,
    Pager,
}

impl ViewId {
    pub fn name(self) -> &'static str {
        match self {
            ViewId::Pipelines => "pipelines",
            ViewId::Pipeline => "pipeline",
            ViewId::Build => "codebuild",
            ViewId::Pager => "pager",
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Initial data handed to a view when it is pushed
#[derive(Debug, Clone, PartialEq)]
pub enum ViewRequest {
    Pipelines,
    Pipeline { name: String },
    /// Drill into a pipeline action; only some providers have a view
    Action(ActionTarget),
    Buildspec { build_id: String },
    Log { build_id: String },
}

impl ViewRequest {
    pub fn resolve(&self) -> Result<ViewId, CoreError> {
        match self {
            ViewRequest::Pipelines => Ok(ViewId::Pipelines),
            ViewRequest::Pipeline { .. } => Ok(ViewId::Pipeline),
            ViewRequest::Action(target) if target.provider.eq_ignore_ascii_case("codebuild") => {
                Ok(ViewId::Build)
            }
            ViewRequest::Action(target) => {
                Err(CoreError::UnsupportedView(target.provider.to_lowercase()))
            }
            ViewRequest::Buildspec { .. } | ViewRequest::Log { .. } => Ok(ViewId::Pager),
        }
    }

    /// Path segment shown in the breadcrumb
    pub fn label(&self) -> String {
        match self {
            ViewRequest::Pipelines => "pipelines".to_string(),
            ViewRequest::Pipeline { name } => name.clone(),
            ViewRequest::Action(target) => target
                .project()
                .map_or_else(|| target.action.clone(), str::to_string),
            ViewRequest::Buildspec { .. } => "buildspec".to_string(),
            ViewRequest::Log { .. } => "logs".to_string(),
        }
    }
}

/// Freshly fetched data for a view, naming the resource it belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum ViewData {
    Pipelines,
    Pipeline { name: String },
    Build { build_id: String },
    /// `request` numbers the page fetch so only the latest one lands
    Log {
        build_id: String,
        request: u64,
        chunk: LogChunk,
    },
}

impl ViewData {
    pub fn target(&self) -> ViewId {
        match self {
            ViewData::Pipelines => ViewId::Pipelines,
            ViewData::Pipeline { .. } => ViewId::Pipeline,
            ViewData::Build { .. } => ViewId::Build,
            ViewData::Log { .. } => ViewId::Pager,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Confirm,
    Text,
    Search,
}

/// What a prompt is about; handed back verbatim in the response
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    StartPipeline { pipeline: String },
    RetryStage(ActionTarget),
    DisableTransition { pipeline: String, stage: String },
    EnableTransition { pipeline: String, stage: String },
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
    pub action: PendingAction,
}

impl Prompt {
    pub fn confirm(text: impl Into<String>, action: PendingAction) -> Self {
        Self {
            kind: PromptKind::Confirm,
            text: text.into(),
            action,
        }
    }

    pub fn text(text: impl Into<String>, action: PendingAction) -> Self {
        Self {
            kind: PromptKind::Text,
            text: text.into(),
            action,
        }
    }

    pub fn search() -> Self {
        Self {
            kind: PromptKind::Search,
            text: String::new(),
            action: PendingAction::Filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub origin: ViewId,
    pub kind: PromptKind,
    pub action: PendingAction,
    pub text: String,
    /// The operator accepted (or entered a non-empty text)
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Push a new view
    ViewChange { origin: ViewId, request: ViewRequest },
    /// Deliver fetched data to the view it targets
    ViewUpdate(ViewData),
    /// Pop one level, optionally refreshing the view below
    Previous { refresh: bool },
    /// Ask the overlay for confirmation or text
    Input { origin: ViewId, prompt: Prompt },
    /// Result of a modal prompt
    Response(Response),
    /// Show a failure on the status line
    Error { origin: ViewId, text: String },
    /// Re-fetch the data of the given view if it is still active
    Refresh { target: ViewId },
}

impl Message {
    pub fn error(origin: ViewId, text: impl Into<String>) -> Self {
        Message::Error {
            origin,
            text: text.into(),
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Message::ViewChange { .. } => "viewChange",
            Message::ViewUpdate(_) => "viewUpdate",
            Message::Previous { .. } => "previous",
            Message::Input { .. } => "input",
            Message::Response(_) => "response",
            Message::Error { .. } => "error",
            Message::Refresh { .. } => "refresh",
        }
    }
}

/// Rendezvous channel between background producers and the coordinator
pub struct Bus {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Message> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> &Receiver<Message> {
        &self.rx
    }
}
