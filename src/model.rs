//! Snapshots of remote pipeline resources.
//!
//! These are plain data: what a source returned at some point in time. They
//! derive serde so a session can be recorded and replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type Tags = BTreeMap<String, String>;

pub const STATUS_UNKNOWN: &str = "Unknown";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_IN_PROGRESS: &str = "InProgress";

/// The most recent execution of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: String,
    pub status: String,
    /// Who or what triggered the run, usually an ARN-like path
    pub trigger: String,
    pub last_update: Option<DateTime<Utc>>,
}

/// One row of the pipeline listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub name: String,
    pub last_execution: Option<ExecutionSummary>,
    /// `None` when tags were not requested or could not be fetched
    pub tags: Option<Tags>,
}

impl PipelineSummary {
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_execution: None,
            tags: None,
        }
    }

    pub fn status(&self) -> &str {
        self.last_execution
            .as_ref()
            .map_or(STATUS_UNKNOWN, |e| e.status.as_str())
    }

    /// Short name of whoever triggered the last execution
    pub fn triggered_by(&self) -> String {
        let Some(execution) = &self.last_execution else {
            return String::new();
        };
        let user = execution
            .trigger
            .rsplit('/')
            .next()
            .unwrap_or_default();
        if user.starts_with("AWSCodeBuild") {
            "CodeBuild".to_string()
        } else {
            user.to_string()
        }
    }

    pub fn last_execution_id(&self) -> Option<&str> {
        self.last_execution.as_ref().map(|e| e.id.as_str())
    }
}

/// Structure and current state of a single pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDetail {
    pub name: String,
    pub stages: Vec<StageState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    pub name: String,
    pub inbound_transition_enabled: bool,
    pub latest_status: Option<String>,
    pub actions: Vec<ActionState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    pub name: String,
    pub provider: String,
    pub category: String,
    pub status: Option<String>,
    pub last_status_change: Option<DateTime<Utc>>,
    /// Id of the build/job the action started; absent until the backend assigns it
    pub external_execution_id: Option<String>,
}

impl ActionState {
    /// Status and last-change columns as displayed in the pipeline view
    pub fn display_status(&self) -> (String, String) {
        match (self.category.as_str(), &self.status, &self.last_status_change) {
            ("Approval", Some(status), None) if status == STATUS_IN_PROGRESS => {
                ("Pending".to_string(), "N/A".to_string())
            }
            ("Approval", status, changed) => (
                status.clone().unwrap_or_else(|| "Waiting".to_string()),
                changed.as_ref().map_or_else(|| "N/A".to_string(), print_time),
            ),
            (_, Some(status), Some(changed)) => (status.clone(), print_time(changed)),
            _ => ("Waiting".to_string(), "...".to_string()),
        }
    }
}

/// Everything needed to open the view of one pipeline action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTarget {
    pub pipeline: String,
    pub stage: String,
    pub action: String,
    pub provider: String,
    pub status: String,
    pub external_execution_id: Option<String>,
}

impl ActionTarget {
    /// Project part of a `project:uuid` build id
    pub fn project(&self) -> Option<&str> {
        self.external_execution_id
            .as_deref()
            .map(|id| id.split(':').next().unwrap_or(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDetail {
    pub id: String,
    pub status: String,
    pub project: ProjectInfo,
    pub source_type: String,
    pub environment: BuildEnvironment,
    pub logs: LogLocation,
    pub vpc: Option<VpcConfig>,
    pub phases: Vec<BuildPhase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
    pub buildspec: String,
    #[serde(default)]
    pub tags: Tags,
}

impl ProjectInfo {
    pub fn has_inline_buildspec(&self) -> bool {
        self.buildspec.starts_with("version:")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub compute_type: String,
    pub image: String,
    pub kind: String,
    pub privileged_mode: bool,
    #[serde(default)]
    pub variables: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLocation {
    pub group: String,
    pub stream: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    pub vpc_id: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPhase {
    pub kind: String,
    pub status: String,
}

/// A page of log lines and the token to continue from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChunk {
    pub lines: Vec<String>,
    pub next_token: Option<String>,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.status())
    }
}

pub fn print_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}
