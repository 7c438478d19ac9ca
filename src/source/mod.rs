//! Where pipeline data comes from.
//!
//! The dashboard only ever talks to a [`PipelineSource`]. Calls block, so
//! they belong on background threads.

pub mod demo;
pub mod record;
pub mod replay;

use crate::error::SourceError;
use crate::model::{BuildDetail, ExecutionSummary, LogChunk, PipelineDetail, Tags};

pub use record::RecordingSource;
pub use replay::{Recording, ReplaySource};

pub const RECORDING_FILE: &str = "recording.json";

pub trait PipelineSource: Send + Sync {
    fn list_pipelines(&self) -> Result<Vec<String>, SourceError>;

    /// `None` when the pipeline has never run
    fn latest_execution(&self, name: &str) -> Result<Option<ExecutionSummary>, SourceError>;

    fn tags(&self, name: &str) -> Result<Tags, SourceError>;

    fn pipeline_detail(&self, name: &str) -> Result<PipelineDetail, SourceError>;

    fn build(&self, build_id: &str) -> Result<BuildDetail, SourceError>;

    /// One page of log lines; `token` continues where the previous page ended
    fn log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
    ) -> Result<LogChunk, SourceError>;

    /// Returns the id of the new execution
    fn start_execution(&self, name: &str) -> Result<String, SourceError>;

    fn retry_stage(&self, execution_id: &str, name: &str, stage: &str) -> Result<(), SourceError>;

    fn set_transition(
        &self,
        name: &str,
        stage: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), SourceError>;
}
