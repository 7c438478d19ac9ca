use super::{PipelineSource, RECORDING_FILE};
use crate::error::SourceError;
use crate::model::{
    BuildDetail, ExecutionSummary, LogChunk, PipelineDetail, STATUS_FAILED, STATUS_IN_PROGRESS,
    Tags,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

pub const REPLAY_TRIGGER: &str = "replay/pipescope";

/// Everything a session has seen, in a form that can be written to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub pipelines: BTreeMap<String, RecordedPipeline>,
    #[serde(default)]
    pub builds: BTreeMap<String, BuildDetail>,
    /// Log pages per stream, in the order they were read
    #[serde(default)]
    pub logs: BTreeMap<String, Vec<LogChunk>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedPipeline {
    pub execution: Option<ExecutionSummary>,
    #[serde(default)]
    pub tags: Tags,
    pub detail: Option<PipelineDetail>,
}

impl Recording {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(RECORDING_FILE)
    }

    pub fn load(dir: &Path) -> Result<Self, SourceError> {
        let path = Self::path(dir);
        let contents = fs::read_to_string(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SourceError::Decode { path, source })
    }

    /// Load the recording in `dir`, or start an empty one if there is none yet
    pub fn load_or_default(dir: &Path) -> Result<Self, SourceError> {
        if Self::path(dir).exists() {
            Self::load(dir)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, dir: &Path) -> Result<(), SourceError> {
        let path = Self::path(dir);
        let contents = serde_json::to_string_pretty(self).map_err(|source| SourceError::Decode {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, contents).map_err(|source| SourceError::Io { path, source })
    }

    fn pipeline(&self, name: &str) -> Result<&RecordedPipeline, SourceError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| SourceError::NotFound(format!("pipeline {name}")))
    }

    fn detail_mut(&mut self, name: &str) -> Result<&mut PipelineDetail, SourceError> {
        self.pipelines
            .get_mut(name)
            .and_then(|p| p.detail.as_mut())
            .ok_or_else(|| SourceError::NotFound(format!("pipeline {name}")))
    }
}

/// Serves a recorded session instead of a live backend.
///
/// Mutations are applied to the in-memory copy only, so the dashboard reacts
/// to them without touching the file it was loaded from.
pub struct ReplaySource {
    recording: Mutex<Recording>,
    latency: Duration,
    executions: AtomicU64,
}

impl ReplaySource {
    pub fn new(recording: Recording) -> Self {
        Self {
            recording: Mutex::new(recording),
            latency: Duration::ZERO,
            executions: AtomicU64::new(0),
        }
    }

    pub fn from_dir(dir: &Path) -> Result<Self, SourceError> {
        let recording = Recording::load(dir)?;
        info!(
            "replaying {} pipelines and {} builds from {}",
            recording.pipelines.len(),
            recording.builds.len(),
            dir.display()
        );
        Ok(Self::new(recording))
    }

    /// Pause every call for `latency` to mimic a remote round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn snapshot(&self) -> Recording {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
    }
}

impl PipelineSource for ReplaySource {
    fn list_pipelines(&self) -> Result<Vec<String>, SourceError> {
        self.wait();
        Ok(self.lock().pipelines.keys().cloned().collect())
    }

    fn latest_execution(&self, name: &str) -> Result<Option<ExecutionSummary>, SourceError> {
        self.wait();
        Ok(self.lock().pipeline(name)?.execution.clone())
    }

    fn tags(&self, name: &str) -> Result<Tags, SourceError> {
        self.wait();
        Ok(self.lock().pipeline(name)?.tags.clone())
    }

    fn pipeline_detail(&self, name: &str) -> Result<PipelineDetail, SourceError> {
        self.wait();
        self.lock()
            .pipeline(name)?
            .detail
            .clone()
            .ok_or_else(|| SourceError::NotFound(format!("detail of pipeline {name}")))
    }

    fn build(&self, build_id: &str) -> Result<BuildDetail, SourceError> {
        self.wait();
        self.lock()
            .builds
            .get(build_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("build {build_id}")))
    }

    fn log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
    ) -> Result<LogChunk, SourceError> {
        self.wait();
        let recording = self.lock();
        let pages = recording
            .logs
            .get(stream)
            .ok_or_else(|| SourceError::NotFound(format!("log stream {group}/{stream}")))?;
        let index = match token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SourceError::Remote(format!("invalid log token {token:?}")))?,
            None => 0,
        };
        Ok(match pages.get(index) {
            Some(page) => LogChunk {
                lines: page.lines.clone(),
                next_token: Some((index + 1).to_string()),
            },
            // Past the end: nothing new yet, keep the caller where it is
            None => LogChunk {
                lines: Vec::new(),
                next_token: Some(index.to_string()),
            },
        })
    }

    fn start_execution(&self, name: &str) -> Result<String, SourceError> {
        self.wait();
        let mut recording = self.lock();
        let pipeline = recording
            .pipelines
            .get_mut(name)
            .ok_or_else(|| SourceError::NotFound(format!("pipeline {name}")))?;
        let sequence = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{name}-replay-{sequence}");
        pipeline.execution = Some(ExecutionSummary {
            id: id.clone(),
            status: STATUS_IN_PROGRESS.to_string(),
            trigger: REPLAY_TRIGGER.to_string(),
            last_update: Some(Utc::now()),
        });
        info!("replay: started {} as {}", name, id);
        Ok(id)
    }

    fn retry_stage(&self, execution_id: &str, name: &str, stage: &str) -> Result<(), SourceError> {
        self.wait();
        let mut recording = self.lock();
        let latest = recording
            .pipeline(name)?
            .execution
            .as_ref()
            .map(|e| e.id.clone());
        if latest.as_deref() != Some(execution_id) {
            return Err(SourceError::Remote(format!(
                "execution {execution_id} is not the latest execution of {name}"
            )));
        }

        let now = Utc::now();
        let detail = recording.detail_mut(name)?;
        let stage_state = detail
            .stages
            .iter_mut()
            .find(|s| s.name == stage)
            .ok_or_else(|| SourceError::NotFound(format!("stage {stage} of {name}")))?;
        stage_state.latest_status = Some(STATUS_IN_PROGRESS.to_string());
        for action in &mut stage_state.actions {
            if action.status.as_deref() == Some(STATUS_FAILED) {
                action.status = Some(STATUS_IN_PROGRESS.to_string());
                action.last_status_change = Some(now);
            }
        }
        if let Some(execution) = recording
            .pipelines
            .get_mut(name)
            .and_then(|p| p.execution.as_mut())
        {
            execution.status = STATUS_IN_PROGRESS.to_string();
            execution.last_update = Some(now);
        }
        info!("replay: retrying {} of {}", stage, name);
        Ok(())
    }

    fn set_transition(
        &self,
        name: &str,
        stage: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), SourceError> {
        self.wait();
        let mut recording = self.lock();
        let stage_state = recording
            .detail_mut(name)?
            .stages
            .iter_mut()
            .find(|s| s.name == stage)
            .ok_or_else(|| SourceError::NotFound(format!("stage {stage} of {name}")))?;
        stage_state.inbound_transition_enabled = enabled;
        debug!(
            "replay: transition into {} of {} enabled={} reason={:?}",
            stage, name, enabled, reason
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::demo;
    use tempfile::TempDir;

    #[test]
    fn test_missing_entries_are_not_found() {
        let source = ReplaySource::new(Recording::default());
        assert!(matches!(
            source.latest_execution("nope"),
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(source.build("x:1"), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_log_pages_follow_tokens() {
        let mut recording = Recording::default();
        recording.logs.insert(
            "stream".to_string(),
            vec![
                LogChunk {
                    lines: vec!["one".to_string()],
                    next_token: None,
                },
                LogChunk {
                    lines: vec!["two".to_string()],
                    next_token: None,
                },
            ],
        );
        let source = ReplaySource::new(recording);

        let first = source.log_events("group", "stream", None).unwrap();
        assert_eq!(first.lines, vec!["one"]);
        let second = source
            .log_events("group", "stream", first.next_token.as_deref())
            .unwrap();
        assert_eq!(second.lines, vec!["two"]);
        let end = source
            .log_events("group", "stream", second.next_token.as_deref())
            .unwrap();
        assert!(end.lines.is_empty());
        assert_eq!(end.next_token.as_deref(), Some("2"));
    }

    #[test]
    fn test_start_marks_execution_in_progress() {
        let source = ReplaySource::new(demo::recording());
        let id = source.start_execution(demo::DEMO_PIPELINE).unwrap();
        let execution = source
            .latest_execution(demo::DEMO_PIPELINE)
            .unwrap()
            .unwrap();
        assert_eq!(execution.id, id);
        assert_eq!(execution.status, STATUS_IN_PROGRESS);
    }

    #[test]
    fn test_retry_restarts_failed_actions() {
        let source = ReplaySource::new(demo::recording());
        let execution = source
            .latest_execution(demo::FAILING_PIPELINE)
            .unwrap()
            .unwrap();
        source
            .retry_stage(&execution.id, demo::FAILING_PIPELINE, "Test")
            .unwrap();

        let detail = source.pipeline_detail(demo::FAILING_PIPELINE).unwrap();
        let stage = detail.stages.iter().find(|s| s.name == "Test").unwrap();
        assert_eq!(stage.latest_status.as_deref(), Some(STATUS_IN_PROGRESS));
        assert!(
            stage
                .actions
                .iter()
                .all(|a| a.status.as_deref() != Some(STATUS_FAILED))
        );

        assert!(source
            .retry_stage("stale-id", demo::FAILING_PIPELINE, "Test")
            .is_err());
    }

    #[test]
    fn test_transition_toggles() {
        let source = ReplaySource::new(demo::recording());
        source
            .set_transition(demo::DEMO_PIPELINE, "Deploy", false, Some("freeze"))
            .unwrap();
        let detail = source.pipeline_detail(demo::DEMO_PIPELINE).unwrap();
        let deploy = detail.stages.iter().find(|s| s.name == "Deploy").unwrap();
        assert!(!deploy.inbound_transition_enabled);
    }

    #[test]
    fn test_save_and_load() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let recording = demo::recording();
        recording.save(dir.path())?;
        assert_eq!(Recording::load(dir.path())?, recording);
        Ok(())
    }

    #[test]
    fn test_corrupt_recording_is_decode_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::write(Recording::path(dir.path()), "{ not json")?;
        assert!(matches!(
            Recording::load(dir.path()),
            Err(SourceError::Decode { .. })
        ));
        assert!(matches!(
            ReplaySource::from_dir(&dir.path().join("missing")),
            Err(SourceError::Io { .. })
        ));
        Ok(())
    }
}
