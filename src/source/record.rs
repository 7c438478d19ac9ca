use super::PipelineSource;
use super::replay::{RecordedPipeline, Recording};
use crate::error::SourceError;
use crate::model::{BuildDetail, ExecutionSummary, LogChunk, PipelineDetail, Tags};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Wraps a source and writes everything it reads to `<dir>/recording.json`,
/// so the session can later be replayed
pub struct RecordingSource<S> {
    inner: S,
    dir: PathBuf,
    recording: Mutex<Recording>,
}

impl<S: PipelineSource> RecordingSource<S> {
    /// Continues an existing recording in `dir` if there is one
    pub fn new(inner: S, dir: &Path) -> Result<Self, SourceError> {
        fs::create_dir_all(dir).map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let recording = Recording::load_or_default(dir)?;
        Ok(Self {
            inner,
            dir: dir.to_path_buf(),
            recording: Mutex::new(recording),
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Apply `update` and rewrite the file; the lock also orders the writes
    fn record<F>(&self, what: &str, update: F)
    where
        F: FnOnce(&mut Recording),
    {
        let mut recording = self.recording.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut recording);
        match recording.save(&self.dir) {
            Ok(()) => debug!("recorded {}", what),
            Err(err) => warn!("failed to record {}: {}", what, err),
        }
    }
}

fn entry<'a>(recording: &'a mut Recording, name: &str) -> &'a mut RecordedPipeline {
    recording.pipelines.entry(name.to_string()).or_default()
}

impl<S: PipelineSource> PipelineSource for RecordingSource<S> {
    fn list_pipelines(&self) -> Result<Vec<String>, SourceError> {
        let names = self.inner.list_pipelines()?;
        self.record("pipeline list", |recording| {
            for name in &names {
                entry(recording, name);
            }
        });
        Ok(names)
    }

    fn latest_execution(&self, name: &str) -> Result<Option<ExecutionSummary>, SourceError> {
        let execution = self.inner.latest_execution(name)?;
        self.record(name, |recording| {
            entry(recording, name).execution = execution.clone();
        });
        Ok(execution)
    }

    fn tags(&self, name: &str) -> Result<Tags, SourceError> {
        let tags = self.inner.tags(name)?;
        self.record(name, |recording| {
            entry(recording, name).tags = tags.clone();
        });
        Ok(tags)
    }

    fn pipeline_detail(&self, name: &str) -> Result<PipelineDetail, SourceError> {
        let detail = self.inner.pipeline_detail(name)?;
        self.record(name, |recording| {
            entry(recording, name).detail = Some(detail.clone());
        });
        Ok(detail)
    }

    fn build(&self, build_id: &str) -> Result<BuildDetail, SourceError> {
        let build = self.inner.build(build_id)?;
        self.record(build_id, |recording| {
            recording
                .builds
                .insert(build_id.to_string(), build.clone());
        });
        Ok(build)
    }

    fn log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
    ) -> Result<LogChunk, SourceError> {
        let chunk = self.inner.log_events(group, stream, token)?;
        self.record(stream, |recording| {
            let pages = recording.logs.entry(stream.to_string()).or_default();
            if token.is_none() {
                pages.clear();
            }
            if !chunk.lines.is_empty() || pages.is_empty() {
                pages.push(chunk.clone());
            }
        });
        Ok(chunk)
    }

    fn start_execution(&self, name: &str) -> Result<String, SourceError> {
        self.inner.start_execution(name)
    }

    fn retry_stage(&self, execution_id: &str, name: &str, stage: &str) -> Result<(), SourceError> {
        self.inner.retry_stage(execution_id, name, stage)
    }

    fn set_transition(
        &self,
        name: &str,
        stage: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), SourceError> {
        self.inner.set_transition(name, stage, enabled, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::demo;
    use crate::source::replay::ReplaySource;
    use tempfile::TempDir;

    #[test]
    fn test_reads_are_written_through() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let source = RecordingSource::new(ReplaySource::new(demo::recording()), dir.path())?;

        let names = source.list_pipelines()?;
        assert!(!names.is_empty());
        source.latest_execution(demo::DEMO_PIPELINE)?;
        source.pipeline_detail(demo::DEMO_PIPELINE)?;

        let saved = Recording::load(dir.path())?;
        assert_eq!(saved.pipelines.len(), names.len());
        let demo = &saved.pipelines[demo::DEMO_PIPELINE];
        assert!(demo.execution.is_some());
        assert!(demo.detail.is_some());
        Ok(())
    }

    #[test]
    fn test_failed_reads_are_not_recorded() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let source = RecordingSource::new(ReplaySource::new(demo::recording()), dir.path())?;
        assert!(source.build("missing:1").is_err());
        assert!(!Recording::path(dir.path()).exists());
        Ok(())
    }

    #[test]
    fn test_log_pages_are_appended() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let source = RecordingSource::new(ReplaySource::new(demo::recording()), dir.path())?;
        let first = source.log_events(demo::LOG_GROUP, demo::LOG_STREAM, None)?;
        source.log_events(demo::LOG_GROUP, demo::LOG_STREAM, first.next_token.as_deref())?;

        let saved = Recording::load(dir.path())?;
        assert_eq!(saved.logs[demo::LOG_STREAM].len(), 2);
        Ok(())
    }
}
