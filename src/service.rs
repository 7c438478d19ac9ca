//! Composes raw source calls into the operations the views need.
//!
//! Reads go through the backoff fetcher and, for the listing, the fan-out
//! collector. Mutations are attempted exactly once.

use crate::error::{CoreError, Result};
use crate::fetch::{Backoff, FanOut};
use crate::model::{BuildDetail, LogChunk, LogLocation, PipelineDetail, PipelineSummary, Tags};
use crate::source::PipelineSource;
use std::sync::Arc;
use tracing::{debug, info};

/// Which pipelines the listing shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    /// Substring the pipeline name must contain
    pub name: Option<String>,
    /// Every pair must be present on the pipeline
    pub tags: Tags,
}

impl ListFilter {
    pub fn matches_name(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_none_or(|filter| name.contains(filter))
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn matches_tags(&self, tags: &Tags) -> bool {
        self.tags.iter().all(|(k, v)| tags.get(k) == Some(v))
    }
}

pub struct PipelineService {
    source: Arc<dyn PipelineSource>,
    backoff: Backoff,
    fanout: FanOut,
    filter: ListFilter,
}

impl PipelineService {
    pub fn new(
        source: Arc<dyn PipelineSource>,
        backoff: Backoff,
        fanout: FanOut,
        filter: ListFilter,
    ) -> Self {
        Self {
            source,
            backoff,
            fanout,
            filter,
        }
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    /// Summaries of every pipeline passing the filter, sorted by name
    pub fn fetch_list(&self) -> Result<Vec<PipelineSummary>> {
        let names: Vec<String> = self
            .backoff
            .fetch(|| self.source.list_pipelines())?
            .into_iter()
            .filter(|name| self.filter.matches_name(name))
            .collect();
        debug!("listing {} pipelines", names.len());

        let executions = self
            .fanout
            .collect(&names, |name| self.source.latest_execution(name));
        let tags = self
            .filter
            .has_tags()
            .then(|| self.fanout.collect(&names, |name| self.source.tags(name)));

        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let pipeline_tags = match &tags {
                Some(tags) => match tags.get(&name) {
                    Some(found) if self.filter.matches_tags(found) => Some(found.clone()),
                    // Unmatched, or unknown and so unprovable
                    _ => continue,
                },
                None => None,
            };
            let last_execution = executions.get(&name).cloned().flatten();
            summaries.push(PipelineSummary {
                name,
                last_execution,
                tags: pipeline_tags,
            });
        }
        if !executions.unknown().is_empty() {
            debug!("status unknown for {:?}", executions.unknown());
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    pub fn fetch_detail(&self, name: &str) -> Result<PipelineDetail> {
        Ok(self.backoff.fetch(|| self.source.pipeline_detail(name))?)
    }

    pub fn fetch_build(&self, build_id: &str) -> Result<BuildDetail> {
        Ok(self.backoff.fetch(|| self.source.build(build_id))?)
    }

    /// A build whose log stream does not exist yet is reported as not ready
    /// and is not retried
    pub fn fetch_log(&self, logs: &LogLocation, token: Option<&str>) -> Result<LogChunk> {
        let stream = logs
            .stream
            .as_deref()
            .ok_or_else(|| CoreError::NotReady("log stream".to_string()))?;
        Ok(self
            .backoff
            .fetch(|| self.source.log_events(&logs.group, stream, token))?)
    }

    pub fn start_execution(&self, name: &str) -> Result<String> {
        let id = self.source.start_execution(name)?;
        info!("started {} as execution {}", name, id);
        Ok(id)
    }

    pub fn retry_stage(&self, execution_id: &str, name: &str, stage: &str) -> Result<()> {
        self.source.retry_stage(execution_id, name, stage)?;
        info!("retrying stage {} of {} ({})", stage, name, execution_id);
        Ok(())
    }

    pub fn set_transition(
        &self,
        name: &str,
        stage: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<()> {
        self.source.set_transition(name, stage, enabled, reason)?;
        info!(
            "transition into {} of {} is now {}",
            stage,
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}
