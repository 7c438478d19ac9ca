//! Last-known snapshots of remote resources.
//!
//! Background tasks write here and only then notify the coordinator over the
//! bus; views read after receiving that notification. Locks are held inside
//! these methods only, never across a channel send.

use crate::model::{BuildDetail, PipelineDetail, PipelineSummary};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineEntry {
    pub summary: PipelineSummary,
    pub detail: Option<PipelineDetail>,
}

#[derive(Debug, Default)]
pub struct DataCache {
    pipelines: RwLock<BTreeMap<String, PipelineEntry>>,
    builds: RwLock<HashMap<String, BuildDetail>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pipeline listing, keeping details of pipelines still listed
    pub fn replace_pipelines(&self, summaries: Vec<PipelineSummary>) {
        let mut pipelines = self.pipelines.write().unwrap_or_else(PoisonError::into_inner);
        let mut previous = std::mem::take(&mut *pipelines);
        for summary in summaries {
            let detail = previous.remove(&summary.name).and_then(|e| e.detail);
            pipelines.insert(summary.name.clone(), PipelineEntry { summary, detail });
        }
    }

    /// Listing in name order
    pub fn pipelines(&self) -> Vec<PipelineSummary> {
        let pipelines = self.pipelines.read().unwrap_or_else(PoisonError::into_inner);
        pipelines.values().map(|e| e.summary.clone()).collect()
    }

    pub fn pipeline(&self, name: &str) -> Option<PipelineEntry> {
        let pipelines = self.pipelines.read().unwrap_or_else(PoisonError::into_inner);
        pipelines.get(name).cloned()
    }

    pub fn store_detail(&self, detail: PipelineDetail) {
        let name = detail.name.clone();
        let mut pipelines = self.pipelines.write().unwrap_or_else(PoisonError::into_inner);
        pipelines
            .entry(name.clone())
            .or_insert_with(|| PipelineEntry {
                summary: PipelineSummary::unknown(name),
                detail: None,
            })
            .detail = Some(detail);
    }

    pub fn last_execution_id(&self, name: &str) -> Option<String> {
        let pipelines = self.pipelines.read().unwrap_or_else(PoisonError::into_inner);
        pipelines
            .get(name)
            .and_then(|e| e.summary.last_execution_id())
            .map(str::to_string)
    }

    pub fn store_build(&self, build: BuildDetail) {
        let mut builds = self.builds.write().unwrap_or_else(PoisonError::into_inner);
        builds.insert(build.id.clone(), build);
    }

    pub fn build(&self, id: &str) -> Option<BuildDetail> {
        let builds = self.builds.read().unwrap_or_else(PoisonError::into_inner);
        builds.get(id).cloned()
    }
}
