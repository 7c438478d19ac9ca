#![allow(dead_code)]

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pipescope::cache::DataCache;
use pipescope::coordinator::{Coordinator, CoordinatorOptions};
use pipescope::error::SourceError;
use pipescope::fetch::{Backoff, FanOut};
use pipescope::model::{BuildDetail, ExecutionSummary, LogChunk, PipelineDetail, Tags};
use pipescope::service::{ListFilter, PipelineService};
use pipescope::source::{PipelineSource, ReplaySource, demo};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Long enough for any background fetch against the in-memory source
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct Calls {
    pub list: AtomicUsize,
    pub executions: AtomicUsize,
    pub tags: AtomicUsize,
    pub detail: AtomicUsize,
    pub build: AtomicUsize,
    pub logs: AtomicUsize,
    pub start: AtomicUsize,
    pub retry: AtomicUsize,
    pub transition: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCall {
    pub pipeline: String,
    pub stage: String,
    pub enabled: bool,
    pub reason: Option<String>,
}

/// The demo data with call counters and injectable failures
pub struct ScriptedSource {
    inner: ReplaySource,
    pub calls: Calls,
    /// Throttle this many list calls before answering
    list_failures: AtomicUsize,
    broken_executions: Mutex<HashSet<String>>,
    broken_tags: Mutex<HashSet<String>>,
    transitions: Mutex<Vec<TransitionCall>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_list(&self, times: usize) {
        self.list_failures.store(times, Ordering::SeqCst);
    }

    pub fn break_execution(&self, name: &str) {
        self.broken_executions.lock().unwrap().insert(name.to_string());
    }

    pub fn break_tags(&self, name: &str) {
        self.broken_tags.lock().unwrap().insert(name.to_string());
    }

    pub fn transitions(&self) -> Vec<TransitionCall> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &ReplaySource {
        &self.inner
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self {
            inner: ReplaySource::new(demo::recording()),
            calls: Calls::default(),
            list_failures: AtomicUsize::new(0),
            broken_executions: Mutex::new(HashSet::new()),
            broken_tags: Mutex::new(HashSet::new()),
            transitions: Mutex::new(Vec::new()),
        }
    }
}

impl PipelineSource for ScriptedSource {
    fn list_pipelines(&self) -> Result<Vec<String>, SourceError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let throttled = self
            .list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(SourceError::Throttled("list".to_string()));
        }
        self.inner.list_pipelines()
    }

    fn latest_execution(&self, name: &str) -> Result<Option<ExecutionSummary>, SourceError> {
        self.calls.executions.fetch_add(1, Ordering::SeqCst);
        if self.broken_executions.lock().unwrap().contains(name) {
            return Err(SourceError::Remote(format!("execution of {name}")));
        }
        self.inner.latest_execution(name)
    }

    fn tags(&self, name: &str) -> Result<Tags, SourceError> {
        self.calls.tags.fetch_add(1, Ordering::SeqCst);
        if self.broken_tags.lock().unwrap().contains(name) {
            return Err(SourceError::Remote(format!("tags of {name}")));
        }
        self.inner.tags(name)
    }

    fn pipeline_detail(&self, name: &str) -> Result<PipelineDetail, SourceError> {
        self.calls.detail.fetch_add(1, Ordering::SeqCst);
        self.inner.pipeline_detail(name)
    }

    fn build(&self, build_id: &str) -> Result<BuildDetail, SourceError> {
        self.calls.build.fetch_add(1, Ordering::SeqCst);
        self.inner.build(build_id)
    }

    fn log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
    ) -> Result<LogChunk, SourceError> {
        self.calls.logs.fetch_add(1, Ordering::SeqCst);
        self.inner.log_events(group, stream, token)
    }

    fn start_execution(&self, name: &str) -> Result<String, SourceError> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        self.inner.start_execution(name)
    }

    fn retry_stage(&self, execution_id: &str, name: &str, stage: &str) -> Result<(), SourceError> {
        self.calls.retry.fetch_add(1, Ordering::SeqCst);
        self.inner.retry_stage(execution_id, name, stage)
    }

    fn set_transition(
        &self,
        name: &str,
        stage: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), SourceError> {
        self.calls.transition.fetch_add(1, Ordering::SeqCst);
        self.transitions.lock().unwrap().push(TransitionCall {
            pipeline: name.to_string(),
            stage: stage.to_string(),
            enabled,
            reason: reason.map(str::to_string),
        });
        self.inner.set_transition(name, stage, enabled, reason)
    }
}

pub fn service(source: Arc<ScriptedSource>, filter: ListFilter) -> PipelineService {
    let backoff = Backoff::new(3, Duration::ZERO);
    let fanout = FanOut::new(4, backoff.clone()).unwrap();
    PipelineService::new(source, backoff, fanout, filter)
}

pub fn coordinator(source: Arc<ScriptedSource>, refresh_delay: Duration) -> Coordinator {
    Coordinator::new(
        Arc::new(service(source, ListFilter::default())),
        Arc::new(DataCache::new()),
        CoordinatorOptions {
            refresh_delay,
            ..CoordinatorOptions::default()
        },
    )
}

/// A coordinator showing the loaded pipeline listing
pub fn started(source: Arc<ScriptedSource>) -> Coordinator {
    let mut coordinator = coordinator(source, Duration::from_millis(20));
    coordinator.start();
    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));
    settle(&coordinator);
    coordinator
}

/// Wait for producers to release their slots once their message is taken
pub fn settle(coordinator: &Coordinator) {
    let deadline = Instant::now() + WAIT;
    while coordinator.refreshing() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}

pub fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

pub fn press_times(coordinator: &mut Coordinator, code: KeyCode, times: usize) {
    for _ in 0..times {
        coordinator.handle_key(press(code));
    }
}

pub fn type_text(coordinator: &mut Coordinator, text: &str) {
    for c in text.chars() {
        coordinator.handle_key(press(KeyCode::Char(c)));
    }
}
