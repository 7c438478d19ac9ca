use super::backoff::Backoff;
use crate::error::Result;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome of a fan-out: one entry per requested resource, `None` when the
/// resource could not be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutResult<V> {
    entries: HashMap<String, Option<V>>,
}

impl<V> FanOutResult<V> {
    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn populated(&self) -> usize {
        self.entries.values().filter(|v| v.is_some()).count()
    }

    pub fn unknown(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn into_map(self) -> HashMap<String, Option<V>> {
        self.entries
    }
}

/// Runs one backoff-wrapped fetch per resource on a bounded worker pool
#[derive(Clone)]
pub struct FanOut {
    pool: Arc<ThreadPool>,
    backoff: Backoff,
}

impl FanOut {
    pub fn new(concurrency: usize, backoff: Backoff) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("fanout-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
            backoff,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Fetch every name and block until all of them have settled.
    ///
    /// A name whose fetch exhausts its retries is recorded as unknown; it
    /// never aborts the rest of the batch.
    pub fn collect<V, E, F>(&self, names: &[String], operation: F) -> FanOutResult<V>
    where
        V: Send,
        E: Display,
        F: Fn(&str) -> std::result::Result<V, E> + Sync,
    {
        debug!("fan-out over {} resources", names.len());
        let entries = self.pool.install(|| {
            names
                .par_iter()
                .map(|name| {
                    let value = match self.backoff.fetch(|| operation(name)) {
                        Ok(value) => Some(value),
                        Err(err) => {
                            warn!("giving up on {}: {}", name, err);
                            None
                        }
                    };
                    (name.clone(), value)
                })
                .collect::<HashMap<_, _>>()
        });
        FanOutResult { entries }
    }
}
