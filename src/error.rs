use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a data source while talking to the pipeline backend
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("recording I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("recording at {path} is not valid: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Core errors surfaced to the coordinator and views
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown view: {0}")]
    UnsupportedView(String),

    #[error("{0} not ready yet")]
    NotReady(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to build fetch worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
