use std::path::PathBuf;
use thiserror::Error;

use crate::types::Stage;

#[derive(Error, Debug)]
pub enum TrendscopeError {
    #[error("Request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Protocol(String),

    #[error("Scraping job {snapshot_id} failed: {payload}")]
    JobFailed {
        snapshot_id: String,
        payload: serde_json::Value,
    },

    #[error("Scraping job {snapshot_id} still '{last_status}' after {attempts} status checks")]
    PollTimeout {
        snapshot_id: String,
        attempts: u32,
        last_status: String,
    },

    #[error("File error for {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage failed: {reason}")]
    Pipeline { stage: Stage, reason: String },

    #[error("Invalid prompt configuration: {0}")]
    Config(String),

    #[error("Invalid scrape request: {0}")]
    InvalidRequest(String),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

impl TrendscopeError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrendscopeError::FileIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pipeline(stage: Stage, reason: impl Into<String>) -> Self {
        TrendscopeError::Pipeline {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TrendscopeError {
    fn from(err: serde_json::Error) -> Self {
        TrendscopeError::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrendscopeError>;
