use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Couldn't run '{binary}': {source}")]
    SourceUnavailable {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("nvidia-smi exited with {status}: {stderr}")]
    SourceFailed { status: ExitStatus, stderr: String },

    #[error("Malformed record: expected {expected} fields, found {found} in {line:?}")]
    MalformedRecord {
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("Malformed record: pid {value:?} is not an integer in {line:?}")]
    InvalidPid { value: String, line: String },

    #[error("Failed to build the GPU UUID to index map: {0}")]
    CorrelationFailure(#[source] Box<QueryError>),
}

impl QueryError {
    /// True for errors that mean the output no longer matches the expected columns
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            QueryError::MalformedRecord { .. } | QueryError::InvalidPid { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
