use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("upstream http error: {0}")]
    Http(String),
    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }

    pub fn from_reqwest(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

/// Errors surfaced to the caller of the pipeline.
///
/// "Nothing to report" is never an error here: a player without qualifying
/// games comes back as `Ok(None)` and a date without games as
/// `IngestOutcome::NoGames`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream source failed: {0}")]
    Upstream(#[source] FetchError),
    #[error("record store failure: {0:#}")]
    Store(anyhow::Error),
    #[error("league baseline refresh failed after loading {rows_loaded} rows: {cause:#}")]
    BaselineRefresh {
        rows_loaded: usize,
        cause: anyhow::Error,
    },
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PipelineError::InvalidInput(msg.into())
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Store(err.into())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
