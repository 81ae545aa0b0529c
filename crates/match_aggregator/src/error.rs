use thiserror::Error;

/// Why a single upstream call produced no data. Never leaves the fetch helpers.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("invalid JSON body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("provider reported failure: {0}")]
    Unsuccessful(String),
}

impl FetchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status(code) => Some(*code),
            FetchError::Transport(e) | FetchError::Decode(e) => e.status().map(|s| s.as_u16()),
            FetchError::Unsuccessful(_) => None,
        }
    }
}

/// The only failures that reach the inbound caller.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("enrichment task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
