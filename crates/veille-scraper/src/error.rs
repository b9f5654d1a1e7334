use thiserror::Error;

/// Failure of one adapter invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, timeout, throttling or an upstream 5xx. Retried.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// Permanent failure for this query (malformed query, 4xx, unparsable
    /// feed). The keyword is skipped without retrying.
    #[error("fatal fetch error: {0}")]
    Fatal(String),

    #[error("per-run adapter call ceiling of {limit} reached")]
    BudgetExhausted { limit: usize },

    #[error("run cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let transient = err.is_timeout()
            || err.is_connect()
            || err.is_request()
            || err
                .status()
                .is_some_and(|s| s.is_server_error() || s.as_u16() == 429);
        if transient {
            FetchError::Transient(err.to_string())
        } else {
            FetchError::Fatal(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
