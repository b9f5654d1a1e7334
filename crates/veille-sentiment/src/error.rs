use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scorer returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("scorer response carried no label")]
    EmptyResponse,

    #[error("scorer response parse error: {0}")]
    Parse(String),
}
