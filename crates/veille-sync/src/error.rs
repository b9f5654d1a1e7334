use thiserror::Error;

/// The external spreadsheet refused or never received a batch. Contained by
/// the sync engine; the batch stays pending.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spreadsheet endpoint returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("spreadsheet accepted {accepted} of {expected} rows")]
    Partial { accepted: usize, expected: usize },

    #[error("no spreadsheet endpoint configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("export serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
