//! Domain model for the Veille media-watch pipeline.
//!
//! Holds the article and theme types shared by every other crate, the pure
//! validation workflow, fingerprinting, the dedup engine, and the
//! [`ArticleStore`] seam that the Postgres storage engine implements.

pub mod app_config;
pub mod article;
pub mod config;
pub mod dedup;
pub mod fingerprint;
pub mod memory;
pub mod normalize;
pub mod store;
pub mod themes;
pub mod workflow;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use article::{
    Article, ArticleFilter, ArticleStatus, Candidate, ContentEdit, NewArticle, ParseEnumError,
    Sentiment, SentimentLabel, SyncState,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use dedup::{AdmitOutcome, DedupEngine, DedupPolicy};
pub use fingerprint::fingerprint;
pub use memory::MemoryStore;
pub use normalize::{canonicalize_url, collapse_whitespace};
pub use store::{
    ArticleEvent, ArticleStore, InsertOutcome, StatusChange, StoreError, SyncHealth, ThemeChange,
};
pub use themes::{
    load_themes, parse_cadence, Priority, RunScope, Theme, ThemeConfig, ThemeRegistry, ThemeSet,
    ThemesFile,
};
pub use workflow::{
    apply_transition, begin_enrichment, complete_enrichment, plan_transition, reassign_theme,
    Action, Actor, WorkflowError, ENRICHMENT_ACTOR, INFERENCE_ACTOR,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read themes file {path}: {source}")]
    ThemesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse themes file: {0}")]
    ThemesFileParse(#[from] serde_yaml::Error),

    #[error("invalid theme configuration: {0}")]
    Validation(String),
}
