//! Best-effort sentiment enrichment.
//!
//! Claims freshly collected articles, scores them through a
//! [`SentimentScorer`] under a bounded timeout, and releases them to human
//! review whether or not a score came back. Unassigned articles get a theme
//! inferred from the current registry on the way through.

pub mod enrich;
pub mod error;
pub mod http;
pub mod scorer;

use std::sync::Arc;

use veille_core::AppConfig;

pub use enrich::{enrich_pending, EnrichmentConfig, EnrichmentReport};
pub use error::SentimentError;
pub use http::HttpScorer;
pub use scorer::{lexicon_score, LexiconScorer, SentimentScorer};

/// The HTTP scorer when `VEILLE_SENTIMENT_URL` is set, the lexicon otherwise.
///
/// # Errors
///
/// Returns [`SentimentError::Http`] if the HTTP client cannot be built.
pub fn scorer_from_config(config: &AppConfig) -> Result<Arc<dyn SentimentScorer>, SentimentError> {
    match config.sentiment_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpScorer::new(url, config.sentiment_timeout_secs)?)),
        None => {
            tracing::info!("no sentiment endpoint configured, using the lexicon scorer");
            Ok(Arc::new(LexiconScorer))
        }
    }
}
