//! The platform collector seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Serialize;
use veille_core::{canonicalize_url, collapse_whitespace, Candidate};

use crate::error::FetchError;

/// One raw search hit, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCandidate {
    pub url: String,
    pub title: String,
    pub raw_text: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Finite, non-restartable sequence of hits for one query. Re-running a
/// keyword means calling [`PlatformCollector::search`] again.
pub type CandidateStream = BoxStream<'static, Result<RawCandidate, FetchError>>;

#[async_trait]
pub trait PlatformCollector: Send + Sync {
    /// Stable platform identifier stored on every admitted article.
    fn platform(&self) -> &str;

    /// Search for `query`, yielding at most `max_results` items.
    ///
    /// Failures of the initial request are returned directly so the caller
    /// can retry them. Errors yielded mid-stream end the keyword pass.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<CandidateStream, FetchError>;
}

/// Canonicalize the URL and collapse whitespace in title and body.
///
/// Returns `None` for hits without a usable URL or title.
#[must_use]
pub fn normalize_candidate(
    raw: RawCandidate,
    platform: &str,
    theme: Option<&str>,
    assigned_member: Option<&str>,
) -> Option<Candidate> {
    let url = canonicalize_url(&raw.url);
    let title = collapse_whitespace(&raw.title);
    if url.is_empty() || title.is_empty() {
        return None;
    }
    Some(Candidate {
        source_platform: platform.to_string(),
        url,
        title,
        content: collapse_whitespace(&raw.raw_text),
        published_at: raw.published_at,
        theme: theme.map(str::to_string),
        assigned_member: assigned_member.map(str::to_string),
    })
}
