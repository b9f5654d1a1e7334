use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Workflow position of an article.
///
/// Stored as the snake_case string returned by [`ArticleStatus::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Collected,
    PendingEnrichment,
    PendingReview,
    MemberValidated,
    AdminCertified,
    Synced,
    Rejected,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 7] = [
        ArticleStatus::Collected,
        ArticleStatus::PendingEnrichment,
        ArticleStatus::PendingReview,
        ArticleStatus::MemberValidated,
        ArticleStatus::AdminCertified,
        ArticleStatus::Synced,
        ArticleStatus::Rejected,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Collected => "collected",
            ArticleStatus::PendingEnrichment => "pending_enrichment",
            ArticleStatus::PendingReview => "pending_review",
            ArticleStatus::MemberValidated => "member_validated",
            ArticleStatus::AdminCertified => "admin_certified",
            ArticleStatus::Synced => "synced",
            ArticleStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArticleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "article status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    NeverSynced,
    Pending,
    Acknowledged,
}

impl SyncState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::NeverSynced => "never_synced",
            SyncState::Pending => "pending",
            SyncState::Acknowledged => "acknowledged",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never_synced" => Ok(SyncState::NeverSynced),
            "pending" => Ok(SyncState::Pending),
            "acknowledged" => Ok(SyncState::Acknowledged),
            other => Err(ParseEnumError {
                kind: "sync state",
                value: other.to_string(),
            }),
        }
    }
}

/// Tonality label, persisted and exported in French.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Positif")]
    Positive,
    #[serde(rename = "Négatif")]
    Negative,
    #[serde(rename = "Neutre")]
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positif",
            SentimentLabel::Negative => "Négatif",
            SentimentLabel::Neutral => "Neutre",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = ParseEnumError;

    /// Accepts the stored French labels and the English model labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positif" | "positive" | "pos" => Ok(SentimentLabel::Positive),
            "négatif" | "negatif" | "negative" | "neg" => Ok(SentimentLabel::Negative),
            "neutre" | "neutral" | "neu" => Ok(SentimentLabel::Neutral),
            _ => Err(ParseEnumError {
                kind: "sentiment label",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// Model confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub public_id: Uuid,
    pub fingerprint: String,
    pub source_platform: String,
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_count: i32,
    pub theme: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub status: ArticleStatus,
    pub assigned_member: Option<String>,
    pub sync_state: SyncState,
    pub last_sync_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert on first admission. Always lands as `collected` / `never_synced`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub fingerprint: String,
    pub source_platform: String,
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub theme: Option<String>,
    pub assigned_member: Option<String>,
}

/// A normalized item ready for dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source_platform: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub theme: Option<String>,
    pub assigned_member: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub theme: Option<String>,
    pub unassigned_only: bool,
    pub limit: Option<i64>,
}

/// Operator correction applied together with a member validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Corrected tonality, exported in place of the scored label.
    #[serde(default)]
    pub sentiment: Option<SentimentLabel>,
}

impl ContentEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.sentiment.is_none()
    }
}
