//! The external spreadsheet seam and its HTTP webhook implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veille_core::Article;

use crate::error::SinkError;

/// One spreadsheet row. Column names follow the published sheet; the
/// fingerprint is the upsert key that makes re-pushes idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Plateforme")]
    pub platform: String,
    #[serde(rename = "Thème")]
    pub theme: String,
    #[serde(rename = "Titre")]
    pub title: String,
    #[serde(rename = "Contenu")]
    pub content: String,
    #[serde(rename = "Tonalité")]
    pub tonality: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub fingerprint: String,
}

impl From<&Article> for SheetRow {
    fn from(article: &Article) -> Self {
        let date = article.published_at.unwrap_or(article.collected_at);
        Self {
            date: date.format("%Y-%m-%d %H:%M").to_string(),
            platform: article.source_platform.clone(),
            theme: article.theme.clone().unwrap_or_default(),
            title: article.title.clone(),
            content: article.raw_content.clone(),
            tonality: article
                .sentiment
                .map(|s| s.label.to_string())
                .unwrap_or_default(),
            url: article.url.clone(),
            fingerprint: article.fingerprint.clone(),
        }
    }
}

#[async_trait]
pub trait SheetSink: Send + Sync {
    /// Write one batch in a single request. Either every row is durably
    /// accepted or the call fails.
    async fn push(&self, rows: &[SheetRow]) -> Result<(), SinkError>;
}

#[derive(Serialize)]
struct PushRequest<'a> {
    sheet: &'a str,
    key: &'static str,
    rows: &'a [SheetRow],
}

#[derive(Deserialize)]
struct PushAck {
    accepted: usize,
}

/// Posts batches to a spreadsheet ingestion webhook (for example an Apps
/// Script deployment) that upserts rows by `key`.
#[derive(Debug, Clone)]
pub struct HttpSheetSink {
    client: reqwest::Client,
    url: String,
    sheet: String,
}

impl HttpSheetSink {
    /// # Errors
    ///
    /// Returns [`SinkError::Http`] if the client cannot be built.
    pub fn new(url: &str, sheet: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            sheet: sheet.to_string(),
        })
    }
}

#[async_trait]
impl SheetSink for HttpSheetSink {
    async fn push(&self, rows: &[SheetRow]) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PushRequest {
                sheet: &self.sheet,
                key: "fingerprint",
                rows,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // An acknowledgement body is optional; when present it must cover
        // the whole batch.
        if let Ok(ack) = serde_json::from_str::<PushAck>(&body) {
            if ack.accepted < rows.len() {
                return Err(SinkError::Partial {
                    accepted: ack.accepted,
                    expected: rows.len(),
                });
            }
        }
        Ok(())
    }
}
