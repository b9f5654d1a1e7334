//! Client for an external text-classification endpoint.
//!
//! Speaks the Hugging Face inference shape: `POST {"inputs": text}` answered
//! by a list of `{label, score}` (optionally nested one level). The
//! highest-scoring label wins.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veille_core::{Sentiment, SentimentLabel};

use crate::error::SentimentError;
use crate::scorer::SentimentScorer;

/// Characters sent to the model. Longer inputs are cut on a char boundary.
const MAX_INPUT_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
    Single(LabelScore),
}

impl ScoreResponse {
    fn into_best(self) -> Option<LabelScore> {
        let all: Vec<LabelScore> = match self {
            Self::Nested(outer) => outer.into_iter().flatten().collect(),
            Self::Flat(list) => list,
            Self::Single(one) => vec![one],
        };
        all.into_iter().max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// Map a model label onto the tonality vocabulary. Anything that is neither
/// clearly negative nor clearly positive is neutral.
fn map_label(raw: &str) -> SentimentLabel {
    let label = raw.to_lowercase();
    if label.contains("neg") || label.contains("nég") {
        SentimentLabel::Negative
    } else if label.contains("pos") {
        SentimentLabel::Positive
    } else {
        SentimentLabel::Neutral
    }
}

impl HttpScorer {
    /// # Errors
    ///
    /// Returns [`SentimentError::Http`] if the client cannot be built.
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, SentimentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SentimentScorer for HttpScorer {
    fn name(&self) -> &str {
        "http"
    }

    async fn score(&self, text: &str) -> Result<Sentiment, SentimentError> {
        let inputs = match text.char_indices().nth(MAX_INPUT_CHARS) {
            Some((cut, _)) => &text[..cut],
            None => text,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest { inputs })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SentimentError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ScoreResponse = response
            .json()
            .await
            .map_err(|e| SentimentError::Parse(e.to_string()))?;
        let best = parsed.into_best().ok_or(SentimentError::EmptyResponse)?;
        Ok(Sentiment {
            label: map_label(&best.label),
            confidence: best.score.clamp(0.0, 1.0),
        })
    }
}
