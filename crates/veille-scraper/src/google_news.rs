//! Google News RSS search adapter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use veille_core::AppConfig;

use crate::collector::{CandidateStream, PlatformCollector, RawCandidate};
use crate::error::FetchError;

pub const PLATFORM: &str = "google_news";

const DEFAULT_BASE_URL: &str = "https://news.google.com";

#[derive(Debug, Clone)]
pub struct GoogleNewsCollector {
    client: Client,
    base_url: String,
    language: String,
    country: String,
}

impl GoogleNewsCollector {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        language: &str,
        country: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            language: language.to_string(),
            country: country.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            &config.news_language,
            &config.news_country,
        )
    }

    /// Point the adapter at another host. Used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn search_url(&self, query: &str) -> String {
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC);
        format!(
            "{}/rss/search?q={encoded}&hl={lang}&gl={country}&ceid={country}:{lang}",
            self.base_url,
            lang = self.language,
            country = self.country,
        )
    }
}

#[async_trait]
impl PlatformCollector for GoogleNewsCollector {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<CandidateStream, FetchError> {
        if query.trim().is_empty() {
            return Err(FetchError::Fatal("empty query".to_string()));
        }

        let url = self.search_url(query);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchError::Transient(format!(
                "google news returned {status} for {query:?}"
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(format!(
                "google news returned {status} for {query:?}"
            )));
        }

        let body = response.text().await?;
        let mut items = parse_rss_feed(&body)?;
        items.truncate(max_results);
        tracing::debug!(query, items = items.len(), "google news search returned");
        Ok(futures::stream::iter(items.into_iter().map(Ok)).boxed())
    }
}

/// Parse a Google News RSS body into raw candidates, in feed order.
///
/// # Errors
///
/// Returns [`FetchError::Fatal`] if the XML is malformed.
pub(crate) fn parse_rss_feed(xml: &str) -> Result<Vec<RawCandidate>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut pub_date = String::new();
    let mut in_item = false;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                if name == "item" {
                    in_item = true;
                    title.clear();
                    link.clear();
                    description.clear();
                    pub_date.clear();
                }
                current_tag = name;
            }
            Ok(Event::End(e)) => {
                let raw = e.name();
                let name = std::str::from_utf8(raw.as_ref()).unwrap_or("");
                if name == "item" && in_item {
                    in_item = false;
                    if !link.is_empty() {
                        items.push(RawCandidate {
                            url: resolve_redirect(&link),
                            title: title.clone(),
                            raw_text: description.clone(),
                            published_at: parse_pub_date(&pub_date),
                        });
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                if in_item {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    assign_field(
                        &current_tag,
                        text,
                        &mut title,
                        &mut link,
                        &mut description,
                        &mut pub_date,
                    );
                }
            }
            Ok(Event::CData(e)) => {
                if in_item {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    assign_field(
                        &current_tag,
                        text,
                        &mut title,
                        &mut link,
                        &mut description,
                        &mut pub_date,
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::Fatal(format!("malformed RSS: {e}"))),
            _ => {}
        }
    }

    Ok(items)
}

fn assign_field(
    tag: &str,
    text: String,
    title: &mut String,
    link: &mut String,
    description: &mut String,
    pub_date: &mut String,
) {
    match tag {
        "title" => *title = text,
        "link" => *link = text,
        // Google News wraps the snippet in escaped HTML.
        "description" => *description = strip_html(&text),
        "pubDate" => *pub_date = text,
        _ => {}
    }
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Unwrap Google redirect links (`/url?q=…` or `?url=…`) to their target.
#[must_use]
pub fn resolve_redirect(link: &str) -> String {
    let trimmed = link.trim();
    let Ok(parsed) = url::Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let is_google = parsed
        .host_str()
        .is_some_and(|h| h == "google.com" || h.contains(".google.") || h.starts_with("google."));
    if !is_google {
        return trimmed.to_string();
    }
    parsed
        .query_pairs()
        .find(|(k, _)| (parsed.path() == "/url" && k == "q") || k == "url")
        .map(|(_, v)| v.into_owned())
        .filter(|target| target.starts_with("http://") || target.starts_with("https://"))
        .unwrap_or_else(|| trimmed.to_string())
}

fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
