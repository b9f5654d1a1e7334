//! Collection side of the pipeline: the platform collector seam, the Google
//! News RSS adapter, upstream rate limiting, and the scrape orchestrator.

pub mod collector;
pub mod error;
pub mod google_news;
pub mod orchestrator;
pub mod rate_limit;

pub use collector::{normalize_candidate, CandidateStream, PlatformCollector, RawCandidate};
pub use error::{FetchError, OrchestratorError};
pub use google_news::GoogleNewsCollector;
pub use orchestrator::{
    KeywordOutcome, KeywordReport, Orchestrator, OrchestratorConfig, RunReport,
};
pub use rate_limit::{retry_with_backoff, CallBudget, RetryPolicy, Throttle};
