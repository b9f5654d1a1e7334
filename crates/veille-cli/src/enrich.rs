//! Enrichment command handler.

use veille_core::AppConfig;
use veille_db::PgStore;
use veille_sentiment::{enrich_pending, EnrichmentConfig};

/// Run one enrichment sweep with the configured scorer.
///
/// # Errors
///
/// Returns an error if the registry or scorer cannot be loaded, or the
/// candidate listing fails. Per-article failures are counted, not raised.
pub(crate) async fn run_enrich(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let themes = veille_core::load_themes(&config.themes_path)?;
    let scorer = veille_sentiment::scorer_from_config(config)?;
    let store = PgStore::new(pool.clone());

    let report = enrich_pending(
        &store,
        scorer.as_ref(),
        &themes,
        &EnrichmentConfig::from_app_config(config),
    )
    .await?;

    println!(
        "enrichment ({}): {} claimed, {} recovered, {} scored, {} unscored, {} themes inferred, {} skipped, {} failed",
        scorer.name(),
        report.claimed,
        report.recovered,
        report.scored,
        report.unscored,
        report.themes_inferred,
        report.skipped,
        report.failed
    );
    Ok(())
}
