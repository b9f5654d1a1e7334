//! Scrape command handler.
//!
//! One invocation is one scrape run: a `scrape_runs` row is opened before
//! the orchestrator starts and closed with its report. Ctrl-C stops the
//! remaining keywords; already admitted articles stay.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use veille_core::{AppConfig, ArticleStore, RunScope, ThemeSet};
use veille_db::PgStore;
use veille_scraper::{GoogleNewsCollector, Orchestrator, OrchestratorConfig, RunReport};

/// `--theme` wins, then `--all-themes`; with neither the global pool runs.
pub(crate) fn scope_from_args(theme: Option<String>, all_themes: bool) -> RunScope {
    match theme {
        Some(name) => RunScope::Theme(name),
        None if all_themes => RunScope::AllThemes,
        None => RunScope::Global,
    }
}

/// Replace a user-typed theme name with the registry's spelling so run
/// history and cadence lookups agree.
fn canonical_scope(themes: &ThemeSet, scope: RunScope) -> anyhow::Result<RunScope> {
    match scope {
        RunScope::Theme(name) => {
            let theme = themes
                .find(&name)
                .ok_or_else(|| anyhow::anyhow!("theme '{name}' not found in registry"))?;
            Ok(RunScope::Theme(theme.name.clone()))
        }
        other => Ok(other),
    }
}

/// `(theme, keyword, cap)` for every keyword pass the scope would make.
fn planned_passes<'a>(
    themes: &'a ThemeSet,
    scope: &RunScope,
    global_cap: u32,
) -> Vec<(Option<&'a str>, &'a str, u32)> {
    match scope {
        RunScope::Global => themes
            .global_keywords
            .iter()
            .map(|k| (None, k.as_str(), global_cap))
            .collect(),
        RunScope::Theme(name) => themes
            .find(name)
            .map(|t| {
                t.keywords
                    .iter()
                    .map(|k| (Some(t.name.as_str()), k.as_str(), t.max_items_per_keyword))
                    .collect()
            })
            .unwrap_or_default(),
        RunScope::AllThemes => themes
            .themes
            .iter()
            .flat_map(|t| {
                t.keywords
                    .iter()
                    .map(|k| (Some(t.name.as_str()), k.as_str(), t.max_items_per_keyword))
            })
            .collect(),
    }
}

/// Attempt to mark a scrape run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = veille_db::fail_scrape_run(pool, run_id, &message).await {
        tracing::error!(run_id, error = %mark_err, "failed to mark scrape run as failed");
    }
}

fn print_report(run_id: i64, report: &RunReport) {
    println!(
        "{:<24}{:<32}{:<15}{:<10}{:<11}{:<9}ERROR",
        "THEME", "KEYWORD", "OUTCOME", "ADMITTED", "REFRESHED", "IGNORED"
    );
    for entry in &report.keywords {
        let (admitted, refreshed, ignored) = entry.outcome.counts();
        println!(
            "{:<24}{:<32}{:<15}{:<10}{:<11}{:<9}{}",
            entry.theme.as_deref().unwrap_or("(global)"),
            entry.keyword,
            entry.outcome.as_str(),
            admitted,
            refreshed,
            ignored,
            entry.outcome.error().unwrap_or("")
        );
    }
    println!();
    println!(
        "run {run_id} ({}): {} admitted, {} refreshed, {} adapter calls{}{}",
        report.scope,
        report.admitted(),
        report.refreshed(),
        report.adapter_calls,
        if report.is_partial() { ", partial" } else { "" },
        if report.cancelled { ", cancelled" } else { "" },
    );
}

/// Run one scrape over `scope` against Google News.
///
/// When `dry_run` is `true`, prints the planned keyword passes and returns
/// without calling the platform or writing to the database.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded, the theme is unknown,
/// the collector cannot be built, or the run cannot be recorded. Per-keyword
/// failures are reported in the run, not propagated.
pub(crate) async fn run_scrape(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    scope: RunScope,
    dry_run: bool,
) -> anyhow::Result<()> {
    let themes = veille_core::load_themes(&config.themes_path)?;
    let scope = canonical_scope(&themes, scope)?;

    if dry_run {
        let passes = planned_passes(&themes, &scope, config.global_max_items_per_keyword);
        println!(
            "dry-run: {scope} would search {} keywords (at most {} adapter calls):",
            passes.len(),
            config.scraper_max_calls_per_run
        );
        for (theme, keyword, cap) in passes {
            println!("  [{}] {keyword} (max {cap})", theme.unwrap_or("global"));
        }
        return Ok(());
    }

    let collector = GoogleNewsCollector::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build Google News client: {e}"))?;
    let store: Arc<dyn ArticleStore> = Arc::new(PgStore::new(pool.clone()));
    let orchestrator = Orchestrator::new(
        Arc::new(collector),
        store,
        OrchestratorConfig::from_app_config(config),
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current keyword");
                cancel.cancel();
            }
        })
    };

    let run = veille_db::create_scrape_run(pool, &scope, "cli").await?;
    let result = orchestrator.run(&themes, &scope, &cancel).await;
    on_ctrl_c.abort();

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
            return Err(err.into());
        }
    };

    if let Err(err) = veille_db::record_run_report(pool, run.id, &report).await {
        fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
        return Err(err.into());
    }

    print_report(run.id, &report);
    Ok(())
}
