//! Scrape run history queries.

use clap::Subcommand;

/// Sub-commands available under `runs`.
#[derive(Debug, Subcommand)]
pub enum RunsCommands {
    /// List recent scrape runs
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show one run with its per-keyword outcomes
    Show {
        /// Run id
        id: i64,
    },
}

/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs_list(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = veille_db::list_scrape_runs(pool, limit).await?;

    if runs.is_empty() {
        println!("no scrape runs recorded; run `scrape` first");
        return Ok(());
    }

    println!(
        "{:<7}{:<18}{:<24}{:<11}{:<11}{:<7}{:<10}REFRESHED",
        "ID", "STARTED", "SCOPE", "TRIGGER", "STATUS", "CALLS", "ADMITTED"
    );
    for run in &runs {
        let scope = run
            .theme
            .as_deref()
            .map_or_else(|| run.scope.clone(), |t| format!("theme:{t}"));
        println!(
            "{:<7}{:<18}{:<24}{:<11}{:<11}{:<7}{:<10}{}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M"),
            scope,
            run.trigger_source,
            run.status,
            run.adapter_calls,
            run.admitted_count,
            run.refreshed_count
        );
    }

    Ok(())
}

/// # Errors
///
/// Returns an error if the run does not exist or the query fails.
pub(crate) async fn run_runs_show(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<()> {
    let run = match veille_db::get_scrape_run(pool, id).await {
        Ok(run) => run,
        Err(veille_db::DbError::NotFound) => anyhow::bail!("scrape run {id} not found"),
        Err(err) => return Err(err.into()),
    };
    let keywords = veille_db::list_scrape_run_keywords(pool, id).await?;

    println!("Run:      {} ({})", run.id, run.public_id);
    println!("Scope:    {}", run.theme.as_deref().unwrap_or(&run.scope));
    println!("Trigger:  {}", run.trigger_source);
    println!("Status:   {}", run.status);
    println!("Started:  {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(done) = run.completed_at {
        println!("Finished: {}", done.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(error) = &run.error_message {
        println!("Error:    {error}");
    }

    println!();
    println!(
        "{:<24}{:<32}{:<15}{:<10}{:<11}{:<9}ERROR",
        "THEME", "KEYWORD", "OUTCOME", "ADMITTED", "REFRESHED", "IGNORED"
    );
    for kw in &keywords {
        println!(
            "{:<24}{:<32}{:<15}{:<10}{:<11}{:<9}{}",
            kw.theme.as_deref().unwrap_or("(global)"),
            kw.keyword,
            kw.outcome,
            kw.admitted_count,
            kw.refreshed_count,
            kw.ignored_count,
            kw.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
