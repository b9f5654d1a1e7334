//! Read-only article queries.

use clap::Subcommand;
use veille_core::{ArticleFilter, ArticleStatus, ArticleStore};
use veille_db::PgStore;

/// Sub-commands available under `articles`.
#[derive(Debug, Subcommand)]
pub enum ArticlesCommands {
    /// List articles, most recently collected first
    List {
        /// Filter by workflow status (e.g. `pending_review`)
        #[arg(long)]
        status: Option<ArticleStatus>,

        /// Filter by theme
        #[arg(long, conflicts_with = "unassigned")]
        theme: Option<String>,

        /// Only articles with no theme yet
        #[arg(long)]
        unassigned: bool,

        /// Maximum number of articles to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show one article with its audit trail
    Show {
        /// Article id
        id: i64,
    },
    /// Counts by status, tonality and theme, plus daily tonality trends
    Stats {
        /// Days of tonality trend to show
        #[arg(long, default_value = "7", value_parser = clap::value_parser!(i32).range(1..=365))]
        days: i32,
    },
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_articles_list(
    pool: &sqlx::PgPool,
    status: Option<ArticleStatus>,
    theme: Option<String>,
    unassigned: bool,
    limit: i64,
) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let articles = store
        .list_articles(&ArticleFilter {
            status,
            theme,
            unassigned_only: unassigned,
            limit: Some(limit),
        })
        .await?;

    if articles.is_empty() {
        println!("no articles found; run `scrape` first");
        return Ok(());
    }

    println!(
        "{:<8}{:<20}{:<22}{:<10}{:<6}TITLE",
        "ID", "STATUS", "THEME", "TONALITY", "SEEN"
    );
    for article in &articles {
        let tonality = article
            .sentiment
            .map_or_else(|| "-".to_string(), |s| s.label.to_string());
        println!(
            "{:<8}{:<20}{:<22}{:<10}{:<6}{}",
            article.id,
            article.status,
            truncate(article.theme.as_deref().unwrap_or("-"), 18),
            tonality,
            article.seen_count,
            truncate(&article.title, 50)
        );
    }

    Ok(())
}

/// # Errors
///
/// Returns an error if the article does not exist or the query fails.
pub(crate) async fn run_articles_show(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let article = store
        .get_article(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("article {id} not found"))?;
    let events = store.list_events(id).await?;

    println!("Article:     {} ({})", article.id, article.public_id);
    println!("Title:       {}", article.title);
    println!("URL:         {}", article.url);
    println!("Platform:    {}", article.source_platform);
    println!("Theme:       {}", article.theme.as_deref().unwrap_or("unassigned"));
    println!("Member:      {}", article.assigned_member.as_deref().unwrap_or("-"));
    println!("Status:      {}", article.status);
    println!("Sync:        {}", article.sync_state);
    match article.sentiment {
        Some(s) => println!("Tonality:    {} ({:.2})", s.label, s.confidence),
        None => println!("Tonality:    -"),
    }
    println!(
        "Seen:        {} time(s), last {}",
        article.seen_count,
        article.last_seen_at.format("%Y-%m-%d %H:%M")
    );
    println!("Fingerprint: {}", article.fingerprint);
    if !article.raw_content.is_empty() {
        println!();
        println!("{}", article.raw_content);
    }

    println!();
    println!("{:<18}{:<22}{:<22}CHANGE", "DATE", "ACTOR", "ACTION");
    for event in &events {
        let change = match (&event.from_status, &event.to_status) {
            (Some(from), Some(to)) => format!("{from} -> {to}"),
            _ => format!(
                "theme {} -> {}",
                event.from_theme.as_deref().unwrap_or("unassigned"),
                event.to_theme.as_deref().unwrap_or("unassigned")
            ),
        };
        let reason = event
            .reason
            .as_deref()
            .map(|r| format!(" ({r})"))
            .unwrap_or_default();
        println!(
            "{:<18}{:<22}{:<22}{change}{reason}",
            event.created_at.format("%Y-%m-%d %H:%M"),
            event.actor,
            event.action
        );
    }

    Ok(())
}

/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_articles_stats(pool: &sqlx::PgPool, days: i32) -> anyhow::Result<()> {
    let stats = veille_db::article_stats(pool).await?;

    println!("total articles: {}", stats.total);
    for (title, rows) in [
        ("by status", &stats.by_status),
        ("by tonality", &stats.by_sentiment),
        ("by theme", &stats.by_theme),
    ] {
        println!();
        println!("{title}:");
        for row in rows {
            println!("  {:<28}{}", row.key, row.count);
        }
    }

    let trends = veille_db::sentiment_trends(pool, days).await?;
    println!();
    println!("tonality over the last {days} day(s):");
    if trends.is_empty() {
        println!("  no articles collected");
    }
    for row in &trends {
        println!("  {}  {:<10}{}", row.day, row.sentiment, row.count);
    }

    Ok(())
}
