mod articles;
mod enrich;
mod review;
mod runs;
mod scrape;
mod sync;
mod themes;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use veille_core::{ContentEdit, SentimentLabel};

use articles::ArticlesCommands;
use review::{ActorArgs, TransitionAction};
use runs::RunsCommands;
use themes::ThemesCommands;

#[derive(Debug, Parser)]
#[command(name = "veille")]
#[command(about = "Veille media-watch command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect the theme registry file
    Themes {
        #[command(subcommand)]
        command: ThemesCommands,
    },
    /// Run one scrape; searches the global keyword pool unless a theme option is given
    Scrape {
        /// Scrape a single theme (name is case-insensitive)
        #[arg(long, conflicts_with = "all_themes")]
        theme: Option<String>,

        /// Scrape every theme in the registry
        #[arg(long)]
        all_themes: bool,

        /// Print the keywords that would be searched without calling any platform
        #[arg(long)]
        dry_run: bool,
    },
    /// Score collected articles and release them to review
    Enrich,
    /// Push one batch of certified articles to the spreadsheet
    Sync,
    /// Browse collected articles
    Articles {
        #[command(subcommand)]
        command: ArticlesCommands,
    },
    /// Apply a review action to an article
    Transition {
        /// Article id
        id: i64,

        #[arg(value_enum)]
        action: TransitionAction,

        /// Why the article is rejected (required for `reject`)
        #[arg(long)]
        reason: Option<String>,

        /// Corrected title, recorded with `validate`
        #[arg(long)]
        title: Option<String>,

        /// Corrected content, recorded with `validate`
        #[arg(long)]
        content: Option<String>,

        /// Corrected tonality (`Positif`, `Négatif`, `Neutre`), recorded with `validate`
        #[arg(long)]
        sentiment: Option<SentimentLabel>,

        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Move an article to another theme
    Reassign {
        /// Article id
        id: i64,

        /// Target theme (must exist in the current registry)
        theme: String,

        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Inspect scrape run history
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn connect(config: &veille_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    veille_db::connect_pool(
        &config.database_url,
        veille_db::PoolConfig::from_app_config(config),
    )
    .await
    .context("failed to connect to the database")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("veille: no command given; run `veille --help`");
        return Ok(());
    };

    let config = veille_core::load_app_config().context("failed to load configuration")?;
    init_tracing(&config.log_level)?;

    // Registry inspection never touches the database.
    if let Commands::Themes { command } = &command {
        return themes::run_themes(&config, command);
    }

    let pool = connect(&config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                veille_db::health_check(&pool).await?;
                println!("database reachable");
            }
            DbCommands::Migrate => {
                let applied = veille_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Themes { command } => themes::run_themes(&config, &command)?,
        Commands::Scrape {
            theme,
            all_themes,
            dry_run,
        } => {
            let scope = scrape::scope_from_args(theme, all_themes);
            scrape::run_scrape(&pool, &config, scope, dry_run).await?;
        }
        Commands::Enrich => enrich::run_enrich(&pool, &config).await?,
        Commands::Sync => sync::run_sync(&pool, &config).await?,
        Commands::Articles { command } => match command {
            ArticlesCommands::List {
                status,
                theme,
                unassigned,
                limit,
            } => {
                articles::run_articles_list(&pool, status, theme, unassigned, limit).await?;
            }
            ArticlesCommands::Show { id } => articles::run_articles_show(&pool, id).await?,
            ArticlesCommands::Stats { days } => articles::run_articles_stats(&pool, days).await?,
        },
        Commands::Transition {
            id,
            action,
            reason,
            title,
            content,
            sentiment,
            actor,
        } => {
            let edit = ContentEdit {
                title,
                content,
                sentiment,
            };
            let action = review::build_action(action, reason, edit)?;
            let actor = actor.to_actor()?;
            review::run_transition(&pool, id, &action, &actor).await?;
        }
        Commands::Reassign { id, theme, actor } => {
            let actor = actor.to_actor()?;
            review::run_reassign(&pool, &config, id, &theme, &actor).await?;
        }
        Commands::Runs { command } => match command {
            RunsCommands::List { limit } => runs::run_runs_list(&pool, limit).await?,
            RunsCommands::Show { id } => runs::run_runs_show(&pool, id).await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests;
