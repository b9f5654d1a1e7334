//! Sync command handler: one tick of the sync engine, on demand.

use std::sync::Arc;

use chrono::Utc;
use veille_core::{AppConfig, ArticleStore};
use veille_db::PgStore;
use veille_sync::{SyncEngine, SyncOutcome};

/// Run one sync tick now. Honors an active backoff window the same way the
/// scheduler does.
///
/// # Errors
///
/// Returns an error if the sink cannot be built or sync state cannot be read
/// or written. A failed push is reported, not raised.
pub(crate) async fn run_sync(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let store: Arc<dyn ArticleStore> = Arc::new(PgStore::new(pool.clone()));
    let engine = SyncEngine::from_app_config(store, config)?;

    match engine.sync_batch(Utc::now()).await? {
        SyncOutcome::Skipped { next_attempt_at } => {
            println!(
                "sync backing off after earlier failures; next attempt at {}",
                next_attempt_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        SyncOutcome::Idle => println!("nothing certified is waiting for sync"),
        SyncOutcome::Acknowledged { count } => {
            println!("sync complete: {count} article(s) acknowledged");
        }
        SyncOutcome::Failed {
            error,
            consecutive_failures,
            next_attempt_at,
            exported,
        } => {
            eprintln!("error: sync failed ({consecutive_failures} in a row): {error}");
            if exported > 0 {
                println!(
                    "{exported} row(s) appended to {}",
                    config.export_path.display()
                );
            }
            println!(
                "records stay pending; next attempt at {}",
                next_attempt_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    Ok(())
}
