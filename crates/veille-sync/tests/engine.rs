//! Sync engine against `MemoryStore` with a scripted sink.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use veille_core::{
    apply_transition, begin_enrichment, complete_enrichment, Action, Actor, AdmitOutcome,
    ArticleStatus, ArticleStore, Candidate, DedupEngine, MemoryStore, SyncState,
};
use veille_sync::{
    LocalExport, SheetRow, SheetSink, SinkError, SyncConfig, SyncEngine, SyncOutcome,
};

/// Fails while scripted failures remain, then accepts. Records every push.
#[derive(Default)]
struct ScriptedSink {
    failures: Mutex<VecDeque<String>>,
    pushes: Mutex<Vec<Vec<SheetRow>>>,
}

impl ScriptedSink {
    fn failing(times: usize) -> Self {
        let sink = Self::default();
        sink.failures
            .lock()
            .unwrap()
            .extend((0..times).map(|i| format!("quota exceeded #{i}")));
        sink
    }

    fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }
}

#[async_trait]
impl SheetSink for ScriptedSink {
    async fn push(&self, rows: &[SheetRow]) -> Result<(), SinkError> {
        self.pushes.lock().unwrap().push(rows.to_vec());
        match self.failures.lock().unwrap().pop_front() {
            Some(body) => Err(SinkError::Rejected { status: 429, body }),
            None => Ok(()),
        }
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 14, 8, 0, 0).unwrap()
}

fn hours(n: i64) -> chrono::Duration {
    chrono::Duration::hours(n)
}

fn config() -> SyncConfig {
    SyncConfig {
        max_batch: 200,
        failure_threshold: 3,
        backoff_base: Duration::from_secs(60),
        backoff_max: Duration::from_secs(3600),
    }
}

fn export_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("veille-sync-{}", uuid::Uuid::new_v4()))
        .join("fallback.jsonl")
}

async fn certified(store: &MemoryStore, n: usize) -> Vec<i64> {
    let member = Actor::Member {
        name: "alice".into(),
        theme: "Santé".into(),
    };
    let admin = Actor::Admin {
        name: "root".into(),
    };
    let mut ids = Vec::new();
    for i in 0..n {
        let candidate = Candidate {
            source_platform: "google_news".into(),
            url: format!("https://a.ne/{i}"),
            title: format!("Article {i}"),
            content: String::new(),
            published_at: None,
            theme: Some("Santé".into()),
            assigned_member: Some("alice".into()),
        };
        let AdmitOutcome::Admitted(id) = DedupEngine::new(store, 200).admit(&candidate).await.unwrap()
        else {
            panic!("expected admission");
        };
        assert!(begin_enrichment(store, id).await.unwrap());
        assert!(complete_enrichment(store, id, None).await.unwrap());
        apply_transition(store, id, &Action::Validate { edits: None }, &member)
            .await
            .unwrap();
        apply_transition(store, id, &Action::Certify, &admin).await.unwrap();
        ids.push(id);
    }
    ids
}

fn engine(
    store: &Arc<MemoryStore>,
    sink: Option<Arc<ScriptedSink>>,
    export: &LocalExport,
    config: SyncConfig,
) -> SyncEngine {
    SyncEngine::new(
        Arc::clone(store) as Arc<dyn ArticleStore>,
        sink.map(|s| s as Arc<dyn SheetSink>),
        export.clone(),
        config,
    )
}

#[tokio::test]
async fn successful_tick_acknowledges_whole_batch_in_one_push() {
    let store = Arc::new(MemoryStore::new());
    let ids = certified(&store, 3).await;
    let sink = Arc::new(ScriptedSink::default());
    let export = LocalExport::new(export_path());
    let engine = engine(&store, Some(Arc::clone(&sink)), &export, config());

    let outcome = engine.sync_batch(t0()).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Acknowledged { count: 3 });
    assert_eq!(sink.push_count(), 1);
    for id in ids {
        let a = store.get_article(id).await.unwrap().unwrap();
        assert_eq!(a.status, ArticleStatus::Synced);
        assert_eq!(a.sync_state, SyncState::Acknowledged);
    }
    let health = store.load_sync_health().await.unwrap();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.last_success_at, Some(t0()));
}

#[tokio::test]
async fn nothing_certified_is_idle() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(ScriptedSink::default());
    let export = LocalExport::new(export_path());
    let engine = engine(&store, Some(Arc::clone(&sink)), &export, config());

    assert_eq!(engine.sync_batch(t0()).await.unwrap(), SyncOutcome::Idle);
    assert_eq!(sink.push_count(), 0);
}

#[tokio::test]
async fn batches_are_bounded() {
    let store = Arc::new(MemoryStore::new());
    certified(&store, 5).await;
    let sink = Arc::new(ScriptedSink::default());
    let export = LocalExport::new(export_path());
    let mut cfg = config();
    cfg.max_batch = 2;
    let engine = engine(&store, Some(Arc::clone(&sink)), &export, cfg);

    assert_eq!(
        engine.sync_batch(t0()).await.unwrap(),
        SyncOutcome::Acknowledged { count: 2 }
    );
    assert_eq!(
        engine.sync_batch(t0()).await.unwrap(),
        SyncOutcome::Acknowledged { count: 2 }
    );
    assert_eq!(
        engine.sync_batch(t0()).await.unwrap(),
        SyncOutcome::Acknowledged { count: 1 }
    );
    assert_eq!(engine.sync_batch(t0()).await.unwrap(), SyncOutcome::Idle);
    assert_eq!(sink.push_count(), 3);
}

#[tokio::test]
async fn failure_keeps_records_pending_and_backs_off() {
    let store = Arc::new(MemoryStore::new());
    let ids = certified(&store, 2).await;
    let sink = Arc::new(ScriptedSink::failing(1));
    let export = LocalExport::new(export_path());
    let engine = engine(&store, Some(Arc::clone(&sink)), &export, config());

    let SyncOutcome::Failed {
        consecutive_failures,
        next_attempt_at,
        exported,
        ..
    } = engine.sync_batch(t0()).await.unwrap()
    else {
        panic!("expected failure");
    };
    assert_eq!(consecutive_failures, 1);
    assert_eq!(next_attempt_at, t0() + chrono::Duration::seconds(60));
    assert_eq!(exported, 0);
    for id in &ids {
        let a = store.get_article(*id).await.unwrap().unwrap();
        assert_eq!(a.status, ArticleStatus::AdminCertified);
        assert_eq!(a.sync_state, SyncState::Pending);
        assert_eq!(a.last_sync_attempt_at, Some(t0()));
    }

    // a tick inside the backoff window does not touch the sink
    let early = engine
        .sync_batch(t0() + chrono::Duration::seconds(30))
        .await
        .unwrap();
    assert!(matches!(early, SyncOutcome::Skipped { .. }));
    assert_eq!(sink.push_count(), 1);

    // the next due tick succeeds and resets health
    let later = engine.sync_batch(t0() + hours(1)).await.unwrap();
    assert_eq!(later, SyncOutcome::Acknowledged { count: 2 });
    assert_eq!(store.load_sync_health().await.unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn fourth_consecutive_failure_exports_and_keeps_pending() {
    let store = Arc::new(MemoryStore::new());
    let ids = certified(&store, 2).await;
    let sink = Arc::new(ScriptedSink::failing(4));
    let export = LocalExport::new(export_path());
    let engine = engine(&store, Some(Arc::clone(&sink)), &export, config());

    for tick in 0..3 {
        let outcome = engine.sync_batch(t0() + hours(tick)).await.unwrap();
        assert!(
            matches!(outcome, SyncOutcome::Failed { exported: 0, .. }),
            "tick {tick}: {outcome:?}"
        );
    }
    assert!(export.read_all().await.unwrap().is_empty());

    let fourth = engine.sync_batch(t0() + hours(3)).await.unwrap();
    assert!(matches!(
        fourth,
        SyncOutcome::Failed {
            consecutive_failures: 4,
            exported: 2,
            ..
        }
    ));

    let records = export.read_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].reason.contains("quota exceeded"));
    for id in &ids {
        let a = store.get_article(*id).await.unwrap().unwrap();
        assert_eq!(a.sync_state, SyncState::Pending);
        assert_eq!(a.status, ArticleStatus::AdminCertified);
    }

    // recovery is transparent once the spreadsheet accepts again
    let recovered = engine.sync_batch(t0() + hours(10)).await.unwrap();
    assert_eq!(recovered, SyncOutcome::Acknowledged { count: 2 });
}

#[tokio::test]
async fn missing_sink_runs_export_only() {
    let store = Arc::new(MemoryStore::new());
    certified(&store, 1).await;
    let export = LocalExport::new(export_path());
    let mut cfg = config();
    cfg.failure_threshold = 0;
    let engine = engine(&store, None, &export, cfg);

    let outcome = engine.sync_batch(t0()).await.unwrap();
    let SyncOutcome::Failed { error, exported, .. } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(error, "no spreadsheet endpoint configured");
    assert_eq!(exported, 1);
}

#[tokio::test]
async fn acknowledge_is_idempotent_across_ticks() {
    let store = Arc::new(MemoryStore::new());
    let ids = certified(&store, 1).await;
    let sink = Arc::new(ScriptedSink::default());
    let export = LocalExport::new(export_path());
    let engine = engine(&store, Some(Arc::clone(&sink)), &export, config());

    engine.sync_batch(t0()).await.unwrap();
    assert_eq!(store.acknowledge_batch(&ids, t0()).await.unwrap(), 0);
    assert_eq!(engine.sync_batch(t0()).await.unwrap(), SyncOutcome::Idle);
}
