//! End-to-end tests across the collector, hub, history store, dispatcher
//! and HTTP routes.
//!
//! Persistence tests use a real SQLite file in a temporary directory; route
//! tests drive the router with `oneshot` and never bind a socket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use hyperpulse::api::AppState;
use hyperpulse::api::routes::create_router;
use hyperpulse::collector::{Collector, CollectorConfig};
use hyperpulse::database::repositories::SqlxHistoryRepository;
use hyperpulse::database::{DbPool, init_pool, run_migrations};
use hyperpulse::history::{CSV_HEADER, HistoryStore, TimeRange};
use hyperpulse::hub::{BroadcastHub, HubConfig};
use hyperpulse::jobs::{JobBoard, JobEvent, JobEventBroadcaster, spawn_lifecycle_listener};
use hyperpulse::metrics::{MetricsCollector, PrometheusExporter};
use hyperpulse::notification::{
    NotificationDispatcher, NotificationDispatcherConfig, NotificationEndpoint,
};
use hyperpulse::snapshot::{JobCounts, Snapshot, SourceState, VmCounts, snapshot_cell};
use hyperpulse::source::{Source, SourceReport};
use hyperpulse::{Error, Result};

async fn setup_test_db(dir: &TempDir) -> DbPool {
    let db_path = dir.path().join("hyperpulse.db");
    let db_url = format!(
        "sqlite:{}?mode=rwc",
        db_path.to_string_lossy().replace('\\', "/")
    );
    let pool = init_pool(&db_url).await.expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

fn history_store(pool: &DbPool, retention_days: u32) -> Arc<HistoryStore> {
    Arc::new(HistoryStore::new(
        Arc::new(SqlxHistoryRepository::new(pool.clone())),
        retention_days,
    ))
}

fn snapshot_at(sequence: u64, timestamp: chrono::DateTime<Utc>, running_vms: u64) -> Snapshot {
    let mut snapshot = Snapshot::empty();
    snapshot.sequence = sequence;
    snapshot.timestamp = timestamp;
    snapshot.virtual_machines = VmCounts {
        total: running_vms,
        running: running_vms,
        ..Default::default()
    };
    snapshot
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

mod history_tests {
    use super::*;

    #[tokio::test]
    async fn test_range_is_inclusive_and_ascending() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let store = history_store(&pool, 30);

        let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let t4 = Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap();

        // Inserted out of order on purpose.
        for (seq, ts, vms) in [(3, t3, 30), (1, t1, 10), (4, t4, 40), (2, t2, 20)] {
            store.record_snapshot(&snapshot_at(seq, ts, vms)).await.unwrap();
        }

        let records = store
            .get_history(&TimeRange::new(t1, t3).unwrap())
            .await
            .unwrap();
        let timestamps: Vec<_> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![t1, t2, t3]);
        assert_eq!(records[0].running_vms, 10);
        assert_eq!(records[2].running_vms, 30);

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.timestamp, t4);
    }

    #[tokio::test]
    async fn test_sub_millisecond_start_excludes_earlier_rows() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let store = history_store(&pool, 30);

        let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let t2 = t1 + chrono::Duration::milliseconds(1);
        store.record_snapshot(&snapshot_at(1, t1, 10)).await.unwrap();
        store.record_snapshot(&snapshot_at(2, t2, 20)).await.unwrap();

        let start = t1 + chrono::Duration::microseconds(500);
        let range = TimeRange::new(start, t1 + chrono::Duration::hours(1)).unwrap();

        let records = store.get_history(&range).await.unwrap();
        let timestamps: Vec<_> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![t2]);
        assert!(records.iter().all(|r| r.timestamp >= start));

        let trend = store.get_trend(&range).await.unwrap();
        assert_eq!(trend.count, 1);
        assert_eq!(trend.running_vms.min, 20.0);
    }

    #[tokio::test]
    async fn test_trend_over_empty_range_is_zero() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let store = history_store(&pool, 30);

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let trend = store
            .get_trend(&TimeRange::new(start, end).unwrap())
            .await
            .unwrap();
        assert_eq!(trend.count, 0);
        assert_eq!(trend.running_vms.max, 0.0);
        assert_eq!(trend.backup_delta, 0);
    }

    #[tokio::test]
    async fn test_trend_aggregates_range() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let store = history_store(&pool, 30);

        let base = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        for (i, vms) in [10u64, 20, 30].into_iter().enumerate() {
            let ts = base + chrono::Duration::hours(i as i64);
            store
                .record_snapshot(&snapshot_at(i as u64 + 1, ts, vms))
                .await
                .unwrap();
        }

        let range = TimeRange::new(base, base + chrono::Duration::hours(2)).unwrap();
        let trend = store.get_trend(&range).await.unwrap();
        assert_eq!(trend.count, 3);
        assert_eq!(trend.running_vms.min, 10.0);
        assert_eq!(trend.running_vms.max, 30.0);
        assert_eq!(trend.running_vms.mean, 20.0);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let store = history_store(&pool, 30);

        let now = Utc::now();
        store
            .record_snapshot(&snapshot_at(1, now - chrono::Duration::days(45), 5))
            .await
            .unwrap();
        store
            .record_snapshot(&snapshot_at(2, now - chrono::Duration::hours(1), 6))
            .await
            .unwrap();

        assert_eq!(store.cleanup().await.unwrap(), 1);
        assert_eq!(store.cleanup().await.unwrap(), 0);

        let remaining = store
            .get_history(&TimeRange::named("30d", now).unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].running_vms, 6);
    }
}

mod collector_tests {
    use super::*;

    struct EngineSource;

    #[async_trait]
    impl Source for EngineSource {
        fn name(&self) -> &str {
            "engine"
        }

        async fn fetch(&self) -> Result<SourceReport> {
            Ok(SourceReport {
                jobs: JobCounts {
                    active: 3,
                    failed: 1,
                    ..Default::default()
                },
                ..Default::default()
            })
        }
    }

    struct HangingSource;

    #[async_trait]
    impl Source for HangingSource {
        fn name(&self) -> &str {
            "cluster-east"
        }

        async fn fetch(&self) -> Result<SourceReport> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(Error::source_unavailable("cluster-east", "unreachable"))
        }
    }

    #[tokio::test]
    async fn test_slow_source_does_not_delay_publication() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let history = history_store(&pool, 30);

        let hub = Arc::new(BroadcastHub::new(HubConfig::default()));
        let token = CancellationToken::new();
        hub.start(token.clone());
        let mut subscription = hub.register(None).unwrap();

        let (writer, reader) = snapshot_cell();
        let metrics = Arc::new(MetricsCollector::default());
        let collector = Collector::new(
            CollectorConfig {
                source_timeout: Duration::from_millis(100),
                ..Default::default()
            },
            writer,
            hub.clone(),
            history.clone(),
            token.clone(),
        )
        .with_source(Arc::new(EngineSource))
        .with_source(Arc::new(HangingSource))
        .with_metrics(metrics.clone());

        let started = Instant::now();
        let snapshot = collector.tick().await;
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.jobs.active, 3);
        assert_eq!(snapshot.jobs.failed, 1);
        assert_eq!(snapshot.sources["engine"].state, SourceState::Fresh);
        assert_eq!(snapshot.sources["cluster-east"].state, SourceState::Unavailable);
        assert_eq!(snapshot.health, hyperpulse::snapshot::HealthState::Degraded);
        assert!(
            snapshot
                .alerts
                .iter()
                .any(|alert| alert.source == "cluster-east")
        );
        assert_eq!(reader.current().sequence, 1);

        let frame = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["data"]["jobs"]["active"], 3);

        collector.record_history().await;
        let latest = history.latest().await.unwrap().unwrap();
        assert_eq!(latest.active_jobs, 3);
        assert_eq!(latest.failed_jobs, 1);

        let counters = metrics.snapshot();
        assert_eq!(counters.ticks_total, 1);
        assert_eq!(counters.history_writes_total, 1);
        token.cancel();
    }
}

mod dispatcher_tests {
    use super::*;
    use hyperpulse::notification::{
        ChannelBuilder, EventKind, NotificationChannel, OutboundMessage,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysFailing {
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationChannel for AlwaysFailing {
        fn channel_type(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _message: &OutboundMessage) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Other("status 500".to_string()))
        }
    }

    #[tokio::test]
    async fn test_job_events_reach_matching_endpoints_with_bounded_retries() {
        let channel = Arc::new(AlwaysFailing {
            calls: AtomicU32::new(0),
        });
        let shared = channel.clone();
        let builder: ChannelBuilder = Arc::new(move |_: &NotificationEndpoint| {
            shared.clone() as Arc<dyn NotificationChannel>
        });
        let dispatcher = Arc::new(NotificationDispatcher::with_channel_builder(
            NotificationDispatcherConfig {
                backoff_unit: Duration::from_millis(1),
                ..Default::default()
            },
            builder,
        ));
        dispatcher.replace_endpoints(vec![
            NotificationEndpoint::new("https://hooks.example.com/failed")
                .with_events(["job.failed"]),
        ]);

        let board = Arc::new(JobBoard::new());
        let events = JobEventBroadcaster::new();
        let token = CancellationToken::new();
        let listener = spawn_lifecycle_listener(
            events.subscribe(),
            board.clone(),
            Some(dispatcher.clone()),
            token.clone(),
        );

        let started: hyperpulse::jobs::JobEvent = serde_json::from_value(serde_json::json!({
            "kind": "started", "job_id": "job-1", "job_name": "vm-web-01"
        }))
        .unwrap();
        let failed: hyperpulse::jobs::JobEvent = serde_json::from_value(serde_json::json!({
            "kind": "failed", "job_id": "job-1", "job_name": "vm-web-01", "error": "disk full"
        }))
        .unwrap();
        events.publish(started);
        events.publish(failed);

        for _ in 0..200 {
            if dispatcher.stats().exhausted == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        dispatcher.wait_idle().await;

        let stats = dispatcher.stats();
        assert_eq!(stats.scheduled, 1, "only job.failed matches the endpoint");
        assert_eq!(stats.exhausted, 1);
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
        assert_eq!(board.counts().failed, 1);
        assert_eq!(board.counts().active, 0);

        // Unrelated kinds are not scheduled.
        assert_eq!(
            dispatcher.notify(EventKind::JobCompleted, serde_json::json!({})),
            0
        );

        token.cancel();
        listener.await.unwrap();
    }
}

mod route_tests {
    use super::*;

    fn live_state(hub: Arc<BroadcastHub>) -> AppState {
        let (_writer, reader) = snapshot_cell();
        AppState::new().with_snapshot(reader).with_hub(hub)
    }

    #[tokio::test]
    async fn test_snapshot_route_serves_current_snapshot() {
        let (writer, reader) = snapshot_cell();
        let mut snapshot = Snapshot::empty();
        snapshot.sequence = 42;
        writer.replace(snapshot);

        let app = create_router(AppState::new().with_snapshot(reader));
        let response = app.oneshot(get("/api/snapshot")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["sequence"], 42);
        assert!(json["recent_jobs"].is_array());
    }

    #[tokio::test]
    async fn test_history_disabled_returns_503() {
        let state = AppState::new().with_history(Arc::new(HistoryStore::disabled()));
        let app = create_router(state);
        let response = app.oneshot(get("/api/history?range=1h")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_history_bad_range_returns_400() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let app = create_router(AppState::new().with_history(history_store(&pool, 30)));

        let response = app
            .clone()
            .oneshot(get("/api/history?range=fortnight"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Only one bound given.
        let response = app
            .oneshot(get("/api/history?start=2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_csv_download() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let store = history_store(&pool, 30);
        store
            .record_snapshot(&snapshot_at(
                1,
                Utc::now() - chrono::Duration::minutes(10),
                12,
            ))
            .await
            .unwrap();

        let app = create_router(AppState::new().with_history(store));
        let response = app
            .oneshot(get("/api/history?range=1h&format=csv&download=true"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/csv"));
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"history-1h.csv\"");

        let body = body_text(response).await;
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(lines.count(), 1);
    }

    #[tokio::test]
    async fn test_history_latest_404_when_empty() {
        let dir = TempDir::new().unwrap();
        let pool = setup_test_db(&dir).await;
        let app = create_router(AppState::new().with_history(history_store(&pool, 30)));
        let response = app.oneshot(get("/api/history/latest")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_live_rejects_when_hub_full() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            max_subscribers: 1,
            ..Default::default()
        }));
        let _held = hub.register(None).unwrap();

        let app = create_router(live_state(hub.clone()));
        let response = app.oneshot(get("/api/live/ws")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["code"], "CAPACITY_EXCEEDED");
        assert_eq!(json["details"]["max_subscribers"], 1);
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn test_live_rejects_disallowed_origin() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            allowed_origins: vec!["https://dashboard.example.com".to_string()],
            ..Default::default()
        }));
        let app = create_router(live_state(hub.clone()));
        let request = Request::builder()
            .uri("/api/live/ws")
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_live_without_upgrade_releases_slot() {
        let hub = Arc::new(BroadcastHub::new(HubConfig::default()));
        let app = create_router(live_state(hub.clone()));
        let response = app.oneshot(get("/api/live/ws")).await.unwrap();
        assert!(response.status().is_client_error());
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_administration() {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            NotificationDispatcherConfig::default(),
        ));
        dispatcher
            .load(vec![NotificationEndpoint::new(
                "https://hooks.example.com/configured",
            )])
            .await
            .unwrap();
        let configured_id = dispatcher.list_endpoints()[0].id.clone();
        let app = create_router(AppState::new().with_dispatcher(dispatcher.clone()));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/notifications/endpoints",
                serde_json::json!({
                    "url": "https://hooks.example.com/ops",
                    "events": ["job.failed"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let created_id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["source"], "dynamic");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/notifications/endpoints",
                serde_json::json!({ "url": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .clone()
            .oneshot(get("/api/notifications/endpoints"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["total"], 2);

        let delete = |id: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/notifications/endpoints/{id}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(delete("missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.clone().oneshot(delete(&configured_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app.clone().oneshot(delete(&created_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(dispatcher.list_endpoints().len(), 1);
    }

    #[tokio::test]
    async fn test_event_ingest() {
        let events = JobEventBroadcaster::new();
        let board = Arc::new(JobBoard::new());
        let token = CancellationToken::new();
        spawn_lifecycle_listener(events.subscribe(), board.clone(), None, token.clone());

        let metrics = Arc::new(MetricsCollector::default());
        let app = create_router(
            AppState::new()
                .with_job_events(events)
                .with_metrics(metrics.clone()),
        );

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/events",
                serde_json::json!({
                    "kind": "started",
                    "job_id": "job-7",
                    "job_name": "vm-db-02",
                    "provider": "vsphere"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["kind"], "job.started");
        assert_eq!(json["job_id"], "job-7");

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/events",
                serde_json::json!({
                    "kind": "progress",
                    "job_id": "job-7",
                    "job_name": "vm-db-02",
                    "percent_complete": 140.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        for _ in 0..100 {
            if board.counts().active == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(board.counts().active, 1);
        token.cancel();
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            NotificationDispatcherConfig::default(),
        ));
        let app = create_router(AppState::new().with_dispatcher(dispatcher));

        let request = Request::builder()
            .method("POST")
            .uri("/api/notifications/endpoints")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"url\": "))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("application/json"));
        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn test_job_routes() {
        let board = Arc::new(JobBoard::new());
        board.apply(&JobEvent::Created {
            job_id: "job-1".to_string(),
            job_name: "vm-web-01".to_string(),
            provider: Some("vsphere".to_string()),
            vm_path: None,
            timestamp: Utc::now(),
        });
        board.apply(&JobEvent::Failed {
            job_id: "job-1".to_string(),
            job_name: "vm-web-01".to_string(),
            error: "disk copy failed".to_string(),
            timestamp: Utc::now(),
        });
        let app = create_router(AppState::new().with_job_board(board));

        let response = app.clone().oneshot(get("/api/jobs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total"], 2);
        assert_eq!(json["jobs"][0]["status"], "pending");

        let response = app.clone().oneshot(get("/api/jobs/job-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], "job-1");
        assert_eq!(json["status"], "failed");

        let response = app.oneshot(get("/api/jobs/unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_job_routes_without_board_are_unavailable() {
        let app = create_router(AppState::new());
        let response = app.oneshot(get("/api/jobs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let metrics = Arc::new(MetricsCollector::default());
        metrics.record_tick(Duration::from_millis(12));
        let exporter = Arc::new(PrometheusExporter::new(metrics.clone()));
        let app = create_router(
            AppState::new()
                .with_metrics(metrics)
                .with_exporter(exporter),
        );

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
        let body = body_text(response).await;
        assert!(body.contains("# TYPE hyperpulse_collection_ticks_total counter"));
        assert!(body.contains("hyperpulse_collection_ticks_total 1"));
    }

    #[tokio::test]
    async fn test_metrics_without_exporter_is_unavailable() {
        let app = create_router(AppState::new());
        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
