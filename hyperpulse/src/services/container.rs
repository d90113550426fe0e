//! Service container for dependency injection.
//!
//! The ServiceContainer builds every long-lived component from an
//! [`AppConfig`], starts their background tasks and stops them in order.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::api::AppState;
use crate::collector::Collector;
use crate::config::AppConfig;
use crate::database::repositories::{SqlxHistoryRepository, SqlxNotificationEndpointRepository};
use crate::database::{self, DbPool, MaintenanceScheduler};
use crate::history::HistoryStore;
use crate::hub::BroadcastHub;
use crate::jobs::{JobBoard, JobEventBroadcaster, spawn_lifecycle_listener};
use crate::logging::LoggingConfig;
use crate::metrics::{
    HealthChecker, MetricsCollector, PrometheusExporter, collector_check, history_check, hub_check,
};
use crate::notification::{NotificationDispatcher, NotificationEndpoint, load_endpoints_file};
use crate::snapshot::{SnapshotReader, snapshot_cell};
use crate::source::{ClusterSource, JobBoardSource, Source, SystemSource};
use crate::utils::http_client;

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Job event channel capacity.
const JOB_EVENT_CAPACITY: usize = 1024;

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool, present when history is enabled.
    pub pool: Option<DbPool>,
    pub snapshot: SnapshotReader,
    pub hub: Arc<BroadcastHub>,
    pub history: Arc<HistoryStore>,
    pub job_board: Arc<JobBoard>,
    pub job_events: JobEventBroadcaster,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub collector: Arc<Collector>,
    pub metrics: Arc<MetricsCollector>,
    pub health_checker: Arc<HealthChecker>,
    pub exporter: Arc<PrometheusExporter>,
    maintenance: Option<Arc<MaintenanceScheduler>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build every service from `config` without starting any task.
    pub async fn new(config: &AppConfig) -> Result<Self> {
        info!("Initializing service container");
        let cancellation_token = CancellationToken::new();
        let metrics = Arc::new(MetricsCollector::default());

        // Persistence
        let pool = match &config.database_url {
            Some(url) => {
                let pool = database::init_pool(url).await?;
                database::run_migrations(&pool).await?;
                Some(pool)
            }
            None => {
                info!("DATABASE_URL not set, history disabled");
                None
            }
        };

        let history = Arc::new(match &pool {
            Some(pool) => HistoryStore::new(
                Arc::new(SqlxHistoryRepository::new(pool.clone())),
                config.retention_days,
            ),
            None => HistoryStore::disabled(),
        });

        let maintenance = pool.as_ref().map(|pool| {
            Arc::new(
                MaintenanceScheduler::new(
                    pool.clone(),
                    history.clone(),
                    config.maintenance.clone(),
                    cancellation_token.child_token(),
                )
                .with_metrics(metrics.clone()),
            )
        });

        // Notifications
        let mut dispatcher = NotificationDispatcher::new(config.notifications.clone());
        if let Some(pool) = &pool {
            dispatcher = dispatcher.with_repository(Arc::new(
                SqlxNotificationEndpointRepository::new(pool.clone()),
            ));
        }
        let dispatcher = Arc::new(dispatcher);
        let configured = load_configured_endpoints(config).await;
        dispatcher.load(configured).await?;

        // Live feed
        let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
        let (writer, snapshot) = snapshot_cell();

        // Sources
        let job_board = Arc::new(JobBoard::new());
        let job_events = JobEventBroadcaster::with_capacity(JOB_EVENT_CAPACITY);
        let sources = build_sources(config, job_board.clone())?;

        let collector = Arc::new(
            Collector::new(
                config.collector.clone(),
                writer,
                hub.clone(),
                history.clone(),
                cancellation_token.child_token(),
            )
            .with_sources(sources)
            .with_metrics(metrics.clone()),
        );

        let health_checker = Arc::new(HealthChecker::new());
        let stale_after = config
            .collector
            .interval
            .saturating_mul(10)
            .max(Duration::from_secs(30));
        health_checker
            .register("collector", collector_check(snapshot.clone(), stale_after))
            .await;
        health_checker.register("hub", hub_check(hub.clone())).await;
        health_checker
            .register("history", history_check(history.clone()))
            .await;

        let exporter = Arc::new(
            PrometheusExporter::new(metrics.clone())
                .with_snapshot(snapshot.clone())
                .with_hub(hub.clone())
                .with_dispatcher(dispatcher.clone()),
        );

        info!(
            sources = collector.source_names().len(),
            history = history.is_enabled(),
            "Service container initialized"
        );

        Ok(Self {
            pool,
            snapshot,
            hub,
            history,
            job_board,
            job_events,
            dispatcher,
            collector,
            metrics,
            health_checker,
            exporter,
            maintenance,
            tasks: parking_lot::Mutex::new(Vec::new()),
            cancellation_token,
        })
    }

    /// Start the hub, lifecycle listener, collector and maintenance loops.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        tasks.extend(self.hub.start(self.cancellation_token.child_token()));
        tasks.push(spawn_lifecycle_listener(
            self.job_events.subscribe(),
            self.job_board.clone(),
            Some(self.dispatcher.clone()),
            self.cancellation_token.child_token(),
        ));
        tasks.extend(self.collector.clone().start());
        if let Some(maintenance) = &self.maintenance {
            tasks.push(maintenance.clone().start());
        }
        info!(tasks = tasks.len(), "Background services started");
    }

    /// Shared state for the API server.
    pub fn app_state(&self, logging_config: Option<Arc<LoggingConfig>>) -> AppState {
        let state = AppState::new()
            .with_snapshot(self.snapshot.clone())
            .with_hub(self.hub.clone())
            .with_history(self.history.clone())
            .with_dispatcher(self.dispatcher.clone())
            .with_job_events(self.job_events.clone())
            .with_job_board(self.job_board.clone())
            .with_health_checker(self.health_checker.clone())
            .with_metrics(self.metrics.clone())
            .with_exporter(self.exporter.clone());
        match logging_config {
            Some(config) => state.with_logging_config(config),
            None => state,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Stop every service, waiting up to the default timeout.
    pub async fn shutdown(&self) {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await;
    }

    /// Cancel background loops, drain notification deliveries and close
    /// the pool.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) {
        info!("Shutting down services");
        self.cancellation_token.cancel();
        self.dispatcher.stop().await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let joined = tokio::time::timeout(timeout, futures::future::join_all(tasks)).await;
        if joined.is_err() {
            warn!("Background tasks did not stop within {:?}", timeout);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        info!("Services stopped");
    }
}

async fn load_configured_endpoints(config: &AppConfig) -> Vec<NotificationEndpoint> {
    let Some(path) = &config.notification_endpoints_file else {
        return Vec::new();
    };
    match load_endpoints_file(path).await {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("Failed to load notification endpoints from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn build_sources(config: &AppConfig, board: Arc<JobBoard>) -> Result<Vec<Arc<dyn Source>>> {
    let mut sources: Vec<Arc<dyn Source>> = vec![Arc::new(JobBoardSource::new(board))];
    if config.enable_system_source {
        sources.push(Arc::new(SystemSource::new()));
    }
    if !config.cluster_sources.is_empty() {
        let client = http_client::build_client(config.collector.source_timeout);
        for cluster in &config.cluster_sources {
            sources.push(Arc::new(ClusterSource::new(
                cluster.name.clone(),
                &cluster.base_url,
                client.clone(),
                config.collector.source_timeout,
            )?));
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_container_without_database() {
        let config = AppConfig {
            enable_system_source: false,
            ..Default::default()
        };
        let container = ServiceContainer::new(&config).await.unwrap();
        assert!(container.pool.is_none());
        assert!(!container.history.is_enabled());
        assert_eq!(container.collector.source_names(), vec!["jobs".to_string()]);

        container.start();
        let snapshot = container.collector.tick().await;
        assert!(snapshot.sequence >= 1);
        container.shutdown_with_timeout(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_container_with_in_memory_database() {
        let config = AppConfig {
            database_url: Some("sqlite::memory:".to_string()),
            enable_system_source: false,
            ..Default::default()
        };
        let container = ServiceContainer::new(&config).await.unwrap();
        assert!(container.history.is_enabled());
        container.shutdown_with_timeout(Duration::from_secs(5)).await;
    }
}
