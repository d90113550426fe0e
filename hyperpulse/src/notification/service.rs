//! Notification dispatcher.
//!
//! `notify` matches an event against the current endpoint list and spawns
//! one tracked delivery task per matching endpoint. Endpoint administration
//! builds a new list and swaps it in; tasks already running keep the
//! endpoint they started with.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::channels::{ChannelBuilder, NotificationChannel, OutboundMessage, webhook_builder};
use super::delivery::{DeliveryOutcome, DeliveryReport, deliver};
use super::endpoint::{EndpointSource, NotificationEndpoint};
use super::events::EventKind;
use crate::database::models::NotificationEndpointDbModel;
use crate::database::repositories::NotificationEndpointRepository;
use crate::utils::http_client;
use crate::{Error, Result};

/// Configuration for the notification dispatcher.
#[derive(Debug, Clone)]
pub struct NotificationDispatcherConfig {
    pub enabled: bool,
    /// One exponential-backoff time unit.
    pub backoff_unit: Duration,
    /// How long `stop` waits for in-flight deliveries.
    pub shutdown_timeout: Duration,
}

impl Default for NotificationDispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff_unit: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

struct RuntimeEndpoint {
    endpoint: NotificationEndpoint,
    channel: Arc<dyn NotificationChannel>,
}

#[derive(Default)]
struct DispatchCounters {
    scheduled: AtomicU64,
    delivered: AtomicU64,
    exhausted: AtomicU64,
    cancelled: AtomicU64,
    attempts: AtomicU64,
}

impl DispatchCounters {
    fn record(&self, report: &DeliveryReport) {
        self.attempts
            .fetch_add(report.attempts.len() as u64, Ordering::Relaxed);
        let counter = match report.outcome {
            DeliveryOutcome::Delivered => &self.delivered,
            DeliveryOutcome::Exhausted { .. } => &self.exhausted,
            DeliveryOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Dispatcher counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationStats {
    pub scheduled: u64,
    pub delivered: u64,
    pub exhausted: u64,
    pub cancelled: u64,
    pub attempts: u64,
    pub in_flight: usize,
    pub endpoint_count: usize,
}

pub struct NotificationDispatcher {
    config: NotificationDispatcherConfig,
    endpoints: RwLock<Arc<Vec<Arc<RuntimeEndpoint>>>>,
    builder: ChannelBuilder,
    repository: Option<Arc<dyn NotificationEndpointRepository>>,
    /// Serializes read-modify-swap of the endpoint list.
    admin_lock: Mutex<()>,
    tracker: TaskTracker,
    counters: Arc<DispatchCounters>,
    cancellation_token: CancellationToken,
}

impl NotificationDispatcher {
    /// Dispatcher delivering over HTTP webhooks.
    pub fn new(config: NotificationDispatcherConfig) -> Self {
        let client = http_client::build_client(Duration::from_secs(5));
        Self::with_channel_builder(config, webhook_builder(client))
    }

    pub fn with_channel_builder(
        config: NotificationDispatcherConfig,
        builder: ChannelBuilder,
    ) -> Self {
        Self {
            config,
            endpoints: RwLock::new(Arc::new(Vec::new())),
            builder,
            repository: None,
            admin_lock: Mutex::new(()),
            tracker: TaskTracker::new(),
            counters: Arc::new(DispatchCounters::default()),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn NotificationEndpointRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    fn runtime(&self, endpoint: NotificationEndpoint) -> Arc<RuntimeEndpoint> {
        let channel = (self.builder)(&endpoint);
        Arc::new(RuntimeEndpoint { endpoint, channel })
    }

    fn snapshot(&self) -> Arc<Vec<Arc<RuntimeEndpoint>>> {
        self.endpoints.read().clone()
    }

    fn swap(&self, endpoints: Vec<Arc<RuntimeEndpoint>>) {
        *self.endpoints.write() = Arc::new(endpoints);
    }

    /// Replace the whole endpoint list. Invalid entries are skipped.
    pub fn replace_endpoints(&self, endpoints: Vec<NotificationEndpoint>) -> usize {
        let runtime: Vec<_> = endpoints
            .into_iter()
            .filter(|endpoint| match endpoint.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(endpoint = %endpoint.id, "Skipping invalid endpoint: {}", e);
                    false
                }
            })
            .map(|endpoint| self.runtime(endpoint))
            .collect();
        let count = runtime.len();
        self.swap(runtime);
        count
    }

    /// Load configured endpoints plus any persisted in the database.
    pub async fn load(&self, configured: Vec<NotificationEndpoint>) -> Result<usize> {
        let _guard = self.admin_lock.lock().await;
        let mut endpoints: Vec<NotificationEndpoint> = configured
            .into_iter()
            .map(|mut endpoint| {
                endpoint.source = EndpointSource::Config;
                endpoint
            })
            .collect();

        if let Some(repo) = &self.repository {
            for model in repo.list_endpoints().await? {
                let id = model.id.clone();
                match model.into_endpoint() {
                    Ok(endpoint) => endpoints.push(endpoint),
                    Err(e) => warn!(endpoint = %id, "Skipping unreadable stored endpoint: {}", e),
                }
            }
        }

        let count = self.replace_endpoints(endpoints);
        info!(count, "Notification endpoints loaded");
        Ok(count)
    }

    pub fn list_endpoints(&self) -> Vec<NotificationEndpoint> {
        self.snapshot()
            .iter()
            .map(|runtime| runtime.endpoint.clone())
            .collect()
    }

    pub fn get_endpoint(&self, id: &str) -> Option<NotificationEndpoint> {
        self.snapshot()
            .iter()
            .find(|runtime| runtime.endpoint.id == id)
            .map(|runtime| runtime.endpoint.clone())
    }

    /// Validate, persist when a database is configured, and add an endpoint.
    pub async fn add_endpoint(
        &self,
        mut endpoint: NotificationEndpoint,
    ) -> Result<NotificationEndpoint> {
        endpoint.validate()?;
        let _guard = self.admin_lock.lock().await;

        let current = self.snapshot();
        if current.iter().any(|r| r.endpoint.id == endpoint.id) {
            return Err(Error::Conflict(format!(
                "endpoint '{}' already exists",
                endpoint.id
            )));
        }

        if let Some(repo) = &self.repository {
            endpoint.source = EndpointSource::Database;
            repo.create_endpoint(&NotificationEndpointDbModel::from_endpoint(&endpoint)?)
                .await?;
        } else {
            endpoint.source = EndpointSource::Dynamic;
        }

        let mut next: Vec<_> = current.iter().cloned().collect();
        next.push(self.runtime(endpoint.clone()));
        self.swap(next);

        info!(endpoint = %endpoint.id, url = %endpoint.url, "Notification endpoint added");
        Ok(endpoint)
    }

    /// Remove a runtime endpoint. Configured endpoints cannot be removed.
    pub async fn remove_endpoint(&self, id: &str) -> Result<()> {
        let _guard = self.admin_lock.lock().await;

        let current = self.snapshot();
        let target = current
            .iter()
            .find(|r| r.endpoint.id == id)
            .ok_or_else(|| Error::not_found("NotificationEndpoint", id))?;

        match target.endpoint.source {
            EndpointSource::Config => {
                return Err(Error::Conflict(format!(
                    "endpoint '{}' comes from configuration and cannot be removed",
                    id
                )));
            }
            EndpointSource::Database => {
                if let Some(repo) = &self.repository {
                    repo.delete_endpoint(id).await?;
                }
            }
            EndpointSource::Dynamic => {}
        }

        let next: Vec<_> = current
            .iter()
            .filter(|r| r.endpoint.id != id)
            .cloned()
            .collect();
        self.swap(next);

        info!(endpoint = %id, "Notification endpoint removed");
        Ok(())
    }

    /// Schedule delivery of one event to every matching endpoint.
    ///
    /// Returns immediately with the number of deliveries scheduled.
    pub fn notify(&self, kind: EventKind, payload: serde_json::Value) -> usize {
        if !self.config.enabled || self.cancellation_token.is_cancelled() {
            return 0;
        }

        let endpoints = self.snapshot();
        let message = Arc::new(OutboundMessage::new(kind, payload));
        let mut scheduled = 0;

        for runtime in endpoints
            .iter()
            .filter(|r| r.endpoint.enabled && r.endpoint.matches(kind))
        {
            let runtime = Arc::clone(runtime);
            let message = Arc::clone(&message);
            let counters = Arc::clone(&self.counters);
            let token = self.cancellation_token.clone();
            let backoff_unit = self.config.backoff_unit;

            self.tracker.spawn(async move {
                let report = deliver(
                    runtime.channel.as_ref(),
                    &runtime.endpoint,
                    &message,
                    backoff_unit,
                    &token,
                )
                .await;
                counters.record(&report);
                log_report(&runtime.endpoint, &report);
            });
            scheduled += 1;
        }

        self.counters
            .scheduled
            .fetch_add(scheduled as u64, Ordering::Relaxed);
        if scheduled == 0 {
            debug!(event = %kind, "No endpoint subscribed to event");
        }
        scheduled
    }

    /// Send one synthetic `test` event to one endpoint with a single attempt.
    pub async fn test_delivery(&self, id: &str) -> Result<DeliveryReport> {
        let runtime = self
            .snapshot()
            .iter()
            .find(|r| r.endpoint.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("NotificationEndpoint", id))?;

        let mut endpoint = runtime.endpoint.clone();
        endpoint.max_attempts = 1;
        let message = OutboundMessage::new(
            EventKind::Test,
            json!({
                "message": "This is a test webhook",
                "test": true,
            }),
        );

        let report = deliver(
            runtime.channel.as_ref(),
            &endpoint,
            &message,
            self.config.backoff_unit,
            &self.cancellation_token,
        )
        .await;
        log_report(&endpoint, &report);
        Ok(report)
    }

    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            scheduled: self.counters.scheduled.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            exhausted: self.counters.exhausted.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            in_flight: self.tracker.len(),
            endpoint_count: self.snapshot().len(),
        }
    }

    /// Wait until every scheduled delivery has finished.
    pub async fn wait_idle(&self) {
        while !self.tracker.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Cancel backoff sleeps and wait for in-flight attempts.
    pub async fn stop(&self) {
        info!("Stopping notification dispatcher");
        self.cancellation_token.cancel();
        self.tracker.close();
        if tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.tracker.len(),
                "Timed out waiting for notification deliveries"
            );
        }
        info!("Notification dispatcher stopped");
    }
}

fn log_report(endpoint: &NotificationEndpoint, report: &DeliveryReport) {
    match &report.outcome {
        DeliveryOutcome::Delivered => debug!(
            endpoint = %endpoint.display_name(),
            event = %report.event,
            attempts = report.attempts.len(),
            "Notification delivered"
        ),
        DeliveryOutcome::Exhausted { last_error } => {
            let err = Error::DeliveryExhausted {
                endpoint: endpoint.display_name().to_string(),
                attempts: report.attempt_count(),
                last_error: last_error.clone(),
            };
            error!(event = %report.event, "{}", err);
        }
        DeliveryOutcome::Cancelled => warn!(
            endpoint = %endpoint.display_name(),
            event = %report.event,
            attempts = report.attempts.len(),
            "Notification delivery cancelled by shutdown"
        ),
    }
}
