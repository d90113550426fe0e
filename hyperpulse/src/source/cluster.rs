use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CarbonReading, Source, SourceReport};
use crate::snapshot::{Alert, VmCounts, WorkloadCounts};
use crate::{Error, Result};

/// Cluster-level resource figures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterResources {
    pub total_cpus: u64,
    pub total_memory_gib: f64,
    pub cpu_usage_percent: f64,
}

/// Status document served at `{base_url}/status`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterStatus {
    pub virtual_machines: VmCounts,
    pub backups: WorkloadCounts,
    pub restores: WorkloadCounts,
    pub resources: ClusterResources,
    pub carbon: CarbonReading,
    pub jobs_by_provider: BTreeMap<String, u64>,
    pub alerts: Vec<Alert>,
}

impl From<ClusterStatus> for SourceReport {
    fn from(status: ClusterStatus) -> Self {
        let mut report = SourceReport {
            virtual_machines: status.virtual_machines,
            backups: status.backups,
            restores: status.restores,
            jobs_by_provider: status.jobs_by_provider,
            carbon: status.carbon,
            alerts: status.alerts,
            ..Default::default()
        };
        report.resources.total_cpus = status.resources.total_cpus;
        report.resources.total_memory_gib = status.resources.total_memory_gib;
        report.resources.cpu_usage_percent = status.resources.cpu_usage_percent;
        report
    }
}

/// Polls one cluster's status endpoint over HTTP.
pub struct ClusterSource {
    name: String,
    status_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ClusterSource {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let base = url::Url::parse(base_url)
            .map_err(|e| Error::config(format!("cluster '{}' url '{}': {}", name, base_url, e)))?;
        let status_url = format!("{}/status", base.as_str().trim_end_matches('/'));
        Ok(Self {
            name,
            status_url,
            client,
            timeout,
        })
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }
}

#[async_trait]
impl Source for ClusterSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<SourceReport> {
        let response = self
            .client
            .get(&self.status_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::source_unavailable(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source_unavailable(
                &self.name,
                format!("status endpoint returned {}", status),
            ));
        }

        let document: ClusterStatus = response
            .json()
            .await
            .map_err(|e| Error::source_unavailable(&self.name, format!("decode: {}", e)))?;
        debug!(
            cluster = %self.name,
            vms = document.virtual_machines.total,
            "Cluster status fetched"
        );
        Ok(document.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;

    fn client() -> reqwest::Client {
        crate::utils::http_client::build_client(Duration::ZERO)
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetches_and_maps_status() {
        let base = serve(Router::new().route(
            "/status",
            get(|| async {
                Json(json!({
                    "virtual_machines": {"total": 12, "running": 9, "stopped": 2, "failed": 1},
                    "backups": {"total": 5, "completed": 4, "failed": 1},
                    "resources": {"total_cpus": 48, "total_memory_gib": 192.0},
                    "carbon": {"carbon_aware_vms": 3, "average_intensity_gco2_kwh": 210.5}
                }))
            }),
        ))
        .await;

        let source =
            ClusterSource::new("east", &base, client(), Duration::from_secs(2))
                .unwrap();
        let report = source.fetch().await.unwrap();
        assert_eq!(report.virtual_machines.running, 9);
        assert_eq!(report.backups.completed, 4);
        assert_eq!(report.backups.pending, 0);
        assert_eq!(report.restores, WorkloadCounts::default());
        assert_eq!(report.resources.total_cpus, 48);
        assert_eq!(report.carbon.carbon_aware_vms, 3);
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable() {
        let base = serve(Router::new().route(
            "/status",
            get(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;

        let source =
            ClusterSource::new("west", &base, client(), Duration::from_secs(2))
                .unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_partial_nested_counters_decode() {
        let status: ClusterStatus = serde_json::from_value(json!({
            "virtual_machines": {"running": 4},
            "backups": {"failed": 2},
            "resources": {"cpu_usage_percent": 37.5}
        }))
        .unwrap();
        assert_eq!(status.virtual_machines.running, 4);
        assert_eq!(status.virtual_machines.total, 0);
        assert_eq!(status.backups.failed, 2);
        assert_eq!(status.backups.completed, 0);
        assert_eq!(status.resources.total_cpus, 0);
        assert_eq!(status.resources.cpu_usage_percent, 37.5);
    }

    #[test]
    fn test_status_url_joins_base() {
        let source = ClusterSource::new(
            "c",
            "http://cluster.local:8080/api/",
            client(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(source.status_url(), "http://cluster.local:8080/api/status");
    }
}
