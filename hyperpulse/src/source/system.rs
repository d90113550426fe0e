use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::{Source, SourceReport};
use crate::Result;
use crate::snapshot::ResourceUsage;

/// Host memory and CPU usage.
pub struct SystemSource {
    system: Mutex<System>,
}

impl SystemSource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_with_specifics(
                RefreshKind::nothing()
                    .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                    .with_memory(MemoryRefreshKind::nothing().with_ram()),
            )),
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for SystemSource {
    fn name(&self) -> &str {
        "system"
    }

    async fn fetch(&self) -> Result<SourceReport> {
        let resources = {
            let mut system = self.system.lock();
            system.refresh_cpu_all();
            system.refresh_memory();
            ResourceUsage {
                memory_used_bytes: system.used_memory(),
                memory_total_bytes: system.total_memory(),
                cpu_usage_percent: f64::from(system.global_cpu_usage()),
                ..Default::default()
            }
        };
        Ok(SourceReport {
            resources,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_host_memory() {
        let report = SystemSource::new().fetch().await.unwrap();
        assert!(report.resources.memory_total_bytes > 0);
        assert!(report.resources.memory_used_bytes <= report.resources.memory_total_bytes);
        assert_eq!(report.jobs, Default::default());
    }
}
