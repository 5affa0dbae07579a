//! Per-user traffic harvesting and reporting

use std::sync::Arc;

use super::adapter::ProxyEngineAdapter;
use super::api::{PanelApi, UserTraffic};
use super::reconciler::UserDirectory;
use crate::core::{counter_name, Direction, UserRecord};
use crate::error::Result;
use crate::logger::log;

/// Format bytes into human-readable string (KB, MB, GB)
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Reads and resets the engine counters of every directory user.
///
/// Counters are zeroed as they are read, so each byte is reported at most
/// once. A failed report loses that interval.
pub struct TrafficCollector {
    api: Arc<dyn PanelApi>,
    adapter: Arc<ProxyEngineAdapter>,
    directory: UserDirectory,
}

impl TrafficCollector {
    pub fn new(
        api: Arc<dyn PanelApi>,
        adapter: Arc<ProxyEngineAdapter>,
        directory: UserDirectory,
    ) -> Self {
        Self {
            api,
            adapter,
            directory,
        }
    }

    /// Harvest counters for the given users, skipping idle ones
    pub fn collect_records(&self, records: &[UserRecord]) -> Vec<UserTraffic> {
        let tag = self.adapter.tag();
        records
            .iter()
            .filter_map(|record| {
                let email = record.identity.key(tag);
                let up = self
                    .adapter
                    .take_counter(&counter_name(&email, Direction::Uplink));
                let down = self
                    .adapter
                    .take_counter(&counter_name(&email, Direction::Downlink));
                (up > 0 || down > 0).then(|| UserTraffic::new(record.identity.id, up, down))
            })
            .collect()
    }

    /// Harvest counters for the current directory snapshot
    pub async fn collect(&self) -> Vec<UserTraffic> {
        let records = self.directory.snapshot().await;
        self.collect_records(&records)
    }

    /// Forward samples to the panel; empty batches are not sent
    pub async fn report(&self, samples: &[UserTraffic]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let total_upload: u64 = samples.iter().map(|t| t.u).sum();
        let total_download: u64 = samples.iter().map(|t| t.d).sum();
        self.api.report_traffic(samples).await?;
        log::info!(
            users = samples.len(),
            upload = %format_bytes(total_upload),
            download = %format_bytes(total_download),
            "Traffic reported"
        );
        Ok(())
    }

    /// One collection cycle; returns the number of users reported
    pub async fn collect_and_report(&self) -> Result<usize> {
        let samples = self.collect().await;
        log::info!(count = samples.len(), "User traffic needs to be reported");
        self.report(&samples).await?;
        Ok(samples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::api::{NodeInfo, UserInfo};
    use crate::business::inbound::build_inbound;
    use crate::core::{CipherKind, MemoryEngine, ProxyEngine, StatsCollector, UserIdentity};
    use crate::error::NodeError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPanel {
        reports: Mutex<Vec<Vec<UserTraffic>>>,
        fail_reports: bool,
    }

    #[async_trait]
    impl PanelApi for RecordingPanel {
        async fn fetch_node_info(&self) -> Result<NodeInfo> {
            Err(NodeError::Api("unused".to_string()))
        }

        async fn fetch_users(&self) -> Result<Vec<UserInfo>> {
            Err(NodeError::Api("unused".to_string()))
        }

        async fn report_traffic(&self, data: &[UserTraffic]) -> Result<()> {
            if self.fail_reports {
                return Err(NodeError::Api("push returned HTTP 502".to_string()));
            }
            self.reports.lock().unwrap().push(data.to_vec());
            Ok(())
        }
    }

    fn setup(panel: Arc<RecordingPanel>) -> (Arc<MemoryEngine>, TrafficCollector) {
        let engine = Arc::new(MemoryEngine::new());
        let descriptor = build_inbound(&NodeInfo {
            server_port: 443,
            cipher: "aes-128-gcm".to_string(),
        })
        .unwrap();
        engine.add_inbound(&descriptor).unwrap();
        let adapter = Arc::new(ProxyEngineAdapter::new(engine.clone(), &descriptor.tag).unwrap());
        let collector = TrafficCollector::new(panel, adapter, UserDirectory::new());
        (engine, collector)
    }

    fn record(id: i64, secret: &str) -> UserRecord {
        UserRecord::new(UserIdentity::new(id, secret), CipherKind::Aes128Gcm)
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00GB");
    }

    #[test]
    fn test_collect_reads_and_resets() {
        let (engine, collector) = setup(Arc::new(RecordingPanel::default()));
        let x = record(1, "x");
        engine.record_upload("shadowsocks_443|1|x", 100);
        engine.record_download("shadowsocks_443|1|x", 50);

        let samples = collector.collect_records(&[x.clone()]);
        assert_eq!(samples, vec![UserTraffic::new(1, 100, 50)]);

        assert_eq!(
            engine
                .stats()
                .get_counter("user>>>shadowsocks_443|1|x>>>traffic>>>uplink")
                .unwrap()
                .value(),
            0
        );

        // No traffic in between: no sample
        assert!(collector.collect_records(&[x]).is_empty());
    }

    #[test]
    fn test_collect_skips_idle_and_missing_counters() {
        let (engine, collector) = setup(Arc::new(RecordingPanel::default()));
        engine.record_download("shadowsocks_443|2|b", 7);
        engine.record_upload("shadowsocks_443|3|c", 0);

        let samples = collector.collect_records(&[record(1, "a"), record(2, "b"), record(3, "c")]);
        assert_eq!(samples, vec![UserTraffic::new(2, 0, 7)]);
    }

    #[test]
    fn test_collect_ignores_users_outside_directory() {
        let (engine, collector) = setup(Arc::new(RecordingPanel::default()));
        engine.record_upload("shadowsocks_443|9|stranger", 1000);
        assert!(collector.collect_records(&[record(1, "a")]).is_empty());
    }

    #[test]
    fn test_counts_once_across_cycles() {
        let (engine, collector) = setup(Arc::new(RecordingPanel::default()));
        let a = record(1, "a");
        let mut total = 0;
        for bytes in [10u64, 20, 30] {
            engine.record_upload("shadowsocks_443|1|a", bytes);
            total += collector
                .collect_records(std::slice::from_ref(&a))
                .iter()
                .map(|s| s.u)
                .sum::<u64>();
        }
        assert_eq!(total, 60);
    }

    #[tokio::test]
    async fn test_report_skips_empty_batch() {
        let panel = Arc::new(RecordingPanel::default());
        let (_engine, collector) = setup(panel.clone());
        collector.report(&[]).await.unwrap();
        assert!(panel.reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_forwards_samples() {
        let panel = Arc::new(RecordingPanel::default());
        let (_engine, collector) = setup(panel.clone());
        collector
            .report(&[UserTraffic::new(1, 10, 20)])
            .await
            .unwrap();
        assert_eq!(
            *panel.reports.lock().unwrap(),
            vec![vec![UserTraffic::new(1, 10, 20)]]
        );
    }

    #[tokio::test]
    async fn test_failed_report_does_not_restore_counters() {
        let panel = Arc::new(RecordingPanel {
            fail_reports: true,
            ..Default::default()
        });
        let (engine, collector) = setup(panel);
        let a = record(1, "a");
        engine.record_upload("shadowsocks_443|1|a", 100);

        let samples = collector.collect_records(std::slice::from_ref(&a));
        assert!(collector.report(&samples).await.is_err());
        assert!(collector.collect_records(&[a]).is_empty());
    }
}
